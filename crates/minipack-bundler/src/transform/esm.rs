// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! ECMAScript module lowering
//!
//! Rewrites line-leading `import` / `export` declarations into CommonJS:
//! - `import d from 'm'`, `import { a as b } from 'm'`, `import * as ns from 'm'`
//! - `import 'm'`
//! - `export default ...`, `export function|class|const|let|var ...`
//! - `export { a as b }`, `export { a } from 'm'`, `export * (as ns) from 'm'`
//!
//! Dynamic `import()` and `import.meta` are left alone. Imported bindings are
//! copied when the import runs; references are not rewritten.
//!
//! Statements and `require` calls are only recognized in code: comments and
//! the contents of string and template literals are masked out first.
//! Regular expression literals are not recognized.

use super::{SourceTransformer, TransformError, Transformed};
use indexmap::IndexSet;
use regex::{Captures, Regex};
use rustc_hash::FxHashSet;
use std::iter::Peekable;
use std::str::Chars;
use std::sync::LazyLock;

macro_rules! regex {
    ($pattern:expr) => {
        LazyLock::new(|| Regex::new($pattern).expect("invalid built-in pattern"))
    };
}

/// Start of a line-leading `import` / `export`
static STATEMENT: LazyLock<Regex> = regex!(r"(?m)^[ \t]*(import|export)\b");

static IMPORT_DYNAMIC: LazyLock<Regex> = regex!(r"\Aimport\s*[(.]");

static IMPORT_FROM: LazyLock<Regex> = regex!(
    r#"\Aimport\s*(?P<clause>[^'";]*?)\s*from\s*(?P<spec>'[^'\n]*'|"[^"\n]*")[ \t]*;?"#
);

static IMPORT_BARE: LazyLock<Regex> =
    regex!(r#"\Aimport\s*(?P<spec>'[^'\n]*'|"[^"\n]*")[ \t]*;?"#);

static EXPORT_ALL: LazyLock<Regex> = regex!(
    r#"\Aexport\s*\*\s*(?:as\s+(?P<name>[\w$]+)\s*)?from\s*(?P<spec>'[^'\n]*'|"[^"\n]*")[ \t]*;?"#
);

static EXPORT_LIST: LazyLock<Regex> = regex!(
    r#"\Aexport\s*\{(?P<list>[^}]*)\}(?:\s*from\s*(?P<spec>'[^'\n]*'|"[^"\n]*"))?[ \t]*;?"#
);

static EXPORT_DEFAULT_DECL: LazyLock<Regex> = regex!(
    r"\Aexport\s+default\s+(?P<decl>(?:async\s+)?function\b\s*\*?\s*(?P<fname>[\w$]+)|class\s+(?P<cname>[\w$]+))"
);

static EXPORT_DEFAULT: LazyLock<Regex> = regex!(r"\Aexport\s+default\b\s*");

static EXPORT_DECL: LazyLock<Regex> = regex!(
    r"\Aexport\s+(?P<decl>(?:async\s+)?function\b\s*\*?\s*(?P<fname>[\w$]+)|class\s+(?P<cname>[\w$]+)|(?:const|let|var)\s+(?P<vname>[\w$]+))"
);

/// `require('...')` with a string literal argument
static REQUIRE_CALL: LazyLock<Regex> =
    regex!(r#"\brequire\s*\(\s*(?:'(?P<single>[^'\n]*)'|"(?P<double>[^"\n]*)")\s*\)"#);

static IDENTIFIER: LazyLock<Regex> = regex!(r"\A[A-Za-z_$][\w$]*\z");

/// Leading identifier
static BINDING: LazyLock<Regex> = regex!(r"\A[A-Za-z_$][\w$]*");

/// Anything shaped like an identifier
static WORD: LazyLock<Regex> = regex!(r"[A-Za-z_$][\w$]*");

const INTEROP_HELPER: &str = r#"function _interopRequireDefault(obj) { return obj && obj.__esModule ? obj : { "default": obj }; }"#;

/// Lowers ES module syntax to CommonJS and collects `require` specifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct EsmTransformer;

impl EsmTransformer {
    /// Create a transformer
    pub fn new() -> Self {
        Self
    }
}

impl SourceTransformer for EsmTransformer {
    fn transform(&self, source: &str) -> Result<Transformed, TransformError> {
        let code = Lowering::new(source).run(source)?;
        let specifiers = require_specifiers(&code);
        Ok(Transformed { code, specifiers })
    }
}

/// Import clause between `import` and `from`
#[derive(Debug, PartialEq, Eq)]
enum ImportClause {
    /// `import d from`
    Default(String),
    /// `import * as ns from`
    Namespace(String),
    /// `import { a, b as c } from` as (imported, local) pairs
    Named(Vec<(String, String)>),
    /// `import d, * as ns from`
    DefaultAndNamespace(String, String),
    /// `import d, { a } from`
    DefaultAndNamed(String, Vec<(String, String)>),
}

/// Replacement for one statement
struct Lowered {
    /// Bytes of the original text replaced
    consumed: usize,
    /// Replacement text
    text: String,
}

/// Per-file lowering state
#[derive(Default)]
struct Lowering {
    /// Hoisted export assignments, emitted right after the prologue
    hoisted: Vec<String>,
    /// Export assignments emitted after the body
    trailer: Vec<String>,
    /// Saw any import/export
    is_module: bool,
    /// Saw any export
    has_exports: bool,
    /// Emit `_interopRequireDefault`
    needs_interop: bool,
    /// Names a temporary may not take: every identifier in the file plus
    /// the temporaries generated so far
    temps: FxHashSet<String>,
}

impl Lowering {
    fn new(source: &str) -> Self {
        let mut temps: FxHashSet<String> = WORD
            .find_iter(source)
            .map(|m| m.as_str().to_string())
            .collect();
        temps.insert("_interopRequireDefault".to_string());
        Self {
            temps,
            ..Self::default()
        }
    }

    fn run(mut self, source: &str) -> Result<String, TransformError> {
        let masked = mask_literals(source);
        let mut body = String::with_capacity(source.len());
        let mut cursor = 0;

        for caps in STATEMENT.captures_iter(&masked) {
            let Some(keyword) = caps.get(1) else {
                continue;
            };
            let start = keyword.start();
            if start < cursor {
                continue;
            }

            let lowered = self
                .lower(&source[start..], &masked[start..])
                .map_err(|message| TransformError::at(source, start, message))?;
            if let Some(lowered) = lowered {
                body.push_str(&source[cursor..start]);
                body.push_str(&lowered.text);
                cursor = start + lowered.consumed;
            }
        }
        body.push_str(&source[cursor..]);

        Ok(self.finish(body))
    }

    fn finish(self, body: String) -> String {
        if !self.is_module {
            return body;
        }

        let mut code = String::from("\"use strict\";\n\n");
        if self.has_exports {
            code.push_str("Object.defineProperty(exports, \"__esModule\", {\n  value: true\n});\n");
        }
        for line in &self.hoisted {
            code.push_str(line);
            code.push('\n');
        }
        code.push_str(&body);
        if !self.trailer.is_empty() || self.needs_interop {
            if !code.ends_with('\n') {
                code.push('\n');
            }
            for line in &self.trailer {
                code.push_str(line);
                code.push('\n');
            }
            if self.needs_interop {
                code.push_str(INTEROP_HELPER);
                code.push('\n');
            }
        }
        code
    }

    /// Lower the statement at the start of `rest`; `masked` is the same text
    /// with literals blanked
    fn lower(&mut self, rest: &str, masked: &str) -> Result<Option<Lowered>, String> {
        if rest.starts_with("import") {
            if IMPORT_DYNAMIC.is_match(rest) {
                return Ok(None);
            }
            self.is_module = true;
            if let Some(caps) = IMPORT_FROM.captures(rest) {
                let clause = parse_import_clause(&caps["clause"])?;
                let text = self.import_from(clause, &unquote(&caps["spec"]));
                return Ok(Some(lowered(&caps, text)));
            }
            if let Some(caps) = IMPORT_BARE.captures(rest) {
                let text = format!("{};", require_call(&unquote(&caps["spec"])));
                return Ok(Some(lowered(&caps, text)));
            }
            return Err("unsupported import syntax".to_string());
        }

        self.is_module = true;
        self.has_exports = true;

        if let Some(caps) = EXPORT_ALL.captures(rest) {
            let spec = unquote(&caps["spec"]);
            let text = match caps.name("name") {
                Some(name) => format!("{} = {};", export_target(name.as_str()), require_call(&spec)),
                None => self.export_all(&spec),
            };
            return Ok(Some(lowered(&caps, text)));
        }

        if let Some(caps) = EXPORT_LIST.captures(rest) {
            let pairs = parse_list(&caps["list"])?;
            let text = match caps.name("spec") {
                Some(spec) => self.export_from(pairs, &unquote(spec.as_str())),
                None => {
                    for (local, exported) in pairs {
                        self.trailer
                            .push(format!("{} = {};", export_target(&exported), local));
                    }
                    String::new()
                }
            };
            return Ok(Some(lowered(&caps, text)));
        }

        if let Some(caps) = EXPORT_DEFAULT_DECL.captures(rest) {
            let anonymous_class = caps.name("cname").is_some_and(|c| c.as_str() == "extends");
            if !anonymous_class {
                let target = export_target("default");
                if let Some(name) = caps.name("fname") {
                    self.hoisted.push(format!("{} = {};", target, name.as_str()));
                } else if let Some(name) = caps.name("cname") {
                    self.trailer.push(format!("{} = {};", target, name.as_str()));
                }
                return Ok(Some(strip_prefix(&caps)));
            }
        }

        if let Some(caps) = EXPORT_DEFAULT.captures(rest) {
            let text = format!("{} = ", export_target("default"));
            return Ok(Some(lowered(&caps, text)));
        }

        if let Some(caps) = EXPORT_DECL.captures(rest) {
            if let Some(name) = caps.name("fname") {
                let name = name.as_str();
                self.hoisted.push(format!("{} = {};", export_target(name), name));
            } else if let Some(name) = caps.name("cname") {
                let name = name.as_str();
                self.trailer.push(format!("{} = {};", export_target(name), name));
            } else if let Some(name) = caps.name("vname") {
                for name in declared_names(&masked[name.start()..])? {
                    self.trailer.push(format!("{} = {};", export_target(&name), name));
                }
            }
            return Ok(Some(strip_prefix(&caps)));
        }

        Err("unsupported export syntax".to_string())
    }

    fn import_from(&mut self, clause: ImportClause, spec: &str) -> String {
        let require = require_call(spec);
        match clause {
            ImportClause::Default(local) => {
                self.needs_interop = true;
                format!("var {local} = _interopRequireDefault({require})[\"default\"];")
            }
            ImportClause::Namespace(local) => format!("var {local} = {require};"),
            ImportClause::Named(pairs) if pairs.is_empty() => format!("{require};"),
            ImportClause::Named(pairs) => {
                let temp = self.temp_for(spec);
                let mut text = format!("var {temp} = {require};");
                push_bindings(&mut text, &temp, &pairs);
                text
            }
            ImportClause::DefaultAndNamespace(default, namespace) => {
                self.needs_interop = true;
                format!(
                    "var {namespace} = {require}; var {default} = _interopRequireDefault({namespace})[\"default\"];"
                )
            }
            ImportClause::DefaultAndNamed(default, pairs) => {
                self.needs_interop = true;
                let temp = self.temp_for(spec);
                let mut text = format!(
                    "var {temp} = {require}; var {default} = _interopRequireDefault({temp})[\"default\"];"
                );
                push_bindings(&mut text, &temp, &pairs);
                text
            }
        }
    }

    fn export_from(&mut self, pairs: Vec<(String, String)>, spec: &str) -> String {
        let temp = self.temp_for(spec);
        let mut text = format!("var {temp} = {};", require_call(spec));
        for (imported, exported) in pairs {
            text.push_str(&format!(
                " Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {temp}{}; }} }});",
                js_string(&exported),
                member(&imported)
            ));
        }
        text
    }

    fn export_all(&mut self, spec: &str) -> String {
        let temp = self.temp_for(spec);
        format!(
            "var {temp} = {require}; Object.keys({temp}).forEach(function (key) {{ \
             if (key === \"default\" || key === \"__esModule\") return; \
             if (key in exports && exports[key] === {temp}[key]) return; \
             Object.defineProperty(exports, key, {{ enumerable: true, get: function () {{ return {temp}[key]; }} }}); }});",
            require = require_call(spec)
        )
    }

    /// Unique `_name` temporary derived from the specifier's file name
    fn temp_for(&mut self, spec: &str) -> String {
        let stem = spec
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(spec)
            .split('.')
            .next()
            .unwrap_or_default();
        let mut base: String = stem
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
            .collect();
        if base.is_empty() {
            base.push_str("module");
        }

        let mut candidate = format!("_{base}");
        let mut n = 2;
        while !self.temps.insert(candidate.clone()) {
            candidate = format!("_{base}{n}");
            n += 1;
        }
        candidate
    }
}

fn lowered(caps: &Captures<'_>, text: String) -> Lowered {
    Lowered {
        consumed: caps.get(0).map_or(0, |m| m.end()),
        text,
    }
}

/// Drop the `export ...` keywords in front of a kept declaration
fn strip_prefix(caps: &Captures<'_>) -> Lowered {
    Lowered {
        consumed: caps.name("decl").map_or(0, |m| m.start()),
        text: String::new(),
    }
}

fn parse_import_clause(clause: &str) -> Result<ImportClause, String> {
    let clause = clause.trim();
    if clause.is_empty() {
        return Err("import clause is empty".to_string());
    }

    let (default, rest) = match clause.split_once(',') {
        Some((default, rest)) if !clause.starts_with('{') => (Some(default.trim()), rest.trim()),
        _ => (None, clause),
    };

    if let Some(default) = default {
        if !is_identifier(default) {
            return Err(format!("invalid default import '{default}'"));
        }
        let default = default.to_string();
        return match parse_clause_tail(rest)? {
            Tail::Namespace(ns) => Ok(ImportClause::DefaultAndNamespace(default, ns)),
            Tail::Named(pairs) => Ok(ImportClause::DefaultAndNamed(default, pairs)),
            Tail::Default(_) => Err(format!("unsupported import clause '{clause}'")),
        };
    }

    Ok(match parse_clause_tail(rest)? {
        Tail::Default(name) => ImportClause::Default(name),
        Tail::Namespace(ns) => ImportClause::Namespace(ns),
        Tail::Named(pairs) => ImportClause::Named(pairs),
    })
}

enum Tail {
    Default(String),
    Namespace(String),
    Named(Vec<(String, String)>),
}

fn parse_clause_tail(part: &str) -> Result<Tail, String> {
    if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        return parse_list(inner).map(Tail::Named);
    }
    if let Some(ns) = part.strip_prefix('*') {
        let ns = ns.trim_start();
        return match ns.strip_prefix("as") {
            Some(name) if name.starts_with(char::is_whitespace) && is_identifier(name.trim()) => {
                Ok(Tail::Namespace(name.trim().to_string()))
            }
            _ => Err(format!("invalid namespace import '{part}'")),
        };
    }
    if is_identifier(part) {
        return Ok(Tail::Default(part.to_string()));
    }
    Err(format!("unsupported import clause '{part}'"))
}

/// Parse `a, b as c` into (name, alias) pairs
fn parse_list(list: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let words: Vec<&str> = part.split_whitespace().collect();
        let (name, alias) = match words.as_slice() {
            [name] => (*name, *name),
            [name, "as", alias] => (*name, *alias),
            _ => return Err(format!("invalid binding '{part}'")),
        };
        if !is_identifier(name) || !is_identifier(alias) {
            return Err(format!("invalid binding '{part}'"));
        }
        pairs.push((name.to_string(), alias.to_string()));
    }
    Ok(pairs)
}

fn push_bindings(text: &mut String, temp: &str, pairs: &[(String, String)]) {
    for (imported, local) in pairs {
        text.push_str(&format!(" var {local} = {temp}{};", member(imported)));
    }
}

/// Names bound by a `const`/`let`/`var` list, read from its first binding
/// up to the end of the statement. `text` must have its literals masked.
fn declared_names(text: &str) -> Result<Vec<String>, String> {
    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut expect_name = true;
    let mut last = ' ';
    let mut offset = 0;

    while let Some(c) = text[offset..].chars().next() {
        let rest = &text[offset..];
        if expect_name {
            if c.is_whitespace() {
                offset += c.len_utf8();
                continue;
            }
            let Some(word) = BINDING.find(rest) else {
                return Err("destructuring exports are not supported".to_string());
            };
            names.push(word.as_str().to_string());
            offset += word.end();
            expect_name = false;
            last = 'a';
            continue;
        }

        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => expect_name = true,
            ';' if depth == 0 => break,
            '\n' if depth == 0 && !continues_after(last, &rest[1..]) => break,
            _ => {}
        }
        if !c.is_whitespace() {
            last = c;
        }
        offset += c.len_utf8();
    }
    Ok(names)
}

/// Whether a line break after `last` keeps the expression going
fn continues_after(last: char, next: &str) -> bool {
    ",=+-*/%&|^<>?:.!~(".contains(last)
        || next
            .trim_start()
            .starts_with(|c: char| ",.?:=+-*/%&|^<>".contains(c))
}

fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Property access suffix for `name`
fn member(name: &str) -> String {
    if name == "default" || !is_identifier(name) {
        format!("[{}]", js_string(name))
    } else {
        format!(".{name}")
    }
}

fn export_target(name: &str) -> String {
    format!("exports{}", member(name))
}

fn require_call(spec: &str) -> String {
    format!("require({})", js_string(spec))
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

fn unquote(literal: &str) -> String {
    literal[1..literal.len() - 1].to_string()
}

/// Specifiers of every `require("...")` call in code, first appearance first
fn require_specifiers(code: &str) -> Vec<String> {
    let masked = mask_literals(code);
    let mut seen = IndexSet::new();
    for caps in REQUIRE_CALL.captures_iter(&masked) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        // `obj.require(...)` is someone else's function
        if masked[..whole.start()].trim_end().ends_with('.') {
            continue;
        }
        if let Some(spec) = caps.name("single").or_else(|| caps.name("double")) {
            seen.insert(code[spec.range()].to_string());
        }
    }
    seen.into_iter().collect()
}

/// Copy of `source` with comments and the contents of string and template
/// literals replaced by spaces. Quotes, line breaks and byte offsets are
/// kept, so a match in the copy indexes the same text in `source`.
fn mask_literals(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    // brace depth at which each open `${` closes
    let mut substitutions: Vec<usize> = Vec::new();
    let mut depth = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                blank(&mut out, c);
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    blank(&mut out, next);
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                blank(&mut out, c);
                chars.next();
                blank(&mut out, '*');
                let mut prev = ' ';
                for next in chars.by_ref() {
                    blank(&mut out, next);
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '\'' | '"' => {
                out.push(c);
                while let Some(next) = chars.next() {
                    match next {
                        '\\' => {
                            blank(&mut out, next);
                            if let Some(escaped) = chars.next() {
                                blank(&mut out, escaped);
                            }
                        }
                        '\n' => {
                            out.push(next);
                            break;
                        }
                        quote if quote == c => {
                            out.push(quote);
                            break;
                        }
                        other => blank(&mut out, other),
                    }
                }
            }
            '`' => {
                out.push(c);
                if template_chunk(&mut chars, &mut out) {
                    substitutions.push(depth);
                }
            }
            '{' => {
                depth += 1;
                out.push(c);
            }
            '}' if substitutions.last() == Some(&depth) => {
                substitutions.pop();
                out.push(c);
                if template_chunk(&mut chars, &mut out) {
                    substitutions.push(depth);
                }
            }
            '}' => {
                depth = depth.saturating_sub(1);
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

/// Mask template text up to its closing backtick or next `${`; true when a
/// substitution was opened
fn template_chunk(chars: &mut Peekable<Chars<'_>>, out: &mut String) -> bool {
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                blank(out, c);
                if let Some(escaped) = chars.next() {
                    blank(out, escaped);
                }
            }
            '`' => {
                out.push(c);
                return false;
            }
            '$' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push_str("${");
                return true;
            }
            other => blank(out, other),
        }
    }
    false
}

fn blank(out: &mut String, c: char) {
    if c == '\n' {
        out.push('\n');
    } else {
        out.extend(std::iter::repeat_n(' ', c.len_utf8()));
    }
}
