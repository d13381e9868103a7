// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Source transformation
//!
//! A transformer turns one file's text into code the bundle runtime can
//! execute (only `require` and `exports` in scope) and reports the raw
//! specifiers that code requires. It knows nothing about the graph.

mod esm;

pub use esm::EsmTransformer;

use thiserror::Error;

/// Output of a transformer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transformed {
    /// Executable code
    pub code: String,
    /// Raw specifiers in order of first appearance, without duplicates
    pub specifiers: Vec<String>,
}

impl Transformed {
    /// Create a transform result
    pub fn new(code: impl Into<String>, specifiers: Vec<String>) -> Self {
        Self {
            code: code.into(),
            specifiers,
        }
    }
}

/// A source file could not be transformed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct TransformError {
    /// 1-based line of the offending construct
    pub line: usize,
    /// Diagnostic
    pub message: String,
}

impl TransformError {
    /// Create an error at `line`
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    /// Create an error for the construct starting at byte `offset` of `source`
    pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let line = source[..offset.min(source.len())].matches('\n').count() + 1;
        Self::new(line, message)
    }
}

/// Turns module source into bundle-ready code
pub trait SourceTransformer: Send + Sync {
    /// Transform one file's contents
    fn transform(&self, source: &str) -> Result<Transformed, TransformError>;
}

impl<F> SourceTransformer for F
where
    F: Fn(&str) -> Result<Transformed, TransformError> + Send + Sync,
{
    fn transform(&self, source: &str) -> Result<Transformed, TransformError> {
        self(source)
    }
}
