// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! minipack CLI - bundle a JavaScript module graph into one file

use anyhow::Context;
use clap::Parser;
use minipack_bundler::{BundleConfig, Bundler, CONFIG_FILE, FsStorage, VERSION};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "minipack",
    about = "Bundle a relative-import JavaScript module graph into one self-contained file",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Config file (defaults to minipack.config.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Entry module, overriding the config file
    #[arg(short, long)]
    entry: Option<PathBuf>,

    /// Output directory, overriding the config file
    #[arg(short = 'o', long = "out-dir")]
    out_dir: Option<PathBuf>,

    /// Bundle file name, overriding the config file
    #[arg(short, long)]
    filename: Option<String>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Print the bundle to stdout instead of writing it
    #[arg(long)]
    print: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("minipack=debug,minipack_bundler=debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("minipack=warn,minipack_bundler=warn")
            .with_writer(std::io::stderr)
            .init();
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let bundler = Bundler::new(config);

    let build = bundler.clone();
    let artifact = tokio::task::spawn_blocking(move || build.bundle())
        .await
        .context("build task panicked")??;

    if cli.print {
        print!("{}", artifact.code);
        return Ok(());
    }

    let path = bundler.write(&artifact)?;
    println!(
        "{} {} ({} modules)",
        "Bundle written to".green().bold(),
        path.display().cyan(),
        artifact.module_count()
    );
    Ok(())
}

/// Config file (explicit or discovered) with command line overrides applied
fn load_config(cli: &Cli) -> anyhow::Result<BundleConfig> {
    let mut config = match &cli.config {
        Some(path) => BundleConfig::load(&FsStorage, path)
            .with_context(|| format!("loading {}", path.display()))?,
        None if Path::new(CONFIG_FILE).is_file() => {
            BundleConfig::load(&FsStorage, Path::new(CONFIG_FILE))?
        }
        None => BundleConfig::default(),
    };

    // Flags are relative to the working directory, not the config file
    let cwd = std::env::current_dir().context("reading the current directory")?;
    config.root = cwd.join(&config.root);
    if let Some(entry) = &cli.entry {
        config.entry = cwd.join(entry);
    }
    if let Some(out_dir) = &cli.out_dir {
        config.output.path = cwd.join(out_dir);
    }
    if let Some(filename) = &cli.filename {
        config.output.filename = filename.clone();
    }

    config.validate()?;
    tracing::debug!(
        root = %config.root.display(),
        entry = %config.entry.display(),
        output = %config.output_file().display(),
        extensions = ?config.extensions,
        "Resolved configuration"
    );
    Ok(config)
}
