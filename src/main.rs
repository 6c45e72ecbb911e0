// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! tessera CLI - run and inspect CommonJS module graphs

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use tessera_node::{LoaderConfig, ModuleLoader, VERSION, Value};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "tessera",
    about = "Resolve, load and run CommonJS modules",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Entry module to run as main
    entry: Option<PathBuf>,

    /// Print the entry's exports as JSON once it has loaded
    #[arg(short, long)]
    print: bool,

    /// Resolve a specifier and print its identity without loading it
    #[arg(long, value_name = "SPEC")]
    resolve: Option<String>,

    /// Evaluate a snippet with `require` bound to the base directory
    #[arg(short = 'e', long = "eval", value_name = "CODE")]
    eval: Option<String>,

    /// Base directory for --resolve and --eval
    #[arg(long, value_name = "DIR")]
    from: Option<PathBuf>,

    /// Extra configuration file, applied after the default locations
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("tessera=debug,tessera_node=debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("tessera=warn,tessera_node=warn")
            .with_writer(std::io::stderr)
            .init();
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    let loader = create_loader(&cwd, cli.config.as_deref())?;
    let base = cli.from.unwrap_or_else(|| cwd.clone());
    debug!("Base directory {}", base.display());

    if let Some(specifier) = cli.resolve {
        let id = loader
            .resolve(&specifier, &base)
            .with_context(|| format!("cannot resolve '{}'", specifier))?;
        println!("{}", id);
        return Ok(());
    }

    if let Some(code) = cli.eval {
        let result = loader.eval(&code, &base)?;
        if !result.is_undefined() {
            println!("{}", result);
        }
        return Ok(());
    }

    let Some(entry) = cli.entry else {
        anyhow::bail!("no entry module given (try --help)");
    };

    let exports = loader
        .run_main(&entry)
        .with_context(|| format!("failed to run {}", entry.display()))?;
    if cli.print {
        print_json(&exports)?;
    }

    Ok(())
}

fn create_loader(cwd: &Path, config_file: Option<&Path>) -> anyhow::Result<ModuleLoader> {
    let mut config = LoaderConfig::load(cwd)?;
    if let Some(path) = config_file {
        debug!("Merging configuration from {}", path.display());
        config
            .merge_from_file(path)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
    }
    debug!(
        "Loader config: extensions {:?}, search depth {}, extra paths {:?}",
        config.extensions, config.max_search_depth, config.extra_paths
    );

    let loader = ModuleLoader::builder().config(config).build()?;
    debug!("Module loader ready");
    Ok(loader)
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&value.to_json())?;
    println!("{}", json);
    Ok(())
}
