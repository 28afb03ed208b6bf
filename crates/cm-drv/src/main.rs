//! `cm` - the driver binary: runs the optimization pipeline over a
//! named fixture and either interprets it or emits JS (spec §6).

mod cli;
mod config;
mod error;
mod fixtures;
mod mir_dump;
mod session;

use std::io::Write as _;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{CacheAction, Cli, Command};
use config::{Config, EmitTarget};
use session::Session;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbose = matches!(
        &cli.command,
        Command::Build { verbose: true, .. } | Command::Run { verbose: true, .. }
    );
    init_logging(verbose);

    let cache_dir = cache_dir();
    let session = Session::new(cache_dir);

    match cli.command {
        Command::Build { fixture, opt_level, emit, out, verbose } => {
            let config = Config { fixture, opt_level, emit: EmitTarget::from(emit), out: out.clone(), verbose };
            let rendered = session.build(&config)?;
            match out {
                Some(path) => std::fs::write(&path, rendered)?,
                None => std::io::stdout().write_all(rendered.as_bytes())?,
            }
        }
        Command::Run { fixture, entry, opt_level, verbose } => {
            let value = session.run(&fixture, entry.as_deref(), opt_level, verbose)?;
            println!("{value}");
        }
        Command::Cache { action } => match action {
            CacheAction::Stats => {
                let manifest = session.cache.load_manifest();
                println!("{} cached module(s)", manifest.entries.len());
                for entry in &manifest.entries {
                    println!("  {} @ {} ({})", entry.module_name, entry.fingerprint, entry.timestamp);
                }
            }
            CacheAction::Clear => {
                let dir = cache_dir_path();
                if dir.exists() {
                    std::fs::remove_dir_all(&dir)?;
                }
                println!("cache cleared");
            }
        },
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
}

fn cache_dir_path() -> std::path::PathBuf {
    dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("cm").join("cache")
}

fn cache_dir() -> std::path::PathBuf {
    cache_dir_path()
}
