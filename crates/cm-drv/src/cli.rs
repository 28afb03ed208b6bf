use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "cm", about = "Driver CLI for the Cm MIR pipeline: optimize, interpret, and emit JS")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the optimization pipeline over a named fixture and emit MIR or JS.
    Build {
        #[arg(long)]
        fixture: String,
        #[arg(short = 'O', long = "opt", default_value_t = 0)]
        opt_level: u8,
        #[arg(long, value_enum, default_value_t = EmitArg::Mir)]
        emit: EmitArg,
        #[arg(long)]
        out: Option<std::path::PathBuf>,
        #[arg(long)]
        verbose: bool,
    },
    /// Run a named fixture's entry function through the interpreter.
    Run {
        #[arg(long)]
        fixture: String,
        #[arg(long)]
        entry: Option<String>,
        #[arg(short = 'O', long = "opt", default_value_t = 0)]
        opt_level: u8,
        #[arg(long)]
        verbose: bool,
    },
    /// Inspect or clear the incremental fingerprint cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    Stats,
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitArg {
    Mir,
    Js,
}
