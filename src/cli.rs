use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "threshold-logger")]
#[command(version = "0.1.0")]
#[command(about = "Continuous prediction-market threshold logger", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration directory
    #[arg(short, long, default_value = "config")]
    pub config: PathBuf,

    /// Write to an in-memory sheet instead of Google Sheets
    #[arg(long, env = "TLOG_DRY_RUN")]
    pub dry_run: bool,

    /// Seed for reproducible price samples
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop after this many completed cycles
    #[arg(long)]
    pub max_cycles: Option<u64>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Log continuously until interrupted (default)
    Run,
    /// Run a single cycle
    Once,
    /// Print the markets the next cycle would use
    Markets,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }

    /// Cycle bound implied by the command and `--max-cycles`
    pub fn cycle_limit(&self) -> Option<u64> {
        match self.command() {
            Commands::Once => Some(1),
            _ => self.max_cycles,
        }
    }
}
