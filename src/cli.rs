use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rangectl",
    version,
    about = "Provision and tear down an intentionally insecure training range"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Settings file (default: ./rangectl.toml when present)"
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Working directory for staged source, keys and the run journal"
    )]
    pub work_dir: Option<PathBuf>,
    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "More log output (-v debug, -vv trace)"
    )]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prompt for region, prefix and secret, then run the full pipeline
    Provision,
    /// Prompt for region, prefix and secret, then tear everything down
    Decommission,
    /// Check required tools and container daemon access
    Doctor,
}
