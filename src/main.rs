use clap::Parser;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

mod backends;
mod cli;
mod commands;
mod config;
mod domain;
mod error;
mod exec;
mod services;

use cli::Cli;

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let settings = config::load_settings(cli.config.as_deref(), cli.work_dir.as_deref())?;
    commands::dispatch(cli, &settings, &exec::SystemRunner)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(&cli) {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}
