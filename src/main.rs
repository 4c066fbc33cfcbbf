//! rdb - interactive debugger for keyword-driven test runs
//!
//! Talks to the control server embedded in a running test host, or replays
//! YAML scenarios locally.

use clap::Parser;
use commands::Commands;
use rdb::{cli, commands};

#[derive(Parser)]
#[command(name = "rdb", about = "Breakpoint debugger for keyword-driven test runs")]
#[command(version, long_about = None)]
struct Cli {
    /// Session name or socket path of the host to control
    #[arg(long, global = true)]
    socket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    rdb::common::logging::init_cli();

    let cli = Cli::parse();

    if let Err(e) = cli::dispatch(cli.command, cli.socket).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
