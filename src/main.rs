//! Unified ptrelay CLI.
//!
//! - `ptrelay client` - local SOCKS5 listeners dialing out through transports
//! - `ptrelay server` - transport listeners forwarding to a fixed upstream
//!
//! Each role can also be run as a standalone binary.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// ptrelay unified CLI.
#[derive(Parser)]
#[command(
    name = "ptrelay",
    version,
    about = "Pluggable-transport connection relay",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the client role.
    #[command(name = "client")]
    Client(Box<ptrelay_client::ClientArgs>),

    /// Run the server role.
    #[command(name = "server", alias = "serve")]
    Server(Box<ptrelay_server::ServerArgs>),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Client(args) => ptrelay_client::cli::run(*args).await,
        Commands::Server(args) => ptrelay_server::cli::run(*args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
