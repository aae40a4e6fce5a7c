//! Replica CLI
//!
//! Command-line tools for the replica replication protocol.
//!
//! # Commands
//!
//! - `decode` - Decode a hex-encoded wire payload
//! - `simulate` - Run a scripted session and print each client's stream
//! - `vectors` - Print the wire-format test vectors

mod commands;

use clap::{Parser, Subcommand};
use commands::Format;
use tracing_subscriber::EnvFilter;

/// Replica protocol command-line tools.
#[derive(Parser)]
#[command(name = "replica")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a hex-encoded wire payload
    Decode {
        /// Payload bytes as hex
        hex: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Run a scripted replication session
    Simulate {
        /// Number of connected clients
        #[arg(short, long, default_value = "2")]
        clients: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Print the wire-format test vectors
    Vectors {
        /// Print as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Decode { hex, format } => commands::decode::run(&hex, format)?,
        Commands::Simulate { clients, format } => commands::simulate::run(clients, format)?,
        Commands::Vectors { json } => commands::vectors::run(json)?,
        Commands::Version => {
            println!("Replica CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Replica protocol v{}",
                replica_protocol::PROTOCOL_VERSION
            );
        }
    }

    Ok(())
}
