//! segstore CLI
//!
//! Command-line tools for the segment store.
//!
//! # Commands
//!
//! - `route` - Show which container owns each segment name
//! - `smoke` - Run a short workload against the in-memory service
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// segstore command-line tools.
#[derive(Parser)]
#[command(name = "segstore")]
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
    /// Show which container owns each segment name
    Route {
        /// Segment names to route
        #[arg(required = true)]
        names: Vec<String>,

        /// Number of segment containers
        #[arg(short, long, default_value = "4")]
        containers: u32,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a short workload against the in-memory service
    Smoke {
        /// Number of segment containers
        #[arg(short, long, default_value = "4")]
        containers: u32,

        /// Worker threads in the execution context
        #[arg(short, long, default_value = "4")]
        threads: usize,

        /// Number of segments to create
        #[arg(short, long, default_value = "16")]
        segments: usize,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Route {
            names,
            containers,
            format,
        } => {
            commands::route::run(&names, containers, &format)?;
        }
        Commands::Smoke {
            containers,
            threads,
            segments,
        } => {
            commands::smoke::run(commands::smoke::SmokeOptions {
                containers,
                threads,
                segments,
            })?;
        }
        Commands::Version => {
            println!("segstore CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("segstore server v{}", segstore_server::VERSION);
        }
    }

    Ok(())
}
