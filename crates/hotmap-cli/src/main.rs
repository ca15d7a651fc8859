//! Hotmap CLI - hot reloading for mapping descriptors
//!
//! Loads the descriptors below a directory, then keeps the in-memory
//! registry in step with the files as they are edited.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "hotmap")]
#[command(author = "Hotmap Contributors")]
#[command(version)]
#[command(about = "Hot reloading for SQL mapping descriptors", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default watch configuration
    Init {
        /// Project root (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Load every descriptor once and report what was registered
    Load {
        /// Directory to load (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify and parse a single descriptor
    Check {
        /// Descriptor file
        file: PathBuf,
    },

    /// Load descriptors, then reload them as they change
    Watch {
        /// Directory to watch (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Override the configured debounce window
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Load { path, json } => commands::load(&path, json),
        Commands::Check { file } => commands::check(&file),
        Commands::Watch { path, debounce_ms } => commands::watch(&path, debounce_ms).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
