//! Annoroute CLI entry point.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use annoroute_cli::cli::Cli;
use annoroute_cli::commands;

#[tokio::main]
async fn main() {
    // Load .env.local if it exists (for ANNOROUTE_STATE_DIR etc.)
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().to_string()));

    fmt().with_env_filter(filter).with_target(false).init();

    let state_dir = cli.state_dir();

    let result = match commands::load_config(cli.config.as_deref(), &state_dir) {
        Ok(config) => commands::execute(cli.command, &state_dir, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
