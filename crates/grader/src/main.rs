//! Contact cards grader - command-line entry point

use clap::Parser;
use std::path::Path;

use cardgrade::config::{GraderConfig, DEFAULT_CONFIG_FILE};
use cardgrade::Grader;

/// Grade the contact cards assignment in the current directory
#[derive(Parser, Debug)]
#[command(name = "cardgrade")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run the grading in debug mode (visible browser, left open afterwards)
    #[arg(long)]
    debug: bool,

    /// Port to run the server on [default: 8800, or `[server] port` in grader.toml]
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = GraderConfig::load(Path::new(DEFAULT_CONFIG_FILE))?;
    config.apply_cli(args.debug, args.port);

    // Initialize logging
    let log_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    config.validate()?;

    // The grade goes to stdout; the exit code only reflects errors.
    Grader::new(config).run().await?;
    Ok(())
}
