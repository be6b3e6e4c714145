//! CLI entry point.

use anyhow::Result;
use clap::Parser;
use mock_responder::ServerConfig;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "mock-responder",
    about = "Declarative HTTP mock responder - canned responses for configured request rules",
    version
)]
struct Args {
    /// Path to the rule configuration file (YAML or JSON)
    #[arg(short, long, default_value = "mock-responder.yaml")]
    config: PathBuf,

    /// Override the port declared in the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print a sample configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        println!("{}", include_str!("../demos/default-config.yaml"));
        return Ok(());
    }

    info!(path = ?args.config, "Loading configuration");
    let config = ServerConfig::from_file(&args.config)?;

    if args.validate {
        println!(
            "Configuration is valid ({} resources defined)",
            config.resources.len()
        );
        return Ok(());
    }

    let port = args.port.unwrap_or(config.port);
    mock_responder::run(config, port).await
}
