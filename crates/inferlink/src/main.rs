//! Inferlink CLI - one command line for many inference providers.
//!
//! Sends provider-neutral requests through the inferlink gateway, which
//! handles per-provider authentication, body templates, retries and
//! asynchronous job polling.
//!
//! # Usage
//!
//! ```bash
//! # Generate with a configured provider
//! inferlink send wanx --param prompt="a lighthouse at dusk"
//!
//! # Save the result (JSON, or raw bytes for audio providers)
//! inferlink send tts --params-file speech.json --output speech.mp3
//!
//! # Compute a query signature
//! inferlink sign --message '/api/generate/webui/status&1700000000000&nonce' --secret sk
//!
//! # Inspect configuration
//! inferlink providers list
//! inferlink config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Inferlink - provider-neutral gateway for inference APIs.
#[derive(Parser, Debug)]
#[command(name = "inferlink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "INFERLINK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a request to a configured provider
    Send(cli::send::SendArgs),

    /// Compute a query signature with the configured signing tiers
    Sign(cli::sign::SignArgs),

    /// Inspect configured providers
    Providers(cli::providers::ProvidersArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match &cli.config {
        Some(path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            inferlink_core::Config::load_from(&PathBuf::from(expanded))?
        }
        None => match inferlink_core::Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `inferlink config path`."
                );
                inferlink_core::Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("inferlink v{}", inferlink_core::VERSION);

    match cli.command {
        Commands::Send(args) => cli::send::execute(args, config).await,
        Commands::Sign(args) => cli::sign::execute(args, config).await,
        Commands::Providers(args) => cli::providers::execute(args, &config),
        Commands::Config(args) => cli::config::execute(args, &config, cli.config.as_deref()),
    }
}
