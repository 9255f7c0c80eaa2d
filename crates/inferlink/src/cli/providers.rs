//! The `inferlink providers` command.

use clap::{Args, Subcommand};
use inferlink_core::{Config, ProviderEntry, ProviderRegistry};

/// Arguments for the `providers` command.
#[derive(Args, Debug)]
pub struct ProvidersArgs {
    #[command(subcommand)]
    pub command: ProvidersCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProvidersCommand {
    /// List configured providers
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute the providers command.
pub fn execute(args: ProvidersArgs, config: &Config) -> anyhow::Result<()> {
    let registry = ProviderRegistry::from_config(config);
    match args.command {
        ProvidersCommand::List { json } => {
            if registry.is_empty() {
                eprintln!(
                    "No providers configured. Add a [providers.<id>] section to {}",
                    Config::default_path().display()
                );
                return Ok(());
            }
            if json {
                let rows: Vec<_> = registry.iter().map(summary_json).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for entry in registry.iter() {
                    println!("{}", summary_line(entry));
                }
            }
        }
    }
    Ok(())
}

fn summary_line(entry: &ProviderEntry) -> String {
    let name = if entry.config.name.is_empty() {
        entry.id.as_str()
    } else {
        entry.config.name.as_str()
    };
    let mut line = format!("{:<16} {name}", entry.id);
    if let Some(model) = entry.default_model() {
        line.push_str(&format!("  model={model}"));
    }
    if entry.config.adapter.response_path.is_some() {
        line.push_str("  async");
    }
    if entry.credential.is_empty() {
        line.push_str("  (no credential)");
    }
    line
}

fn summary_json(entry: &ProviderEntry) -> serde_json::Value {
    serde_json::json!({
        "id": entry.id,
        "name": entry.config.name,
        "base_url": entry.config.base_url,
        "models": entry.config.models,
        "output_type": entry.config.output_type,
        "async": entry.config.adapter.response_path.is_some(),
        "model_overrides": entry.config.model_overrides.keys().collect::<Vec<_>>(),
        "has_credential": !entry.credential.is_empty(),
    })
}
