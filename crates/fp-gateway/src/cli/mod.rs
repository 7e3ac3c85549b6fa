pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};

/// feedpipe — a self-hosted feed aggregator's background fetch pipeline.
#[derive(Debug, Parser)]
#[command(name = "feedpipe", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the pipeline and control surface (default when no subcommand
    /// is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any issues.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load configuration from the path named by `FEEDPIPE_CONFIG` (or
/// `config.toml` by default). Shared by `serve`, `doctor`, and `config`
/// subcommands.
pub fn load_config() -> anyhow::Result<(fp_domain::Config, String)> {
    let config_path = std::env::var("FEEDPIPE_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        fp_domain::Config::default()
    };

    Ok((config, config_path))
}
