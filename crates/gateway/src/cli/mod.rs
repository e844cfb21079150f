pub mod config;

use clap::{Parser, Subcommand};

/// httpsession: server-side HTTP sessions with sliding expiration.
#[derive(Debug, Parser)]
#[command(name = "httpsession", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `HS_CONFIG` (or
/// `config.toml` by default).  A missing file yields the defaults.  Returns
/// the parsed [`Config`](hs_domain::config::Config) and the path that was used.
pub fn load_config() -> anyhow::Result<(hs_domain::config::Config, String)> {
    let config_path =
        std::env::var("HS_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        hs_domain::config::Config::default()
    };

    Ok((config, config_path))
}
