//! CLI argument parsing.

use std::path::PathBuf;

use clap::Parser;

/// Webhook relay: verifies inbound webhooks and fans them out to chat and email.
#[derive(Parser, Debug)]
#[command(name = "hookrelay", version, about)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, env = "HOOKRELAY_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Listen address; overrides `addr` from the config file.
    #[arg(long, env = "HOOKRELAY_ADDR")]
    pub addr: Option<String>,
}
