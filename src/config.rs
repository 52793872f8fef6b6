//! Configuration management
//!
//! Defaults, an optional TOML file, and command-line flags, merged in that
//! order with figment. The flags mirror the classic single-letter interface;
//! the file carries the tunables that have no flag.

use crate::sources;
use clap::Parser;
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Continuous Certificate Transparency log monitor", long_about = None)]
pub struct Cli {
    /// Path to the list of root domains to filter against.
    #[arg(short = 'r', value_name = "FILE")]
    pub roots: Option<PathBuf>,

    /// Monitor the root domain file for updates and restart the scan.
    /// Requires -r.
    #[arg(short = 'f', requires = "roots")]
    pub follow: bool,

    /// Verbose diagnostics (HTTP errors, skipped entries) on stderr.
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Emit diagnostics when a log falls behind.
    #[arg(long)]
    pub debug: bool,

    /// JSONL output of full certificate info.
    #[arg(short = 'j')]
    pub json: bool,

    /// Directory for per-root output files. Requires -r.
    #[arg(short = 'o', value_name = "DIR", requires = "roots")]
    pub output: Option<PathBuf>,

    /// Discord webhook URL for notifications.
    #[arg(long = "discord-webhook", value_name = "URL")]
    pub discord_webhook: Option<String>,

    /// Optional TOML configuration file.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// The main configuration struct for the application.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub verbose: bool,
    pub debug: bool,
    pub json: bool,
    pub roots: RootsConfig,
    pub output: OutputConfig,
    pub notify: NotifyConfig,
    pub polling: PollingConfig,
}

/// Root-domain filter settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RootsConfig {
    pub file: Option<PathBuf>,
    pub watch: bool,
}

/// Per-root output directory settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: Option<PathBuf>,
}

/// Notification settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    pub discord_webhook: Option<String>,
}

/// Polling engine tunables. File-only; no flags.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    pub log_list_url: String,
    /// How far behind the tip each cursor starts.
    pub backfill: u64,
    /// Task channel capacity per log.
    pub queue_per_log: usize,
    /// Worker pool size; defaults to one worker per log.
    pub workers: Option<usize>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            log_list_url: sources::DEFAULT_LOG_LIST_URL.to_string(),
            backfill: 20,
            queue_per_log: 100,
            workers: None,
        }
    }
}

impl Config {
    /// Loads the application configuration by parsing command-line arguments.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_cli(Cli::parse())
    }

    /// Builds the final config from defaults, the optional TOML file, and
    /// the CLI flags, then validates it.
    pub fn load_from_cli(cli: Cli) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            anyhow::ensure!(
                path.exists(),
                "config file not found at specified path: {}",
                path.display()
            );
            figment = figment.merge(Toml::file(path));
        }

        let mut config: Config = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("configuration loading error: {}", e))?;

        // Flags always win over the file.
        if cli.verbose {
            config.verbose = true;
        }
        if cli.debug {
            config.debug = true;
        }
        if cli.json {
            config.json = true;
        }
        if cli.roots.is_some() {
            config.roots.file = cli.roots;
        }
        if cli.follow {
            config.roots.watch = true;
        }
        if cli.output.is_some() {
            config.output.dir = cli.output;
        }
        if cli.discord_webhook.is_some() {
            config.notify.discord_webhook = cli.discord_webhook;
        }

        config.validate()?;
        Ok(config)
    }

    /// Startup validation; failures are fatal with a non-zero exit.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.output.dir.is_some() && self.roots.file.is_none() {
            anyhow::bail!("the -o flag requires the -r flag to be set");
        }
        if self.roots.watch && self.roots.file.is_none() {
            anyhow::bail!("the -f flag requires the -r flag to be set");
        }
        Ok(())
    }
}
