//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/mdsync.sqlite"
//!
//! [upstream]
//! server_url = "http://media.local:32400"
//! token = "..."
//! analytics_url = "http://media.local:8181"
//! analytics_api_key = "..."
//!
//! [preload]
//! batch_size = 5
//!
//! [monitor]
//! interval_secs = 300
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::MAX_SECTION_ITEMS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub preload: PreloadConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Connection settings for the media server and its analytics companion.
///
/// Every field here except the timeout feeds the config fingerprint, so
/// changing any of them invalidates the cache on the next start.
#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    pub server_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub analytics_url: Option<String>,
    #[serde(default)]
    pub analytics_api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct PreloadConfig {
    #[serde(default = "default_items_per_section")]
    pub items_per_section: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    #[serde(default = "default_error_grace_ms")]
    pub error_grace_ms: u64,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            items_per_section: default_items_per_section(),
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            error_grace_ms: default_error_grace_ms(),
        }
    }
}

impl PreloadConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn error_grace(&self) -> Duration {
        Duration::from_millis(self.error_grace_ms)
    }
}

fn default_items_per_section() -> usize {
    MAX_SECTION_ITEMS
}
fn default_batch_size() -> usize {
    5
}
fn default_batch_pause_ms() -> u64 {
    250
}
fn default_error_grace_ms() -> u64 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_section_cooldown_secs")]
    pub section_cooldown_secs: i64,
    #[serde(default = "default_processed_capacity")]
    pub processed_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            initial_delay_secs: default_initial_delay_secs(),
            section_cooldown_secs: default_section_cooldown_secs(),
            processed_capacity: default_processed_capacity(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn section_cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.section_cooldown_secs)
    }
}

fn default_interval_secs() -> u64 {
    300
}
fn default_initial_delay_secs() -> u64 {
    60
}
fn default_section_cooldown_secs() -> i64 {
    120
}
fn default_processed_capacity() -> usize {
    2048
}

impl Config {
    /// Build a config that talks to nothing and stores into `db_path`.
    ///
    /// Used by tests and by embedders that construct collaborators
    /// themselves.
    pub fn minimal(db_path: PathBuf) -> Self {
        Self {
            db: DbConfig { path: db_path },
            upstream: UpstreamConfig {
                server_url: "http://127.0.0.1:32400".to_string(),
                token: String::new(),
                analytics_url: None,
                analytics_api_key: None,
                request_timeout_secs: default_timeout_secs(),
            },
            preload: PreloadConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.upstream.server_url.trim().is_empty() {
        anyhow::bail!("upstream.server_url must not be empty");
    }
    if config.upstream.request_timeout_secs == 0 {
        anyhow::bail!("upstream.request_timeout_secs must be > 0");
    }

    if config.preload.batch_size == 0 {
        anyhow::bail!("preload.batch_size must be > 0");
    }
    if config.preload.items_per_section == 0 || config.preload.items_per_section > MAX_SECTION_ITEMS
    {
        anyhow::bail!(
            "preload.items_per_section must be in [1, {}]",
            MAX_SECTION_ITEMS
        );
    }

    if config.monitor.interval_secs == 0 {
        anyhow::bail!("monitor.interval_secs must be > 0");
    }
    if config.monitor.section_cooldown_secs < 0 {
        anyhow::bail!("monitor.section_cooldown_secs must be >= 0");
    }
    if config.monitor.processed_capacity == 0 {
        anyhow::bail!("monitor.processed_capacity must be > 0");
    }

    Ok(())
}
