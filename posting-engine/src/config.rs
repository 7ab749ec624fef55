//! Configuration for the posting engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Settings key holding the default cash account used for payment/receipt legs
pub const DEFAULT_CASH_ACCOUNT_KEY: &str = "default_cash_account_id";

/// Posting engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Posting worker configuration
    pub worker: WorkerConfig,

    /// Chart-of-accounts cache configuration
    pub chart: ChartConfig,

    /// Read-only settings handed to the settings collaborator
    pub settings: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/posting"),
            service_name: "posting-engine".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            rocksdb: RocksDBConfig::default(),
            worker: WorkerConfig::default(),
            chart: ChartConfig::default(),
            settings: BTreeMap::new(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Sync the WAL on every posting
    pub sync_writes: bool,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            sync_writes: true,
            enable_statistics: false,
        }
    }
}

/// Posting worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Bounded mailbox capacity (backpressure on submitters)
    pub mailbox_capacity: usize,

    /// Default caller-side deadline (milliseconds), `None` waits forever
    pub reply_deadline_ms: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
            reply_deadline_ms: Some(30_000),
        }
    }
}

/// Chart-of-accounts cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Rebuild stale trees on this interval (milliseconds); `None` leaves refresh to callers
    pub refresh_interval_ms: Option<u64>,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("POSTING_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(capacity) = std::env::var("POSTING_MAILBOX_CAPACITY") {
            config.worker.mailbox_capacity = parse_env("POSTING_MAILBOX_CAPACITY", &capacity)?;
        }

        if let Ok(ms) = std::env::var("POSTING_REPLY_DEADLINE_MS") {
            config.worker.reply_deadline_ms = Some(parse_env("POSTING_REPLY_DEADLINE_MS", &ms)?);
        }

        if let Ok(ms) = std::env::var("POSTING_CHART_REFRESH_MS") {
            config.chart.refresh_interval_ms = Some(parse_env("POSTING_CHART_REFRESH_MS", &ms)?);
        }

        if let Ok(account) = std::env::var("POSTING_DEFAULT_CASH_ACCOUNT") {
            config
                .settings
                .insert(DEFAULT_CASH_ACCOUNT_KEY.to_string(), account);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the worker cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.worker.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "worker.mailbox_capacity must be positive".to_string(),
            ));
        }
        if self.chart.refresh_interval_ms == Some(0) {
            return Err(crate::Error::Config(
                "chart.refresh_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> crate::Result<T> {
    value
        .parse()
        .map_err(|_| crate::Error::Config(format!("{} has invalid value {:?}", key, value)))
}
