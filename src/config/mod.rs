//! Configuration management for billet
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::allocation::{BlockPolicy, TagMatcher, LEGACY_TAG_PREFIX};
use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document store configuration
    pub store: StoreConfig,

    /// Allocation policy configuration
    pub allocation: AllocationConfig,

    /// Retry configuration for per-record writes
    pub retry: RetryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Document store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unknown store backend '{other}' (expected sqlite or memory)"),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend selection
    pub backend: StoreBackend,

    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            sqlite_path: PathBuf::from("data/billet.db"),
        }
    }
}

/// Allocation policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Blocks reserved for male trainees, in preference order
    pub male_blocks: Vec<String>,

    /// Blocks reserved for female trainees, in preference order
    pub female_blocks: Vec<String>,

    /// Prefixes stripped from stored tag numbers before comparison
    pub legacy_tag_prefixes: Vec<String>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            male_blocks: vec![String::from("A"), String::from("B")],
            female_blocks: vec![String::from("C"), String::from("D")],
            legacy_tag_prefixes: vec![String::from(LEGACY_TAG_PREFIX)],
        }
    }
}

impl AllocationConfig {
    pub fn block_policy(&self) -> BlockPolicy {
        BlockPolicy::new(self.male_blocks.iter().cloned(), self.female_blocks.iter().cloned())
    }

    pub fn matcher(&self) -> TagMatcher {
        TagMatcher::new(self.legacy_tag_prefixes.iter().cloned())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let backend = match std::env::var("BILLET_STORE_BACKEND") {
            Ok(v) => v.parse().context("Invalid BILLET_STORE_BACKEND")?,
            Err(_) => defaults.store.backend,
        };

        let sqlite_path = std::env::var("BILLET_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store.sqlite_path);

        let male_blocks = std::env::var("BILLET_MALE_BLOCKS")
            .map(|v| comma_list(&v))
            .unwrap_or(defaults.allocation.male_blocks);

        let female_blocks = std::env::var("BILLET_FEMALE_BLOCKS")
            .map(|v| comma_list(&v))
            .unwrap_or(defaults.allocation.female_blocks);

        let legacy_tag_prefixes = std::env::var("BILLET_TAG_PREFIXES")
            .map(|v| comma_list(&v))
            .unwrap_or(defaults.allocation.legacy_tag_prefixes);

        let max_retries = std::env::var("BILLET_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.retry.max_retries);

        let base_delay_ms = std::env::var("BILLET_RETRY_BASE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.retry.base_delay_ms);

        let level = std::env::var("BILLET_LOG_LEVEL").unwrap_or(defaults.logging.level);

        let format = std::env::var("BILLET_LOG_FORMAT").unwrap_or(defaults.logging.format);

        Ok(Self {
            store: StoreConfig {
                backend,
                sqlite_path,
            },
            allocation: AllocationConfig {
                male_blocks,
                female_blocks,
                legacy_tag_prefixes,
            },
            retry: RetryConfig {
                max_retries,
                base_delay_ms,
                ..defaults.retry
            },
            logging: LoggingConfig { level, format },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.allocation
            .block_policy()
            .validate()
            .context("Invalid block reservation")?;

        if self.store.backend == StoreBackend::Sqlite && self.store.sqlite_path.as_os_str().is_empty() {
            anyhow::bail!("sqlite_path must not be empty for the sqlite backend");
        }

        if self.retry.backoff_multiplier < 1.0 {
            anyhow::bail!("backoff_multiplier must be at least 1.0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("log format must be 'text' or 'json'");
        }

        Ok(())
    }
}
