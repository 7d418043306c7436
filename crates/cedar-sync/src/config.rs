//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CEDAR_TERMINAL_ID=term-01                                          │
//! │     CEDAR_API_URL=https://api.example.com                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/cedar-pos/sync.toml (Linux)                              │
//! │     ~/Library/Application Support/com.cedar.pos/sync.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     auto-generated terminal id, 5s poll, 5 retry attempts              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [terminal]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! code = "T01"
//! tax_bps = 1100  # 11% Lebanese VAT
//!
//! [sync]
//! api_url = "https://api.example.com"
//! batch_size = 50
//! poll_interval_secs = 5
//! send_timeout_secs = 10
//!
//! [retry]
//! max_attempts = 5
//! initial_backoff_ms = 1000
//! multiplier = 2.0
//! max_backoff_secs = 300
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cedar_core::Currency;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Terminal Configuration
// =============================================================================

/// Configuration for this terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    /// Unique terminal identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Short code stamped into receipt numbers ("T01-000042").
    #[serde(default = "default_terminal_code")]
    pub code: String,

    /// Tax rate in basis points (default: 1100 = 11% Lebanese VAT).
    #[serde(default = "default_tax_bps")]
    pub tax_bps: u32,

    /// Primary pricing currency for carts on this terminal.
    #[serde(default = "default_currency")]
    pub currency: Currency,
}

fn default_terminal_code() -> String {
    "T01".to_string()
}

fn default_tax_bps() -> u32 {
    1100
}

fn default_currency() -> Currency {
    Currency::Usd
}

impl Default for TerminalConfig {
    fn default() -> Self {
        TerminalConfig {
            id: Uuid::new_v4().to_string(),
            code: default_terminal_code(),
            tax_bps: default_tax_bps(),
            currency: default_currency(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Base URL of the backend API (if known).
    #[serde(default)]
    pub api_url: Option<String>,

    /// Maximum queue items sent per drain pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Interval between periodic drain attempts (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Deadline for a single transport send (seconds).
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_batch_size() -> usize {
    50
}
fn default_poll_interval() -> u64 {
    5
}
fn default_send_timeout() -> u64 {
    10
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            api_url: None,
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Per-item retry policy for failed queue entries.
///
/// ## Backoff Schedule
/// ```text
/// delay(n) = min(initial_backoff × multiplier^(n−1), max_backoff)
///
/// Defaults: 1s, 2s, 4s, 8s, 16s ... capped at 300s, 5 attempts total.
/// After max_attempts the item stays FAILED until a manual retry.
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts before the item requires manual retry.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failure (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Multiplier applied per subsequent failure.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Ceiling for any single delay (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff() -> u64 {
    1_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_max_backoff() -> u64 {
    300
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            multiplier: default_multiplier(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after the given number of failed attempts (1-based).
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(31);
        let delay_ms = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent as i32);
        let cap_ms = self.max_backoff_secs as f64 * 1_000.0;
        Duration::from_millis(delay_ms.min(cap_ms) as u64)
    }

    /// Checks if the item has exhausted its automatic retries.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Terminal identity and tax settings.
    #[serde(default)]
    pub terminal: TerminalConfig,

    /// Sync behavior settings.
    #[serde(default)]
    pub sync: SyncSettings,

    /// Per-item retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated terminal ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSave("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.terminal.id.is_empty() {
            return Err(SyncError::InvalidConfig("terminal id must not be empty".into()));
        }
        if self.sync.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "retry.max_attempts must be greater than 0".into(),
            ));
        }
        if self.retry.multiplier < 1.0 {
            return Err(SyncError::InvalidConfig(
                "retry.multiplier must be >= 1.0".into(),
            ));
        }
        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("CEDAR_TERMINAL_ID") {
            debug!(terminal_id = %id, "Overriding terminal ID from environment");
            self.terminal.id = id;
        }

        if let Ok(code) = std::env::var("CEDAR_TERMINAL_CODE") {
            self.terminal.code = code;
        }

        if let Ok(url) = std::env::var("CEDAR_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.sync.api_url = Some(url);
        }

        if let Ok(interval) = std::env::var("CEDAR_POLL_INTERVAL_SECS") {
            if let Ok(secs) = interval.parse::<u64>() {
                self.sync.poll_interval_secs = secs;
            }
        }

        if let Ok(attempts) = std::env::var("CEDAR_MAX_RETRY_ATTEMPTS") {
            if let Ok(n) = attempts.parse::<u32>() {
                self.retry.max_attempts = n;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "cedar", "pos").map(|dirs| {
            let config_dir = dirs.config_dir();
            config_dir.join("sync.toml")
        })
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the terminal ID.
    pub fn terminal_id(&self) -> &str {
        &self.terminal.id
    }

    /// Returns the terminal receipt code.
    pub fn terminal_code(&self) -> &str {
        &self.terminal.code
    }

    /// Returns the transport send deadline.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.send_timeout_secs)
    }

    /// Returns the periodic drain interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.terminal.id.is_empty()); // Auto-generated
        assert_eq!(config.terminal.tax_bps, 1100);
        assert_eq!(config.sync.batch_size, 50);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();
        assert!(config.validate().is_ok());

        config.terminal.id = String::new();
        assert!(config.validate().is_err());

        config.terminal.id = "term-01".to_string();
        config.sync.batch_size = 0;
        assert!(config.validate().is_err());

        config.sync.batch_size = 50;
        config.retry.multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(5), Duration::from_secs(16));

        // Cap at max_backoff_secs
        assert_eq!(policy.delay_for(30), Duration::from_secs(300));

        assert!(!policy.is_exhausted(4));
        assert!(policy.is_exhausted(5));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[terminal]"));
        assert!(toml_str.contains("[retry]"));

        let parsed: SyncConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.terminal.id, config.terminal.id);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");

        let mut config = SyncConfig::default();
        config.terminal.code = "T99".to_string();
        config.save(Some(path.clone())).unwrap();

        let loaded = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.terminal.code, "T99");
    }
}
