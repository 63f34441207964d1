//! Application configuration loading and validation.
//!
//! Settings load from a TOML file (`sidekey.toml` by default) with
//! environment overrides for machine-local paths. Secrets never live in the
//! config file: session material and signing keys stay in the encrypted
//! vault, and the vault key is generated on first use.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::chain::ChainName;
use crate::error::{ConfigError, Result};

/// Environment variable overriding the on-disk data directory.
pub const DATA_DIR_ENV: &str = "SIDEKEY_DATA_DIR";

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

/// Trading venue endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    /// REST API URL for market queries, auth, and order submission.
    #[serde(default = "default_venue_api_url")]
    pub api_url: String,
}

fn default_venue_api_url() -> String {
    "https://clob.polymarket.com".into()
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            api_url: default_venue_api_url(),
        }
    }
}

/// Remote wallet approver endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApproverConfig {
    /// Web page where the wallet holder reviews and approves a session.
    #[serde(default = "default_approve_url")]
    pub approve_url: String,

    /// Custodial signing service API (session-authenticated transfers).
    #[serde(default = "default_service_url")]
    pub service_url: String,
}

fn default_approve_url() -> String {
    "https://approve.sidekey.dev/grant".into()
}

fn default_service_url() -> String {
    "https://api.sidekey.dev".into()
}

impl Default for ApproverConfig {
    fn default() -> Self {
        Self {
            approve_url: default_approve_url(),
            service_url: default_service_url(),
        }
    }
}

/// Handshake timing knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeConfig {
    /// Seconds to wait for the approval callback before giving up.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,
}

fn default_wait_timeout() -> u64 {
    300
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: default_wait_timeout(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Target chain for new approval requests.
    #[serde(default)]
    pub chain: ChainName,

    /// Optional RPC URL override for the active chain.
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Trading venue endpoints.
    #[serde(default)]
    pub venue: VenueConfig,

    /// Remote approver endpoints.
    #[serde(default)]
    pub approver: ApproverConfig,

    /// Handshake timing.
    #[serde(default)]
    pub handshake: HandshakeConfig,

    /// Data directory holding the vault key, sessions, and pending requests.
    ///
    /// Defaults to `~/.local/share/sidekey`; `SIDEKEY_DATA_DIR` overrides
    /// both this field and the default.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the default configuration so the CLI works
    /// without any setup; a present but malformed file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&contents)
    }

    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed.
    pub fn parse_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.logging.level));

        match self.logging.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }

    /// Resolve the data directory: env override, config value, then the
    /// platform default.
    pub fn data_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        if let Some(ref dir) = self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sidekey")
    }
}
