//! Configuration file parser for ~/.config/rss-feed/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Pipeline configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TCP connect timeout for document fetches.
    pub connect_timeout_secs: u64,

    /// Upper bound on a single request once connected (headers and body).
    pub read_timeout_secs: u64,

    /// Maximum HTTP redirects followed for one fetch.
    pub max_redirects: usize,

    /// Maximum auto-discovery hops the feed finder follows from HTML pages.
    pub max_discovery_hops: usize,

    /// Response bodies above this size are rejected.
    pub max_document_bytes: usize,

    /// Retries for 429, 5xx and truncated responses.
    pub max_retries: u32,

    /// Base backoff delay; attempt `n` waits `base * 2^n`.
    pub retry_base_delay_ms: u64,

    /// Number of sources handled sequentially by one concurrent unit.
    pub batch_width: usize,

    /// Wall-clock budget for a whole multi-source load.
    pub batch_deadline_secs: u64,

    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Accept localhost and private network addresses as feed locations.
    pub allow_private_hosts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 15,
            max_redirects: 10,
            max_discovery_hops: 3,
            max_document_bytes: 10 * 1024 * 1024,
            max_retries: 2,
            retry_base_delay_ms: 500,
            batch_width: 20,
            batch_deadline_secs: 30,
            user_agent: concat!("rss-feed/", env!("CARGO_PKG_VERSION")).to_string(),
            allow_private_hosts: false,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "connect_timeout_secs",
        "read_timeout_secs",
        "max_redirects",
        "max_discovery_hops",
        "max_document_bytes",
        "max_retries",
        "retry_base_delay_ms",
        "batch_width",
        "batch_deadline_secs",
        "user_agent",
        "allow_private_hosts",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn batch_deadline(&self) -> Duration {
        Duration::from_secs(self.batch_deadline_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.batch_width, 20);
        assert_eq!(config.batch_deadline(), Duration::from_secs(30));
        assert_eq!(config.max_discovery_hops, 3);
        assert!(!config.allow_private_hosts);
        assert!(config.user_agent.starts_with("rss-feed/"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/rss_feed_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.batch_width, 20);
    }

    #[test]
    fn test_whitespace_only_returns_default() {
        let config = Config::from_toml("   \n  \n  ").unwrap();
        assert_eq!(config.read_timeout_secs, 15);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::from_toml("batch_width = 5\n").unwrap();
        assert_eq!(config.batch_width, 5);
        assert_eq!(config.batch_deadline_secs, 30);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_full_config_from_file() {
        let dir = std::env::temp_dir().join("rss_feed_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
connect_timeout_secs = 3
read_timeout_secs = 7
max_redirects = 4
max_discovery_hops = 1
max_document_bytes = 2048
max_retries = 0
retry_base_delay_ms = 10
batch_width = 8
batch_deadline_secs = 12
user_agent = "test-agent"
allow_private_hosts = true
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.read_timeout(), Duration::from_secs(7));
        assert_eq!(config.max_redirects, 4);
        assert_eq!(config.max_discovery_hops, 1);
        assert_eq!(config.max_document_bytes, 2048);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_base_delay(), Duration::from_millis(10));
        assert_eq!(config.batch_width, 8);
        assert_eq!(config.batch_deadline(), Duration::from_secs(12));
        assert_eq!(config.user_agent, "test-agent");
        assert!(config.allow_private_hosts);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("batch_width = 3\ntotally_fake_key = 1\n").unwrap();
        assert_eq!(config.batch_width, 3);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::from_toml("batch_width = \"many\"\n").is_err());
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("rss_feed_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
