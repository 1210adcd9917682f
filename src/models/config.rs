//! Configuration data model and validation

use crate::types::{Result, AppError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MAX_PING_COUNT: u32 = 100;
pub const MAX_PING_TIMEOUT_MS: u64 = 60_000;
pub const MAX_WORKERS: usize = 64;
pub const MAX_TEST_DURATION_SECS: u64 = 300;
pub const MAX_UPLOAD_CHUNK_BYTES: usize = 16 * 1024 * 1024;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the speed-test server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Path of the latency (echo) endpoint
    #[serde(default = "default_ping_path")]
    pub ping_path: String,

    /// Path of the streaming download endpoint
    #[serde(default = "default_download_path")]
    pub download_path: String,

    /// Path of the upload endpoint
    #[serde(default = "default_upload_path")]
    pub upload_path: String,

    /// Query parameter carrying the requested download size
    #[serde(default = "default_download_size_param")]
    pub download_size_param: String,

    /// Number of sequential latency probes
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,

    /// Per-probe timeout in milliseconds
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,

    /// Pause between consecutive probes in milliseconds
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    /// Parallel download streams
    #[serde(default = "default_download_workers")]
    pub download_workers: usize,

    /// Parallel upload streams
    #[serde(default = "default_upload_workers")]
    pub upload_workers: usize,

    /// Measurement window of each throughput phase
    #[serde(default = "default_test_duration_secs")]
    pub test_duration_seconds: u64,

    /// Size requested from the download endpoint per transfer
    #[serde(default = "default_download_request_bytes")]
    pub download_request_bytes: u64,

    /// Payload size of a single upload send
    #[serde(default = "default_upload_chunk_bytes")]
    pub upload_chunk_bytes: usize,

    /// Live sampling interval in milliseconds
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Delay before a failed transfer is retried, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Probe latency in the background while throughput phases run
    #[serde(default = "default_measure_loaded_latency")]
    pub measure_loaded_latency: bool,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Print the result record as JSON instead of the formatted report
    #[serde(default)]
    pub json_output: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            ping_path: default_ping_path(),
            download_path: default_download_path(),
            upload_path: default_upload_path(),
            download_size_param: default_download_size_param(),
            ping_count: default_ping_count(),
            ping_timeout_ms: default_ping_timeout_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            download_workers: default_download_workers(),
            upload_workers: default_upload_workers(),
            test_duration_seconds: default_test_duration_secs(),
            download_request_bytes: default_download_request_bytes(),
            upload_chunk_bytes: default_upload_chunk_bytes(),
            sample_interval_ms: default_sample_interval_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            measure_loaded_latency: default_measure_loaded_latency(),
            enable_color: default_enable_color(),
            json_output: false,
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Measurement window of each throughput phase
    pub fn test_duration(&self) -> Duration {
        Duration::from_secs(self.test_duration_seconds)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.server_url.is_empty() {
            return Err(AppError::config("Server URL cannot be empty"));
        }

        match url::Url::parse(&self.server_url) {
            Ok(parsed) => {
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!("Server URL must use http or https: {}", self.server_url)));
                }
                if parsed.host_str().is_none() {
                    return Err(AppError::config(format!("Server URL must have a host: {}", self.server_url)));
                }
            }
            Err(e) => {
                return Err(AppError::config(format!("Invalid server URL '{}': {}", self.server_url, e)));
            }
        }

        for (name, path) in [
            ("Ping", &self.ping_path),
            ("Download", &self.download_path),
            ("Upload", &self.upload_path),
        ] {
            if !path.starts_with('/') {
                return Err(AppError::config(format!("{} path must start with '/': {}", name, path)));
            }
        }

        if !is_query_key(&self.download_size_param) {
            return Err(AppError::config(format!(
                "Download size parameter must be a non-empty name of letters, digits, '_' or '-': {:?}",
                self.download_size_param
            )));
        }

        if self.ping_count == 0 {
            return Err(AppError::config("Ping count must be greater than 0"));
        }

        if self.ping_count > MAX_PING_COUNT {
            return Err(AppError::config(format!("Ping count cannot exceed {}", MAX_PING_COUNT)));
        }

        if self.ping_timeout_ms == 0 {
            return Err(AppError::config("Ping timeout must be greater than 0"));
        }

        if self.ping_timeout_ms > MAX_PING_TIMEOUT_MS {
            return Err(AppError::config(format!("Ping timeout cannot exceed {} ms", MAX_PING_TIMEOUT_MS)));
        }

        for (name, workers) in [("Download", self.download_workers), ("Upload", self.upload_workers)] {
            if workers == 0 {
                return Err(AppError::config(format!("{} worker count must be greater than 0", name)));
            }
            if workers > MAX_WORKERS {
                return Err(AppError::config(format!("{} worker count cannot exceed {}", name, MAX_WORKERS)));
            }
        }

        if self.test_duration_seconds == 0 {
            return Err(AppError::config("Test duration must be greater than 0"));
        }

        if self.test_duration_seconds > MAX_TEST_DURATION_SECS {
            return Err(AppError::config(format!("Test duration cannot exceed {} seconds", MAX_TEST_DURATION_SECS)));
        }

        if self.download_request_bytes == 0 {
            return Err(AppError::config("Download request size must be greater than 0"));
        }

        if self.upload_chunk_bytes == 0 {
            return Err(AppError::config("Upload chunk size must be greater than 0"));
        }

        if self.upload_chunk_bytes > MAX_UPLOAD_CHUNK_BYTES {
            return Err(AppError::config(format!("Upload chunk size cannot exceed {} bytes", MAX_UPLOAD_CHUNK_BYTES)));
        }

        if self.sample_interval_ms == 0 {
            return Err(AppError::config("Sample interval must be greater than 0"));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(server_url) = std::env::var("SERVER_URL") {
            let server_url = server_url.trim();
            if !server_url.is_empty() {
                self.server_url = server_url.to_string();
            }
        }

        for (key, target) in [
            ("PING_PATH", &mut self.ping_path),
            ("DOWNLOAD_PATH", &mut self.download_path),
            ("UPLOAD_PATH", &mut self.upload_path),
            ("DOWNLOAD_SIZE_PARAM", &mut self.download_size_param),
        ] {
            if let Ok(value) = std::env::var(key) {
                let value = value.trim();
                if !value.is_empty() {
                    *target = value.to_string();
                }
            }
        }

        if let Ok(value) = std::env::var("PING_COUNT") {
            self.ping_count = parse_env("PING_COUNT", &value)?;
        }

        if let Ok(value) = std::env::var("PING_TIMEOUT_MS") {
            self.ping_timeout_ms = parse_env("PING_TIMEOUT_MS", &value)?;
        }

        if let Ok(value) = std::env::var("PING_INTERVAL_MS") {
            self.ping_interval_ms = parse_env("PING_INTERVAL_MS", &value)?;
        }

        if let Ok(value) = std::env::var("DOWNLOAD_WORKERS") {
            self.download_workers = parse_env("DOWNLOAD_WORKERS", &value)?;
        }

        if let Ok(value) = std::env::var("UPLOAD_WORKERS") {
            self.upload_workers = parse_env("UPLOAD_WORKERS", &value)?;
        }

        if let Ok(value) = std::env::var("TEST_DURATION_SECONDS") {
            self.test_duration_seconds = parse_env("TEST_DURATION_SECONDS", &value)?;
        }

        if let Ok(value) = std::env::var("DOWNLOAD_REQUEST_BYTES") {
            self.download_request_bytes = parse_env("DOWNLOAD_REQUEST_BYTES", &value)?;
        }

        if let Ok(value) = std::env::var("UPLOAD_CHUNK_BYTES") {
            self.upload_chunk_bytes = parse_env("UPLOAD_CHUNK_BYTES", &value)?;
        }

        if let Ok(value) = std::env::var("SAMPLE_INTERVAL_MS") {
            self.sample_interval_ms = parse_env("SAMPLE_INTERVAL_MS", &value)?;
        }

        if let Ok(value) = std::env::var("RETRY_BACKOFF_MS") {
            self.retry_backoff_ms = parse_env("RETRY_BACKOFF_MS", &value)?;
        }

        if let Ok(value) = std::env::var("MEASURE_LOADED_LATENCY") {
            self.measure_loaded_latency = parse_env("MEASURE_LOADED_LATENCY", &value)?;
        }

        if let Ok(value) = std::env::var("ENABLE_COLOR") {
            self.enable_color = parse_env("ENABLE_COLOR", &value)?;
        }

        Ok(())
    }
}

/// Name usable as a query key without escaping
pub fn is_query_key(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))
}

// Default value functions for serde
fn default_server_url() -> String {
    crate::defaults::DEFAULT_SERVER_URL.to_string()
}

fn default_ping_path() -> String {
    crate::defaults::DEFAULT_PING_PATH.to_string()
}

fn default_download_path() -> String {
    crate::defaults::DEFAULT_DOWNLOAD_PATH.to_string()
}

fn default_upload_path() -> String {
    crate::defaults::DEFAULT_UPLOAD_PATH.to_string()
}

fn default_download_size_param() -> String {
    crate::defaults::DEFAULT_DOWNLOAD_SIZE_PARAM.to_string()
}

fn default_ping_count() -> u32 {
    crate::defaults::DEFAULT_PING_COUNT
}

fn default_ping_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_PING_TIMEOUT.as_millis() as u64
}

fn default_ping_interval_ms() -> u64 {
    crate::defaults::DEFAULT_PING_INTERVAL.as_millis() as u64
}

fn default_download_workers() -> usize {
    crate::defaults::DEFAULT_DOWNLOAD_WORKERS
}

fn default_upload_workers() -> usize {
    crate::defaults::DEFAULT_UPLOAD_WORKERS
}

fn default_test_duration_secs() -> u64 {
    crate::defaults::DEFAULT_TEST_DURATION.as_secs()
}

fn default_download_request_bytes() -> u64 {
    crate::defaults::DEFAULT_DOWNLOAD_REQUEST_BYTES
}

fn default_upload_chunk_bytes() -> usize {
    crate::defaults::DEFAULT_UPLOAD_CHUNK_BYTES
}

fn default_sample_interval_ms() -> u64 {
    crate::defaults::DEFAULT_SAMPLE_INTERVAL.as_millis() as u64
}

fn default_retry_backoff_ms() -> u64 {
    crate::defaults::DEFAULT_RETRY_BACKOFF.as_millis() as u64
}

fn default_measure_loaded_latency() -> bool {
    crate::defaults::DEFAULT_MEASURE_LOADED_LATENCY
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.test_duration(), Duration::from_secs(10));
        assert_eq!(config.ping_timeout(), Duration::from_millis(2000));
    }

    #[test]
    fn test_invalid_server_url() {
        let mut config = Config::default();
        config.server_url = "not-a-url".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.server_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config.server_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default();
        config.download_workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.upload_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = Config::default();
        config.test_duration_seconds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Test duration"));
    }

    #[test]
    fn test_size_limits() {
        let mut config = Config::default();
        config.upload_chunk_bytes = 0;
        assert!(config.validate().is_err());

        config.upload_chunk_bytes = MAX_UPLOAD_CHUNK_BYTES + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.download_request_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ping_limits() {
        let mut config = Config::default();
        config.ping_count = 0;
        assert!(config.validate().is_err());
        config.ping_count = MAX_PING_COUNT + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ping_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_paths_must_be_absolute() {
        let mut config = Config::default();
        config.ping_path = "api/ping".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: Config = serde_json::from_str(r#"{"server_url": "http://speed.local:9000"}"#).unwrap();
        assert_eq!(config.server_url, "http://speed.local:9000");
        assert_eq!(config.download_workers, crate::defaults::DEFAULT_DOWNLOAD_WORKERS);
        assert_eq!(config.upload_chunk_bytes, crate::defaults::DEFAULT_UPLOAD_CHUNK_BYTES);
        assert!(config.measure_loaded_latency);
    }
}
