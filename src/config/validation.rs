//! Configuration validation utilities and rules

use crate::{
    client::HttpUtils,
    error::Result,
    models::Config,
};

/// Worker counts above this rarely add throughput and mostly add contention
const WORKER_WARNING_THRESHOLD: usize = 16;
/// Payloads at or above this size overrun the window by a noticeable tail
const LARGE_UPLOAD_CHUNK_BYTES: usize = 1024 * 1024;
/// Windows shorter than this are dominated by TCP slow start
const SHORT_WINDOW_SECS: u64 = 5;

/// Configuration validator producing non-fatal warnings
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration with comprehensive checks
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        // Fatal checks first
        config.validate()?;

        warnings.extend(Self::validate_server_url(&config.server_url));
        warnings.extend(Self::validate_latency_settings(config));
        warnings.extend(Self::validate_throughput_settings(config));

        Ok(warnings)
    }

    fn validate_server_url(server_url: &str) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if !HttpUtils::is_https(server_url) && !HttpUtils::is_local_host(server_url) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Server '{}' uses plain HTTP over a non-local network; proxies may buffer or alter traffic", server_url),
            ));
        }

        if let Ok(parsed) = url::Url::parse(server_url) {
            if parsed.query().is_some() {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("Query parameters on '{}' are dropped when building endpoint URLs", server_url),
                ));
            }
        }

        warnings
    }

    fn validate_latency_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.ping_count < 3 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Ping count of {} may not provide a reliable jitter figure (recommended: >= 3)", config.ping_count),
            ));
        }

        if config.ping_timeout_ms < 200 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Ping timeout of {}ms may count slow replies as lost", config.ping_timeout_ms),
            ));
        }

        warnings
    }

    fn validate_throughput_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.test_duration_seconds < SHORT_WINDOW_SECS {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Test duration of {}s is short; connection ramp-up will lower the measured throughput",
                    config.test_duration_seconds
                ),
            ));
        }

        for (name, workers) in [("download", config.download_workers), ("upload", config.upload_workers)] {
            if workers > WORKER_WARNING_THRESHOLD {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("{} {} workers may saturate the client before the link", workers, name),
                ));
            }
        }

        if config.upload_chunk_bytes >= LARGE_UPLOAD_CHUNK_BYTES {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Upload chunk of {} bytes is 1 MiB or more; the last send of each worker may overrun the window noticeably",
                    config.upload_chunk_bytes
                ),
            ));
        }

        if (config.download_request_bytes as u128) * 8 < (config.test_duration_seconds as u128) * 100_000_000 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Download request size of {} bytes will be reopened often on links faster than 100 Mbps",
                    config.download_request_bytes
                ),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        use colored::Colorize;

        let label = format!("[{}]", self.level.as_str());
        let label = if use_color {
            match self.level {
                ValidationLevel::Info => label.blue().to_string(),
                ValidationLevel::Warning => label.yellow().to_string(),
                ValidationLevel::Error => label.red().to_string(),
            }
        } else {
            label
        };
        format!("{} {}", label, self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warnings_for(config: &Config) -> Vec<String> {
        validate_config(config)
            .unwrap()
            .into_iter()
            .map(|w| w.message)
            .collect()
    }

    #[test]
    fn test_validation_warning_format() {
        let warning = ValidationWarning::new(ValidationLevel::Warning, "Test warning message".to_string());

        let formatted = warning.format(false);
        assert_eq!(formatted, "[WARNING] Test warning message");
    }

    #[test]
    fn test_default_config_has_no_warnings() {
        assert!(warnings_for(&Config::default()).is_empty());
    }

    #[test]
    fn test_large_upload_chunk_warns() {
        let config = Config {
            upload_chunk_bytes: 1024 * 1024,
            ..Config::default()
        };
        let warnings = warnings_for(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("1 MiB"));
    }

    #[test]
    fn test_short_duration_warns() {
        let config = Config {
            test_duration_seconds: 3,
            ..Config::default()
        };
        assert!(warnings_for(&config).iter().any(|w| w.contains("short")));
    }

    #[test]
    fn test_many_workers_warn() {
        let config = Config {
            download_workers: 17,
            upload_workers: 16,
            ..Config::default()
        };
        let warnings = warnings_for(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("download"));
    }

    #[test]
    fn test_plain_http_to_remote_host_warns() {
        let remote = Config {
            server_url: "http://speed.example.com".to_string(),
            ..Config::default()
        };
        assert!(warnings_for(&remote).iter().any(|w| w.contains("plain HTTP")));

        let secure = Config {
            server_url: "https://speed.example.com".to_string(),
            ..Config::default()
        };
        assert!(warnings_for(&secure).is_empty());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let config = Config {
            ping_count: 0,
            ..Config::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_small_download_request_is_informational() {
        let config = Config {
            download_request_bytes: 1_000_000,
            ..Config::default()
        };
        let warnings = validate_config(&config).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, ValidationLevel::Info);
    }
}
