//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::models::config::{is_query_key, MAX_PING_COUNT, MAX_PING_TIMEOUT_MS, MAX_TEST_DURATION_SECS, MAX_UPLOAD_CHUNK_BYTES, MAX_WORKERS};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists; variables already set win
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Network Speed Tester Configuration
#
# Values here are used as defaults and can be overridden by environment
# variables and command-line arguments.

# Base URL of the speed-test server
# SERVER_URL=http://127.0.0.1:8000

# Endpoint layout of the server and the download size query parameter
# PING_PATH=/api/ping
# DOWNLOAD_PATH=/api/download
# UPLOAD_PATH=/api/upload
# DOWNLOAD_SIZE_PARAM=bytes

# Latency probes: count, per-probe timeout and spacing (milliseconds)
# PING_COUNT=10
# PING_TIMEOUT_MS=2000
# PING_INTERVAL_MS=120

# Parallel streams per direction
# DOWNLOAD_WORKERS=4
# UPLOAD_WORKERS=3

# Measurement window of each throughput phase in seconds
# TEST_DURATION_SECONDS=10

# Bytes requested per download transfer
# DOWNLOAD_REQUEST_BYTES=1000000000

# Payload of one upload send; keep it below 1 MiB
# UPLOAD_CHUNK_BYTES=524288

# Live progress interval and retry backoff (milliseconds)
# SAMPLE_INTERVAL_MS=200
# RETRY_BACKOFF_MS=150

# Probe latency while throughput phases run (true/false)
# MEASURE_LOADED_LATENCY=true

# Enable colored output (true/false)
# ENABLE_COLOR=true

# Example configurations for different scenarios:
#
# Quick check against a remote server:
# SERVER_URL=https://speed.example.com
# TEST_DURATION_SECONDS=5
#
# Server exposing /ping/, /download/?size= and /upload/:
# PING_PATH=/ping/
# DOWNLOAD_PATH=/download/
# UPLOAD_PATH=/upload/
# DOWNLOAD_SIZE_PARAM=size
#
# Saturating a fast link:
# DOWNLOAD_WORKERS=8
# UPLOAD_WORKERS=6
"#.to_string()
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "SERVER_URL" => {
                let parsed = url::Url::parse(value.trim())
                    .map_err(|e| AppError::config(format!("Invalid SERVER_URL '{}': {}", value, e)))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!("SERVER_URL must use http or https: {}", value)));
                }
            }
            "PING_PATH" | "DOWNLOAD_PATH" | "UPLOAD_PATH" => {
                if !value.trim().starts_with('/') {
                    return Err(AppError::config(format!("{} must start with '/': {}", key, value)));
                }
            }
            "DOWNLOAD_SIZE_PARAM" => {
                if !is_query_key(value.trim()) {
                    return Err(AppError::config(format!(
                        "{} must be letters, digits, '_' or '-': {}",
                        key, value
                    )));
                }
            }
            "PING_COUNT" => check_range(key, value, 1, MAX_PING_COUNT as u64)?,
            "PING_TIMEOUT_MS" => check_range(key, value, 1, MAX_PING_TIMEOUT_MS)?,
            "PING_INTERVAL_MS" => check_range(key, value, 0, MAX_PING_TIMEOUT_MS)?,
            "DOWNLOAD_WORKERS" | "UPLOAD_WORKERS" => check_range(key, value, 1, MAX_WORKERS as u64)?,
            "TEST_DURATION_SECONDS" => check_range(key, value, 1, MAX_TEST_DURATION_SECS)?,
            "DOWNLOAD_REQUEST_BYTES" => check_range(key, value, 1, u64::MAX)?,
            "UPLOAD_CHUNK_BYTES" => check_range(key, value, 1, MAX_UPLOAD_CHUNK_BYTES as u64)?,
            "SAMPLE_INTERVAL_MS" => check_range(key, value, 1, 60_000)?,
            "RETRY_BACKOFF_MS" => check_range(key, value, 0, 60_000)?,
            "MEASURE_LOADED_LATENCY" | "ENABLE_COLOR" => {
                value.trim().parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("SERVER_URL", "Base URL of the speed-test server", "https://speed.example.com"),
            ("PING_PATH", "Path of the latency endpoint", "/api/ping"),
            ("DOWNLOAD_PATH", "Path of the download endpoint", "/api/download"),
            ("UPLOAD_PATH", "Path of the upload endpoint", "/api/upload"),
            ("DOWNLOAD_SIZE_PARAM", "Query parameter for the download size", "bytes"),
            ("PING_COUNT", "Number of latency probes (1-100)", "10"),
            ("PING_TIMEOUT_MS", "Per-probe timeout in milliseconds", "2000"),
            ("PING_INTERVAL_MS", "Pause between probes in milliseconds", "120"),
            ("DOWNLOAD_WORKERS", "Parallel download streams (1-64)", "4"),
            ("UPLOAD_WORKERS", "Parallel upload streams (1-64)", "3"),
            ("TEST_DURATION_SECONDS", "Throughput window in seconds (1-300)", "10"),
            ("DOWNLOAD_REQUEST_BYTES", "Bytes requested per download transfer", "1000000000"),
            ("UPLOAD_CHUNK_BYTES", "Payload of one upload send", "524288"),
            ("SAMPLE_INTERVAL_MS", "Live progress interval in milliseconds", "200"),
            ("RETRY_BACKOFF_MS", "Delay before retrying a failed transfer", "150"),
            ("MEASURE_LOADED_LATENCY", "Probe latency during throughput phases", "true"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<24} {}\n", var, description));
            help.push_str(&format!("  {:<24} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Check if a .env file exists and validate its contents
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value.trim()) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}

fn check_range(key: &str, value: &str, min: u64, max: u64) -> Result<()> {
    let parsed: u64 = value.trim().parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
    if parsed < min || parsed > max {
        return Err(AppError::config(format!("{} must be between {} and {}, got: {}", key, min, max, parsed)));
    }
    Ok(())
}
