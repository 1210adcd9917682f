//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    models::Config,
    error::Result,
    config::env::EnvManager,
};
use std::path::Path;

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        if self.cli.debug {
            if let Some(warnings) = EnvManager::check_env_file(Path::new(".env"))? {
                for warning in warnings {
                    eprintln!("Warning: .env {}", warning);
                }
            }
        }

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides; only flags actually given take effect
    fn apply_cli_overrides(&self, config: &mut Config) {
        if let Some(ref server) = self.cli.server {
            config.server_url = server.trim().to_string();
        }

        let paths = [
            (&self.cli.ping_path, &mut config.ping_path),
            (&self.cli.download_path, &mut config.download_path),
            (&self.cli.upload_path, &mut config.upload_path),
            (&self.cli.size_param, &mut config.download_size_param),
        ];
        for (flag, target) in paths {
            if let Some(value) = flag {
                *target = value.trim().to_string();
            }
        }

        if let Some(count) = self.cli.ping_count {
            config.ping_count = count;
        }

        if let Some(timeout_ms) = self.cli.ping_timeout {
            config.ping_timeout_ms = timeout_ms;
        }

        if let Some(workers) = self.cli.download_workers {
            config.download_workers = workers;
        }

        if let Some(workers) = self.cli.upload_workers {
            config.upload_workers = workers;
        }

        if let Some(duration) = self.cli.duration {
            config.test_duration_seconds = duration;
        }

        if let Some(chunk) = self.cli.upload_chunk {
            config.upload_chunk_bytes = chunk;
        }

        if self.cli.no_loaded_latency {
            config.measure_loaded_latency = false;
        }

        if self.cli.no_color || self.cli.json {
            config.enable_color = false;
        } else if self.cli.color {
            config.enable_color = true;
        }

        // CLI-only switches
        config.json_output = self.cli.json;
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!("{}", display_config_summary(config));
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Configuration summary for debug and verbose output
pub fn display_config_summary(config: &Config) -> String {
    let summary = [
        format!("Server: {}", config.server_url),
        format!(
            "Endpoints: {} | {} | {}",
            config.ping_path, config.download_path, config.upload_path
        ),
        format!("Download Size Parameter: {}", config.download_size_param),
        format!(
            "Latency Probes: {} (timeout {}ms, interval {}ms)",
            config.ping_count, config.ping_timeout_ms, config.ping_interval_ms
        ),
        format!(
            "Workers: {} download, {} upload",
            config.download_workers, config.upload_workers
        ),
        format!("Window: {}s per direction", config.test_duration_seconds),
        format!("Upload Chunk: {} bytes", config.upload_chunk_bytes),
        format!("Loaded Latency: {}", config.measure_loaded_latency),
        format!("Color Output: {}", config.enable_color),
        format!("Verbose: {}", config.verbose),
        format!("Debug: {}", config.debug),
    ];

    summary.join("\n")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use clap::Parser;
    use std::env;
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialises tests touching the process environment and hides any .env file
    pub(crate) struct EnvGuard {
        _lock: MutexGuard<'static, ()>,
        moved_env_file: bool,
    }

    impl EnvGuard {
        pub(crate) fn acquire() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            for (name, _, _) in EnvManager::get_supported_env_vars() {
                env::remove_var(name);
            }
            let moved_env_file = std::path::Path::new(".env").exists()
                && std::fs::rename(".env", ".env.test_backup").is_ok();
            Self { _lock: lock, moved_env_file }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, _, _) in EnvManager::get_supported_env_vars() {
                env::remove_var(name);
            }
            if self.moved_env_file {
                let _ = std::fs::rename(".env.test_backup", ".env");
            }
        }
    }

    #[test]
    fn test_defaults_without_overrides() {
        let _guard = EnvGuard::acquire();

        let config = load_config(Cli::parse_from(["nst"])).unwrap();

        assert_eq!(config.server_url, crate::defaults::DEFAULT_SERVER_URL);
        assert_eq!(config.ping_count, crate::defaults::DEFAULT_PING_COUNT);
        assert_eq!(config.download_workers, crate::defaults::DEFAULT_DOWNLOAD_WORKERS);
        assert!(config.measure_loaded_latency);
        assert!(!config.json_output);
    }

    #[test]
    fn test_cli_overrides() {
        let _guard = EnvGuard::acquire();

        let cli = Cli::parse_from([
            "nst",
            "--server", "https://speed.example.com",
            "--ping-count", "4",
            "--duration", "6",
            "--upload-workers", "2",
            "--no-loaded-latency",
            "--no-color",
            "--verbose",
        ]);
        let config = ConfigParser::new(cli).parse().unwrap();

        assert_eq!(config.server_url, "https://speed.example.com");
        assert_eq!(config.ping_count, 4);
        assert_eq!(config.test_duration_seconds, 6);
        assert_eq!(config.upload_workers, 2);
        assert_eq!(config.download_workers, crate::defaults::DEFAULT_DOWNLOAD_WORKERS);
        assert!(!config.measure_loaded_latency);
        assert!(!config.enable_color);
        assert!(config.verbose);
    }

    #[test]
    fn test_cli_overrides_env_vars() {
        let _guard = EnvGuard::acquire();
        env::set_var("PING_COUNT", "8");
        env::set_var("DOWNLOAD_WORKERS", "6");

        let config = load_config(Cli::parse_from(["nst", "--ping-count", "12"])).unwrap();

        assert_eq!(config.ping_count, 12);
        assert_eq!(config.download_workers, 6);
    }

    #[test]
    fn test_cli_value_equal_to_default_still_overrides_env() {
        let _guard = EnvGuard::acquire();
        env::set_var("PING_COUNT", "25");

        let default_count = crate::defaults::DEFAULT_PING_COUNT.to_string();
        let config = load_config(Cli::parse_from(["nst", "--ping-count", default_count.as_str()])).unwrap();

        assert_eq!(config.ping_count, crate::defaults::DEFAULT_PING_COUNT);
    }

    #[test]
    fn test_invalid_env_value_is_an_error() {
        let _guard = EnvGuard::acquire();
        env::set_var("UPLOAD_WORKERS", "many");

        let err = load_config(Cli::parse_from(["nst"])).unwrap_err();
        assert!(err.to_string().contains("UPLOAD_WORKERS"));
    }

    #[test]
    fn test_invalid_final_config_is_rejected() {
        let _guard = EnvGuard::acquire();

        let cli = Cli::parse_from(["nst", "--download-workers", "0"]);
        assert!(load_config(cli).is_err());

        let cli = Cli::parse_from(["nst", "--server", "ftp://example.com"]);
        assert!(load_config(cli).is_err());
    }

    #[test]
    fn test_endpoint_layout_from_env_and_cli() {
        let _guard = EnvGuard::acquire();
        env::set_var("PING_PATH", "/ping/");
        env::set_var("DOWNLOAD_PATH", "/download/");
        env::set_var("UPLOAD_PATH", "/upload/");
        env::set_var("DOWNLOAD_SIZE_PARAM", "size");

        let config = load_config(Cli::parse_from(["nst"])).unwrap();
        assert_eq!(config.ping_path, "/ping/");
        assert_eq!(config.download_path, "/download/");
        assert_eq!(config.upload_path, "/upload/");
        assert_eq!(config.download_size_param, "size");

        let cli = Cli::parse_from([
            "nst",
            "--upload-path", "/api/v2/upload",
            "--size-param", "n_bytes",
        ]);
        let config = load_config(cli).unwrap();
        assert_eq!(config.ping_path, "/ping/");
        assert_eq!(config.upload_path, "/api/v2/upload");
        assert_eq!(config.download_size_param, "n_bytes");
    }

    #[test]
    fn test_bad_endpoint_flags_are_rejected() {
        let _guard = EnvGuard::acquire();

        assert!(load_config(Cli::parse_from(["nst", "--ping-path", "ping"])).is_err());
        assert!(load_config(Cli::parse_from(["nst", "--size-param", "a&b"])).is_err());
    }

    #[test]
    fn test_json_disables_color() {
        let _guard = EnvGuard::acquire();

        let config = load_config(Cli::parse_from(["nst", "--json", "--color"])).unwrap();
        assert!(config.json_output);
        assert!(!config.enable_color);
    }

    #[test]
    fn test_config_summary() {
        let summary = display_config_summary(&Config::default());

        assert!(summary.contains("Server: http://127.0.0.1:8000"));
        assert!(summary.contains("Latency Probes: 10"));
        assert!(summary.contains("Workers: 4 download, 3 upload"));
        assert!(summary.contains("Window: 10s"));
        assert!(summary.contains("Download Size Parameter: bytes"));
    }
}
