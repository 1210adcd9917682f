//! Command-line interface module with topic help

pub mod help;

pub use help::HelpSystem;

use clap::Parser;

/// Network Speed Tester - measures latency, jitter, packet loss and throughput
/// against an HTTP speed-test server
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "nst")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the speed-test server
    #[arg(short, long, value_name = "URL")]
    pub server: Option<String>,

    /// Path of the latency endpoint
    #[arg(long, value_name = "PATH")]
    pub ping_path: Option<String>,

    /// Path of the download endpoint
    #[arg(long, value_name = "PATH")]
    pub download_path: Option<String>,

    /// Path of the upload endpoint
    #[arg(long, value_name = "PATH")]
    pub upload_path: Option<String>,

    /// Query parameter carrying the download size
    #[arg(long, value_name = "NAME")]
    pub size_param: Option<String>,

    /// Number of latency probes
    #[arg(short = 'c', long, value_name = "COUNT")]
    pub ping_count: Option<u32>,

    /// Per-probe timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub ping_timeout: Option<u64>,

    /// Parallel download streams
    #[arg(long, value_name = "N")]
    pub download_workers: Option<usize>,

    /// Parallel upload streams
    #[arg(long, value_name = "N")]
    pub upload_workers: Option<usize>,

    /// Measurement window of each throughput phase in seconds
    #[arg(short, long, value_parser = parse_duration, value_name = "SECONDS")]
    pub duration: Option<u64>,

    /// Payload size of one upload send in bytes
    #[arg(long, value_name = "BYTES")]
    pub upload_chunk: Option<usize>,

    /// Skip latency probing while the throughput phases run
    #[arg(long)]
    pub no_loaded_latency: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print the result record as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Show help for specific topic (config, examples, output, measurement)
    #[arg(long, value_name = "TOPIC")]
    pub help_topic: Option<String>,
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.json && self.verbose {
            return Err("Cannot specify both --json and --verbose".to_string());
        }

        Ok(())
    }

    /// Check if help should be displayed for a specific topic
    pub fn should_show_topic_help(&self) -> bool {
        self.help_topic.is_some()
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.json || self.no_color {
            false
        } else if self.color {
            true
        } else {
            supports_color()
        }
    }

    /// Display help for the specified topic or main help
    pub fn display_help(&self) -> String {
        let help_system = HelpSystem::new();
        let use_colors = self.use_colors();

        if let Some(topic) = &self.help_topic {
            help_system.display_topic_help(topic, use_colors)
                .unwrap_or_else(|| {
                    format!(
                        "Unknown help topic: '{}'\n\nAvailable topics: {}\n\n{}",
                        topic,
                        HelpSystem::TOPICS.join(", "),
                        help_system.display_main_help(use_colors)
                    )
                })
        } else {
            help_system.display_main_help(use_colors)
        }
    }
}

/// Parse the window length in seconds
fn parse_duration(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > crate::models::config::MAX_TEST_DURATION_SECS {
                Err(format!(
                    "Duration cannot exceed {} seconds",
                    crate::models::config::MAX_TEST_DURATION_SECS
                ))
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
