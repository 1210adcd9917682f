//! Command-line help system with examples and topic guidance

use crate::config::env::EnvManager;
use colored::*;

/// Help system for the CLI application
pub struct HelpSystem {
    binary: &'static str,
}

impl HelpSystem {
    pub const TOPICS: [&'static str; 4] = ["config", "examples", "output", "measurement"];

    pub fn new() -> Self {
        Self { binary: "nst" }
    }

    /// Display the main help message
    pub fn display_main_help(&self, use_colors: bool) -> String {
        let mut help = String::new();

        help.push_str(&self.format_header(use_colors));
        help.push('\n');
        help.push_str(&self.format_usage_section(use_colors));
        help.push('\n');
        help.push_str(&self.format_options_section(use_colors));
        help.push('\n');
        help.push_str(&self.format_examples_section(use_colors));
        help.push('\n');
        help.push_str(&self.format_footer(use_colors));

        help
    }

    /// Display help for a single topic
    pub fn display_topic_help(&self, topic: &str, use_colors: bool) -> Option<String> {
        match topic.to_lowercase().as_str() {
            "config" | "configuration" | "env" => Some(self.format_configuration_help(use_colors)),
            "examples" => Some(self.format_examples_section(use_colors)),
            "output" | "json" => Some(self.format_output_help(use_colors)),
            "measurement" | "method" => Some(self.format_measurement_help(use_colors)),
            _ => None,
        }
    }

    fn format_header(&self, use_colors: bool) -> String {
        let title = "Network Speed Tester";
        let subtitle = "Latency, jitter, packet loss and multi-stream throughput against an HTTP speed-test server";
        let version = format!("{} ({})", crate::VERSION, crate::build_info::GIT_COMMIT);

        if use_colors {
            format!(
                "{}\n{}\nVersion: {}\n",
                title.bright_cyan().bold(),
                subtitle.bright_blue(),
                version.green()
            )
        } else {
            format!("{}\n{}\nVersion: {}\n", title, subtitle, version)
        }
    }

    fn section(title: &str, use_colors: bool) -> String {
        if use_colors {
            title.bright_green().bold().to_string()
        } else {
            title.to_string()
        }
    }

    fn format_usage_section(&self, use_colors: bool) -> String {
        let mut usage = format!("{}\n", Self::section("USAGE:", use_colors));
        for pattern in [
            format!("{} [OPTIONS]", self.binary),
            format!("{} --server <URL> [OPTIONS]", self.binary),
            format!("{} --help-topic <TOPIC>", self.binary),
        ] {
            usage.push_str(&format!("  {}\n", pattern));
        }
        usage
    }

    fn format_options_section(&self, use_colors: bool) -> String {
        let options = [
            OptionHelp { short: Some("s"), long: "server", value: "<URL>", description: "Base URL of the speed-test server" },
            OptionHelp { short: None, long: "ping-path", value: "<PATH>", description: "Path of the latency endpoint" },
            OptionHelp { short: None, long: "download-path", value: "<PATH>", description: "Path of the download endpoint" },
            OptionHelp { short: None, long: "upload-path", value: "<PATH>", description: "Path of the upload endpoint" },
            OptionHelp { short: None, long: "size-param", value: "<NAME>", description: "Query parameter for the download size" },
            OptionHelp { short: Some("c"), long: "ping-count", value: "<COUNT>", description: "Number of latency probes (1-100)" },
            OptionHelp { short: None, long: "ping-timeout", value: "<MS>", description: "Per-probe timeout in milliseconds" },
            OptionHelp { short: None, long: "download-workers", value: "<N>", description: "Parallel download streams (1-64)" },
            OptionHelp { short: None, long: "upload-workers", value: "<N>", description: "Parallel upload streams (1-64)" },
            OptionHelp { short: Some("d"), long: "duration", value: "<SECONDS>", description: "Window of each throughput phase (1-300)" },
            OptionHelp { short: None, long: "upload-chunk", value: "<BYTES>", description: "Payload of one upload send" },
            OptionHelp { short: None, long: "no-loaded-latency", value: "", description: "Skip latency probing under load" },
            OptionHelp { short: None, long: "json", value: "", description: "Print the result record as JSON" },
            OptionHelp { short: None, long: "no-color", value: "", description: "Disable colored output" },
            OptionHelp { short: None, long: "verbose", value: "", description: "Show per-probe and per-phase detail" },
            OptionHelp { short: None, long: "debug", value: "", description: "Enable debug logging" },
        ];

        let mut output = format!("{}\n", Self::section("OPTIONS:", use_colors));
        for option in options {
            output.push_str(&option.format(use_colors));
            output.push('\n');
        }
        output
    }

    fn format_examples_section(&self, use_colors: bool) -> String {
        let examples = [
            ExampleHelp {
                title: "Test against a local server",
                command: "nst --server http://192.168.1.10:8000",
                description: "Run all three phases with default settings",
            },
            ExampleHelp {
                title: "Quick check",
                command: "nst --duration 5 --ping-count 5",
                description: "Shorter windows and fewer probes",
            },
            ExampleHelp {
                title: "Saturate a fast link",
                command: "nst --download-workers 8 --upload-workers 6",
                description: "More parallel streams per direction",
            },
            ExampleHelp {
                title: "Machine-readable output",
                command: "nst --json > result.json",
                description: "Write the result record as JSON; logs stay on stderr",
            },
        ];

        let mut output = format!("{}\n", Self::section("EXAMPLES:", use_colors));
        for example in examples {
            output.push_str(&example.format(use_colors));
            output.push('\n');
        }
        output
    }

    fn format_footer(&self, use_colors: bool) -> String {
        let text = format!(
            "More help: {} --help-topic <{}>",
            self.binary,
            Self::TOPICS.join("|")
        );
        if use_colors {
            format!("{}\n", text.bright_blue())
        } else {
            format!("{}\n", text)
        }
    }

    fn format_configuration_help(&self, use_colors: bool) -> String {
        let mut help = format!("{}\n\n", Self::section("CONFIGURATION REFERENCE", use_colors));
        help.push_str(&EnvManager::display_env_help());
        help.push_str("\nExample .env file:\n\n");
        help.push_str(&EnvManager::create_example_env_content());
        help
    }

    fn format_output_help(&self, use_colors: bool) -> String {
        let mut help = format!("{}\n\n", Self::section("OUTPUT FORMATS", use_colors));
        help.push_str("Default: live progress on stderr, then a summary table of all phases.\n");
        help.push_str("--verbose: adds per-probe samples and per-phase transfer counts.\n");
        help.push_str("--json: prints one record with ping_ms, jitter_ms, packet_loss_percent,\n");
        help.push_str("        download_mbps, upload_mbps, download_latency_ms, upload_latency_ms,\n");
        help.push_str("        downloaded_bytes, uploaded_bytes and timestamp.\n");
        help.push_str("\nWhen every latency probe is lost, ping and jitter are null and loss is 100.\n");
        help
    }

    fn format_measurement_help(&self, use_colors: bool) -> String {
        let mut help = format!("{}\n\n", Self::section("MEASUREMENT", use_colors));
        help.push_str("1. Latency: sequential probes of the echo endpoint. Average and jitter\n");
        help.push_str("   (sample standard deviation) use answered probes only; lost probes count\n");
        help.push_str("   toward packet loss.\n");
        help.push_str("2. Download: parallel streams read for the configured window. Megabits per\n");
        help.push_str("   second are computed over the window itself.\n");
        help.push_str("3. Upload: parallel streams send fixed-size payloads. A send in flight at\n");
        help.push_str("   the deadline may finish within the drain timeout and is then credited.\n");
        help.push_str("   Sends abandoned past that limit add neither bytes nor time.\n");
        help.push_str("\nFailed transfers are retried after a short backoff until the window closes.\n");
        help
    }
}

impl Default for HelpSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper struct for formatting individual options
struct OptionHelp {
    short: Option<&'static str>,
    long: &'static str,
    value: &'static str,
    description: &'static str,
}

impl OptionHelp {
    fn format(&self, use_colors: bool) -> String {
        let mut option_str = match self.short {
            Some(short) if use_colors => format!("  {}, ", format!("-{}", short).bright_cyan()),
            Some(short) => format!("  -{}, ", short),
            None => "      ".to_string(),
        };

        let long_with_value = if self.value.is_empty() {
            format!("--{}", self.long)
        } else {
            format!("--{} {}", self.long, self.value)
        };

        if use_colors {
            option_str.push_str(&format!("{:<30} {}", long_with_value.bright_cyan(), self.description));
        } else {
            option_str.push_str(&format!("{:<30} {}", long_with_value, self.description));
        }

        option_str
    }
}

/// Helper struct for formatting examples
struct ExampleHelp {
    title: &'static str,
    command: &'static str,
    description: &'static str,
}

impl ExampleHelp {
    fn format(&self, use_colors: bool) -> String {
        if use_colors {
            format!(
                "  {}:\n    {}\n    {}\n",
                self.title.bright_yellow().bold(),
                self.command.bright_white(),
                self.description.bright_blue().italic()
            )
        } else {
            format!("  {}:\n    {}\n    {}\n", self.title, self.command, self.description)
        }
    }
}
