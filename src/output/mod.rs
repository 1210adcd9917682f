//! Output formatting and display system
//!
//! This module provides a flexible output formatting system for test results,
//! supporting colored and plain text output, table formatting, live progress
//! and the JSON result record.

mod formatter;
mod colored;

pub use formatter::{
    OutputFormatter,
    PlainFormatter,
    TableFormat,
    FormattingOptions,
    Column,
    Alignment,
    RowData,
    PerformanceLevel,
};
pub use colored::{ColoredFormatter, ColorScheme};

use crate::{
    error::{AppError, Result},
    executor::{PhaseOutcome, Reporter, SpeedTestReport},
    types::Direction,
};
use std::io::Write;
use std::sync::Mutex;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            table_borders: true,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, true)
    }
}

/// Main output coordinator that handles final result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
}

impl OutputCoordinator {
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self { formatter }
    }

    /// Display the complete report: header, per-phase lines and the summary table
    pub fn display_report(&self, report: &SpeedTestReport) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.formatter.format_header("Network Speed Test Results")?);
        output.push_str("\n\n");
        output.push_str(&format!("Server:   {}\n", report.server_url));
        output.push_str(&format!(
            "Duration: {:.1}s\n\n",
            report.duration().num_milliseconds() as f64 / 1000.0
        ));

        output.push_str(&self.formatter.format_summary_table(report)?);
        output.push('\n');

        if report.is_total_failure() {
            output.push('\n');
            output.push_str(&self.formatter.format_error("No phase produced a measurement; check the server URL")?);
            output.push('\n');
        } else if report.latency.is_none() {
            output.push('\n');
            output.push_str(&self.formatter.format_warning("Every latency probe was lost; ping and jitter are unavailable")?);
            output.push('\n');
        }

        Ok(output)
    }

    /// Serialize the flattened result record
    pub fn display_json(&self, report: &SpeedTestReport) -> Result<String> {
        serde_json::to_string_pretty(&report.to_record())
            .map_err(|e| AppError::parse(format!("Failed to serialize result record: {}", e)))
    }

    pub fn formatter(&self) -> &dyn OutputFormatter {
        self.formatter.as_ref()
    }
}

/// Reporter that renders live progress and finished phases to a terminal stream
pub struct ConsoleReporter {
    formatter: Box<dyn OutputFormatter>,
    writer: Mutex<Box<dyn Write + Send>>,
    show_progress: bool,
}

impl ConsoleReporter {
    /// Reporter writing to stderr so stdout stays clean for results
    pub fn new(formatter: Box<dyn OutputFormatter>, show_progress: bool) -> Self {
        Self::with_writer(formatter, Box::new(std::io::stderr()), show_progress)
    }

    pub fn with_writer(formatter: Box<dyn OutputFormatter>, writer: Box<dyn Write + Send>, show_progress: bool) -> Self {
        Self {
            formatter,
            writer: Mutex::new(writer),
            show_progress,
        }
    }

    fn write(&self, text: &str) {
        // A poisoned lock or closed stream only loses display output
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.write_all(text.as_bytes());
            let _ = writer.flush();
        }
    }
}

impl Reporter for ConsoleReporter {
    fn on_sample(&self, direction: Direction, total_bytes: u64, elapsed_secs: f64) {
        if self.show_progress {
            let line = self.formatter.format_progress(direction, total_bytes, elapsed_secs);
            self.write(&format!("\r\x1b[2K{}", line));
        }
    }

    fn on_phase_complete(&self, outcome: &PhaseOutcome) {
        let formatted = match outcome {
            PhaseOutcome::Latency(result) => self.formatter.format_latency(Some(result), result.sent),
            PhaseOutcome::LatencyUnavailable { attempts } => self.formatter.format_latency(None, *attempts),
            PhaseOutcome::Throughput(result) => self.formatter.format_throughput(result),
        };

        let prefix = if self.show_progress { "\r\x1b[2K" } else { "" };
        match formatted {
            Ok(text) => self.write(&format!("{}{}\n", prefix, text)),
            Err(e) => self.write(&format!("{}{}\n", prefix, e)),
        }
    }
}
