//! Colored formatter implementation with terminal color support

use crate::{
    error::Result,
    executor::SpeedTestReport,
    models::{LatencyResult, ThroughputResult},
    stats,
    types::{Direction, SpeedLevel},
};
use super::formatter::{
    format_bytes, format_millis, format_mbps, format_percentage, FormattingOptions, OutputFormatter,
    PerformanceLevel, PlainFormatter,
};
use colored::*;

impl PerformanceLevel {
    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter; table layout comes from the plain formatter
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(options.clone()),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> String {
        if self.options.enable_color {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    /// Apply color and bold formatting if colors are enabled
    fn emphasize(&self, text: &str, color: Color) -> String {
        if self.options.enable_color {
            text.color(color).bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.options.enable_color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn speed_color(&self, mbps: f64) -> Color {
        match SpeedLevel::from_mbps(mbps) {
            SpeedLevel::Fast => self.color_scheme.success,
            SpeedLevel::Moderate => self.color_scheme.warning,
            SpeedLevel::Slow => self.color_scheme.error,
        }
    }

    fn loss_color(&self, loss_percent: f64) -> Color {
        if loss_percent == 0.0 {
            self.color_scheme.success
        } else if loss_percent < 5.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        }
    }

    fn direction_label(&self, direction: Direction) -> String {
        let label = format!("{:<9}", format!("{}:", direction.name()));
        self.emphasize(&label, self.color_scheme.info)
    }

    /// Fixed-width progress bar over the measurement window
    fn create_progress_bar(&self, fraction: f64, width: usize) -> String {
        let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
        format!(
            "[{}{}]",
            self.colorize(&"#".repeat(filled), self.color_scheme.success),
            self.colorize(&"-".repeat(width - filled), self.color_scheme.muted)
        )
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let border = "=".repeat(title.len() + 4);
        Ok(format!(
            "{}\n  {}  \n{}",
            self.colorize(&border, self.color_scheme.header),
            self.bold(title),
            self.colorize(&border, self.color_scheme.header)
        ))
    }

    fn format_latency(&self, latency: Option<&LatencyResult>, attempts: u32) -> Result<String> {
        let label = self.emphasize(&format!("{:<9}", "Latency:"), self.color_scheme.info);

        let Some(latency) = latency else {
            return Ok(format!(
                "{} {}",
                label,
                self.colorize(&format!("unavailable ({} of {} probes lost)", attempts, attempts), self.color_scheme.error)
            ));
        };

        let level = PerformanceLevel::from_response_time(latency.average_ms);
        let mut output = format!(
            "{} {} (jitter {}, loss {}, {}/{} received)",
            label,
            self.emphasize(&format_millis(latency.average_ms), level.color()),
            format_millis(latency.jitter_ms),
            self.colorize(&format_percentage(latency.loss_percent), self.loss_color(latency.loss_percent)),
            latency.received,
            latency.sent
        );

        if self.options.verbose_mode {
            output.push_str(&format!(
                "\n  {}",
                self.colorize(
                    &format!("min {} | max {}", format_millis(latency.min_ms), format_millis(latency.max_ms)),
                    self.color_scheme.muted
                )
            ));
            for line in self.plain_formatter.probe_lines(latency) {
                output.push('\n');
                output.push_str(&self.colorize(&line, self.color_scheme.muted));
            }
        }

        Ok(output)
    }

    fn format_throughput(&self, result: &ThroughputResult) -> Result<String> {
        let mut output = format!(
            "{} {} ({} in {:.2}s)",
            self.direction_label(result.direction),
            self.emphasize(&format_mbps(result.mbps), self.speed_color(result.mbps)),
            format_bytes(result.total_bytes),
            result.duration_secs
        );

        if let Some(loaded) = result.loaded_latency_ms {
            let level = PerformanceLevel::from_response_time(loaded);
            output.push_str(&format!(", loaded latency {}", self.colorize(&format_millis(loaded), level.color())));
        }

        if self.options.verbose_mode {
            let errors = format!("{} failed transfers", result.transfer_errors);
            let errors_color = if result.transfer_errors == 0 {
                self.color_scheme.muted
            } else {
                self.color_scheme.warning
            };
            output.push_str(&format!(
                "\n  {} streams, {}",
                result.worker_count,
                self.colorize(&errors, errors_color)
            ));
        }

        Ok(output)
    }

    fn format_summary_table(&self, report: &SpeedTestReport) -> Result<String> {
        let table = self.plain_formatter.format_summary_table(report)?;
        if !self.options.enable_color {
            return Ok(table);
        }

        // Color whole lines so column widths stay intact
        let lines: Vec<String> = table
            .lines()
            .enumerate()
            .map(|(idx, line)| {
                if line.starts_with('+') {
                    line.color(self.color_scheme.muted).to_string()
                } else if idx == 1 {
                    line.bold().to_string()
                } else {
                    line.to_string()
                }
            })
            .collect();

        Ok(lines.join("\n"))
    }

    fn format_progress(&self, direction: Direction, total_bytes: u64, elapsed_secs: f64) -> String {
        let mbps = stats::throughput_mbps(total_bytes, elapsed_secs);
        format!(
            "{} {:>14}  {:>10}  {:5.1}s",
            self.direction_label(direction),
            self.colorize(&format_mbps(mbps), self.speed_color(mbps)),
            format_bytes(total_bytes),
            elapsed_secs
        )
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.emphasize("ERROR:", self.color_scheme.error), error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.emphasize("WARNING:", self.color_scheme.warning), warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.emphasize("SUCCESS:", self.color_scheme.success), message))
    }
}

impl ColoredFormatter {
    /// Progress line with a bar showing how much of the window has elapsed
    pub fn format_progress_with_bar(
        &self,
        direction: Direction,
        total_bytes: u64,
        elapsed_secs: f64,
        window_secs: f64,
    ) -> String {
        let fraction = if window_secs > 0.0 { elapsed_secs / window_secs } else { 1.0 };
        format!(
            "{} {}",
            self.format_progress(direction, total_bytes, elapsed_secs),
            self.create_progress_bar(fraction, 20)
        )
    }
}
