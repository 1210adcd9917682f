//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::{
    error::{AppError, Result},
    executor::SpeedTestReport,
    models::{LatencyResult, LatencySample, LossReason, ThroughputResult},
    types::{Direction, SpeedLevel},
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Format the latency phase; `None` when every probe was lost
    fn format_latency(&self, latency: Option<&LatencyResult>, attempts: u32) -> Result<String>;

    /// Format one finished throughput phase
    fn format_throughput(&self, result: &ThroughputResult) -> Result<String>;

    /// Format the summary table of a complete run
    fn format_summary_table(&self, report: &SpeedTestReport) -> Result<String>;

    /// Format a live progress line for a running throughput phase
    fn format_progress(&self, direction: Direction, total_bytes: u64, elapsed_secs: f64) -> String;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show per-probe samples and transfer error counts
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    pub columns: Vec<Column>,
    pub show_borders: bool,
    pub show_header: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    fn new(header: &str, alignment: Alignment, min_width: usize, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width,
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }

    /// Layout of the per-phase summary table
    pub(crate) fn summary_table_format(&self) -> TableFormat {
        TableFormat {
            columns: vec![
                Column::new("Phase", Alignment::Left, 10, 12),
                Column::new("Result", Alignment::Right, 14, 16),
                Column::new("Detail", Alignment::Left, 20, 48),
                Column::new("Rating", Alignment::Center, 10, 10),
            ],
            show_borders: self.options.table_borders,
            show_header: true,
        }
    }

    /// Rows of the per-phase summary table
    pub(crate) fn summary_rows(&self, report: &SpeedTestReport) -> Vec<RowData> {
        let latency_row = match &report.latency {
            Some(latency) => vec![
                "Latency".to_string(),
                format_millis(latency.average_ms),
                format!(
                    "jitter {} | loss {}",
                    format_millis(latency.jitter_ms),
                    format_percentage(latency.loss_percent)
                ),
                PerformanceLevel::from_response_time(latency.average_ms).description().to_string(),
            ],
            None => vec![
                "Latency".to_string(),
                "N/A".to_string(),
                format!("0/{} probes answered", report.latency_attempts),
                "Failed".to_string(),
            ],
        };

        let mut rows = vec![latency_row];
        for result in [&report.download, &report.upload] {
            let mut detail = format!(
                "{} in {:.1}s, {} streams",
                format_bytes(result.total_bytes),
                result.duration_secs,
                result.worker_count
            );
            if let Some(loaded) = result.loaded_latency_ms {
                let _ = write!(detail, ", loaded {}", format_millis(loaded));
            }
            rows.push(vec![
                result.direction.name().to_string(),
                format_mbps(result.mbps),
                detail,
                speed_level_label(SpeedLevel::from_mbps(result.mbps)).to_string(),
            ]);
        }
        rows
    }

    /// Create a table with the given format and data
    pub(crate) fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> Result<String> {
        if rows.is_empty() {
            return Ok(String::new());
        }

        let column_widths = self.calculate_column_widths(format, rows);
        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }

            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            output.push_str(&self.create_row(&headers, &column_widths, format));
            output.push('\n');

            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&column_widths));
                output.push('\n');
            }
        }

        for row in rows {
            output.push_str(&self.create_row(row, &column_widths, format));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&column_widths));
        }

        Ok(output)
    }

    fn calculate_column_widths(&self, format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        format
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let content = rows
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0);
                content
                    .max(column.min_width)
                    .max(column.header.len())
                    .min(column.max_width)
            })
            .collect()
    }

    fn create_row(&self, data: &[String], widths: &[usize], format: &TableFormat) -> String {
        let mut row = String::new();

        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format.columns.get(idx).map_or(&Alignment::Left, |c| &c.alignment);

            if format.show_borders {
                row.push(' ');
            }
            row.push_str(&align_text(cell, width, alignment));
            if format.show_borders {
                row.push_str(" |");
            } else {
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::new();

        if !widths.is_empty() {
            border.push('+');
            for &width in widths {
                border.push_str(&"-".repeat(width + 2));
                border.push('+');
            }
        }

        border
    }

    /// Per-probe listing shown in verbose mode
    pub(crate) fn probe_lines(&self, latency: &LatencyResult) -> Vec<String> {
        latency
            .samples
            .iter()
            .enumerate()
            .map(|(idx, sample)| match sample {
                LatencySample::Received { rtt_ms } => format!("  #{:<3} {}", idx + 1, format_millis(*rtt_ms)),
                LatencySample::Lost { reason: LossReason::Timeout } => format!("  #{:<3} lost (timeout)", idx + 1),
                LatencySample::Lost { reason: LossReason::Failed(message) } => {
                    format!("  #{:<3} lost ({})", idx + 1, message)
                }
            })
            .collect()
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border)
            .map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;
        writeln!(output, "  {}  ", title)
            .map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;
        write!(output, "{}", border)
            .map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;

        Ok(output)
    }

    fn format_latency(&self, latency: Option<&LatencyResult>, attempts: u32) -> Result<String> {
        let mut output = String::new();

        let Some(latency) = latency else {
            write!(output, "Latency:  unavailable ({} of {} probes lost)", attempts, attempts)
                .map_err(|e| AppError::io(format!("Failed to format latency: {}", e)))?;
            return Ok(output);
        };

        write!(
            output,
            "Latency:  {} (jitter {}, loss {}, {}/{} received)",
            format_millis(latency.average_ms),
            format_millis(latency.jitter_ms),
            format_percentage(latency.loss_percent),
            latency.received,
            latency.sent
        )
        .map_err(|e| AppError::io(format!("Failed to format latency: {}", e)))?;

        if self.options.verbose_mode {
            write!(
                output,
                "\n  min {} | max {}\n{}",
                format_millis(latency.min_ms),
                format_millis(latency.max_ms),
                self.probe_lines(latency).join("\n")
            )
            .map_err(|e| AppError::io(format!("Failed to format latency: {}", e)))?;
        }

        Ok(output)
    }

    fn format_throughput(&self, result: &ThroughputResult) -> Result<String> {
        let mut output = String::new();

        write!(
            output,
            "{:<9} {} ({} in {:.2}s)",
            format!("{}:", result.direction.name()),
            format_mbps(result.mbps),
            format_bytes(result.total_bytes),
            result.duration_secs
        )
        .map_err(|e| AppError::io(format!("Failed to format throughput: {}", e)))?;

        if let Some(loaded) = result.loaded_latency_ms {
            write!(output, ", loaded latency {}", format_millis(loaded))
                .map_err(|e| AppError::io(format!("Failed to format throughput: {}", e)))?;
        }

        if self.options.verbose_mode {
            write!(
                output,
                "\n  {} streams, {} failed transfers",
                result.worker_count, result.transfer_errors
            )
            .map_err(|e| AppError::io(format!("Failed to format throughput: {}", e)))?;
        }

        Ok(output)
    }

    fn format_summary_table(&self, report: &SpeedTestReport) -> Result<String> {
        self.create_table(&self.summary_table_format(), &self.summary_rows(report))
    }

    fn format_progress(&self, direction: Direction, total_bytes: u64, elapsed_secs: f64) -> String {
        format!(
            "{:<9} {:>14}  {:>10}  {:5.1}s",
            format!("{}:", direction.name()),
            format_mbps(crate::stats::throughput_mbps(total_bytes, elapsed_secs)),
            format_bytes(total_bytes),
            elapsed_secs
        )
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

/// Latency classification for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerformanceLevel {
    Excellent,  // < 20ms
    Good,       // 20-50ms
    Fair,       // 50-100ms
    Poor,       // 100-300ms
    VeryPoor,   // > 300ms
}

impl PerformanceLevel {
    pub fn from_response_time(time_ms: f64) -> Self {
        if time_ms < 20.0 {
            Self::Excellent
        } else if time_ms < 50.0 {
            Self::Good
        } else if time_ms < 100.0 {
            Self::Fair
        } else if time_ms < 300.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }
}

pub(crate) fn speed_level_label(level: SpeedLevel) -> &'static str {
    match level {
        SpeedLevel::Fast => "Fast",
        SpeedLevel::Moderate => "Moderate",
        SpeedLevel::Slow => "Slow",
    }
}

/// Align text within specified width
pub(crate) fn align_text(text: &str, width: usize, alignment: &Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }

    let padding = width - len;
    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left_pad = padding / 2;
            let right_pad = padding - left_pad;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
        }
    }
}

pub(crate) fn format_millis(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.0}µs", ms * 1000.0)
    } else if ms < 1000.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

pub(crate) fn format_percentage(percentage: f64) -> String {
    if percentage >= 99.95 {
        "100.0%".to_string()
    } else if percentage < 0.05 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", percentage)
    }
}

pub(crate) fn format_mbps(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.2} Gbps", mbps / 1000.0)
    } else {
        format!("{:.2} Mbps", mbps)
    }
}

/// Decimal byte units, matching the megabit arithmetic
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1000 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    format!("{:.1} {}", value, unit)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    pub(crate) fn sample_report(latency: bool) -> SpeedTestReport {
        let latency = latency.then(|| {
            LatencyResult::from_samples(vec![
                LatencySample::received(Duration::from_millis(12)),
                LatencySample::received(Duration::from_millis(14)),
                LatencySample::timeout(),
                LatencySample::received(Duration::from_millis(16)),
            ])
            .unwrap()
        });
        let now = Utc::now();
        SpeedTestReport {
            server_url: "http://127.0.0.1:8000".to_string(),
            latency,
            latency_attempts: 4,
            download: ThroughputResult::new(Direction::Download, 1_200_000_000, Duration::from_secs(10), 4)
                .with_loaded_latency(Some(31.5)),
            upload: ThroughputResult::new(Direction::Upload, 50_000_000, Duration::from_secs(10), 3),
            started_at: now,
            completed_at: now,
        }
    }

    fn plain(verbose: bool) -> PlainFormatter {
        PlainFormatter::new(FormattingOptions {
            enable_color: false,
            verbose_mode: verbose,
            table_borders: true,
        })
    }

    #[test]
    fn test_format_header() {
        let header = plain(false).format_header("Speed Test").unwrap();
        assert_eq!(header, "==============\n  Speed Test  \n==============");
    }

    #[test]
    fn test_format_latency() {
        let report = sample_report(true);
        let text = plain(false).format_latency(report.latency.as_ref(), 4).unwrap();

        assert!(text.contains("14.0ms"));
        assert!(text.contains("loss 25.0%"));
        assert!(text.contains("3/4 received"));
        assert!(!text.contains("#1"));
    }

    #[test]
    fn test_format_latency_verbose_lists_probes() {
        let report = sample_report(true);
        let text = plain(true).format_latency(report.latency.as_ref(), 4).unwrap();

        assert!(text.contains("#1   12.0ms"));
        assert!(text.contains("#3   lost (timeout)"));
    }

    #[test]
    fn test_format_latency_unavailable() {
        let text = plain(false).format_latency(None, 10).unwrap();
        assert!(text.contains("unavailable"));
        assert!(text.contains("10 of 10"));
    }

    #[test]
    fn test_format_throughput() {
        let report = sample_report(true);
        let text = plain(false).format_throughput(&report.download).unwrap();

        assert!(text.starts_with("Download:"));
        assert!(text.contains("960.00 Mbps"));
        assert!(text.contains("1.2 GB"));
        assert!(text.contains("loaded latency 31.5ms"));
    }

    #[test]
    fn test_summary_table() {
        let table = plain(false).format_summary_table(&sample_report(true)).unwrap();
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with('+'));
        assert!(lines[1].contains("Phase"));
        assert!(table.contains("960.00 Mbps"));
        assert!(table.contains("40.00 Mbps"));
        assert!(table.contains("Fast"));
        assert!(table.contains("Moderate"));
        assert!(table.contains("Excellent"));

        let widths: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
        assert!(widths.iter().all(|&w| w == widths[0]));
    }

    #[test]
    fn test_summary_table_without_latency() {
        let table = plain(false).format_summary_table(&sample_report(false)).unwrap();
        assert!(table.contains("0/4 probes answered"));
        assert!(table.contains("Failed"));
    }

    #[test]
    fn test_progress_line() {
        let line = plain(false).format_progress(Direction::Upload, 25_000_000, 2.0);
        assert!(line.starts_with("Upload:"));
        assert!(line.contains("100.00 Mbps"));
        assert!(line.contains("25.0 MB"));
    }

    #[test]
    fn test_unit_formatting() {
        assert_eq!(format_bytes(999), "999 B");
        assert_eq!(format_bytes(1_500), "1.5 KB");
        assert_eq!(format_bytes(2_000_000_000), "2.0 GB");
        assert_eq!(format_mbps(1_250.0), "1.25 Gbps");
        assert_eq!(format_millis(0.5), "500µs");
        assert_eq!(format_millis(1_500.0), "1.50s");
        assert_eq!(format_percentage(100.0), "100.0%");
    }

    #[test]
    fn test_align_text() {
        assert_eq!(align_text("ab", 5, &Alignment::Right), "   ab");
        assert_eq!(align_text("ab", 5, &Alignment::Center), " ab  ");
        assert_eq!(align_text("abcdef", 3, &Alignment::Left), "abc");
    }
}
