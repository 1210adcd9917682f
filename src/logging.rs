//! Structured logging for the measurement engine
//!
//! Events carry a level, a target (`PHASE`, `XFER`), the run ID shared by
//! every logger of one test run, and a flat map of structured fields. They
//! render either as a console line or as one JSON object per line.
//!
//! Everything is written to stderr; stdout is reserved for results.

use crate::error::{AppError, Result};
use crate::models::{Config, LatencyResult, ThroughputResult};
use crate::types::{Direction, TestPhase};
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn paint(&self, text: &str) -> ColoredString {
        match self {
            LogLevel::Debug => text.cyan(),
            LogLevel::Info => text.green(),
            LogLevel::Warn => text.yellow(),
            LogLevel::Error => text.red().bold(),
        }
    }

    /// Level implied by the verbosity flags of a run
    pub fn for_config(config: &Config) -> Self {
        if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" | "TRACE" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Console,
    /// One JSON object per line
    Json,
}

/// A single structured log event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

/// Cheap to clone; workers each hold their own copy.
#[derive(Debug, Clone)]
pub struct Logger {
    target: &'static str,
    min_level: LogLevel,
    use_color: bool,
    format: LogFormat,
    run_id: Option<Arc<str>>,
}

impl Logger {
    pub fn new(target: &'static str) -> Self {
        Self {
            target,
            min_level: LogLevel::Info,
            use_color: false,
            format: LogFormat::Console,
            run_id: None,
        }
    }

    /// Debug runs log JSON so transfer events can be piped into other tools.
    pub fn with_config(target: &'static str, config: &Config) -> Self {
        Self {
            target,
            min_level: LogLevel::for_config(config),
            use_color: config.enable_color,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: Arc<str>) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn target(&self) -> &str {
        self.target
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    pub fn event(&self, level: LogLevel, message: impl Into<String>) -> EventBuilder<'_> {
        EventBuilder {
            logger: self,
            record: LogRecord {
                timestamp: Utc::now(),
                level,
                target: self.target.to_string(),
                message: message.into(),
                run_id: self.run_id.as_deref().map(String::from),
                fields: Map::new(),
            },
        }
    }

    pub fn debug(&self, message: impl Into<String>) -> EventBuilder<'_> {
        self.event(LogLevel::Debug, message)
    }

    pub fn info(&self, message: impl Into<String>) -> EventBuilder<'_> {
        self.event(LogLevel::Info, message)
    }

    pub fn warn(&self, message: impl Into<String>) -> EventBuilder<'_> {
        self.event(LogLevel::Warn, message)
    }

    pub fn error(&self, message: impl Into<String>) -> EventBuilder<'_> {
        self.event(LogLevel::Error, message)
    }

    pub fn render(&self, record: &LogRecord) -> String {
        match self.format {
            LogFormat::Console => self.render_console(record),
            LogFormat::Json => serde_json::to_string(record)
                .unwrap_or_else(|_| format!("{{\"message\":{:?}}}", record.message)),
        }
    }

    fn render_console(&self, record: &LogRecord) -> String {
        let level = format!("{:>5}", record.level.as_str());
        let level = if self.use_color {
            record.level.paint(&level).to_string()
        } else {
            level
        };

        let mut line = format!(
            "{} {} [{}] {}",
            record.timestamp.format("%H:%M:%S%.3f"),
            level,
            record.target,
            record.message
        );

        if !record.fields.is_empty() {
            let fields: Vec<String> = record
                .fields
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            line.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        line
    }

    fn write(&self, record: LogRecord) {
        if !self.enabled(record.level) {
            return;
        }
        let _ = writeln!(io::stderr().lock(), "{}", self.render(&record));
    }
}

pub struct EventBuilder<'a> {
    logger: &'a Logger,
    record: LogRecord,
}

impl EventBuilder<'_> {
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.record.fields.insert(key.to_string(), value);
        }
        self
    }

    pub fn latency(self, result: &LatencyResult) -> Self {
        self.field("average_ms", result.average_ms)
            .field("jitter_ms", result.jitter_ms)
            .field("loss_percent", result.loss_percent)
            .field("sent", result.sent)
            .field("received", result.received)
    }

    pub fn throughput(self, result: &ThroughputResult) -> Self {
        self.field("direction", result.direction)
            .field("mbps", result.mbps)
            .field("total_bytes", result.total_bytes)
            .field("duration_secs", result.duration_secs)
            .field("workers", result.worker_count)
            .field("transfer_errors", result.transfer_errors)
            .field("loaded_latency_ms", result.loaded_latency_ms)
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_exit_code", error.exit_code())
    }

    pub fn record(&self) -> &LogRecord {
        &self.record
    }

    pub fn emit(self) {
        self.logger.write(self.record);
    }
}

/// Times the three phases of a run and logs their results
pub struct PhaseLogger {
    logger: Logger,
    started: HashMap<TestPhase, Instant>,
}

impl PhaseLogger {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            started: HashMap::new(),
        }
    }

    pub fn start_phase(&mut self, phase: TestPhase) {
        self.started.insert(phase, Instant::now());
        self.logger
            .info(format!("Started {} phase", phase.name()))
            .field("phase", phase.name())
            .emit();
    }

    /// Returns None for a phase that was never started
    pub fn end_phase(&mut self, phase: TestPhase, success: bool) -> Option<Duration> {
        let Some(started) = self.started.remove(&phase) else {
            self.logger
                .warn(format!("Ended {} phase that was not started", phase.name()))
                .field("phase", phase.name())
                .emit();
            return None;
        };

        let elapsed = started.elapsed();
        self.logger
            .info(format!("Completed {} phase in {}ms", phase.name(), elapsed.as_millis()))
            .field("phase", phase.name())
            .field("duration_ms", elapsed.as_millis() as u64)
            .field("success", success)
            .emit();
        Some(elapsed)
    }

    pub fn log_latency_result(&self, result: &LatencyResult) {
        self.logger
            .info(format!(
                "Latency: avg={:.2}ms jitter={:.2}ms loss={:.1}%",
                result.average_ms, result.jitter_ms, result.loss_percent
            ))
            .latency(result)
            .emit();
    }

    pub fn log_latency_unavailable(&self, error: &AppError) {
        self.logger
            .error(format!("Latency phase: {}", error))
            .error_info(error)
            .emit();
    }

    pub fn log_throughput_result(&self, result: &ThroughputResult) {
        self.logger
            .info(format!(
                "{} throughput: {:.2} Mbps over {:.2}s",
                result.direction.name(),
                result.mbps,
                result.duration_secs
            ))
            .throughput(result)
            .emit();
    }

    pub fn active_phases(&self) -> Vec<TestPhase> {
        self.started.keys().copied().collect()
    }
}

/// Event logger for probes and stream workers
#[derive(Debug, Clone)]
pub struct TransferLogger {
    logger: Logger,
}

impl TransferLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// Only the first failure of a worker is a warning; repeats go to debug
    pub fn log_transfer_failure(&self, direction: Direction, worker_id: usize, failures: u64, error: &AppError) {
        let level = if failures <= 1 { LogLevel::Warn } else { LogLevel::Debug };
        self.logger
            .event(
                level,
                format!("{} worker {} transfer failed: {}", direction.name(), worker_id, error),
            )
            .field("direction", direction)
            .field("worker_id", worker_id)
            .field("failures", failures)
            .error_info(error)
            .emit();
    }

    pub fn log_worker_stopped(&self, direction: Direction, worker_id: usize, bytes: u64, failures: u64) {
        self.logger
            .debug(format!("{} worker {} stopped", direction.name(), worker_id))
            .field("direction", direction)
            .field("worker_id", worker_id)
            .field("bytes", bytes)
            .field("failures", failures)
            .emit();
    }

    /// A session task that panicked or was aborted instead of returning
    pub fn log_task_failure(&self, direction: Direction, task: &str, error: &str) {
        self.task_failure(direction, task, error).emit();
    }

    fn task_failure(&self, direction: Direction, task: &str, error: &str) -> EventBuilder<'_> {
        self.logger
            .error(format!("{} {} task failed: {}", direction.name(), task, error))
            .field("direction", direction)
            .field("task", task)
            .field("error", error)
    }

    pub fn log_probe_lost(&self, attempt: u32, reason: &str) {
        self.logger
            .debug(format!("Latency probe {} lost: {}", attempt, reason))
            .field("attempt", attempt)
            .field("reason", reason)
            .emit();
    }
}

/// Hands out loggers that share one run ID
pub struct LoggerFactory {
    config: Config,
    run_id: Arc<str>,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            run_id: Uuid::new_v4().to_string().into(),
        }
    }

    pub fn logger(&self, target: &'static str) -> Logger {
        Logger::with_config(target, &self.config).with_run_id(self.run_id.clone())
    }

    pub fn phase_logger(&self) -> PhaseLogger {
        PhaseLogger::new(self.logger("PHASE"))
    }

    pub fn transfer_logger(&self) -> TransferLogger {
        TransferLogger::new(self.logger("XFER"))
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}
