//! Error handling for the network speed tester

use colored::Colorize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Raised while building the configuration, before any I/O
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The server answered, but not with a usable response
    #[error("HTTP request error: {0}")]
    HttpRequest(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parsing error: {0}")]
    Parse(String),

    /// Every latency probe of a run was lost
    #[error("Latency unavailable: all {attempts} probe(s) were lost")]
    LatencyUnavailable { attempts: u32 },

    /// A single download or upload transfer failed
    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Test execution error: {0}")]
    TestExecution(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    pub fn http_request<S: Into<String>>(message: S) -> Self {
        Self::HttpRequest(message.into())
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    pub fn latency_unavailable(attempts: u32) -> Self {
        Self::LatencyUnavailable { attempts }
    }

    pub fn transfer<S: Into<String>>(message: S) -> Self {
        Self::Transfer(message.into())
    }

    pub fn test_execution<S: Into<String>>(message: S) -> Self {
        Self::TestExecution(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Short tag used in console output and structured log fields
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Network(_) => "NETWORK",
            Self::HttpRequest(_) => "HTTP",
            Self::Timeout(_) => "TIMEOUT",
            Self::Validation(_) => "VALIDATION",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::LatencyUnavailable { .. } => "LATENCY",
            Self::Transfer(_) => "TRANSFER",
            Self::TestExecution(_) => "TEST",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Network(_) | Self::HttpRequest(_) | Self::Transfer(_) => 2,
            Self::Timeout(_) | Self::LatencyUnavailable { .. } => 3,
            Self::Io(_) => 5,
            Self::TestExecution(_) => 6,
            Self::Internal(_) => 99,
        }
    }

    /// Troubleshooting hints shown under the error message
    pub fn suggestions(&self) -> &'static [&'static str] {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => &[
                "Check your .env file format (see --help-topic config)",
                "Verify the server URL starts with http:// or https://",
                "Worker counts must be between 1 and 64",
            ],
            Self::Network(_) | Self::HttpRequest(_) | Self::Transfer(_) => &[
                "Check that the speed-test server is running and reachable",
                "Verify firewall settings",
            ],
            Self::Timeout(_) | Self::LatencyUnavailable { .. } => &[
                "Raise --ping-timeout if the path is slow",
                "Confirm the ping endpoint answers with a 2xx status",
            ],
            Self::TestExecution(_) => &[
                "Confirm the ping, download and upload endpoints exist on the server",
                "Re-run with --debug to see per-transfer failures",
            ],
            Self::Io(_) => &["Check file permissions in the working directory"],
            Self::Internal(_) => &["This is likely a bug; please report it with the --debug output"],
        }
    }

    /// `[CATEGORY] message`, colored by severity group
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if !use_color {
            return format!("[{}] {}", category, message);
        }

        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                format!("[{}] {}", category.red().bold(), message.red())
            }
            Self::Network(_) | Self::HttpRequest(_) | Self::Transfer(_) => {
                format!("[{}] {}", category.yellow().bold(), message.yellow())
            }
            Self::Timeout(_) | Self::LatencyUnavailable { .. } => {
                format!("[{}] {}", category.blue().bold(), message.blue())
            }
            Self::Io(_) | Self::TestExecution(_) => {
                format!("[{}] {}", category.cyan().bold(), message.cyan())
            }
            Self::Internal(_) => {
                format!("[{}] {}", category.bright_red().bold(), message.bright_red())
            }
        }
    }
}

/// Why a single stream transfer stopped.
///
/// The deadline abort of a session travels through the same code paths as
/// real I/O failures, so the two are kept apart by variant rather than by
/// inspecting error messages.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The session's cancellation signal fired. Not a failure.
    #[error("transfer cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(#[from] AppError),
}

impl TransferError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::network(error.to_string())
        } else {
            Self::http_request(error.to_string())
        }
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Prints fatal errors to stderr
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Message, optional cause chain and troubleshooting hints
    pub fn render(&self, error: &AppError) -> String {
        let mut output = error.format_for_console(self.use_color);

        if self.verbose {
            output.push_str(&format!("\nExit code: {}", error.exit_code()));
        }

        let suggestions = error.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\n\nTroubleshooting:");
            for suggestion in suggestions {
                output.push_str(&format!("\n  - {}", suggestion));
            }
        }

        output
    }

    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.render(error));
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}
