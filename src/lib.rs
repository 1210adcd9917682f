//! Network Speed Tester
//!
//! Measures network path quality between this host and an HTTP speed-test
//! server: round-trip latency with jitter and packet loss, and sustained
//! throughput in the download and upload directions.

pub mod cli;
pub mod config;
pub mod client;
pub mod error;
pub mod logging;
pub mod stats;
pub mod executor;
pub mod output;
pub mod models;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, LatencyResult, LatencySample, ThroughputResult, SpeedTestRecord};
pub use client::{SpeedTransport, HttpTransport};
pub use executor::{
    SpeedTestExecutor, SpeedTestReport, LatencyProber, ThroughputSession,
    StreamWorker, ByteCounter, Reporter, NoopReporter, PhaseOutcome,
};
pub use types::Direction;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build metadata emitted by build.rs
pub mod build_info {
    pub const BUILD_TIME: &str = env!("NST_BUILD_TIME");
    pub const GIT_COMMIT: &str = env!("NST_GIT_COMMIT");
    pub const TARGET: &str = env!("NST_TARGET");
    pub const PROFILE: &str = env!("NST_BUILD_PROFILE");

    /// One-line description used in debug output and the help header
    pub fn summary() -> String {
        format!(
            "{} v{} ({} {}, {} build, {})",
            super::PKG_NAME,
            super::VERSION,
            GIT_COMMIT,
            TARGET,
            PROFILE,
            BUILD_TIME
        )
    }
}

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
    pub const DEFAULT_PING_PATH: &str = "/api/ping";
    pub const DEFAULT_DOWNLOAD_PATH: &str = "/api/download";
    pub const DEFAULT_UPLOAD_PATH: &str = "/api/upload";
    pub const DEFAULT_DOWNLOAD_SIZE_PARAM: &str = "bytes";

    pub const DEFAULT_PING_COUNT: u32 = 10;
    pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_millis(2000);
    pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_millis(120);

    pub const DEFAULT_DOWNLOAD_WORKERS: usize = 4;
    pub const DEFAULT_UPLOAD_WORKERS: usize = 3;
    pub const DEFAULT_TEST_DURATION: Duration = Duration::from_secs(10);

    /// Large enough that one request normally outlives the whole window
    pub const DEFAULT_DOWNLOAD_REQUEST_BYTES: u64 = 1_000_000_000;
    pub const DEFAULT_UPLOAD_CHUNK_BYTES: usize = 512 * 1024;

    pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);
    pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(150);
    pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
    pub const DEFAULT_LOADED_LATENCY_INTERVAL: Duration = Duration::from_millis(500);
    pub const DEFAULT_MEASURE_LOADED_LATENCY: bool = true;
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
