//! Measurement engine
//!
//! This module contains the speed test execution components:
//! - Latency prober issuing sequential timed probes
//! - Stream workers moving bytes until cancelled
//! - Throughput sessions running a worker pool against a deadline
//! - The executor that runs the latency, download and upload phases in order

pub mod latency;
pub mod session;
pub mod worker;

pub use latency::LatencyProber;
pub use session::{ByteCounter, LoadedLatency, SessionSettings, ThroughputSession};
pub use worker::{StreamWorker, TransferPlan, WorkerStats};

use crate::{
    client::{HttpTransport, SpeedTransport},
    error::{AppError, Result},
    logging::{LoggerFactory, PhaseLogger, TransferLogger},
    models::{Config, LatencyResult, SpeedTestRecord, ThroughputResult},
    types::{Direction, TestPhase},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Observer for live progress and finished phases.
///
/// Called from engine tasks, so implementations must be cheap and must not
/// block.
pub trait Reporter: Send + Sync {
    /// Live byte total of a running throughput session
    fn on_sample(&self, _direction: Direction, _total_bytes: u64, _elapsed_secs: f64) {}

    /// A phase finished
    fn on_phase_complete(&self, _outcome: &PhaseOutcome) {}
}

/// Reporter that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Result of one phase as handed to the reporter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseOutcome {
    Latency(LatencyResult),
    /// Every latency probe was lost
    LatencyUnavailable { attempts: u32 },
    Throughput(ThroughputResult),
}

impl PhaseOutcome {
    pub fn phase(&self) -> TestPhase {
        match self {
            PhaseOutcome::Latency(_) | PhaseOutcome::LatencyUnavailable { .. } => TestPhase::Latency,
            PhaseOutcome::Throughput(result) => result.direction.into(),
        }
    }
}

/// Everything measured in one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedTestReport {
    pub server_url: String,
    /// `None` when every latency probe was lost
    pub latency: Option<LatencyResult>,
    pub latency_attempts: u32,
    pub download: ThroughputResult,
    pub upload: ThroughputResult,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl SpeedTestReport {
    /// Flatten into the persistence record.
    ///
    /// With latency unavailable, ping and jitter are absent and loss is 100%.
    pub fn to_record(&self) -> SpeedTestRecord {
        SpeedTestRecord {
            ping_ms: self.latency.as_ref().map(|l| l.average_ms),
            jitter_ms: self.latency.as_ref().map(|l| l.jitter_ms),
            packet_loss_percent: self.latency.as_ref().map_or(100.0, |l| l.loss_percent),
            download_mbps: Some(self.download.mbps),
            upload_mbps: Some(self.upload.mbps),
            download_latency_ms: self.download.loaded_latency_ms,
            upload_latency_ms: self.upload.loaded_latency_ms,
            downloaded_bytes: self.download.total_bytes,
            uploaded_bytes: self.upload.total_bytes,
            timestamp: self.completed_at,
        }
    }

    /// Phase outcomes in execution order
    pub fn outcomes(&self) -> Vec<PhaseOutcome> {
        let latency = match &self.latency {
            Some(result) => PhaseOutcome::Latency(result.clone()),
            None => PhaseOutcome::LatencyUnavailable { attempts: self.latency_attempts },
        };
        vec![
            latency,
            PhaseOutcome::Throughput(self.download.clone()),
            PhaseOutcome::Throughput(self.upload.clone()),
        ]
    }

    /// No phase produced a measurement
    pub fn is_total_failure(&self) -> bool {
        self.latency.is_none() && self.download.total_bytes == 0 && self.upload.total_bytes == 0
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

/// High-level test executor interface
#[async_trait]
pub trait TestExecutor {
    /// Run a complete speed test, reporting progress as it goes
    async fn execute(&self, reporter: Arc<dyn Reporter>) -> Result<SpeedTestReport>;
}

/// Runs the latency, download and upload phases in order.
///
/// Packet loss never gates the throughput phases; all three always run.
pub struct SpeedTestExecutor {
    config: Config,
    transport: Arc<dyn SpeedTransport>,
}

impl SpeedTestExecutor {
    pub fn new(config: Config, transport: Arc<dyn SpeedTransport>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    /// Executor talking HTTP to the configured server
    pub fn from_config(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::new(config, Arc::new(transport))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&self, reporter: Arc<dyn Reporter>) -> Result<SpeedTestReport> {
        let factory = LoggerFactory::new(self.config.clone());
        let mut phases = factory.phase_logger();
        let transfers = factory.transfer_logger();
        let started_at = Utc::now();

        phases.start_phase(TestPhase::Latency);
        let prober = LatencyProber::from_config(self.transport.clone(), &self.config)?
            .with_logger(transfers.clone());
        let latency = match prober.probe().await {
            Ok(result) => {
                phases.log_latency_result(&result);
                reporter.on_phase_complete(&PhaseOutcome::Latency(result.clone()));
                Some(result)
            }
            Err(AppError::LatencyUnavailable { attempts }) => {
                phases.log_latency_unavailable(&AppError::latency_unavailable(attempts));
                reporter.on_phase_complete(&PhaseOutcome::LatencyUnavailable { attempts });
                None
            }
            Err(error) => return Err(error),
        };
        phases.end_phase(TestPhase::Latency, latency.is_some());

        let download = self
            .run_throughput(Direction::Download, &mut phases, &transfers, reporter.clone())
            .await?;
        let upload = self
            .run_throughput(Direction::Upload, &mut phases, &transfers, reporter.clone())
            .await?;

        Ok(SpeedTestReport {
            server_url: self.config.server_url.clone(),
            latency,
            latency_attempts: self.config.ping_count,
            download,
            upload,
            started_at,
            completed_at: Utc::now(),
        })
    }

    async fn run_throughput(
        &self,
        direction: Direction,
        phases: &mut PhaseLogger,
        transfers: &TransferLogger,
        reporter: Arc<dyn Reporter>,
    ) -> Result<ThroughputResult> {
        let phase = TestPhase::from(direction);
        phases.start_phase(phase);

        let settings = SessionSettings::from_config(&self.config, direction);
        let session = ThroughputSession::new(direction, settings)?.with_logger(transfers.clone());
        let result = session.run(self.transport.clone(), reporter.clone()).await;

        phases.log_throughput_result(&result);
        phases.end_phase(phase, result.total_bytes > 0);
        reporter.on_phase_complete(&PhaseOutcome::Throughput(result.clone()));
        Ok(result)
    }
}

#[async_trait]
impl TestExecutor for SpeedTestExecutor {
    async fn execute(&self, reporter: Arc<dyn Reporter>) -> Result<SpeedTestReport> {
        self.run(reporter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{DownloadScript, MockTransport, PingScript, StreamEnd};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct PhaseRecorder {
        phases: Mutex<Vec<TestPhase>>,
    }

    impl Reporter for PhaseRecorder {
        fn on_phase_complete(&self, outcome: &PhaseOutcome) {
            self.phases.lock().unwrap().push(outcome.phase());
        }
    }

    fn test_config() -> Config {
        Config {
            ping_count: 5,
            download_workers: 2,
            upload_workers: 2,
            test_duration_seconds: 2,
            upload_chunk_bytes: 64 * 1024,
            ..Config::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_all_phases_in_order() {
        let transport = MockTransport::new().with_ping_delay(Duration::from_millis(25));
        let executor = SpeedTestExecutor::new(test_config(), Arc::new(transport)).unwrap();
        let recorder = Arc::new(PhaseRecorder::default());

        let report = executor.run(recorder.clone()).await.unwrap();

        assert_eq!(*recorder.phases.lock().unwrap(), TestPhase::ALL.to_vec());
        let latency = report.latency.as_ref().unwrap();
        assert!((latency.average_ms - 25.0).abs() < 1e-6);
        assert!(report.download.total_bytes > 0);
        assert!(report.upload.total_bytes > 0);
        assert!(report.download.loaded_latency_ms.is_some());
        assert!(!report.is_total_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_latency_does_not_stop_throughput() {
        let transport = MockTransport::new().with_ping_default(PingScript::Hang);
        let executor = SpeedTestExecutor::new(test_config(), Arc::new(transport)).unwrap();

        let report = executor.run(Arc::new(NoopReporter)).await.unwrap();

        assert!(report.latency.is_none());
        assert!(report.download.mbps > 0.0);
        assert!(matches!(
            report.outcomes()[0],
            PhaseOutcome::LatencyUnavailable { attempts: 5 }
        ));

        let record = report.to_record();
        assert_eq!(record.ping_ms, None);
        assert_eq!(record.packet_loss_percent, 100.0);
        assert_eq!(record.download_latency_ms, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_from_report() {
        let transport = MockTransport::new().with_download(DownloadScript::Stream {
            chunk_size: 10_000,
            count: Some(10),
            interval: Duration::from_millis(10),
            end: StreamEnd::Hang,
        });
        let config = Config {
            measure_loaded_latency: false,
            ..test_config()
        };
        let executor = SpeedTestExecutor::new(config, Arc::new(transport)).unwrap();

        let report = executor.run(Arc::new(NoopReporter)).await.unwrap();
        let record = report.to_record();

        assert_eq!(record.downloaded_bytes, 2 * 10 * 10_000);
        assert_eq!(record.download_mbps, Some(report.download.mbps));
        assert_eq!(record.ping_ms, Some(report.latency.as_ref().unwrap().average_ms));
        assert_eq!(record.packet_loss_percent, 0.0);
        assert!(record.download_latency_ms.is_none());
        assert_eq!(record.timestamp, report.completed_at);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = Config {
            download_workers: 0,
            ..Config::default()
        };
        assert!(SpeedTestExecutor::new(config, Arc::new(MockTransport::new())).is_err());
    }

    #[test]
    fn test_phase_outcome_serializes_tagged() {
        let outcome = PhaseOutcome::LatencyUnavailable { attempts: 10 };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["phase"], "latency_unavailable");
        assert_eq!(value["attempts"], 10);
    }
}
