//! Latency and throughput measurement data models

use crate::{
    error::{AppError, Result},
    stats,
    types::Direction,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use chrono::{DateTime, Utc};

/// Why a latency probe produced no sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum LossReason {
    /// The per-attempt timeout elapsed before headers arrived
    Timeout,
    /// Transport error or non-success status
    Failed(String),
}

/// A single latency probe outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LatencySample {
    Received { rtt_ms: f64 },
    Lost { reason: LossReason },
}

impl LatencySample {
    pub fn received(rtt: Duration) -> Self {
        Self::Received { rtt_ms: rtt.as_secs_f64() * 1000.0 }
    }

    pub fn timeout() -> Self {
        Self::Lost { reason: LossReason::Timeout }
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self::Lost { reason: LossReason::Failed(message.into()) }
    }

    pub fn rtt_ms(&self) -> Option<f64> {
        match self {
            Self::Received { rtt_ms } => Some(*rtt_ms),
            Self::Lost { .. } => None,
        }
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, Self::Lost { .. })
    }
}

/// Aggregate of one latency phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyResult {
    /// Mean RTT of received probes
    pub average_ms: f64,

    /// Sample standard deviation of received RTTs
    pub jitter_ms: f64,

    /// Lost probes as a percentage of probes sent
    pub loss_percent: f64,

    pub min_ms: f64,
    pub max_ms: f64,

    /// Probes sent (including lost ones)
    pub sent: u32,

    /// Probes that produced an RTT
    pub received: u32,

    /// Individual probe outcomes in send order
    pub samples: Vec<LatencySample>,
}

impl LatencyResult {
    /// Aggregate probe outcomes.
    ///
    /// Fails with [`AppError::LatencyUnavailable`] when no probe was received;
    /// partial loss is a normal result.
    pub fn from_samples(samples: Vec<LatencySample>) -> Result<Self> {
        let sent = samples.len() as u32;
        let rtts: Vec<f64> = samples.iter().filter_map(LatencySample::rtt_ms).collect();

        if rtts.is_empty() {
            return Err(AppError::latency_unavailable(sent));
        }

        let received = rtts.len() as u32;
        let average_ms = stats::mean(&rtts);
        let (min_ms, max_ms) = stats::min_max(&rtts);

        Ok(Self {
            average_ms,
            jitter_ms: stats::sample_std_dev(&rtts),
            loss_percent: stats::loss_percent(sent, received),
            min_ms,
            max_ms,
            sent,
            received,
            samples,
        })
    }

    pub fn lost(&self) -> u32 {
        self.sent - self.received
    }
}

/// Outcome of one throughput session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThroughputResult {
    pub direction: Direction,

    /// Megabits per second (10^6 bits)
    pub mbps: f64,

    /// Bytes credited by all workers
    pub total_bytes: u64,

    /// Denominator used for `mbps`
    pub duration_secs: f64,

    pub worker_count: usize,

    /// Failed transfer attempts (cancellation excluded)
    pub transfer_errors: u64,

    /// Mean RTT measured while the session was loading the link
    pub loaded_latency_ms: Option<f64>,
}

impl ThroughputResult {
    pub fn new(direction: Direction, total_bytes: u64, duration: Duration, worker_count: usize) -> Self {
        let duration_secs = duration.as_secs_f64();
        Self {
            direction,
            mbps: stats::throughput_mbps(total_bytes, duration_secs),
            total_bytes,
            duration_secs,
            worker_count,
            transfer_errors: 0,
            loaded_latency_ms: None,
        }
    }

    pub fn with_transfer_errors(mut self, transfer_errors: u64) -> Self {
        self.transfer_errors = transfer_errors;
        self
    }

    pub fn with_loaded_latency(mut self, loaded_latency_ms: Option<f64>) -> Self {
        self.loaded_latency_ms = loaded_latency_ms;
        self
    }

    /// Data moved in mebibytes, for display
    pub fn megabytes(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Flat record of one completed run, handed to persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestRecord {
    pub ping_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub packet_loss_percent: f64,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub download_latency_ms: Option<f64>,
    pub upload_latency_ms: Option<f64>,
    pub downloaded_bytes: u64,
    pub uploaded_bytes: u64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn received(values: &[f64]) -> Vec<LatencySample> {
        values.iter().map(|&rtt_ms| LatencySample::Received { rtt_ms }).collect()
    }

    #[test]
    fn test_identical_samples_have_zero_jitter() {
        let result = LatencyResult::from_samples(received(&[42.0; 8])).unwrap();
        assert_eq!(result.average_ms, 42.0);
        assert_eq!(result.jitter_ms, 0.0);
        assert_eq!(result.loss_percent, 0.0);
        assert_eq!(result.sent, 8);
    }

    #[test]
    fn test_all_lost_is_latency_unavailable() {
        let samples = vec![LatencySample::timeout(), LatencySample::failed("503"), LatencySample::timeout()];
        match LatencyResult::from_samples(samples) {
            Err(AppError::LatencyUnavailable { attempts }) => assert_eq!(attempts, 3),
            other => panic!("expected LatencyUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_twenty_probes_three_lost() {
        let rtts = [
            50.0, 52.0, 48.0, 51.0, 49.0, 53.0, 47.0, 50.0, 52.0,
            48.0, 51.0, 49.0, 50.0, 54.0, 46.0, 50.0, 50.0,
        ];
        let mut samples = received(&rtts);
        samples.insert(3, LatencySample::timeout());
        samples.insert(9, LatencySample::timeout());
        samples.push(LatencySample::timeout());
        assert_eq!(samples.len(), 20);

        let result = LatencyResult::from_samples(samples).unwrap();
        let expected_mean = rtts.iter().sum::<f64>() / rtts.len() as f64;

        assert_eq!(result.loss_percent, 15.0);
        assert!((result.average_ms - expected_mean).abs() < 1e-9);
        assert_eq!(result.received, 17);
        assert_eq!(result.lost(), 3);
        assert_eq!(result.min_ms, 46.0);
        assert_eq!(result.max_ms, 54.0);
    }

    #[test]
    fn test_jitter_is_sample_standard_deviation() {
        // mean 20, squared deviations 100 + 0 + 100, n - 1 = 2
        let result = LatencyResult::from_samples(received(&[10.0, 20.0, 30.0])).unwrap();
        assert!((result.jitter_ms - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_helpers() {
        let sample = LatencySample::received(Duration::from_millis(25));
        assert_eq!(sample.rtt_ms(), Some(25.0));
        assert!(!sample.is_lost());
        assert!(LatencySample::timeout().is_lost());
        assert_eq!(LatencySample::failed("boom").rtt_ms(), None);
    }

    #[test]
    fn test_throughput_result_from_window() {
        let result = ThroughputResult::new(Direction::Download, 1_250_000, Duration::from_secs(1), 2);
        assert_eq!(result.mbps, 10.0);
        assert_eq!(result.duration_secs, 1.0);
        assert_eq!(result.transfer_errors, 0);
        assert!(result.loaded_latency_ms.is_none());
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = SpeedTestRecord {
            ping_ms: Some(12.5),
            jitter_ms: Some(1.25),
            packet_loss_percent: 0.0,
            download_mbps: Some(960.0),
            upload_mbps: Some(120.0),
            download_latency_ms: None,
            upload_latency_ms: None,
            downloaded_bytes: 1,
            uploaded_bytes: 2,
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["ping_ms"], 12.5);
        assert_eq!(value["download_mbps"], 960.0);
        assert!(value["timestamp"].is_string());
    }
}
