//! Throughput session: a fixed pool of stream workers measured over a window

use super::{
    worker::{StreamWorker, TransferPlan},
    Reporter,
};
use crate::{
    client::SpeedTransport,
    defaults,
    error::{AppError, Result},
    logging::TransferLogger,
    models::{Config, ThroughputResult},
    stats::RollingStats,
    types::Direction,
};
use bytes::Bytes;
use futures::future::join_all;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Running byte total shared by every worker of a session.
///
/// Only ever increases; reads are a single atomic load.
#[derive(Debug, Default)]
pub struct ByteCounter {
    total: AtomicU64,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bytes: u64) {
        self.total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// Background latency probing while the link is loaded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadedLatency {
    pub interval: Duration,
    pub probe_timeout: Duration,
}

impl Default for LoadedLatency {
    fn default() -> Self {
        Self {
            interval: defaults::DEFAULT_LOADED_LATENCY_INTERVAL,
            probe_timeout: defaults::DEFAULT_PING_TIMEOUT,
        }
    }
}

/// Tunables of one throughput session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub worker_count: usize,
    pub window: Duration,
    pub sample_interval: Duration,
    pub retry_backoff: Duration,
    pub drain_timeout: Duration,
    pub download_request_bytes: u64,
    pub upload_chunk_bytes: usize,
    pub loaded_latency: Option<LoadedLatency>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            worker_count: defaults::DEFAULT_DOWNLOAD_WORKERS,
            window: defaults::DEFAULT_TEST_DURATION,
            sample_interval: defaults::DEFAULT_SAMPLE_INTERVAL,
            retry_backoff: defaults::DEFAULT_RETRY_BACKOFF,
            drain_timeout: defaults::DEFAULT_DRAIN_TIMEOUT,
            download_request_bytes: defaults::DEFAULT_DOWNLOAD_REQUEST_BYTES,
            upload_chunk_bytes: defaults::DEFAULT_UPLOAD_CHUNK_BYTES,
            loaded_latency: None,
        }
    }
}

impl SessionSettings {
    /// Settings for one direction of a configured run
    pub fn from_config(config: &Config, direction: Direction) -> Self {
        let worker_count = match direction {
            Direction::Download => config.download_workers,
            Direction::Upload => config.upload_workers,
        };

        Self {
            worker_count,
            window: config.test_duration(),
            sample_interval: config.sample_interval(),
            retry_backoff: config.retry_backoff(),
            drain_timeout: defaults::DEFAULT_DRAIN_TIMEOUT,
            download_request_bytes: config.download_request_bytes,
            upload_chunk_bytes: config.upload_chunk_bytes,
            loaded_latency: config.measure_loaded_latency.then(|| LoadedLatency {
                interval: defaults::DEFAULT_LOADED_LATENCY_INTERVAL,
                probe_timeout: config.ping_timeout(),
            }),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(AppError::config("Worker count must be greater than 0"));
        }
        if self.window.is_zero() {
            return Err(AppError::config("Measurement window must be greater than 0"));
        }
        if self.sample_interval.is_zero() {
            return Err(AppError::config("Sample interval must be greater than 0"));
        }
        if self.download_request_bytes == 0 {
            return Err(AppError::config("Download request size must be greater than 0"));
        }
        if self.upload_chunk_bytes == 0 {
            return Err(AppError::config("Upload chunk size must be greater than 0"));
        }
        if let Some(loaded) = &self.loaded_latency {
            if loaded.interval.is_zero() || loaded.probe_timeout.is_zero() {
                return Err(AppError::config("Loaded latency interval and timeout must be greater than 0"));
            }
        }
        Ok(())
    }
}

/// One bounded measurement of aggregate bytes moved in one direction.
///
/// Download throughput divides by the fixed window. Upload throughput divides
/// by the time from start until the later of the window end and the last
/// credited send: sends may drain past the deadline and are counted, but a
/// send abandoned after the drain timeout adds neither bytes nor time.
pub struct ThroughputSession {
    direction: Direction,
    settings: SessionSettings,
    counter: Arc<ByteCounter>,
    cancel: CancellationToken,
    logger: Option<TransferLogger>,
}

impl ThroughputSession {
    /// Validate the settings; nothing touches the network until [`run`](Self::run)
    pub fn new(direction: Direction, settings: SessionSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            direction,
            settings,
            counter: Arc::new(ByteCounter::new()),
            cancel: CancellationToken::new(),
            logger: None,
        })
    }

    /// Session with default tunables for the given pool size and window
    pub fn with_window(direction: Direction, worker_count: usize, window: Duration) -> Result<Self> {
        Self::new(
            direction,
            SessionSettings {
                worker_count,
                window,
                ..SessionSettings::default()
            },
        )
    }

    pub fn with_logger(mut self, logger: TransferLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Live byte total, readable while the session runs
    pub fn counter(&self) -> Arc<ByteCounter> {
        self.counter.clone()
    }

    /// Token that stops the session early when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn plan(&self) -> TransferPlan {
        match self.direction {
            Direction::Download => TransferPlan::Download {
                request_bytes: self.settings.download_request_bytes,
            },
            Direction::Upload => TransferPlan::Upload {
                payload: Bytes::from(vec![0u8; self.settings.upload_chunk_bytes]),
            },
        }
    }

    /// Run every worker until the window closes and compute throughput.
    ///
    /// Never fails: a session in which no bytes moved reports 0 Mbps.
    pub async fn run(self, transport: Arc<dyn SpeedTransport>, reporter: Arc<dyn Reporter>) -> ThroughputResult {
        let start = Instant::now();
        let plan = self.plan();

        let workers: Vec<_> = (0..self.settings.worker_count)
            .map(|id| {
                let mut worker = StreamWorker::new(
                    id,
                    plan.clone(),
                    transport.clone(),
                    self.counter.clone(),
                    self.cancel.clone(),
                )
                .with_retry_backoff(self.settings.retry_backoff)
                .with_drain_timeout(self.settings.drain_timeout);
                if let Some(logger) = &self.logger {
                    worker = worker.with_logger(logger.clone());
                }
                tokio::spawn(worker.run())
            })
            .collect();

        let sampler = tokio::spawn(sample_progress(
            self.direction,
            self.counter.clone(),
            self.cancel.clone(),
            reporter.clone(),
            self.settings.sample_interval,
            start,
        ));

        let monitor = self
            .settings
            .loaded_latency
            .map(|loaded| tokio::spawn(monitor_loaded_latency(transport.clone(), self.cancel.clone(), loaded)));

        tokio::select! {
            _ = tokio::time::sleep(self.settings.window) => {}
            _ = self.cancel.cancelled() => {}
        }
        self.cancel.cancel();
        let window_end = Instant::now();

        let mut transfer_errors = 0;
        let mut stopped_at = window_end;
        for joined in join_all(workers).await {
            match joined {
                Ok(stats) => {
                    transfer_errors += stats.failures;
                    if let Some(last_credit) = stats.last_credit {
                        stopped_at = stopped_at.max(last_credit);
                    }
                }
                Err(error) => self.log_task_failure("worker", &error),
            }
        }

        if let Err(error) = sampler.await {
            self.log_task_failure("progress sampler", &error);
        }
        let loaded_latency_ms = match monitor {
            Some(handle) => handle.await.unwrap_or_else(|error| {
                self.log_task_failure("loaded latency monitor", &error);
                None
            }),
            None => None,
        };

        let total_bytes = self.counter.snapshot();
        let duration = match self.direction {
            Direction::Download => self.settings.window,
            Direction::Upload => stopped_at.duration_since(start),
        };
        reporter.on_sample(self.direction, total_bytes, duration.as_secs_f64());

        ThroughputResult::new(self.direction, total_bytes, duration, self.settings.worker_count)
            .with_transfer_errors(transfer_errors)
            .with_loaded_latency(loaded_latency_ms)
    }
}

impl ThroughputSession {
    fn log_task_failure(&self, task: &str, error: &tokio::task::JoinError) {
        if let Some(logger) = &self.logger {
            logger.log_task_failure(self.direction, task, &error.to_string());
        }
    }
}

/// Report the live byte total every `interval` until cancelled
async fn sample_progress(
    direction: Direction,
    counter: Arc<ByteCounter>,
    cancel: CancellationToken,
    reporter: Arc<dyn Reporter>,
    interval: Duration,
    start: Instant,
) {
    let mut ticker = tokio::time::interval_at(start + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                reporter.on_sample(direction, counter.snapshot(), start.elapsed().as_secs_f64());
            }
        }
    }
}

/// Probe the latency endpoint while the session loads the link; returns the
/// mean RTT of the probes that answered
async fn monitor_loaded_latency(
    transport: Arc<dyn SpeedTransport>,
    cancel: CancellationToken,
    loaded: LoadedLatency,
) -> Option<f64> {
    let mut rtts = RollingStats::new();
    let mut ticker = tokio::time::interval(loaded.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let sent_at = Instant::now();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            probe = tokio::time::timeout(loaded.probe_timeout, transport.ping()) => {
                if let Ok(Ok(())) = probe {
                    rtts.add_value(sent_at.elapsed().as_secs_f64() * 1000.0);
                }
            }
        }
    }

    rtts.average()
}
