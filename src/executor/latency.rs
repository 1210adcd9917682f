//! Latency prober: sequential timed round trips against the echo endpoint

use crate::{
    client::SpeedTransport,
    error::{AppError, Result},
    logging::TransferLogger,
    models::{
        config::{MAX_PING_COUNT, MAX_PING_TIMEOUT_MS},
        Config, LatencyResult, LatencySample,
    },
};
use std::{sync::Arc, time::Duration};
use tokio::time::{timeout, Instant};

pub struct LatencyProber {
    transport: Arc<dyn SpeedTransport>,
    attempts: u32,
    per_attempt_timeout: Duration,
    interval: Duration,
    logger: Option<TransferLogger>,
}

impl LatencyProber {
    /// Prober issuing `attempts` probes, each bounded by `per_attempt_timeout`
    pub fn new(transport: Arc<dyn SpeedTransport>, attempts: u32, per_attempt_timeout: Duration) -> Result<Self> {
        if attempts == 0 {
            return Err(AppError::config("Probe attempts must be greater than 0"));
        }
        if attempts > MAX_PING_COUNT {
            return Err(AppError::config(format!("Probe attempts cannot exceed {}", MAX_PING_COUNT)));
        }
        if per_attempt_timeout.is_zero() {
            return Err(AppError::config("Probe timeout must be greater than 0"));
        }
        if per_attempt_timeout > Duration::from_millis(MAX_PING_TIMEOUT_MS) {
            return Err(AppError::config(format!("Probe timeout cannot exceed {} ms", MAX_PING_TIMEOUT_MS)));
        }

        Ok(Self {
            transport,
            attempts,
            per_attempt_timeout,
            interval: Duration::ZERO,
            logger: None,
        })
    }

    pub fn from_config(transport: Arc<dyn SpeedTransport>, config: &Config) -> Result<Self> {
        Ok(Self::new(transport, config.ping_count, config.ping_timeout())?
            .with_interval(config.ping_interval()))
    }

    /// Pause between consecutive probes; never part of a sample
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_logger(mut self, logger: TransferLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run every probe in turn and aggregate the outcomes.
    ///
    /// Fails with [`AppError::LatencyUnavailable`] when no probe answered.
    pub async fn probe(&self) -> Result<LatencyResult> {
        let mut samples = Vec::with_capacity(self.attempts as usize);

        for attempt in 1..=self.attempts {
            if attempt > 1 && !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }

            let sample = self.probe_once().await;
            if let (Some(logger), LatencySample::Lost { reason }) = (&self.logger, &sample) {
                logger.log_probe_lost(attempt, &format!("{:?}", reason));
            }
            samples.push(sample);
        }

        LatencyResult::from_samples(samples)
    }

    /// Time one probe from dispatch until response headers arrive
    pub async fn probe_once(&self) -> LatencySample {
        let sent_at = Instant::now();
        match timeout(self.per_attempt_timeout, self.transport.ping()).await {
            Ok(Ok(())) => LatencySample::received(sent_at.elapsed()),
            Ok(Err(error)) => LatencySample::failed(error.to_string()),
            Err(_) => LatencySample::timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockTransport, PingScript};
    use crate::models::LossReason;
    use std::sync::atomic::Ordering;

    fn prober(transport: MockTransport, attempts: u32) -> LatencyProber {
        LatencyProber::new(Arc::new(transport), attempts, Duration::from_millis(2000)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_average() {
        for attempts in [1, 5, 10] {
            let transport = MockTransport::new().with_ping_delay(Duration::from_millis(35));
            let result = prober(transport, attempts).probe().await.unwrap();

            assert!((result.average_ms - 35.0).abs() < 1e-6);
            assert_eq!(result.loss_percent, 0.0);
            assert_eq!(result.sent, attempts);
            assert!(result.jitter_ms < 1e-6);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_timeouts_are_unavailable() {
        let transport = MockTransport::new().with_ping_default(PingScript::Hang);
        let result = prober(transport, 4).probe().await;

        match result {
            Err(AppError::LatencyUnavailable { attempts }) => assert_eq!(attempts, 4),
            other => panic!("expected LatencyUnavailable, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failures_are_unavailable() {
        let transport = MockTransport::new().with_ping_default(PingScript::Fail);
        assert!(matches!(
            prober(transport, 3).probe().await,
            Err(AppError::LatencyUnavailable { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_twenty_probes_three_timeouts() {
        let rtts = [
            50, 52, 48, 51, 49, 53, 47, 50, 52, 48, 51, 49, 50, 54, 46, 50, 50,
        ];
        let mut script: Vec<PingScript> = rtts
            .iter()
            .map(|&ms| PingScript::Respond(Duration::from_millis(ms)))
            .collect();
        script.insert(2, PingScript::Hang);
        script.insert(11, PingScript::Hang);
        script.push(PingScript::Hang);
        assert_eq!(script.len(), 20);

        let transport = MockTransport::new().with_ping_sequence(script);
        let result = prober(transport, 20).probe().await.unwrap();

        let expected_mean = rtts.iter().sum::<u64>() as f64 / rtts.len() as f64;
        assert_eq!(result.loss_percent, 15.0);
        assert!((result.average_ms - expected_mean).abs() < 1e-6);
        assert_eq!(result.received, 17);
        assert_eq!(
            result.samples.iter().filter(|s| matches!(s, LatencySample::Lost { reason: LossReason::Timeout })).count(),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_recorded_as_lost() {
        let transport = MockTransport::new()
            .with_ping_delay(Duration::from_millis(20))
            .with_ping_sequence(vec![PingScript::Fail]);
        let result = prober(transport, 4).probe().await.unwrap();

        assert_eq!(result.loss_percent, 25.0);
        assert!(matches!(
            result.samples[0],
            LatencySample::Lost { reason: LossReason::Failed(_) }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_not_part_of_rtt() {
        let transport = Arc::new(MockTransport::new().with_ping_delay(Duration::from_millis(10)));
        let prober = LatencyProber::new(transport.clone(), 3, Duration::from_secs(1))
            .unwrap()
            .with_interval(Duration::from_millis(120));

        let start = Instant::now();
        let result = prober.probe().await.unwrap();

        assert!((result.average_ms - 10.0).abs() < 1e-6);
        assert_eq!(start.elapsed(), Duration::from_millis(3 * 10 + 2 * 120));
        assert_eq!(transport.ping_calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_invalid_parameters() {
        let transport: Arc<dyn SpeedTransport> = Arc::new(MockTransport::new());
        assert!(LatencyProber::new(transport.clone(), 0, Duration::from_secs(1)).is_err());
        assert!(LatencyProber::new(transport.clone(), 5, Duration::ZERO).is_err());
        assert!(LatencyProber::new(transport.clone(), MAX_PING_COUNT + 1, Duration::from_secs(1)).is_err());
        assert!(LatencyProber::new(transport, 5, Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            ping_count: 7,
            ..Config::default()
        };
        let prober = LatencyProber::from_config(Arc::new(MockTransport::new()), &config).unwrap();
        assert_eq!(prober.attempts(), 7);
        assert_eq!(prober.interval, Duration::from_millis(120));
    }
}
