//! Statistical calculations for latency and throughput measurements
//!
//! Jitter is the sample standard deviation (n - 1 denominator) of the RTT
//! samples around their mean. Throughput is expressed in megabits per second
//! using decimal units (10^6 bits).


/// Arithmetic mean; 0.0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation around the mean; 0.0 with fewer than two values
pub fn sample_std_dev(values: &[f64]) -> f64 {
    let count = values.len();
    if count < 2 {
        return 0.0;
    }

    let avg = mean(values);
    let sum_squared_diff: f64 = values
        .iter()
        .map(|&x| (x - avg).powi(2))
        .sum();

    (sum_squared_diff / (count - 1) as f64).sqrt()
}

/// Minimum and maximum; (0.0, 0.0) for an empty slice
pub fn min_max(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}

/// Lost probes as a percentage of probes sent
pub fn loss_percent(sent: u32, received: u32) -> f64 {
    if sent == 0 {
        return 0.0;
    }
    (sent.saturating_sub(received)) as f64 / sent as f64 * 100.0
}

/// `bytes * 8 / (seconds * 1_000_000)`; 0.0 for a non-positive duration
pub fn throughput_mbps(bytes: u64, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / (seconds * 1_000_000.0)
}

/// Running mean for values that arrive one at a time
#[derive(Debug, Clone, Default)]
pub struct RollingStats {
    total_sum: f64,
    count: usize,
}

impl RollingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value(&mut self, value: f64) {
        self.total_sum += value;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of the values seen so far, `None` before the first value
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total_sum / self.count as f64)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_empty() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[10.0, 20.0, 30.0]), 20.0);
    }

    #[test]
    fn test_std_dev_small_inputs() {
        assert_eq!(sample_std_dev(&[]), 0.0);
        assert_eq!(sample_std_dev(&[5.0]), 0.0);
        assert_eq!(sample_std_dev(&[7.0, 7.0, 7.0]), 0.0);
        // deviations -1, +1 around 2 -> variance 2 / 1
        assert!((sample_std_dev(&[1.0, 3.0]) - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min_max(&[]), (0.0, 0.0));
        assert_eq!(min_max(&[3.0, 1.0, 2.0]), (1.0, 3.0));
    }

    #[test]
    fn test_loss_uses_sent_as_denominator() {
        assert_eq!(loss_percent(20, 17), 15.0);
        assert_eq!(loss_percent(10, 10), 0.0);
        assert_eq!(loss_percent(4, 0), 100.0);
        assert_eq!(loss_percent(0, 0), 0.0);
    }

    #[test]
    fn test_throughput_mbps() {
        // 6 workers * 20 MB/s * 10 s over a 10 s window
        let bytes = 6 * 20_000_000 * 10;
        assert_eq!(throughput_mbps(bytes, 10.0), 960.0);
        assert_eq!(throughput_mbps(0, 10.0), 0.0);
        assert_eq!(throughput_mbps(1_000, 0.0), 0.0);
    }

    #[test]
    fn test_rolling_stats_matches_batch() {
        let values = [12.0, 15.5, 9.25, 30.0, 18.0];
        let mut rolling = RollingStats::new();
        for v in values {
            rolling.add_value(v);
        }

        assert_eq!(rolling.count(), values.len());
        assert!((rolling.average().unwrap() - mean(&values)).abs() < 1e-9);
    }

    #[test]
    fn test_rolling_stats_empty() {
        let rolling = RollingStats::default();
        assert!(rolling.is_empty());
        assert!(rolling.average().is_none());
        assert_eq!(rolling.count(), 0);
    }
}
