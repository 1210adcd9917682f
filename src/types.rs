//! Type definitions and aliases

use std::fmt;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Direction of a throughput measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Server to client
    Download,
    /// Client to server
    Upload,
}

impl Direction {
    /// Short lowercase label used in logs and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Download => "download",
            Direction::Upload => "upload",
        }
    }

    /// Human-readable name for display
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Download => "Download",
            Direction::Upload => "Upload",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phases of a full speed test run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestPhase {
    Latency,
    Download,
    Upload,
}

impl TestPhase {
    /// All phases in the order they run
    pub const ALL: [TestPhase; 3] = [TestPhase::Latency, TestPhase::Download, TestPhase::Upload];

    pub fn name(&self) -> &'static str {
        match self {
            TestPhase::Latency => "Latency",
            TestPhase::Download => "Download",
            TestPhase::Upload => "Upload",
        }
    }
}

impl From<Direction> for TestPhase {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Download => TestPhase::Download,
            Direction::Upload => TestPhase::Upload,
        }
    }
}

/// Classification of a throughput figure for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedLevel {
    /// 100 Mbps and above
    Fast,
    /// 25 to 100 Mbps
    Moderate,
    /// Below 25 Mbps
    Slow,
}

impl SpeedLevel {
    pub fn from_mbps(mbps: f64) -> Self {
        if mbps >= 100.0 {
            Self::Fast
        } else if mbps >= 25.0 {
            Self::Moderate
        } else {
            Self::Slow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_labels() {
        assert_eq!(Direction::Download.as_str(), "download");
        assert_eq!(Direction::Upload.to_string(), "upload");
        assert_eq!(Direction::Upload.name(), "Upload");
    }

    #[test]
    fn test_direction_serde_lowercase() {
        let json = serde_json::to_string(&Direction::Download).unwrap();
        assert_eq!(json, "\"download\"");
        let parsed: Direction = serde_json::from_str("\"upload\"").unwrap();
        assert_eq!(parsed, Direction::Upload);
    }

    #[test]
    fn test_phase_order() {
        assert_eq!(TestPhase::ALL[0], TestPhase::Latency);
        assert_eq!(TestPhase::from(Direction::Upload), TestPhase::Upload);
    }

    #[test]
    fn test_speed_level_thresholds() {
        assert_eq!(SpeedLevel::from_mbps(960.0), SpeedLevel::Fast);
        assert_eq!(SpeedLevel::from_mbps(50.0), SpeedLevel::Moderate);
        assert_eq!(SpeedLevel::from_mbps(0.0), SpeedLevel::Slow);
    }
}
