//! Dynamic Liquidity Analyzer output types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiquidityRegime {
    UltraHigh,
    High,
    Normal,
    Low,
    Critical,
}

impl LiquidityRegime {
    /// Bucket a [0,100] percentile into one of the five named bands.
    pub fn from_percentile(percentile: u8) -> Self {
        match percentile {
            90..=100 => LiquidityRegime::UltraHigh,
            75..=89 => LiquidityRegime::High,
            50..=74 => LiquidityRegime::Normal,
            25..=49 => LiquidityRegime::Low,
            _ => LiquidityRegime::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SampleStatus {
    Valid,
    InvalidData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquiditySample {
    pub status: SampleStatus,
    pub dls: u8,
    pub percentile: u8,
    pub regime: LiquidityRegime,
    pub is_valid_for_signal: bool,
    pub timestamp: i64,
}

impl LiquiditySample {
    pub fn invalid(timestamp: i64) -> Self {
        Self {
            status: SampleStatus::InvalidData,
            dls: 0,
            percentile: 0,
            regime: LiquidityRegime::Critical,
            is_valid_for_signal: false,
            timestamp,
        }
    }
}

/// Derived events emitted by the DLA alongside each valid sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiquidityEvent {
    HighLiquidityRegime,
    LowLiquidityWarning,
    CriticalLiquidityDetected,
}

impl LiquidityEvent {
    pub fn from_percentile(percentile: u8) -> Option<Self> {
        if percentile >= 90 {
            Some(LiquidityEvent::HighLiquidityRegime)
        } else if percentile <= 10 {
            Some(LiquidityEvent::CriticalLiquidityDetected)
        } else if percentile <= 25 {
            Some(LiquidityEvent::LowLiquidityWarning)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_buckets_match_spec_bounds() {
        assert_eq!(LiquidityRegime::from_percentile(90), LiquidityRegime::UltraHigh);
        assert_eq!(LiquidityRegime::from_percentile(75), LiquidityRegime::High);
        assert_eq!(LiquidityRegime::from_percentile(50), LiquidityRegime::Normal);
        assert_eq!(LiquidityRegime::from_percentile(25), LiquidityRegime::Low);
        assert_eq!(LiquidityRegime::from_percentile(24), LiquidityRegime::Critical);
    }

    #[test]
    fn event_priority_matches_spec() {
        assert_eq!(LiquidityEvent::from_percentile(95), Some(LiquidityEvent::HighLiquidityRegime));
        assert_eq!(LiquidityEvent::from_percentile(10), Some(LiquidityEvent::CriticalLiquidityDetected));
        assert_eq!(LiquidityEvent::from_percentile(20), Some(LiquidityEvent::LowLiquidityWarning));
        assert_eq!(LiquidityEvent::from_percentile(50), None);
    }
}
