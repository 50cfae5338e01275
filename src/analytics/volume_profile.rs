//! Volume-profile factor for the DLS composite.
//!
//! Volume-profile integration is optional and not uniformly wired in, so
//! this returns the 1.0 constant unless a notional-volume window is
//! supplied by the caller.

/// Default when no notional-volume feed is wired in.
pub const DEFAULT_FACTOR: f64 = 1.0;

const MIN_FACTOR: f64 = 0.5;
const MAX_FACTOR: f64 = 1.5;

/// Normalizes a rolling 1h notional-volume observation against its own
/// trailing average into [0.5, 1.5]. Returns the default constant when no
/// window is available.
pub fn factor(recent_notional: Option<f64>, trailing_average_notional: Option<f64>) -> f64 {
    let (Some(recent), Some(average)) = (recent_notional, trailing_average_notional) else {
        return DEFAULT_FACTOR;
    };
    if average <= 0.0 {
        return DEFAULT_FACTOR;
    }
    (recent / average).clamp(MIN_FACTOR, MAX_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_one_without_a_feed() {
        assert_eq!(factor(None, None), DEFAULT_FACTOR);
    }

    #[test]
    fn clamps_to_bounds() {
        assert_eq!(factor(Some(1000.0), Some(100.0)), MAX_FACTOR);
        assert_eq!(factor(Some(10.0), Some(1000.0)), MIN_FACTOR);
    }
}
