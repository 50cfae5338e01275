//! Classifier threshold profiles.
//!
//! The source ships two subtly different calibrations: an "ultra-aggressive"
//! set meant to force signals during testing and a more restrictive default.
//! Both are named profiles here; the engine defaults to `Conservative` unless
//! `CLASSIFIER_PROFILE=aggressive` is set.

/// Epsilon tolerance for pressure/momentum boundary comparisons.
pub const EPSILON: f64 = 1e-10;

/// Regime-rule constants plus the adaptive-threshold base, floor and
/// per-alert reduction for one calibration.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdProfile {
    pub name: &'static str,

    /// Base percentile threshold for CASCADE_HUNTER before adaptive reduction.
    pub base_dls_threshold: f64,
    /// Points subtracted from `base_dls_threshold` per active side-channel alert.
    pub adaptive_reduction_per_alert: f64,
    /// Minimum the effective threshold can ever fall to.
    pub adaptive_floor: f64,

    pub p_cascade: f64,
    pub m_cascade: f64,

    pub p_coil: f64,
    pub m_coil_min: f64,
    pub m_coil_max: f64,
    pub coil_percentile_threshold: f64,

    pub p_shakeout: f64,
    pub m_shakeout: f64,
    pub shakeout_percentile_threshold: f64,
}

impl ThresholdProfile {
    /// Restrictive default: base DLS threshold 75, reductions apply normally.
    pub const CONSERVATIVE: ThresholdProfile = ThresholdProfile {
        name: "conservative",
        base_dls_threshold: 75.0,
        adaptive_reduction_per_alert: 15.0,
        adaptive_floor: 10.0,
        p_cascade: 1.00001,
        m_cascade: -0.05,
        p_coil: 1.00001,
        m_coil_min: -0.02,
        m_coil_max: 0.02,
        coil_percentile_threshold: 85.0,
        p_shakeout: 1.000001,
        m_shakeout: -0.10,
        shakeout_percentile_threshold: 80.0,
    };

    /// Ultra-aggressive calibration used to force signals during testing:
    /// same regime geometry, much lower base DLS threshold.
    pub const AGGRESSIVE: ThresholdProfile = ThresholdProfile {
        name: "aggressive",
        base_dls_threshold: 25.0,
        ..Self::CONSERVATIVE
    };

    /// Resolve the active profile from `CLASSIFIER_PROFILE`; defaults to
    /// `Conservative` unless the value is exactly `aggressive`.
    pub fn from_env() -> ThresholdProfile {
        match std::env::var("CLASSIFIER_PROFILE") {
            Ok(v) if v.eq_ignore_ascii_case("aggressive") => Self::AGGRESSIVE,
            _ => Self::CONSERVATIVE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggressive_only_lowers_the_base_threshold() {
        let c = ThresholdProfile::CONSERVATIVE;
        let a = ThresholdProfile::AGGRESSIVE;
        assert_eq!(a.base_dls_threshold, 25.0);
        assert_eq!(a.p_cascade, c.p_cascade);
        assert_eq!(a.adaptive_floor, c.adaptive_floor);
    }

    #[test]
    fn defaults_to_conservative_when_unset() {
        // SAFETY: test-only, single-threaded test environment.
        unsafe { std::env::remove_var("CLASSIFIER_PROFILE") };
        assert_eq!(ThresholdProfile::from_env().name, "conservative");
    }
}
