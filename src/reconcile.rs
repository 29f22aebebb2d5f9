//! Counter reconciliation: turns raw cumulative step-counter readings into
//! bounded daily deltas.
//!
//! Step-counter hardware reports a cumulative count since the last device
//! boot. The counter resets whenever the device reboots or the sensor driver
//! restarts, so a lower reading must never be interpreted as negative steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw cumulative reading pushed by the step-counter hardware.
///
/// Ephemeral: consumed immediately by reconciliation, never persisted as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCounterSample {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

/// Outcome of reconciling one raw sample against the stored baseline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ReconcileResult {
    /// First sample ever observed. The device's lifetime count must not be
    /// credited as steps walked today, so only the baseline is recorded.
    Initialized,
    /// The counter went backwards (reboot, driver restart). Steps lost across
    /// the gap are unknowable, so nothing is credited and tracking resumes
    /// from the lower value.
    Reset,
    NoChange,
    Delta(u64),
}

/// Classify a raw reading against the last observed baseline.
///
/// The baseline always advances to the latest reading, including on
/// `NoChange`, so a fractional reading cannot leave a stale reference point.
pub fn classify(baseline: Option<f64>, value: f64) -> ReconcileResult {
    let Some(last) = baseline else {
        return ReconcileResult::Initialized;
    };

    if value < last {
        return ReconcileResult::Reset;
    }

    let diff = (value - last).floor();
    if diff <= 0.0 {
        ReconcileResult::NoChange
    } else {
        ReconcileResult::Delta(diff as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_initializes_without_credit() {
        assert_eq!(classify(None, 48_213.0), ReconcileResult::Initialized);
    }

    #[test]
    fn forward_movement_credits_floored_difference() {
        assert_eq!(classify(Some(1000.0), 1050.0), ReconcileResult::Delta(50));
        assert_eq!(classify(Some(1000.0), 1050.7), ReconcileResult::Delta(50));
    }

    #[test]
    fn equal_or_fractional_movement_is_no_change() {
        assert_eq!(classify(Some(1000.0), 1000.0), ReconcileResult::NoChange);
        assert_eq!(classify(Some(1000.0), 1000.9), ReconcileResult::NoChange);
    }

    #[test]
    fn lower_reading_is_a_reset_never_a_negative_delta() {
        assert_eq!(classify(Some(1000.0), 900.0), ReconcileResult::Reset);
    }

    #[test]
    fn credited_deltas_sum_to_final_minus_baseline_without_resets() {
        let samples = [1000.0, 1013.0, 1013.0, 1200.0, 1201.0, 1500.0];
        let mut baseline: Option<f64> = None;
        let mut credited = 0u64;

        for value in samples {
            if let ReconcileResult::Delta(amount) = classify(baseline, value) {
                credited += amount;
            }
            baseline = Some(value);
        }

        assert_eq!(credited, 500);
    }

    #[test]
    fn recovers_forward_tracking_after_reset() {
        let samples = [(1000.0, ReconcileResult::Initialized),
            (1050.0, ReconcileResult::Delta(50)),
            (1050.0, ReconcileResult::NoChange),
            (900.0, ReconcileResult::Reset),
            (950.0, ReconcileResult::Delta(50))];

        let mut baseline: Option<f64> = None;
        for (value, expected) in samples {
            assert_eq!(classify(baseline, value), expected, "at reading {value}");
            baseline = Some(value);
        }
        assert_eq!(baseline, Some(950.0));
    }
}
