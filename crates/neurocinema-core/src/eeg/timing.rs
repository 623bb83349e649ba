//! Window timing: reconcile a clip's reported start against the clock
//!
//! The coordinator learns about a clip some time after playback actually
//! began. Without compensating for that lag, collection windows would drift
//! later every clip and risk reading into the next clip's content.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Compute the remaining collection budget for a clip.
///
/// `remaining = duration - (now - start) - lead`, clamped at zero. A start
/// time in the future (clock skew) also yields zero: the window collects
/// nothing rather than erroring.
pub fn collection_budget(
    start: DateTime<Utc>,
    duration_secs: f64,
    now: DateTime<Utc>,
    lead_secs: f64,
) -> Duration {
    let already_elapsed = (now - start).num_milliseconds() as f64 / 1000.0;
    if already_elapsed < 0.0 {
        return Duration::ZERO;
    }

    let remaining = (duration_secs - already_elapsed - lead_secs).max(0.0);
    Duration::from_secs_f64(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_full_duration_when_no_lag() {
        let now = Utc::now();
        let budget = collection_budget(now, 10.0, now, 0.0);
        assert_eq!(budget, Duration::from_secs(10));
    }

    #[test]
    fn test_lag_is_subtracted() {
        let now = Utc::now();
        let start = now - TimeDelta::milliseconds(2500);
        let budget = collection_budget(start, 10.0, now, 0.0);
        assert!((budget.as_secs_f64() - 7.5).abs() < 0.01);
    }

    #[test]
    fn test_lead_time_is_subtracted() {
        let now = Utc::now();
        let budget = collection_budget(now, 10.0, now, 0.5);
        assert!((budget.as_secs_f64() - 9.5).abs() < 0.01);
    }

    #[test]
    fn test_clamps_when_clip_already_over() {
        let now = Utc::now();
        let start = now - TimeDelta::seconds(30);
        assert_eq!(collection_budget(start, 10.0, now, 0.0), Duration::ZERO);
    }

    #[test]
    fn test_clamps_on_clock_skew() {
        let now = Utc::now();
        let start = now + TimeDelta::seconds(5);
        assert_eq!(collection_budget(start, 10.0, now, 0.0), Duration::ZERO);
    }

    #[test]
    fn test_clamps_when_lead_exceeds_duration() {
        let now = Utc::now();
        assert_eq!(collection_budget(now, 0.3, now, 0.5), Duration::ZERO);
    }
}
