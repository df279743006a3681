//! Canary traffic ramping.
//!
//! A service with a traffic ladder starts at phase 0 and climbs one phase at
//! a time after dwelling long enough at healthy scores. A score below the
//! current phase's threshold drops it back exactly one phase.
//!
//! The grader is split into a mutating [`TrafficGrader::observe`] and a pure
//! [`TrafficGrader::current_percentage`]; time comes from a [`Clock`].

mod clock;
mod grader;

pub use clock::{Clock, ManualClock, SystemClock};
pub use grader::{PhaseTransition, TrafficGrader};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One rung of the canary ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficPhase {
    /// Share of live traffic admitted, 0..=100.
    pub percentage: u8,
    /// Minimum dwell before advancing. `None` dwells forever.
    pub duration: Option<Duration>,
    /// Health score required to stay in this phase.
    pub health_threshold: u8,
}

impl TrafficPhase {
    pub fn new(percentage: u8, duration: Option<Duration>, health_threshold: u8) -> Self {
        Self {
            percentage,
            duration,
            health_threshold,
        }
    }
}

/// 1% → 10% → 50% → 100%, with thresholds tightening as exposure grows.
pub fn default_phases() -> Vec<TrafficPhase> {
    vec![
        TrafficPhase::new(1, Some(Duration::from_secs(5 * 60)), 80),
        TrafficPhase::new(10, Some(Duration::from_secs(5 * 60)), 85),
        TrafficPhase::new(50, Some(Duration::from_secs(10 * 60)), 90),
        TrafficPhase::new(100, None, 95),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder_shape() {
        let phases = default_phases();
        let percentages: Vec<u8> = phases.iter().map(|p| p.percentage).collect();
        assert_eq!(percentages, vec![1, 10, 50, 100]);

        let thresholds: Vec<u8> = phases.iter().map(|p| p.health_threshold).collect();
        assert_eq!(thresholds, vec![80, 85, 90, 95]);

        assert_eq!(phases[0].duration, Some(Duration::from_secs(300)));
        assert_eq!(phases[2].duration, Some(Duration::from_secs(600)));
        assert!(phases[3].duration.is_none());
    }

    #[test]
    fn test_thresholds_tighten() {
        let phases = default_phases();
        assert!(phases
            .windows(2)
            .all(|w| w[0].health_threshold < w[1].health_threshold));
    }
}
