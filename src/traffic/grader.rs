//! Per-service traffic phase state machine.

use std::time::Instant;

use super::TrafficPhase;

/// What a single observation did to the grader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTransition {
    /// Still in the same phase.
    Dwelling,
    Advanced { from: usize, to: usize },
    /// Dropped one phase, or restarted the dwell clock at phase 0.
    RolledBack { from: usize, to: usize },
    /// Past the ladder; full traffic.
    Exhausted,
}

impl PhaseTransition {
    /// `true` when the phase index moved.
    pub fn changed_phase(&self) -> bool {
        match self {
            PhaseTransition::Advanced { from, to } | PhaseTransition::RolledBack { from, to } => {
                from != to
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficGrader {
    phases: Vec<TrafficPhase>,
    current_phase: usize,
    /// Set on the first observation of the current phase.
    phase_started: Option<Instant>,
}

impl TrafficGrader {
    pub fn new(phases: Vec<TrafficPhase>) -> Self {
        Self {
            phases,
            current_phase: 0,
            phase_started: None,
        }
    }

    pub fn phases(&self) -> &[TrafficPhase] {
        &self.phases
    }

    pub fn current_phase(&self) -> usize {
        self.current_phase
    }

    pub fn phase_started(&self) -> Option<Instant> {
        self.phase_started
    }

    /// Admitted percentage right now. Does not mutate.
    pub fn current_percentage(&self) -> u8 {
        self.phases
            .get(self.current_phase)
            .map_or(100, |phase| phase.percentage)
    }

    /// Feed one health sample taken at `now`.
    ///
    /// Below the current threshold: step back one phase (floored at 0) and
    /// restart the dwell clock. Otherwise advance once the phase has been
    /// held for its duration; the dwell clock is not reset by healthy
    /// observations.
    pub fn observe(&mut self, health_score: u8, now: Instant) -> PhaseTransition {
        let Some(phase) = self.phases.get(self.current_phase).copied() else {
            return PhaseTransition::Exhausted;
        };

        let from = self.current_phase;
        if health_score < phase.health_threshold {
            self.current_phase = from.saturating_sub(1);
            self.phase_started = Some(now);
            return PhaseTransition::RolledBack {
                from,
                to: self.current_phase,
            };
        }

        let started = *self.phase_started.get_or_insert(now);
        let Some(duration) = phase.duration else {
            return PhaseTransition::Dwelling;
        };
        if now.saturating_duration_since(started) < duration {
            return PhaseTransition::Dwelling;
        }

        let last = self.phases.len() - 1;
        self.current_phase = (from + 1).min(last);
        self.phase_started = Some(now);
        if self.current_phase == from {
            PhaseTransition::Dwelling
        } else {
            PhaseTransition::Advanced {
                from,
                to: self.current_phase,
            }
        }
    }

    /// Forget when the current phase started; the next observation restarts
    /// the dwell clock.
    pub fn reset(&mut self) {
        self.phase_started = None;
    }
}
