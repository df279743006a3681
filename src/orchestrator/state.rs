//! Mutable bookkeeping owned by one orchestrator.

use std::collections::{BTreeSet, HashMap};

use crate::traffic::TrafficGrader;

/// Cross-call state of a startup run.
///
/// A service id is in at most one of `initialized` and `failed`; anything in
/// neither is pending.
#[derive(Debug, Clone, Default)]
pub struct StartupState {
    initialized: BTreeSet<String>,
    failed: BTreeSet<String>,
    health_scores: HashMap<String, u8>,
    graders: HashMap<String, TrafficGrader>,
}

impl StartupState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialized(&self) -> &BTreeSet<String> {
        &self.initialized
    }

    pub fn failed(&self) -> &BTreeSet<String> {
        &self.failed
    }

    pub fn health_scores(&self) -> &HashMap<String, u8> {
        &self.health_scores
    }

    pub fn is_initialized(&self, id: &str) -> bool {
        self.initialized.contains(id)
    }

    pub fn is_failed(&self, id: &str) -> bool {
        self.failed.contains(id)
    }

    pub fn health_score(&self, id: &str) -> Option<u8> {
        self.health_scores.get(id).copied()
    }

    pub fn grader(&self, id: &str) -> Option<&TrafficGrader> {
        self.graders.get(id)
    }

    pub(crate) fn grader_mut(&mut self, id: &str) -> Option<&mut TrafficGrader> {
        self.graders.get_mut(id)
    }

    pub(crate) fn graders(&self) -> &HashMap<String, TrafficGrader> {
        &self.graders
    }

    /// Record a successful start. Clears any earlier failure.
    pub(crate) fn mark_initialized(&mut self, id: &str, grader: Option<TrafficGrader>) {
        self.failed.remove(id);
        self.initialized.insert(id.to_string());
        self.health_scores.insert(id.to_string(), 100);
        if let Some(grader) = grader {
            self.graders.insert(id.to_string(), grader);
        }
    }

    /// Record a failed start. An initialized service is never demoted.
    pub(crate) fn mark_failed(&mut self, id: &str) {
        if self.initialized.contains(id) {
            return;
        }
        self.failed.insert(id.to_string());
        self.health_scores.insert(id.to_string(), 0);
    }

    /// Store a health score, clamped to 100.
    pub(crate) fn set_health(&mut self, id: &str, score: u8) {
        self.health_scores.insert(id.to_string(), score.min(100));
    }
}
