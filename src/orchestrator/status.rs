//! Point-in-time startup status snapshot.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::graph::DependencyDag;

use super::StartupState;

/// Read-only snapshot of a startup run, recomputed on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupStatus {
    pub initialized_services: BTreeSet<String>,
    /// DAG ids that are neither initialized nor failed.
    pub pending_services: BTreeSet<String>,
    pub failed_services: BTreeSet<String>,
    /// Current phase index per service with a traffic ladder.
    pub traffic_phases: BTreeMap<String, usize>,
    pub health_scores: BTreeMap<String, u8>,
}

impl StartupStatus {
    pub(crate) fn compute(state: &StartupState, dag: &DependencyDag) -> Self {
        let pending_services = dag
            .ids()
            .filter(|id| !state.is_initialized(id) && !state.is_failed(id))
            .map(str::to_string)
            .collect();

        Self {
            initialized_services: state.initialized().clone(),
            pending_services,
            failed_services: state.failed().clone(),
            traffic_phases: state
                .graders()
                .iter()
                .map(|(id, grader)| (id.clone(), grader.current_phase()))
                .collect(),
            health_scores: state
                .health_scores()
                .iter()
                .map(|(id, score)| (id.clone(), *score))
                .collect(),
        }
    }

    /// Nothing pending and nothing failed.
    pub fn is_complete(&self) -> bool {
        self.pending_services.is_empty() && self.failed_services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_dag;
    use crate::service::ServiceNode;

    #[test]
    fn test_pending_is_set_difference() {
        let dag = build_dag(vec![
            ServiceNode::new("a"),
            ServiceNode::new("b"),
            ServiceNode::new("c"),
        ]);
        let mut state = StartupState::new();
        state.mark_initialized("a", None);
        state.mark_failed("b");

        let status = StartupStatus::compute(&state, &dag);
        assert_eq!(status.pending_services.into_iter().collect::<Vec<_>>(), ["c"]);
        assert!(status.initialized_services.contains("a"));
        assert!(status.failed_services.contains("b"));
        assert_eq!(status.health_scores.get("b"), Some(&0));
    }

    #[test]
    fn test_complete() {
        let dag = build_dag(vec![ServiceNode::new("a")]);
        let mut state = StartupState::new();
        assert!(!StartupStatus::compute(&state, &dag).is_complete());
        state.mark_initialized("a", None);
        assert!(StartupStatus::compute(&state, &dag).is_complete());
    }

    #[test]
    fn test_serializes_as_sorted_lists() {
        let mut status = StartupStatus::default();
        status.pending_services.insert("b".into());
        status.pending_services.insert("a".into());
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["pending_services"], serde_json::json!(["a", "b"]));
    }
}
