//! Lifecycle event payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEventKind {
    /// Passed init, liveness and readiness.
    ServiceInitialized,
    /// A traffic observation moved the canary phase.
    TrafficPhaseChanged {
        from_phase: usize,
        to_phase: usize,
        percentage: u8,
    },
}

impl LifecycleEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEventKind::ServiceInitialized => "service initialized",
            LifecycleEventKind::TrafficPhaseChanged { .. } => "traffic phase changed",
        }
    }
}

/// One event on the lifecycle bus.
///
/// `id` is unique per event so consumers can drop duplicates delivered
/// more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub id: Uuid,
    pub service_id: String,
    pub health_score: u8,
    pub kind: LifecycleEventKind,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(service_id: impl Into<String>, health_score: u8, kind: LifecycleEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id: service_id.into(),
            health_score,
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn initialized(service_id: impl Into<String>, health_score: u8) -> Self {
        Self::new(
            service_id,
            health_score,
            LifecycleEventKind::ServiceInitialized,
        )
    }
}
