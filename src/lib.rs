//! Startgate - dependency-ordered service startup with health gates and
//! canary traffic ramps

pub mod bus;
pub mod config;
pub mod error;
pub mod graph;
pub mod health;
pub mod orchestrator;
pub mod service;
pub mod traffic;
pub mod utils;

pub use bus::{LifecycleBus, LifecycleEvent, LifecycleEventKind};
pub use config::Config;
pub use error::{Result, ServiceError, StartupError};
pub use graph::{build_dag, topological_sort, validate_dag, DependencyDag, DependencyEdge, EdgeKind};
pub use health::{HealthCheck, HealthGate, LivenessCheck, ReadinessCheck};
pub use orchestrator::{Orchestrator, StartupState, StartupStatus};
pub use service::{ServiceInit, ServiceNode};
pub use traffic::{default_phases, TrafficGrader, TrafficPhase};
