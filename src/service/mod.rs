//! Service nodes, the units the orchestrator brings up.
//!
//! A [`ServiceNode`] carries its identity, declared dependencies, health-check
//! descriptor, optional traffic ladder, and an init routine implementing
//! [`ServiceInit`].
//!
//! # Example
//!
//! ```
//! use startgate::service::ServiceNode;
//! use startgate::traffic::default_phases;
//!
//! let api = ServiceNode::new("api")
//!     .named("Public API")
//!     .depends_on(["db", "cache"])
//!     .with_traffic(default_phases());
//! assert_eq!(api.dependencies, vec!["db", "cache"]);
//! ```

pub mod process;

pub use process::{CommandInit, CommandSpec, ManagedProcess};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::health::HealthCheck;
use crate::traffic::TrafficPhase;

/// Brings one service up.
///
/// Implementations must be idempotent; the orchestrator additionally never
/// calls `init` again once a service is initialized.
#[async_trait]
pub trait ServiceInit: Send + Sync {
    /// Perform initialization.
    async fn init(&self) -> Result<(), ServiceError>;

    /// Whether the backing process is running.
    ///
    /// `None` means the routine has no backing process, which fails a
    /// process-kind liveness check.
    fn is_running(&self) -> Option<bool> {
        None
    }
}

/// Init routine that does nothing and always succeeds.
///
/// Suits externally managed services whose health checks do all the work.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInit;

#[async_trait]
impl ServiceInit for NoopInit {
    async fn init(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// A unit of deployable capability.
#[derive(Clone)]
pub struct ServiceNode {
    /// Unique identifier used in dependency lists.
    pub id: String,
    /// Human-readable service name.
    pub name: String,
    /// Ids this service needs healthy before it may start.
    pub dependencies: Vec<String>,
    /// Ids ordered loosely; never gate startup.
    pub optional_dependencies: Vec<String>,
    pub health_check: HealthCheck,
    pub init: Arc<dyn ServiceInit>,
    /// Canary ladder. `None` admits full traffic as soon as the service is up.
    pub traffic: Option<Vec<TrafficPhase>>,
    /// Tie-break hint; not used for ordering.
    pub priority: Option<i32>,
}

impl ServiceNode {
    /// New node with a no-op init routine and always-passing health checks.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            dependencies: Vec::new(),
            optional_dependencies: Vec::new(),
            health_check: HealthCheck::passing(),
            init: Arc::new(NoopInit),
            traffic: None,
            priority: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn optionally_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_dependencies
            .extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn with_init(mut self, init: Arc<dyn ServiceInit>) -> Self {
        self.init = init;
        self
    }

    pub fn with_health_check(mut self, health_check: HealthCheck) -> Self {
        self.health_check = health_check;
        self
    }

    pub fn with_traffic(mut self, phases: Vec<TrafficPhase>) -> Self {
        self.traffic = Some(phases);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

impl fmt::Debug for ServiceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("optional_dependencies", &self.optional_dependencies)
            .field("health_check", &self.health_check)
            .field("traffic", &self.traffic)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
