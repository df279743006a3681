//! Initialization orchestrator.
//!
//! Walks a validated [`DependencyDag`] in topological order and brings each
//! service up one at a time: dependency gate, init (bounded by a timeout),
//! liveness (with retries), readiness. Per-service failures are recorded in
//! the [`StartupState`] and never abort the pass; only structural graph
//! problems surface as errors.
//!
//! # Example
//!
//! ```rust
//! use startgate::bus::LifecycleBus;
//! use startgate::config::StartupConfig;
//! use startgate::graph::build_dag;
//! use startgate::orchestrator::Orchestrator;
//! use startgate::service::ServiceNode;
//!
//! # tokio_test::block_on(async {
//! let dag = build_dag(vec![
//!     ServiceNode::new("db"),
//!     ServiceNode::new("api").depends_on(["db"]),
//! ]);
//!
//! let mut orchestrator = Orchestrator::new(StartupConfig::default(), LifecycleBus::new());
//! let status = orchestrator.initialize(&dag).await.unwrap();
//! assert!(status.is_complete());
//! assert!(orchestrator.is_service_ready("api", &dag));
//! # });
//! ```

mod state;
mod status;

pub use state::StartupState;
pub use status::StartupStatus;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bus::{LifecycleBus, LifecycleEvent, LifecycleEventKind};
use crate::config::StartupConfig;
use crate::error::{Result, ServiceError, StartupError};
use crate::graph::{topological_sort, validate_dag, DependencyDag};
use crate::health::HealthGate;
use crate::log_component;
use crate::service::ServiceNode;
use crate::traffic::{Clock, PhaseTransition, SystemClock, TrafficGrader};

/// Drives one startup run. Each instance owns its own state.
pub struct Orchestrator {
    state: StartupState,
    gate: HealthGate,
    bus: LifecycleBus,
    clock: Arc<dyn Clock>,
    settings: StartupConfig,
}

impl Orchestrator {
    pub fn new(settings: StartupConfig, bus: LifecycleBus) -> Self {
        Self {
            state: StartupState::new(),
            gate: HealthGate::from_config(&settings),
            bus,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    /// Replace the wall clock used for traffic dwell accounting.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &StartupState {
        &self.state
    }

    pub fn bus(&self) -> &LifecycleBus {
        &self.bus
    }

    pub fn settings(&self) -> &StartupConfig {
        &self.settings
    }

    /// Run one pass over `dag`.
    ///
    /// Each successful start publishes a `ServiceInitialized` event and waits
    /// for buffer space, so the bus must be consumed concurrently when `dag`
    /// holds more services than the bus buffer.
    ///
    /// # Errors
    /// - `StartupError::InvalidGraph` if validation finds a cycle; nothing is
    ///   started.
    /// - `StartupError::Unorderable` / `DuplicateService` from the sort.
    pub async fn initialize(&mut self, dag: &DependencyDag) -> Result<StartupStatus> {
        let validation = validate_dag(dag);
        if !validation.is_valid() {
            log_component!(
                error,
                "orchestrator",
                "refusing to start a cyclic graph",
                cycles = validation.cycles.len()
            );
            return Err(StartupError::InvalidGraph {
                cycles: validation.cycles,
            });
        }

        let order = topological_sort(dag)?;
        debug!(order = ?order, "startup order");

        for id in &order {
            if self.state.is_initialized(id) {
                debug!(service = %id, "already initialized; skipping");
                continue;
            }
            let Some(node) = dag.node(id) else {
                continue;
            };

            let blocked = self
                .gate
                .unhealthy_dependencies(node, self.state.health_scores());
            if !blocked.is_empty() {
                info!(
                    service = %id,
                    blocked_on = ?blocked,
                    "dependencies not healthy; leaving pending"
                );
                continue;
            }

            match self.start_service(node).await {
                Ok(()) => self.on_started(node).await,
                Err(e) => self.on_failed(node, &e),
            }
        }

        let status = self.status(dag);
        log_component!(
            info,
            "orchestrator",
            "startup pass finished",
            initialized = status.initialized_services.len(),
            pending = status.pending_services.len(),
            failed = status.failed_services.len()
        );
        Ok(status)
    }

    /// Repeat [`initialize`](Self::initialize) up to `max_passes` times,
    /// stopping early once everything is up or a pass makes no progress.
    pub async fn initialize_until_settled(
        &mut self,
        dag: &DependencyDag,
    ) -> Result<StartupStatus> {
        let max_passes = self.settings.max_passes.max(1);
        let mut status = self.initialize(dag).await?;

        for pass in 2..=max_passes {
            if status.is_complete() {
                break;
            }
            let before = status.initialized_services.len();
            let delay = self.settings.pass_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            debug!(pass, max_passes, "starting another startup pass");
            status = self.initialize(dag).await?;
            if status.initialized_services.len() == before {
                debug!(pass, "no progress; settled");
                break;
            }
        }

        Ok(status)
    }

    /// Snapshot for the services in `dag`.
    pub fn status(&self, dag: &DependencyDag) -> StartupStatus {
        StartupStatus::compute(&self.state, dag)
    }

    /// Whether a router may send live traffic to `id` right now.
    ///
    /// Requires the service to be initialized with a score at or above the
    /// dependency threshold and a non-zero admitted percentage. Feeds the
    /// recorded score to the traffic grader, so this call advances dwell
    /// accounting.
    pub fn is_service_ready(&mut self, id: &str, dag: &DependencyDag) -> bool {
        if !dag.contains(id) || !self.state.is_initialized(id) {
            return false;
        }
        let score = self.state.health_score(id).unwrap_or(0);
        if score < self.gate.dependency_threshold() {
            return false;
        }
        self.traffic_percentage(id, score) > 0
    }

    /// Observe `health_score` for `id` and return the admitted percentage.
    ///
    /// Services without a traffic ladder always get 100.
    pub fn traffic_percentage(&mut self, id: &str, health_score: u8) -> u8 {
        let now = self.clock.now();
        let Some(grader) = self.state.grader_mut(id) else {
            return 100;
        };
        let transition = grader.observe(health_score, now);
        let percentage = grader.current_percentage();

        match transition {
            PhaseTransition::Advanced { from, to } => {
                log_component!(
                    info,
                    "traffic",
                    "traffic phase advanced",
                    service = id,
                    from = from,
                    to = to,
                    percentage = percentage
                );
            }
            PhaseTransition::RolledBack { from, to } => {
                log_component!(
                    warn,
                    "traffic",
                    "health below phase threshold; rolled back",
                    service = id,
                    from = from,
                    to = to,
                    health_score = health_score,
                    percentage = percentage
                );
            }
            PhaseTransition::Dwelling | PhaseTransition::Exhausted => {}
        }

        if let PhaseTransition::Advanced { from, to } | PhaseTransition::RolledBack { from, to } =
            transition
        {
            if from != to {
                self.try_publish(LifecycleEvent::new(
                    id,
                    health_score,
                    LifecycleEventKind::TrafficPhaseChanged {
                        from_phase: from,
                        to_phase: to,
                        percentage,
                    },
                ));
            }
        }

        percentage
    }

    /// Feed a live health score (clamped to 100) for `id`.
    pub fn record_health(&mut self, id: &str, score: u8) {
        debug!(service = %id, score, "health recorded");
        self.state.set_health(id, score);
    }

    /// Forget when `id`'s current traffic phase started.
    pub fn reset_traffic_grader(&mut self, id: &str) {
        if let Some(grader) = self.state.grader_mut(id) {
            grader.reset();
        }
    }

    async fn start_service(&self, node: &ServiceNode) -> std::result::Result<(), ServiceError> {
        let timeout = self.settings.init_timeout();
        match tokio::time::timeout(timeout, node.init.init()).await {
            Ok(result) => result?,
            Err(_) => return Err(ServiceError::InitTimeout(timeout)),
        }
        self.await_liveness(node).await?;
        self.gate.probe_readiness(node).await
    }

    async fn await_liveness(&self, node: &ServiceNode) -> std::result::Result<(), ServiceError> {
        let attempts = self.settings.liveness_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.gate.probe_liveness(node).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    debug!(
                        service = %node.id,
                        attempt,
                        attempts,
                        error = %e,
                        "liveness not yet passing; retrying"
                    );
                    tokio::time::sleep(node.health_check.liveness.interval).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn on_started(&mut self, node: &ServiceNode) {
        let grader = node.traffic.clone().map(TrafficGrader::new);
        self.state.mark_initialized(&node.id, grader);
        log_component!(info, "orchestrator", "service initialized", service = node.id.as_str());
        if let Err(e) = self
            .bus
            .publish(LifecycleEvent::initialized(node.id.clone(), 100))
            .await
        {
            warn!(service = %node.id, error = %e, "lifecycle event dropped");
        }
    }

    fn on_failed(&mut self, node: &ServiceNode, error: &ServiceError) {
        self.state.mark_failed(&node.id);
        warn!(
            service = %node.id,
            stage = error.stage(),
            error = %error,
            "service failed to start"
        );
    }

    fn try_publish(&self, event: LifecycleEvent) {
        let kind = event.kind.as_str();
        if let Err(e) = self.bus.try_publish(event) {
            warn!(event = kind, error = %e, "lifecycle event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_dag;
    use crate::health::{HealthCheck, LivenessCheck, StaticProbe};
    use crate::traffic::{default_phases, ManualClock};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct HangingInit;

    #[async_trait]
    impl crate::service::ServiceInit for HangingInit {
        async fn init(&self) -> std::result::Result<(), ServiceError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    /// Liveness probe that fails a fixed number of times, then passes.
    struct EventuallyAlive {
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl crate::health::LivenessProbe for EventuallyAlive {
        async fn is_alive(&self) -> bool {
            self.failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
        }
    }

    fn orchestrator(settings: StartupConfig) -> Orchestrator {
        Orchestrator::new(settings, LifecycleBus::new())
    }

    #[tokio::test]
    async fn test_init_timeout_marks_failed() {
        let settings = StartupConfig {
            init_timeout_secs: 0,
            ..Default::default()
        };
        let dag = build_dag(vec![ServiceNode::new("slow").with_init(Arc::new(HangingInit))]);
        let mut orch = orchestrator(settings);
        let status = orch.initialize(&dag).await.unwrap();
        assert!(status.failed_services.contains("slow"));
        assert_eq!(status.health_scores.get("slow"), Some(&0));
    }

    #[tokio::test]
    async fn test_liveness_retries_until_attempts_exhausted() {
        let flaky = || {
            ServiceNode::new("svc").with_health_check(HealthCheck::new(
                LivenessCheck::custom(Arc::new(EventuallyAlive {
                    failures_left: AtomicUsize::new(2),
                }))
                .with_interval(Duration::from_millis(1)),
                HealthCheck::passing().readiness,
            ))
        };

        let dag = build_dag(vec![flaky()]);
        let mut orch = orchestrator(StartupConfig::default());
        let status = orch.initialize(&dag).await.unwrap();
        assert!(status.failed_services.contains("svc"));

        let dag = build_dag(vec![flaky()]);
        let mut orch = orchestrator(StartupConfig {
            liveness_attempts: 3,
            ..Default::default()
        });
        let status = orch.initialize(&dag).await.unwrap();
        assert!(status.initialized_services.contains("svc"));
    }

    #[tokio::test]
    async fn test_traffic_percentage_without_grader_is_full() {
        let dag = build_dag(vec![ServiceNode::new("db")]);
        let mut orch = orchestrator(StartupConfig::default());
        orch.initialize(&dag).await.unwrap();
        assert_eq!(orch.traffic_percentage("db", 0), 100);
        assert_eq!(orch.traffic_percentage("unknown", 0), 100);
    }

    #[tokio::test]
    async fn test_is_service_ready_requires_membership_and_health() {
        let dag = build_dag(vec![
            ServiceNode::new("db"),
            ServiceNode::new("broken").with_health_check(HealthCheck::new(
                LivenessCheck::custom(Arc::new(StaticProbe::down())),
                HealthCheck::passing().readiness,
            )),
        ]);
        let mut orch = orchestrator(StartupConfig::default());
        orch.initialize(&dag).await.unwrap();

        assert!(orch.is_service_ready("db", &dag));
        assert!(!orch.is_service_ready("broken", &dag));
        assert!(!orch.is_service_ready("missing", &dag));

        orch.record_health("db", 49);
        assert!(!orch.is_service_ready("db", &dag));
    }

    #[tokio::test]
    async fn test_rollback_publishes_phase_change() {
        let clock = Arc::new(ManualClock::new());
        let dag = build_dag(vec![ServiceNode::new("api").with_traffic(default_phases())]);
        let mut orch = orchestrator(StartupConfig::default()).with_clock(clock.clone());
        orch.initialize(&dag).await.unwrap();
        orch.bus().drain().await;

        assert_eq!(orch.traffic_percentage("api", 100), 1);
        clock.advance(Duration::from_secs(300));
        assert_eq!(orch.traffic_percentage("api", 100), 10);
        assert_eq!(orch.traffic_percentage("api", 10), 1);

        let kinds: Vec<LifecycleEventKind> =
            orch.bus().drain().await.into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LifecycleEventKind::TrafficPhaseChanged {
                    from_phase: 0,
                    to_phase: 1,
                    percentage: 10
                },
                LifecycleEventKind::TrafficPhaseChanged {
                    from_phase: 1,
                    to_phase: 0,
                    percentage: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_reset_traffic_grader_restarts_dwell() {
        let clock = Arc::new(ManualClock::new());
        let dag = build_dag(vec![ServiceNode::new("api").with_traffic(default_phases())]);
        let mut orch = orchestrator(StartupConfig::default()).with_clock(clock.clone());
        orch.initialize(&dag).await.unwrap();

        orch.traffic_percentage("api", 100);
        clock.advance(Duration::from_secs(299));
        orch.reset_traffic_grader("api");
        clock.advance(Duration::from_secs(1));
        assert_eq!(orch.traffic_percentage("api", 100), 1);
        assert!(orch.state().grader("api").unwrap().phase_started().is_some());
    }

    #[tokio::test]
    async fn test_initialize_waits_for_bus_space() {
        let dag = build_dag((0..5).map(|i| ServiceNode::new(format!("svc-{i}"))).collect());
        let bus = LifecycleBus::with_buffer_size(1);
        let consumer = bus.clone();
        let collector = tokio::spawn(async move {
            let mut ids = Vec::new();
            while ids.len() < 5 {
                match consumer.consume().await {
                    Some(event) => ids.push(event.service_id),
                    None => break,
                }
            }
            ids
        });

        let mut orch = Orchestrator::new(StartupConfig::default(), bus);
        let status = orch.initialize(&dag).await.unwrap();
        assert!(status.is_complete());

        let ids = tokio::time::timeout(Duration::from_secs(5), collector)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids, vec!["svc-0", "svc-1", "svc-2", "svc-3", "svc-4"]);
    }

    #[tokio::test]
    async fn test_full_bus_drops_phase_event_without_blocking() {
        let clock = Arc::new(ManualClock::new());
        let dag = build_dag(vec![ServiceNode::new("api").with_traffic(default_phases())]);
        let mut orch = Orchestrator::new(
            StartupConfig::default(),
            LifecycleBus::with_buffer_size(1),
        )
        .with_clock(clock.clone());
        orch.initialize(&dag).await.unwrap();

        orch.traffic_percentage("api", 100);
        clock.advance(Duration::from_secs(300));
        assert_eq!(orch.traffic_percentage("api", 100), 10);

        let events = orch.bus().drain().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, LifecycleEventKind::ServiceInitialized);
    }
}
