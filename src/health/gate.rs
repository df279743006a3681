//! Health gate evaluator.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::config::StartupConfig;
use crate::error::ServiceError;
use crate::service::ServiceNode;

use super::probe::{http_get, tcp_connect};
use super::LivenessKind;

/// Minimum recorded score for a dependency to count as healthy.
pub const DEFAULT_DEPENDENCY_THRESHOLD: u8 = 50;

/// Runs liveness and readiness checks and evaluates the dependency gate.
#[derive(Debug, Clone)]
pub struct HealthGate {
    client: reqwest::Client,
    dependency_threshold: u8,
    readiness_timeout: Duration,
    unwired_custom_passes: bool,
}

impl Default for HealthGate {
    fn default() -> Self {
        Self::from_config(&StartupConfig::default())
    }
}

impl HealthGate {
    pub fn from_config(config: &StartupConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            dependency_threshold: config.dependency_health_threshold,
            readiness_timeout: config.readiness_timeout(),
            unwired_custom_passes: config.unwired_custom_liveness_passes,
        }
    }

    pub fn dependency_threshold(&self) -> u8 {
        self.dependency_threshold
    }

    /// One liveness attempt. No retries here.
    pub async fn probe_liveness(&self, node: &ServiceNode) -> Result<(), ServiceError> {
        let check = &node.health_check.liveness;
        match &check.kind {
            LivenessKind::Http { endpoint } => http_get(&self.client, endpoint, check.timeout)
                .await
                .map_err(ServiceError::Liveness),
            LivenessKind::Tcp { host, port } => {
                tcp_connect(&format!("{}:{}", host, port), check.timeout)
                    .await
                    .map_err(ServiceError::Liveness)
            }
            LivenessKind::Process => match node.init.is_running() {
                Some(true) => Ok(()),
                Some(false) => Err(ServiceError::Liveness("process is not running".into())),
                None => Err(ServiceError::Liveness(
                    "init routine has no backing process".into(),
                )),
            },
            LivenessKind::Custom(Some(probe)) => {
                match tokio::time::timeout(check.timeout, probe.is_alive()).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(ServiceError::Liveness("custom check failed".into())),
                    Err(_) => Err(ServiceError::Liveness(format!(
                        "custom check timed out after {:?}",
                        check.timeout
                    ))),
                }
            }
            LivenessKind::Custom(None) => {
                warn!(
                    service = %node.id,
                    passes = self.unwired_custom_passes,
                    "custom liveness check has no hook wired; using fallback"
                );
                if self.unwired_custom_passes {
                    Ok(())
                } else {
                    Err(ServiceError::Liveness("custom check not wired".into()))
                }
            }
        }
    }

    pub async fn check_liveness(&self, node: &ServiceNode) -> bool {
        self.probe_liveness(node).await.is_ok()
    }

    /// Run every readiness sub-check concurrently and combine with AND/OR.
    ///
    /// Each sub-check is bounded by the readiness timeout; a timeout counts
    /// as a failed check. With no sub-checks AND passes and OR fails.
    pub async fn probe_readiness(&self, node: &ServiceNode) -> Result<(), ServiceError> {
        let readiness = &node.health_check.readiness;
        if readiness.checks.is_empty() {
            warn!(service = %node.id, "readiness check has no sub-checks");
        }

        let timeout = self.readiness_timeout;
        let results = join_all(readiness.checks.iter().map(|check| async move {
            let ok = tokio::time::timeout(timeout, check.probe.is_ready())
                .await
                .unwrap_or(false);
            (check.name.as_str(), ok)
        }))
        .await;

        let failing: Vec<&str> = results
            .iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| *name)
            .collect();

        let passed = if readiness.all_required {
            failing.is_empty()
        } else {
            results.iter().any(|(_, ok)| *ok)
        };

        debug!(
            service = %node.id,
            all_required = readiness.all_required,
            total = results.len(),
            failing = failing.len(),
            passed,
            "readiness evaluated"
        );

        if passed {
            Ok(())
        } else if failing.is_empty() {
            Err(ServiceError::Readiness("no readiness checks configured".into()))
        } else {
            Err(ServiceError::Readiness(format!(
                "failing: {}",
                failing.join(", ")
            )))
        }
    }

    pub async fn check_readiness(&self, node: &ServiceNode) -> bool {
        self.probe_readiness(node).await.is_ok()
    }

    /// Required dependencies whose recorded score is missing or below the
    /// threshold.
    pub fn unhealthy_dependencies<'a>(
        &self,
        node: &'a ServiceNode,
        health_scores: &HashMap<String, u8>,
    ) -> Vec<&'a str> {
        node.dependencies
            .iter()
            .filter(|dep| {
                health_scores
                    .get(dep.as_str())
                    .map_or(true, |score| *score < self.dependency_threshold)
            })
            .map(String::as_str)
            .collect()
    }

    /// `true` when every required dependency has a score at or above the
    /// threshold. A missing score fails.
    pub fn check_dependencies(
        &self,
        node: &ServiceNode,
        health_scores: &HashMap<String, u8>,
    ) -> bool {
        self.unhealthy_dependencies(node, health_scores).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{
        HealthCheck, LivenessCheck, LivenessProbe, NamedCheck, ReadinessCheck, ReadinessProbe,
        StaticProbe,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    struct SlowProbe;

    #[async_trait]
    impl ReadinessProbe for SlowProbe {
        async fn is_ready(&self) -> bool {
            tokio::time::sleep(Duration::from_secs(30)).await;
            true
        }
    }

    #[async_trait]
    impl LivenessProbe for SlowProbe {
        async fn is_alive(&self) -> bool {
            tokio::time::sleep(Duration::from_secs(30)).await;
            true
        }
    }

    struct CountingProbe(AtomicUsize);

    #[async_trait]
    impl ReadinessProbe for CountingProbe {
        async fn is_ready(&self) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn readiness(all_required: bool, answers: &[bool]) -> ServiceNode {
        let checks = answers
            .iter()
            .enumerate()
            .map(|(i, ok)| {
                NamedCheck::new(format!("check-{}", i), Arc::new(StaticProbe(*ok)))
            })
            .collect();
        let readiness = ReadinessCheck {
            checks,
            all_required,
        };
        ServiceNode::new("svc").with_health_check(HealthCheck::new(
            LivenessCheck::custom(Arc::new(StaticProbe::up())),
            readiness,
        ))
    }

    fn with_liveness(liveness: LivenessCheck) -> ServiceNode {
        ServiceNode::new("svc").with_health_check(HealthCheck::new(
            liveness,
            ReadinessCheck::all(vec![NamedCheck::new(
                "static",
                Arc::new(StaticProbe::up()),
            )]),
        ))
    }

    fn quick_gate() -> HealthGate {
        let config = StartupConfig {
            readiness_timeout_ms: 100,
            ..StartupConfig::default()
        };
        HealthGate::from_config(&config)
    }

    #[tokio::test]
    async fn test_readiness_all_required() {
        let gate = HealthGate::default();
        assert!(gate.check_readiness(&readiness(true, &[true, true])).await);
        let err = gate
            .probe_readiness(&readiness(true, &[true, false]))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Readiness("failing: check-1".into()));
    }

    #[tokio::test]
    async fn test_readiness_any_required() {
        let gate = HealthGate::default();
        assert!(gate.check_readiness(&readiness(false, &[false, true])).await);
        assert!(!gate.check_readiness(&readiness(false, &[false, false])).await);
    }

    #[tokio::test]
    async fn test_readiness_empty_checks() {
        let gate = HealthGate::default();
        assert!(gate.check_readiness(&readiness(true, &[])).await);
        assert!(!gate.check_readiness(&readiness(false, &[])).await);
    }

    #[tokio::test]
    async fn test_readiness_runs_every_check() {
        let counter = Arc::new(CountingProbe(AtomicUsize::new(0)));
        let checks = (0..3)
            .map(|i| NamedCheck::new(format!("c{}", i), counter.clone() as Arc<dyn ReadinessProbe>))
            .collect();
        let node = ServiceNode::new("svc").with_health_check(HealthCheck::new(
            LivenessCheck::custom(Arc::new(StaticProbe::up())),
            ReadinessCheck::any(checks),
        ));
        assert!(HealthGate::default().check_readiness(&node).await);
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_readiness_sub_check_timeout_fails() {
        let node = ServiceNode::new("svc").with_health_check(HealthCheck::new(
            LivenessCheck::custom(Arc::new(StaticProbe::up())),
            ReadinessCheck::all(vec![NamedCheck::new("slow", Arc::new(SlowProbe))]),
        ));
        let err = quick_gate().probe_readiness(&node).await.unwrap_err();
        assert!(err.to_string().contains("slow"));
    }

    #[tokio::test]
    async fn test_liveness_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let gate = HealthGate::default();
        assert!(gate.check_liveness(&with_liveness(LivenessCheck::tcp(port))).await);
        drop(listener);
        let check = LivenessCheck::tcp(port).with_timeout(Duration::from_millis(500));
        assert!(!gate.check_liveness(&with_liveness(check)).await);
    }

    #[tokio::test]
    async fn test_liveness_http_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let check = LivenessCheck::http(format!("http://127.0.0.1:{}/health", port))
            .with_timeout(Duration::from_millis(500));
        let err = HealthGate::default()
            .probe_liveness(&with_liveness(check))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "liveness");
    }

    #[tokio::test]
    async fn test_liveness_process_without_backing_process() {
        let err = HealthGate::default()
            .probe_liveness(&with_liveness(LivenessCheck::process()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no backing process"));
    }

    #[tokio::test]
    async fn test_liveness_custom_timeout() {
        let check = LivenessCheck::custom(Arc::new(SlowProbe)).with_timeout(Duration::from_millis(50));
        assert!(!HealthGate::default().check_liveness(&with_liveness(check)).await);
    }

    #[tokio::test]
    async fn test_liveness_unwired_custom_follows_policy() {
        let node = with_liveness(LivenessCheck::unwired());
        assert!(HealthGate::default().check_liveness(&node).await);

        let strict = StartupConfig {
            unwired_custom_liveness_passes: false,
            ..StartupConfig::default()
        };
        assert!(!HealthGate::from_config(&strict).check_liveness(&node).await);
    }

    #[test]
    fn test_dependencies_threshold() {
        let gate = HealthGate::default();
        let node = ServiceNode::new("api").depends_on(["db"]);

        let mut scores = HashMap::new();
        assert!(!gate.check_dependencies(&node, &scores));

        scores.insert("db".to_string(), 40);
        assert!(!gate.check_dependencies(&node, &scores));

        scores.insert("db".to_string(), 50);
        assert!(gate.check_dependencies(&node, &scores));
    }

    #[test]
    fn test_unhealthy_dependencies_lists_each_blocker() {
        let gate = HealthGate::default();
        let node = ServiceNode::new("api")
            .depends_on(["db", "cache", "queue"])
            .optionally_depends_on(["metrics"]);
        let scores = HashMap::from([("db".to_string(), 100), ("cache".to_string(), 10)]);
        assert_eq!(
            gate.unhealthy_dependencies(&node, &scores),
            vec!["cache", "queue"]
        );
    }

    #[test]
    fn test_no_dependencies_always_pass() {
        let gate = HealthGate::default();
        assert!(gate.check_dependencies(&ServiceNode::new("db"), &HashMap::new()));
        assert_eq!(gate.dependency_threshold(), DEFAULT_DEPENDENCY_THRESHOLD);
    }
}
