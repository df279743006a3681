//! Configuration management for Startgate
//!
//! The service manifest is loaded from `./startgate.json` (or an explicit
//! path) with environment variable overrides, checked with
//! [`Config::validate`], and turned into [`ServiceNode`]s with
//! [`Config::build_nodes`].

mod types;
pub mod validate;

pub use types::*;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, StartupError};
use crate::health::{
    HealthCheck, HttpProbe, LivenessCheck, NamedCheck, ReadinessCheck, TcpProbe,
};
use crate::service::{CommandInit, ServiceNode};
use crate::traffic::{default_phases, TrafficPhase};

/// Default manifest file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "startgate.json";

impl Config {
    /// Returns the default manifest path (`./startgate.json`)
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Load the manifest from `path` and apply environment overrides.
    ///
    /// Unlike a missing optional setting, a missing manifest is an error:
    /// there is nothing to start without one.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_json_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a manifest without touching the environment.
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables follow the pattern: STARTGATE_SECTION_KEY
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Logging
        if let Some(val) = lookup("STARTGATE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("STARTGATE_LOG_FORMAT") {
            if let Some(format) = LogFormat::parse(&val) {
                self.logging.format = format;
            }
        }

        // Startup
        if let Some(val) = lookup("STARTGATE_STARTUP_DEPENDENCY_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.startup.dependency_health_threshold = v;
            }
        }
        if let Some(val) = lookup("STARTGATE_STARTUP_MAX_PASSES") {
            if let Ok(v) = val.parse() {
                self.startup.max_passes = v;
            }
        }
        if let Some(val) = lookup("STARTGATE_STARTUP_INIT_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                self.startup.init_timeout_secs = v;
            }
        }
    }

    /// Every semantic problem in the manifest, one message per problem.
    ///
    /// Cycles are not reported here; they are a graph concern.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.startup.dependency_health_threshold > 100 {
            problems.push(format!(
                "startup.dependency_health_threshold: {} exceeds 100",
                self.startup.dependency_health_threshold
            ));
        }
        if self.startup.liveness_attempts == 0 {
            problems.push("startup.liveness_attempts: must be at least 1".to_string());
        }
        if self.startup.max_passes == 0 {
            problems.push("startup.max_passes: must be at least 1".to_string());
        }

        let declared: HashSet<&str> = self.services.iter().map(|s| s.id.as_str()).collect();
        let mut seen = HashSet::new();
        for (i, svc) in self.services.iter().enumerate() {
            let at = format!("services[{}]", i);
            if svc.id.trim().is_empty() {
                problems.push(format!("{}.id: must not be empty", at));
            } else if !seen.insert(svc.id.as_str()) {
                problems.push(format!("{}.id: duplicate service id '{}'", at, svc.id));
            }

            for dep in &svc.dependencies {
                if !declared.contains(dep.as_str()) {
                    problems.push(format!("{}.dependencies: unknown service '{}'", at, dep));
                }
            }

            if let Some(command) = &svc.command {
                if command.program.trim().is_empty() {
                    problems.push(format!("{}.command.program: must not be empty", at));
                }
            }

            if let Some(liveness) = &svc.liveness {
                match liveness.kind {
                    ProbeKind::Http if liveness.endpoint.is_none() => {
                        problems.push(format!("{}.liveness: http check needs an endpoint", at));
                    }
                    ProbeKind::Tcp if liveness.port.is_none() => {
                        problems.push(format!("{}.liveness: tcp check needs a port", at));
                    }
                    ProbeKind::Process if svc.command.is_none() => {
                        problems.push(format!("{}.liveness: process check needs a command", at));
                    }
                    _ => {}
                }
            }

            if let Some(readiness) = &svc.readiness {
                if readiness.checks.is_empty() {
                    problems.push(format!("{}.readiness.checks: must not be empty", at));
                }
                for (j, check) in readiness.checks.iter().enumerate() {
                    let at = format!("{}.readiness.checks[{}]", at, j);
                    if check.name.trim().is_empty() {
                        problems.push(format!("{}.name: must not be empty", at));
                    }
                    match check.kind {
                        ProbeKind::Http if check.endpoint.is_none() => {
                            problems.push(format!("{}: http check needs an endpoint", at));
                        }
                        ProbeKind::Tcp if check.port.is_none() => {
                            problems.push(format!("{}: tcp check needs a port", at));
                        }
                        ProbeKind::Process | ProbeKind::Custom => {
                            problems.push(format!(
                                "{}: {} is not a readiness check kind",
                                at,
                                check.kind.as_str()
                            ));
                        }
                        _ => {}
                    }
                }
            }

            if let Some(phases) = svc.traffic.as_ref().and_then(|t| t.phases.as_ref()) {
                if phases.is_empty() {
                    problems.push(format!("{}.traffic.phases: must not be empty", at));
                }
                for (j, phase) in phases.iter().enumerate() {
                    if phase.percentage > 100 {
                        problems.push(format!(
                            "{}.traffic.phases[{}].percentage: {} exceeds 100",
                            at, j, phase.percentage
                        ));
                    }
                    if phase.health_threshold > 100 {
                        problems.push(format!(
                            "{}.traffic.phases[{}].health_threshold: {} exceeds 100",
                            at, j, phase.health_threshold
                        ));
                    }
                }
            }
        }

        problems
    }

    /// Reject a manifest with any semantic problem.
    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(StartupError::Config(problems.join("; ")))
        }
    }

    /// Turn every service manifest into a [`ServiceNode`], in declaration
    /// order. HTTP probes share one client.
    pub fn build_nodes(&self) -> Result<Vec<ServiceNode>> {
        let client = reqwest::Client::new();
        self.services
            .iter()
            .map(|svc| svc.to_node(&client, &self.startup))
            .collect()
    }
}

fn missing(service: &str, what: &str) -> StartupError {
    StartupError::Config(format!("service '{}': {}", service, what))
}

impl ServiceManifest {
    fn to_node(&self, client: &reqwest::Client, startup: &StartupConfig) -> Result<ServiceNode> {
        let mut node = ServiceNode::new(self.id.clone())
            .depends_on(self.dependencies.iter().cloned())
            .optionally_depends_on(self.optional_dependencies.iter().cloned());
        if let Some(name) = &self.name {
            node = node.named(name.clone());
        }
        if let Some(priority) = self.priority {
            node = node.with_priority(priority);
        }
        if let Some(command) = &self.command {
            node = node.with_init(Arc::new(CommandInit::new(self.id.clone(), command.clone())));
        }

        let fallback = HealthCheck::passing();
        let liveness = match &self.liveness {
            Some(manifest) => manifest.to_check(&self.id)?,
            None if self.command.is_some() => LivenessCheck::process(),
            None => fallback.liveness,
        };
        let readiness = match &self.readiness {
            Some(manifest) => {
                let checks = manifest
                    .checks
                    .iter()
                    .map(|check| check.to_check(&self.id, client, startup.readiness_timeout()))
                    .collect::<Result<Vec<_>>>()?;
                ReadinessCheck {
                    checks,
                    all_required: manifest.all_required,
                }
            }
            None => fallback.readiness,
        };
        node = node.with_health_check(HealthCheck::new(liveness, readiness));

        if let Some(traffic) = &self.traffic {
            let phases = match &traffic.phases {
                Some(phases) => phases
                    .iter()
                    .map(|p| {
                        TrafficPhase::new(
                            p.percentage,
                            p.duration_secs.map(Duration::from_secs),
                            p.health_threshold,
                        )
                    })
                    .collect(),
                None => default_phases(),
            };
            node = node.with_traffic(phases);
        }

        Ok(node)
    }
}

impl LivenessManifest {
    fn to_check(&self, service: &str) -> Result<LivenessCheck> {
        let mut check = match self.kind {
            ProbeKind::Http => {
                let endpoint = self
                    .endpoint
                    .clone()
                    .ok_or_else(|| missing(service, "http liveness needs an endpoint"))?;
                LivenessCheck::http(endpoint)
            }
            ProbeKind::Tcp => {
                let port = self
                    .port
                    .ok_or_else(|| missing(service, "tcp liveness needs a port"))?;
                LivenessCheck::tcp_host(self.host.clone(), port)
            }
            ProbeKind::Process => LivenessCheck::process(),
            ProbeKind::Custom => LivenessCheck::unwired(),
        };
        if let Some(ms) = self.timeout_ms {
            check = check.with_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.interval_ms {
            check = check.with_interval(Duration::from_millis(ms));
        }
        Ok(check)
    }
}

impl ReadinessCheckManifest {
    fn to_check(
        &self,
        service: &str,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> Result<NamedCheck> {
        match self.kind {
            ProbeKind::Http => {
                let endpoint = self.endpoint.clone().ok_or_else(|| {
                    missing(service, &format!("readiness '{}' needs an endpoint", self.name))
                })?;
                Ok(NamedCheck::new(
                    self.name.clone(),
                    Arc::new(HttpProbe::new(client.clone(), endpoint, timeout)),
                ))
            }
            ProbeKind::Tcp => {
                let port = self.port.ok_or_else(|| {
                    missing(service, &format!("readiness '{}' needs a port", self.name))
                })?;
                Ok(NamedCheck::new(
                    self.name.clone(),
                    Arc::new(TcpProbe::new(&self.host, port, timeout)),
                ))
            }
            other => Err(missing(
                service,
                &format!(
                    "readiness '{}' uses unsupported kind '{}'",
                    self.name,
                    other.as_str()
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::LivenessKind;
    use std::collections::HashMap;
    use std::io::Write;

    const MANIFEST: &str = r#"{
        "logging": {"level": "debug"},
        "startup": {"max_passes": 3},
        "services": [
            {"id": "db", "liveness": {"kind": "tcp", "port": 5432, "timeout_ms": 250}},
            {"id": "cache"},
            {
                "id": "api",
                "dependencies": ["db"],
                "optional_dependencies": ["cache"],
                "readiness": {
                    "checks": [
                        {"name": "health", "kind": "http", "endpoint": "http://127.0.0.1:8080/ready"}
                    ]
                },
                "traffic": {}
            }
        ]
    }"#;

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.services.len(), 3);
        assert_eq!(config.services[2].dependencies, vec!["db"]);
        assert_eq!(config.startup.dependency_health_threshold, 50);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_path(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, StartupError::Io(_)));
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = Config::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, StartupError::Json(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("STARTGATE_LOG_LEVEL", "warn"),
            ("STARTGATE_LOG_FORMAT", "json"),
            ("STARTGATE_STARTUP_DEPENDENCY_THRESHOLD", "75"),
            ("STARTGATE_STARTUP_MAX_PASSES", "5"),
            ("STARTGATE_STARTUP_INIT_TIMEOUT_SECS", "9"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.startup.dependency_health_threshold, 75);
        assert_eq!(config.startup.max_passes, 5);
        assert_eq!(config.startup.init_timeout_secs, 9);
    }

    #[test]
    fn test_unparseable_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| {
            (key == "STARTGATE_STARTUP_MAX_PASSES").then(|| "many".to_string())
        });
        assert_eq!(config.startup.max_passes, 1);
    }

    #[test]
    fn test_valid_manifest_has_no_problems() {
        let config = Config::from_json_str(MANIFEST).unwrap();
        assert!(config.problems().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_and_empty_ids() {
        let config = Config::from_json_str(
            r#"{"services": [{"id": "a"}, {"id": "a"}, {"id": " "}]}"#,
        )
        .unwrap();
        let problems = config.problems();
        assert!(problems.iter().any(|p| p.contains("duplicate service id 'a'")));
        assert!(problems.iter().any(|p| p.contains("services[2].id")));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_dependency() {
        let config =
            Config::from_json_str(r#"{"services": [{"id": "a", "dependencies": ["ghost"]}]}"#)
                .unwrap();
        assert_eq!(
            config.problems(),
            vec!["services[0].dependencies: unknown service 'ghost'"]
        );
    }

    #[test]
    fn test_probe_shape_problems() {
        let config = Config::from_json_str(
            r#"{"services": [
                {"id": "a", "liveness": {"kind": "http"}},
                {"id": "b", "liveness": {"kind": "process"}},
                {"id": "c", "readiness": {"checks": []}},
                {"id": "d", "readiness": {"checks": [{"name": "p", "kind": "process"}]}}
            ]}"#,
        )
        .unwrap();
        let problems = config.problems();
        assert_eq!(problems.len(), 4, "{:?}", problems);
        assert!(problems[0].contains("needs an endpoint"));
        assert!(problems[1].contains("needs a command"));
        assert!(problems[2].contains("readiness.checks: must not be empty"));
        assert!(problems[3].contains("not a readiness check kind"));
    }

    #[test]
    fn test_traffic_problems() {
        let config = Config::from_json_str(
            r#"{
                "startup": {"dependency_health_threshold": 120, "max_passes": 0},
                "services": [
                    {"id": "a", "traffic": {"phases": []}},
                    {"id": "b", "traffic": {"phases": [{"percentage": 150, "health_threshold": 101}]}}
                ]
            }"#,
        )
        .unwrap();
        let problems = config.problems();
        assert!(problems.iter().any(|p| p.contains("dependency_health_threshold")));
        assert!(problems.iter().any(|p| p.contains("max_passes")));
        assert!(problems.iter().any(|p| p.contains("traffic.phases: must not be empty")));
        assert!(problems.iter().any(|p| p.contains("percentage: 150 exceeds 100")));
        assert!(problems.iter().any(|p| p.contains("health_threshold: 101 exceeds 100")));
    }

    #[test]
    fn test_build_nodes() {
        let config = Config::from_json_str(MANIFEST).unwrap();
        let nodes = config.build_nodes().unwrap();
        assert_eq!(nodes.len(), 3);

        let db = &nodes[0];
        match &db.health_check.liveness.kind {
            LivenessKind::Tcp { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(*port, 5432);
            }
            other => panic!("expected tcp liveness, got {:?}", other),
        }
        assert_eq!(db.health_check.liveness.timeout, Duration::from_millis(250));
        assert!(db.traffic.is_none());

        let api = &nodes[2];
        assert_eq!(api.dependencies, vec!["db"]);
        assert_eq!(api.optional_dependencies, vec!["cache"]);
        assert_eq!(api.health_check.readiness.checks[0].name, "health");
        assert_eq!(api.traffic.as_deref(), Some(default_phases().as_slice()));
    }

    #[test]
    fn test_command_defaults_to_process_liveness() {
        let config = Config::from_json_str(
            r#"{"services": [{"id": "worker", "command": {"program": "sleep", "args": ["5"]}}]}"#,
        )
        .unwrap();
        let nodes = config.build_nodes().unwrap();
        assert_eq!(nodes[0].health_check.liveness.kind.as_str(), "process");
    }

    #[test]
    fn test_custom_phases() {
        let config = Config::from_json_str(
            r#"{"services": [{"id": "a", "traffic": {"phases": [
                {"percentage": 20, "duration_secs": 30, "health_threshold": 70},
                {"percentage": 100, "health_threshold": 90}
            ]}}]}"#,
        )
        .unwrap();
        let nodes = config.build_nodes().unwrap();
        assert_eq!(
            nodes[0].traffic,
            Some(vec![
                TrafficPhase::new(20, Some(Duration::from_secs(30)), 70),
                TrafficPhase::new(100, None, 90),
            ])
        );
    }

    #[test]
    fn test_build_nodes_rejects_incomplete_probe() {
        let config =
            Config::from_json_str(r#"{"services": [{"id": "a", "liveness": {"kind": "tcp"}}]}"#)
                .unwrap();
        let err = config.build_nodes().unwrap_err();
        assert!(err.to_string().contains("tcp liveness needs a port"));
    }
}
