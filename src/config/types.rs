//! Configuration type definitions for Startgate
//!
//! The manifest is a single JSON document: logging settings, orchestrator
//! knobs, and the list of services to bring up. All types implement serde
//! traits and have sensible defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::health::DEFAULT_DEPENDENCY_THRESHOLD;
use crate::service::CommandSpec;

/// Main configuration struct for Startgate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging output configuration
    pub logging: LoggingConfig,
    /// Orchestrator behavior
    pub startup: StartupConfig,
    /// Services to bring up, in declaration order
    pub services: Vec<ServiceManifest>,
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output.
    Pretty,
    /// Compact single-line output; events carry a `component` field.
    #[default]
    Component,
    /// JSON lines for log aggregators.
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "component" => Some(LogFormat::Component),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive, e.g. `info` or `startgate=debug`. `RUST_LOG` wins.
    pub level: String,
    /// Append JSON logs to this file instead of stderr.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "info".to_string(),
            file: None,
        }
    }
}

// ============================================================================
// Startup Configuration
// ============================================================================

/// Orchestrator knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Minimum recorded score for a dependency to count as healthy (0-100).
    pub dependency_health_threshold: u8,
    /// Bound on each service's init routine.
    pub init_timeout_secs: u64,
    /// Bound on each readiness sub-check.
    pub readiness_timeout_ms: u64,
    /// Liveness attempts per service before it is marked failed.
    pub liveness_attempts: u32,
    /// Upper bound on passes made by `initialize_until_settled`.
    pub max_passes: u32,
    /// Pause between settling passes.
    pub pass_delay_ms: u64,
    /// Outcome of a custom liveness check with no hook wired.
    pub unwired_custom_liveness_passes: bool,
    /// Lifecycle bus capacity.
    pub event_buffer: usize,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            dependency_health_threshold: DEFAULT_DEPENDENCY_THRESHOLD,
            init_timeout_secs: 60,
            readiness_timeout_ms: 5_000,
            liveness_attempts: 1,
            max_passes: 1,
            pass_delay_ms: 500,
            unwired_custom_liveness_passes: true,
            event_buffer: 100,
        }
    }
}

impl StartupConfig {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn pass_delay(&self) -> Duration {
        Duration::from_millis(self.pass_delay_ms)
    }
}

// ============================================================================
// Service Manifests
// ============================================================================

/// What a manifest probe talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    Http,
    Tcp,
    /// Liveness only: the service's command is still running.
    Process,
    /// Liveness only: resolved by `unwired_custom_liveness_passes`.
    Custom,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Http => "http",
            ProbeKind::Tcp => "tcp",
            ProbeKind::Process => "process",
            ProbeKind::Custom => "custom",
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Liveness section of a service manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessManifest {
    pub kind: ProbeKind,
    /// Required for `http`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    /// Required for `tcp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

/// One named readiness sub-check. Only `http` and `tcp` are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessCheckManifest {
    pub name: String,
    pub kind: ProbeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Readiness section of a service manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessManifest {
    /// AND when true, OR when false.
    #[serde(default = "default_true")]
    pub all_required: bool,
    pub checks: Vec<ReadinessCheckManifest>,
}

/// One canary phase as written in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseManifest {
    pub percentage: u8,
    /// Omit to dwell forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    pub health_threshold: u8,
}

/// Traffic section. `{}` selects the default ladder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phases: Option<Vec<PhaseManifest>>,
}

/// A service as declared in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceManifest {
    pub id: String,
    /// Display name; defaults to the id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub dependencies: Vec<String>,
    pub optional_dependencies: Vec<String>,
    /// Spawned as the init routine. Without one, init is a no-op.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness: Option<LivenessManifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<ReadinessManifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic: Option<TrafficManifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}
