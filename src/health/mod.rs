//! Health-check descriptors and the gate that evaluates them.
//!
//! A [`HealthCheck`] pairs a [`LivenessCheck`] ("is it up at all") with a
//! [`ReadinessCheck`] ("can it serve traffic"). [`HealthGate`] runs them and
//! also answers whether a service's dependencies are healthy enough to start
//! it.

mod gate;
mod probe;

pub use gate::{HealthGate, DEFAULT_DEPENDENCY_THRESHOLD};
pub use probe::{HttpProbe, LivenessProbe, ReadinessProbe, StaticProbe, TcpProbe};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default liveness timeout.
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(5);
/// Default liveness poll interval.
pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_millis(250);

/// What a liveness check probes.
#[derive(Clone)]
pub enum LivenessKind {
    /// GET the endpoint, expect 2xx.
    Http { endpoint: String },
    /// Open a TCP connection.
    Tcp { host: String, port: u16 },
    /// Ask the init routine whether its backing process is running.
    Process,
    /// Caller-supplied logic. `None` means no hook was wired.
    Custom(Option<Arc<dyn LivenessProbe>>),
}

impl LivenessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LivenessKind::Http { .. } => "http",
            LivenessKind::Tcp { .. } => "tcp",
            LivenessKind::Process => "process",
            LivenessKind::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for LivenessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LivenessKind::Http { endpoint } => {
                f.debug_struct("Http").field("endpoint", endpoint).finish()
            }
            LivenessKind::Tcp { host, port } => f
                .debug_struct("Tcp")
                .field("host", host)
                .field("port", port)
                .finish(),
            LivenessKind::Process => f.write_str("Process"),
            LivenessKind::Custom(hook) => f
                .debug_tuple("Custom")
                .field(&if hook.is_some() { "wired" } else { "unwired" })
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LivenessCheck {
    pub kind: LivenessKind,
    /// Hard bound on one attempt.
    pub timeout: Duration,
    /// Pause between attempts when the orchestrator retries.
    pub interval: Duration,
}

impl LivenessCheck {
    fn with_kind(kind: LivenessKind) -> Self {
        Self {
            kind,
            timeout: DEFAULT_LIVENESS_TIMEOUT,
            interval: DEFAULT_LIVENESS_INTERVAL,
        }
    }

    pub fn http(endpoint: impl Into<String>) -> Self {
        Self::with_kind(LivenessKind::Http {
            endpoint: endpoint.into(),
        })
    }

    /// TCP check against `127.0.0.1:port`.
    pub fn tcp(port: u16) -> Self {
        Self::tcp_host("127.0.0.1", port)
    }

    pub fn tcp_host(host: impl Into<String>, port: u16) -> Self {
        Self::with_kind(LivenessKind::Tcp {
            host: host.into(),
            port,
        })
    }

    pub fn process() -> Self {
        Self::with_kind(LivenessKind::Process)
    }

    pub fn custom(probe: Arc<dyn LivenessProbe>) -> Self {
        Self::with_kind(LivenessKind::Custom(Some(probe)))
    }

    /// Custom check with no hook wired; resolved by the gate's fallback policy.
    pub fn unwired() -> Self {
        Self::with_kind(LivenessKind::Custom(None))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// A named readiness predicate.
#[derive(Clone)]
pub struct NamedCheck {
    pub name: String,
    pub probe: Arc<dyn ReadinessProbe>,
}

impl NamedCheck {
    pub fn new(name: impl Into<String>, probe: Arc<dyn ReadinessProbe>) -> Self {
        Self {
            name: name.into(),
            probe,
        }
    }
}

impl fmt::Debug for NamedCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedCheck")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Readiness: a set of sub-checks combined with AND or OR.
#[derive(Debug, Clone)]
pub struct ReadinessCheck {
    pub checks: Vec<NamedCheck>,
    /// `true` = every check must pass; `false` = any one suffices.
    pub all_required: bool,
}

impl ReadinessCheck {
    pub fn all(checks: Vec<NamedCheck>) -> Self {
        Self {
            checks,
            all_required: true,
        }
    }

    pub fn any(checks: Vec<NamedCheck>) -> Self {
        Self {
            checks,
            all_required: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub liveness: LivenessCheck,
    pub readiness: ReadinessCheck,
}

impl HealthCheck {
    pub fn new(liveness: LivenessCheck, readiness: ReadinessCheck) -> Self {
        Self {
            liveness,
            readiness,
        }
    }

    /// Checks that always pass.
    pub fn passing() -> Self {
        let probe = Arc::new(StaticProbe::up());
        Self {
            liveness: LivenessCheck::custom(probe.clone()),
            readiness: ReadinessCheck::all(vec![NamedCheck::new("static", probe)]),
        }
    }
}
