//! Process-backed init routines.
//!
//! [`CommandInit`] spawns a child process as the service's init step and
//! keeps the handle so `process` liveness checks can ask whether it is still
//! alive.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ServiceError;

use super::ServiceInit;

/// Command used to launch a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Executable path or name on `PATH`.
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// A managed child process.
#[derive(Debug)]
pub struct ManagedProcess {
    pub name: String,
    pub pid: u32,
    child: tokio::process::Child,
}

impl ManagedProcess {
    /// Check if the process is still alive.
    pub fn is_alive(&mut self) -> bool {
        self.child.try_wait().ok().flatten().is_none()
    }

    /// Kill the process.
    pub async fn kill(&mut self) -> Result<(), ServiceError> {
        self.child
            .kill()
            .await
            .map_err(|e| ServiceError::Init(format!("failed to kill {}: {}", self.name, e)))
    }
}

/// Init routine that spawns a command.
///
/// Idempotent: a second `init` while the child is alive is a no-op. The
/// child is killed when the routine is dropped.
#[derive(Debug)]
pub struct CommandInit {
    name: String,
    spec: CommandSpec,
    process: Mutex<Option<ManagedProcess>>,
}

impl CommandInit {
    pub fn new(name: impl Into<String>, spec: CommandSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            process: Mutex::new(None),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.lock().as_ref().map(|p| p.pid)
    }

    /// Take the process handle out, e.g. to stop it explicitly.
    pub fn take_process(&self) -> Option<ManagedProcess> {
        self.lock().take()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ManagedProcess>> {
        self.process
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ServiceInit for CommandInit {
    async fn init(&self) -> Result<(), ServiceError> {
        let mut guard = self.lock();
        if let Some(process) = guard.as_mut() {
            if process.is_alive() {
                debug!(service = %self.name, pid = process.pid, "process already running");
                return Ok(());
            }
        }

        if self.spec.program.trim().is_empty() {
            return Err(ServiceError::Init("empty command".to_string()));
        }

        let mut cmd = tokio::process::Command::new(&self.spec.program);
        cmd.args(&self.spec.args)
            .envs(&self.spec.env)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            ServiceError::Init(format!("failed to start '{}': {}", self.spec.program, e))
        })?;

        let pid = child.id().unwrap_or(0);
        info!(service = %self.name, pid, program = %self.spec.program, "started process");

        *guard = Some(ManagedProcess {
            name: self.name.clone(),
            pid,
            child,
        });
        Ok(())
    }

    fn is_running(&self) -> Option<bool> {
        Some(self.lock().as_mut().is_some_and(ManagedProcess::is_alive))
    }
}
