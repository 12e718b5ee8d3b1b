//! Execution of resolved calls.
//!
//! The router picks an invoker per call:
//!   in-process  -> `in_process::run`  (shared address space, output captured)
//!   sub-process -> `subprocess::run`  (re-invokes the host binary)
//!   auto        -> sub-process only for handlers that may end the process

pub mod capture;
pub mod in_process;
pub mod subprocess;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::{ExecutionMode, ServerConfig};
use crate::discover::CommandDescriptor;
use crate::dispatch::ResolvedCall;
use crate::error::{CancelReason, Error, Result};
use crate::tree::{Capability, CommandTree};

/// Outcome of a single command execution. Created fresh for every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecuteResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }
}

/// Routes resolved calls to the in-process or subprocess invoker.
#[derive(Debug, Clone)]
pub struct Executor {
    tree: Arc<CommandTree>,
    mode: ExecutionMode,
    program: Option<PathBuf>,
    timeout: Option<Duration>,
    intercept_streams: bool,
    limiter: Option<Arc<Semaphore>>,
}

impl Executor {
    pub fn new(tree: Arc<CommandTree>, config: &ServerConfig) -> Self {
        Self {
            tree,
            mode: config.execution_mode,
            program: config.program.clone(),
            timeout: config.timeout(),
            intercept_streams: config.intercept_streams,
            limiter: config
                .max_concurrent_subprocesses
                .filter(|n| *n > 0)
                .map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Concrete mode for `desc`: never `Auto`.
    pub fn select_mode(&self, desc: &CommandDescriptor) -> ExecutionMode {
        match self.mode {
            ExecutionMode::Auto => match desc.capability {
                Capability::TerminatesOnly => ExecutionMode::SubProcess,
                Capability::ReportsError => ExecutionMode::InProcess,
            },
            fixed => fixed,
        }
    }

    pub async fn execute(&self, call: &ResolvedCall, ct: CancellationToken) -> Result<ExecuteResult> {
        let mode = self.select_mode(&call.descriptor);
        tracing::debug!(path = %call.descriptor.display_path(), mode = %mode, "mode selected");

        if ct.is_cancelled() {
            return Err(Error::Cancelled {
                reason: CancelReason::Requested,
            });
        }

        match mode {
            ExecutionMode::InProcess => {
                if call.descriptor.capability == Capability::TerminatesOnly {
                    tracing::warn!(
                        path = %call.descriptor.display_path(),
                        "running a terminating handler in-process; the server may exit"
                    );
                }
                in_process::run(self.tree.clone(), call.argv.clone(), self.intercept_streams).await
            }
            _ => {
                let _permit = match &self.limiter {
                    Some(sem) => Some(self.acquire(sem.clone(), &ct).await?),
                    None => None,
                };
                let program = self.program()?;
                subprocess::run(&program, &call.argv, ct, self.timeout).await
            }
        }
    }

    /// Wait for a subprocess slot. The wait is bounded by cancellation and
    /// by the call timeout; nothing is spawned when either fires first.
    async fn acquire(&self, sem: Arc<Semaphore>, ct: &CancellationToken) -> Result<OwnedSemaphorePermit> {
        tokio::select! {
            permit = sem.acquire_owned() => {
                permit.map_err(|e| Error::Config(format!("subprocess limiter closed: {e}")))
            }
            _ = ct.cancelled() => Err(Error::Cancelled { reason: CancelReason::Requested }),
            reason = subprocess::deadline(self.timeout) => Err(Error::Cancelled { reason }),
        }
    }

    fn program(&self) -> Result<PathBuf> {
        match &self.program {
            Some(p) => Ok(p.clone()),
            None => std::env::current_exe().map_err(|source| Error::SubprocessSpawn {
                program: "<current executable>".to_string(),
                source,
            }),
        }
    }
}
