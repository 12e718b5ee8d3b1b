//! Subprocess invocation: re-run the host binary with the serialized argv.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{CancelReason, Error, Result};
use crate::exec::ExecuteResult;

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    Cancelled(CancelReason),
}

/// Spawn `program argv...`, wait for it and collect its output.
///
/// Cancellation or the timeout kills the child and yields `Error::Cancelled`.
pub async fn run(
    program: &Path,
    argv: &[String],
    ct: CancellationToken,
    timeout: Option<Duration>,
) -> Result<ExecuteResult> {
    let program_name = program.display().to_string();
    let mut child = Command::new(program)
        .args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::SubprocessSpawn {
            program: program_name.clone(),
            source,
        })?;
    tracing::debug!(program = %program_name, argv = ?argv, pid = ?child.id(), "subprocess running");

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        _ = ct.cancelled() => Outcome::Cancelled(CancelReason::Requested),
        reason = deadline(timeout) => Outcome::Cancelled(reason),
    };

    let status = match outcome {
        Outcome::Exited(status) => status.map_err(|source| Error::SubprocessSpawn {
            program: program_name.clone(),
            source,
        })?,
        Outcome::Cancelled(reason) => {
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to kill cancelled subprocess");
            }
            stdout.abort();
            stderr.abort();
            tracing::info!(program = %program_name, %reason, "subprocess cancelled");
            return Err(Error::Cancelled { reason });
        }
    };

    let stdout = collect(stdout).await;
    let stderr = collect(stderr).await;
    let (exit_code, error) = match status.code() {
        Some(0) => (0, None),
        Some(code) => (code, Some(format!("exit status {code}"))),
        None => (-1, Some(format!("terminated by signal ({status})"))),
    };
    tracing::debug!(program = %program_name, exit_code, "subprocess finished");

    Ok(ExecuteResult {
        stdout,
        stderr,
        exit_code,
        error,
    })
}

pub(crate) async fn deadline(timeout: Option<Duration>) -> CancelReason {
    match timeout {
        Some(d) => {
            tokio::time::sleep(d).await;
            CancelReason::TimedOut(d)
        }
        None => std::future::pending().await,
    }
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe
            && let Err(e) = pipe.read_to_end(&mut buf).await
        {
            tracing::debug!(error = %e, "subprocess pipe read failed");
        }
        buf
    })
}

async fn collect(handle: JoinHandle<Vec<u8>>) -> String {
    let bytes = handle.await.unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let res = run(
            Path::new("/bin/sh"),
            &sh("echo out; echo err >&2; exit 3"),
            CancellationToken::new(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(res.stdout, "out\n");
        assert_eq!(res.stderr, "err\n");
        assert_eq!(res.exit_code, 3);
        assert_eq!(res.error.as_deref(), Some("exit status 3"));
    }

    #[tokio::test]
    async fn timeout_kills_child() {
        let err = run(
            Path::new("/bin/sh"),
            &sh("sleep 10"),
            CancellationToken::new(),
            Some(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Cancelled {
                reason: CancelReason::TimedOut(_)
            }
        ));
    }

    #[tokio::test]
    async fn cancellation_token_kills_child() {
        let ct = CancellationToken::new();
        let trigger = ct.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let started = std::time::Instant::now();
        let err = run(Path::new("/bin/sh"), &sh("sleep 10"), ct, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Cancelled {
                reason: CancelReason::Requested
            }
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let err = run(
            Path::new("/definitely/not/here"),
            &[],
            CancellationToken::new(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::SubprocessSpawn { .. }));
    }
}
