//! Long-running form: one engine serving many hook invocations over a Unix
//! domain socket.
//!
//! The protocol is line-delimited JSON. Each request line is a
//! [`DaemonRequest`]; each answer line is the [`HookOutput`] the one-shot
//! `eval` command would have produced. A connection may carry any number of
//! requests.
//!
//! SIGHUP re-reads the configuration and swaps every registry. SIGINT and
//! SIGTERM stop accepting, let requests already being evaluated finish,
//! close idle connections, and remove the socket file.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::engine::Engine;
use crate::harness::{AdapterEnv, ClaudeHarness, HookOutput};
use crate::harness::types::HookEventName;

/// One hook invocation forwarded by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub event: HookEventName,
    pub payload: Value,
    /// The caller's adapter environment; the daemon's own is never used
    #[serde(default)]
    pub env: AdapterEnv,
}

pub struct Daemon {
    engine: Arc<Engine>,
    socket_path: PathBuf,
}

impl Daemon {
    pub fn new(engine: Engine, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            engine: Arc::new(engine),
            socket_path: socket_path.into(),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Serve until SIGINT or SIGTERM, reloading on SIGHUP
    pub async fn run(self) -> Result<()> {
        let mut hangup = signal(SignalKind::hangup()).context("Failed to register SIGHUP")?;
        let mut terminate =
            signal(SignalKind::terminate()).context("Failed to register SIGTERM")?;
        let mut interrupt =
            signal(SignalKind::interrupt()).context("Failed to register SIGINT")?;

        let engine = Arc::clone(&self.engine);
        let shutdown = async move {
            loop {
                tokio::select! {
                    _ = hangup.recv() => {
                        info!("Received SIGHUP; reloading configuration");
                        if let Err(e) = engine.reload_from_disk() {
                            error!(error = %format!("{e:#}"), "Reload failed; keeping previous registries");
                        }
                    }
                    _ = terminate.recv() => {
                        info!("Received SIGTERM");
                        break;
                    }
                    _ = interrupt.recv() => {
                        info!("Received SIGINT");
                        break;
                    }
                }
            }
        };

        self.serve_until(shutdown).await
    }

    /// Accept connections until `shutdown` resolves, then drain
    pub async fn serve_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let listener = bind(&self.socket_path).await?;
        info!(socket = ?self.socket_path, "Hookgate daemon listening");

        let mut connections = JoinSet::new();
        let (closing, closing_rx) = watch::channel(false);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let engine = Arc::clone(&self.engine);
                        connections.spawn(serve_connection(engine, stream, closing_rx.clone()));
                    }
                    Err(e) => error!(error = %e, "Failed to accept connection"),
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    log_connection_result(finished);
                }
            }
        }

        drop(listener);
        let _ = closing.send(true);
        info!(open = connections.len(), "Shutting down; draining connections");
        while let Some(finished) = connections.join_next().await {
            log_connection_result(finished);
        }

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            warn!(socket = ?self.socket_path, error = %e, "Failed to remove socket file");
        }
        info!("Hookgate daemon stopped");
        Ok(())
    }
}

/// Bind the socket, replacing a stale socket left by a crashed daemon
///
/// Anything at the path that is not a socket is left alone and refused.
async fn bind(path: &Path) -> Result<UnixListener> {
    if let Ok(metadata) = std::fs::symlink_metadata(path) {
        if !metadata.file_type().is_socket() {
            bail!("{} exists but is not a socket", path.display());
        }
        if UnixStream::connect(path).await.is_ok() {
            bail!("A daemon is already listening on {}", path.display());
        }
        debug!(socket = ?path, "Removing stale socket file");
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
    }
    UnixListener::bind(path).with_context(|| format!("Failed to bind {}", path.display()))
}

fn log_connection_result(result: Result<Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %format!("{e:#}"), "Connection ended with an error"),
        Err(e) => error!(error = %e, "Connection task failed"),
    }
}

/// Serve requests until the client hangs up or the daemon starts closing
///
/// Shutdown is only observed between requests, so a request that has been
/// read is always answered.
async fn serve_connection(
    engine: Arc<Engine>,
    stream: UnixStream,
    mut closing: watch::Receiver<bool>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        if *closing.borrow() {
            break;
        }
        let line = tokio::select! {
            biased;
            _ = closing.changed() => break,
            line = lines.next_line() => line.context("Failed to read request")?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let output = handle_request(&engine, &line).await;
        let mut encoded = serde_json::to_string(&output).context("Failed to encode response")?;
        encoded.push('\n');
        writer
            .write_all(encoded.as_bytes())
            .await
            .context("Failed to write response")?;
    }
    Ok(())
}

/// Answer one request line; malformed requests fail open
pub async fn handle_request(engine: &Engine, line: &str) -> HookOutput {
    let request: DaemonRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Malformed daemon request; default allow");
            return HookOutput::fail_open();
        }
    };

    let input = request.payload.to_string();
    let decision = engine
        .evaluate_input(request.event, &input, &request.env)
        .await;

    ClaudeHarness::format_response(request.event, &decision).unwrap_or_else(|e| {
        error!(error = %e, "Failed to encode hook response; default allow");
        HookOutput::fail_open()
    })
}

/// Forward one request to a running daemon and wait for its answer
pub async fn send_request(socket_path: &Path, request: &DaemonRequest) -> Result<HookOutput> {
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("Failed to connect to daemon at {}", socket_path.display()))?;
    let (reader, mut writer) = stream.into_split();

    let mut encoded = serde_json::to_string(request).context("Failed to encode request")?;
    encoded.push('\n');
    writer.write_all(encoded.as_bytes()).await?;
    writer.shutdown().await?;

    let line = BufReader::new(reader)
        .lines()
        .next_line()
        .await?
        .context("Daemon closed the connection without answering")?;
    serde_json::from_str(&line).context("Daemon sent an invalid response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HookgateConfig;
    use crate::harness::{EXIT_ALLOW, EXIT_DENY};
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    fn engine() -> Engine {
        Engine::from_settings(&HookgateConfig::default()).unwrap()
    }

    fn system_write() -> DaemonRequest {
        DaemonRequest {
            event: HookEventName::PreToolUse,
            payload: json!({
                "tool_name": "Write",
                "tool_input": {"file_path": "/etc/hosts", "content": "127.0.0.1 x"}
            }),
            env: AdapterEnv::default(),
        }
    }

    #[tokio::test]
    async fn test_handle_request_denies_and_fails_open() {
        let engine = engine();
        let line = serde_json::to_string(&system_write()).unwrap();

        let output = handle_request(&engine, &line).await;
        assert_eq!(output.exit_code, EXIT_DENY);
        assert!(output.stdout.contains("\"permissionDecision\":\"deny\""));

        let output = handle_request(&engine, "{\"event\": \"Nope\"}").await;
        assert_eq!(output, HookOutput::fail_open());
    }

    #[tokio::test]
    async fn test_serves_over_socket_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("hookgate.sock");
        let (stop, stopped) = oneshot::channel::<()>();

        let server = tokio::spawn(Daemon::new(engine(), &socket).serve_until(async {
            let _ = stopped.await;
        }));
        while !socket.exists() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let denied = send_request(&socket, &system_write()).await.unwrap();
        assert_eq!(denied.exit_code, EXIT_DENY);

        let allowed = send_request(
            &socket,
            &DaemonRequest {
                event: HookEventName::PreToolUse,
                payload: json!({"tool_name": "Read", "tool_input": {"file_path": "a.md"}}),
                env: AdapterEnv::default(),
            },
        )
        .await
        .unwrap();
        assert_eq!(allowed, HookOutput::fail_open());
        assert_eq!(allowed.exit_code, EXIT_ALLOW);

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert!(!socket.exists());
    }

    #[tokio::test]
    async fn test_idle_client_does_not_block_shutdown() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("hookgate.sock");
        let (stop, stopped) = oneshot::channel::<()>();

        let server = tokio::spawn(Daemon::new(engine(), &socket).serve_until(async {
            let _ = stopped.await;
        }));
        while !socket.exists() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        // Connected but never sends anything
        let idle = UnixStream::connect(&socket).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        stop.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(3), server)
            .await
            .expect("shutdown finished with an idle client connected")
            .unwrap()
            .unwrap();
        assert!(!socket.exists());
        drop(idle);
    }

    #[tokio::test]
    async fn test_stale_socket_is_replaced() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("stale.sock");
        // Bound then dropped: the socket file stays behind with no listener
        drop(std::os::unix::net::UnixListener::bind(&socket).unwrap());
        assert!(socket.exists());

        let listener = bind(&socket).await.unwrap();
        drop(listener);
    }

    #[tokio::test]
    async fn test_regular_file_at_socket_path_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("important.txt");
        std::fs::write(&path, "user data").unwrap();

        let err = bind(&path).await.unwrap_err();
        assert!(err.to_string().contains("not a socket"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "user data");
    }
}
