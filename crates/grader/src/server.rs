//! App server management - spawning the server and waiting for readiness
//!
//! The server is considered up once its console output shows the app was
//! loaded and then announces the listening address. An address announced
//! before the app loaded means another process already holds the port.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{GradeError, GradeResult};
use crate::workspace::StagedApp;

/// Outcome of scanning one line of server output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    /// Address announced before the app loaded
    Aborted,
    PortInUse,
}

/// Watches server output for the readiness markers
#[derive(Debug, Clone)]
pub struct ReadinessScanner {
    app_marker: String,
    listen_marker: String,
    conflict_marker: String,
    app_loaded: bool,
}

impl ReadinessScanner {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            app_marker: config.app_marker.clone(),
            listen_marker: config.listen_marker(),
            conflict_marker: config.conflict_marker.clone(),
            app_loaded: false,
        }
    }

    pub fn feed(&mut self, line: &str) -> Readiness {
        if line.contains(&self.conflict_marker) {
            return Readiness::PortInUse;
        }
        if line.contains(&self.app_marker) {
            self.app_loaded = true;
        }
        if line.contains(&self.listen_marker) {
            return if self.app_loaded {
                Readiness::Ready
            } else {
                Readiness::Aborted
            };
        }
        Readiness::Pending
    }
}

/// Handle to a running app server process
pub struct AppServer {
    child: Option<Child>,
    pub base_url: String,
    pub port: u16,
}

impl AppServer {
    /// Spawn the server for a staged app and wait until it is ready
    pub async fn spawn(config: &ServerConfig, staged: &StagedApp) -> GradeResult<Self> {
        let port = config.port;
        let base_url = format!("http://{}:{}", config.host, port);

        info!("Starting the server on port {}", port);

        // One pipe for both streams keeps lines in the order they were written.
        let (reader, writer) = nix::unistd::pipe().map_err(std::io::Error::from)?;
        let stderr_writer = writer.try_clone()?;

        let child = {
            let mut cmd = Command::new(&config.command);
            cmd.arg("run")
                .arg(&staged.apps_root)
                .arg("--port")
                .arg(port.to_string())
                .arg("--app_names")
                .arg(&staged.app_name)
                .stdin(Stdio::piped())
                .stdout(Stdio::from(writer))
                .stderr(Stdio::from(stderr_writer))
                .kill_on_drop(true);

            // The command owns our copies of the write end; dropping it
            // lets the reader see end of output when the child exits.
            cmd.spawn().map_err(|e| {
                GradeError::ServerStartup(format!("Failed to spawn {}: {}", config.command, e))
            })?
        };

        let (tx, rx) = mpsc::unbounded_channel();
        pump_lines(pipe::Receiver::from_owned_fd(reader)?, tx);

        // Dropping the handle on an error path kills the child.
        let handle = AppServer {
            child: Some(child),
            base_url,
            port,
        };

        let mut rx = handle.wait_for_ready(config, rx).await?;

        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                debug!(target: "cardgrade::server_output", "{}", line);
            }
        });

        info!("- app started!");
        Ok(handle)
    }

    async fn wait_for_ready(
        &self,
        config: &ServerConfig,
        mut rx: mpsc::UnboundedReceiver<String>,
    ) -> GradeResult<mpsc::UnboundedReceiver<String>> {
        let mut scanner = ReadinessScanner::new(config);
        let port = self.port;

        let scan = async {
            while let Some(line) = rx.recv().await {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                info!("{}", line);
                match scanner.feed(line) {
                    Readiness::Pending => {}
                    Readiness::Ready => return Ok(()),
                    Readiness::Aborted => return Err(GradeError::StartupAborted(port)),
                    Readiness::PortInUse => return Err(GradeError::PortInUse(port)),
                }
            }
            Err(GradeError::ServerStartup(
                "server exited before becoming ready".to_string(),
            ))
        };

        let outcome = timeout(config.startup_timeout(), scan).await;
        match outcome {
            Ok(Ok(())) => Ok(rx),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(GradeError::ServerReadinessTimeout(config.startup_timeout())),
        }
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Stop the server; calling it again is a no-op
    pub fn stop(&mut self) -> GradeResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        info!("- stopping server...");

        #[cfg(unix)]
        if let Some(pid) = child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(200));
            }
        }

        if let Err(e) = child.start_kill() {
            debug!("Server already gone: {}", e);
        }
        match child.try_wait() {
            Ok(Some(status)) => debug!("Server exited with {}", status),
            Ok(None) => warn!("Server still shutting down"),
            Err(e) => warn!("Failed to reap server: {}", e),
        }

        info!("- stopping server...DONE");
        Ok(())
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Forward every line of a child stream into the merged output channel
pub(crate) fn pump_lines<R>(stream: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

/// Configuration for spawning the app server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server launcher, invoked as `<command> run <apps> --port <port> --app_names <app>`
    pub command: String,

    /// Address the launcher listens on by default; used for the base URL
    /// and the listen marker, not passed to the launcher
    pub host: String,

    pub port: u16,

    /// Upper bound on waiting for the readiness markers
    pub startup_timeout_ms: u64,

    /// Printed once per app that loaded successfully
    pub app_marker: String,

    /// Printed when the port cannot be bound
    pub conflict_marker: String,
}

impl ServerConfig {
    /// Address announcement that marks the server as listening
    pub fn listen_marker(&self) -> String {
        format!("{}:", self.host)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: "py4web".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8800,
            startup_timeout_ms: 30_000,
            app_marker: "[X]".to_string(),
            conflict_marker: "Address already in use".to_string(),
        }
    }
}
