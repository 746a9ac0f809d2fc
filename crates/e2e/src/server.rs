//! Dev server management - spawning, readiness detection and health polling

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::DevServerConfig;
use crate::error::{E2eError, E2eResult};

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B\[[0-9;]*[mK]").expect("ANSI escape regex is valid"));

/// A dev server process (e.g. `ng serve`) started for the duration of a test run
pub struct DevServer {
    config: DevServerConfig,
    child: Option<Child>,
    port: Option<u16>,
}

impl DevServer {
    pub fn new(config: DevServerConfig) -> Self {
        Self {
            config,
            child: None,
            port: None,
        }
    }

    /// Port the server was started on
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn base_url(&self) -> Option<String> {
        self.port.map(|port| format!("http://localhost:{}/", port))
    }

    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Spawn the server and wait until its output reports it is ready.
    ///
    /// Does nothing if the server is already running.
    pub async fn start(&mut self) -> E2eResult<()> {
        if self.is_running() {
            info!("Dev server already running");
            return Ok(());
        }

        let port = match self.config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let args = substitute_port(&self.config.args, port);

        info!("Spawning dev server: {} {}", self.config.program, args.join(" "));

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&args)
            .current_dir(&self.config.working_dir)
            .envs(self.config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so stop() also reaches the children npx spawns.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!("Failed to spawn {}: {}", self.config.program, e))
        })?;

        let (ready_tx, ready_rx) = oneshot::channel();
        if let Some(stdout) = child.stdout.take() {
            let patterns = self.config.ready_patterns.clone();
            tokio::spawn(async move {
                let mut ready_tx = Some(ready_tx);
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = strip_ansi(&line);
                    info!(target: "dev_server", "{}", line);
                    if is_ready_line(&line, &patterns) {
                        if let Some(tx) = ready_tx.take() {
                            let _ = tx.send(());
                        }
                    }
                }
                debug!("Dev server stdout closed");
            });
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "dev_server", "{}", strip_ansi(&line));
                }
            });
        }

        self.child = Some(child);
        self.port = Some(port);

        let startup_timeout = self.config.startup_timeout();
        match timeout(startup_timeout, ready_rx).await {
            Ok(Ok(())) => {
                info!("Dev server is running at http://localhost:{}/", port);
                Ok(())
            }
            Ok(Err(_)) => {
                self.stop().await?;
                Err(E2eError::ServerStartup(
                    "process output ended before it reported ready".to_string(),
                ))
            }
            Err(_) => {
                self.stop().await?;
                Err(E2eError::ServerReadyTimeout(startup_timeout.as_secs()))
            }
        }
    }

    /// Stop the server. Safe to call when it was never started or already stopped.
    pub async fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        self.port = None;

        if !matches!(child.try_wait(), Ok(None)) {
            return Ok(());
        }

        info!("Stopping dev server (pid: {:?})", child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if killpg(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && timeout(Duration::from_secs(2), child.wait()).await.is_ok()
                {
                    return Ok(());
                }
            }
        }

        // Force kill if still running
        if let Err(e) = child.kill().await {
            warn!("Error stopping dev server: {}", e);
        }
        Ok(())
    }

    /// Poll `url` until it answers with a success status.
    ///
    /// Useful when the application is started outside the test run.
    pub async fn wait_until_responsive(url: &str, timeout_duration: Duration) -> E2eResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .danger_accept_invalid_certs(true)
            .build()?;

        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!("{} is responding", url);
                    return Ok(());
                }
                Ok(resp) => {
                    debug!("Readiness probe returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for {} to respond...", url);
                    }
                    // Connection refused is expected while the app is starting
                    if !e.is_connect() {
                        warn!("Readiness probe error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(500)).await;
        }

        Err(E2eError::NotResponsive {
            url: url.to_string(),
            seconds: timeout_duration.as_secs(),
            attempts,
        })
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            #[cfg(unix)]
            {
                use nix::sys::signal::{killpg, Signal};
                use nix::unistd::Pid;

                if let Some(pid) = child.id() {
                    let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
                }
            }
            let _ = child.start_kill();
        }
    }
}

fn substitute_port(args: &[String], port: u16) -> Vec<String> {
    let port = port.to_string();
    args.iter().map(|arg| arg.replace("{port}", &port)).collect()
}

fn strip_ansi(line: &str) -> String {
    ANSI_ESCAPE.replace_all(line, "").into_owned()
}

fn is_ready_line(line: &str, patterns: &[String]) -> bool {
    let line = line.to_lowercase();
    patterns.iter().any(|p| line.contains(&p.to_lowercase()))
}

/// Find a free port to use
pub fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    Ok(TcpListener::bind("127.0.0.1:0")?.local_addr()?.port())
}
