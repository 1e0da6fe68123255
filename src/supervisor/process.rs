//! Launching and tracking the engine child process.

use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;

use super::tail::LogTail;
use crate::config::EngineConfig;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine was launched without a {pipe} pipe")]
    MissingPipe { pipe: &'static str },

    #[error("failed to prepare database directory {path}: {source}")]
    DatabaseDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<OsString>,
    pub envs: Vec<(String, String)>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The engine command line: configured args, then the database file.
    pub fn for_engine(engine: &EngineConfig, database: &Path) -> Self {
        let mut spec = Self::new(engine.command.clone());
        spec.args.extend(engine.args.iter().map(OsString::from));
        spec.args.push(database.as_os_str().to_owned());
        spec.envs.push(("HOME".into(), engine.home_directory.clone()));
        spec
    }
}

/// A running engine plus its control pipes.
#[derive(Debug)]
pub struct LaunchedProcess {
    pub handle: ProcessHandle,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

/// Spawn exactly one child. Stderr is forwarded to tracing under the
/// `engine` target and retained in the handle's log tail.
pub fn launch(spec: &LaunchSpec) -> Result<LaunchedProcess, SupervisorError> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &spec.envs {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| SupervisorError::Launch {
        program: spec.program.clone(),
        source,
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or(SupervisorError::MissingPipe { pipe: "stdin" })?;
    let stdout = child
        .stdout
        .take()
        .ok_or(SupervisorError::MissingPipe { pipe: "stdout" })?;
    let stderr = child
        .stderr
        .take()
        .ok_or(SupervisorError::MissingPipe { pipe: "stderr" })?;

    let tail = LogTail::default();
    let writer = tail.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::warn!(target: "engine", "{line}");
            writer.push(line);
        }
    });

    let pid = child.id();
    tracing::info!(program = %spec.program, pid = ?pid, "Engine launched");

    Ok(LaunchedProcess {
        handle: ProcessHandle {
            child,
            pid,
            tail,
            exit: None,
        },
        stdin,
        stdout,
    })
}

/// Ensure the database directory exists and return the database file path.
pub fn prepare_database(engine: &EngineConfig, bucket: &str) -> Result<std::path::PathBuf, SupervisorError> {
    let dir = Path::new(&engine.database_dir);
    std::fs::create_dir_all(dir).map_err(|source| SupervisorError::DatabaseDir {
        path: dir.display().to_string(),
        source,
    })?;
    Ok(dir.join(format!("{bucket}.duckdb")))
}

/// Liveness and teardown for one launched child.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
    tail: LogTail,
    exit: Option<ExitStatus>,
}

impl ProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn log_tail(&self) -> &LogTail {
        &self.tail
    }

    /// Non-blocking exit check. Once observed, the status is remembered.
    pub fn poll_exit(&mut self) -> Option<ExitStatus> {
        if self.exit.is_none() {
            if let Ok(Some(status)) = self.child.try_wait() {
                self.exit = Some(status);
            }
        }
        self.exit
    }

    pub fn is_alive(&mut self) -> bool {
        self.poll_exit().is_none()
    }

    /// SIGTERM, then SIGKILL once `grace` has passed.
    pub async fn terminate(&mut self, grace: Duration) -> Option<ExitStatus> {
        if let Some(status) = self.poll_exit() {
            return Some(status);
        }
        if let Some(pid) = self.pid {
            let _ = Command::new("kill")
                .args(["-TERM", &pid.to_string()])
                .output()
                .await;
        }
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                self.exit = Some(status);
            }
            _ => {
                tracing::warn!(pid = ?self.pid, "Engine ignored SIGTERM; killing");
                let _ = self.child.kill().await;
                self.exit = self.child.try_wait().ok().flatten();
            }
        }
        self.exit
    }

    /// Watch the child after readiness. Returns when it exits on its own
    /// (logged as an error) or when `stop` fires, in which case the child is
    /// terminated with `grace`.
    pub async fn supervise(mut self, stop: oneshot::Receiver<()>, grace: Duration) -> Option<ExitStatus> {
        if let Some(status) = self.exit {
            return Some(status);
        }
        let exited = tokio::select! {
            biased;
            _ = stop => None,
            status = self.child.wait() => Some(status),
        };
        match exited {
            Some(Ok(status)) => {
                tracing::error!(
                    status = %status,
                    last_lines = ?self.tail.snapshot(),
                    "Engine exited; forwarded sessions will fail"
                );
                self.exit = Some(status);
                self.exit
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Lost track of engine process");
                None
            }
            None => {
                let status = self.terminate(grace).await;
                tracing::info!(status = ?status, "Engine stopped");
                status
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn engine_command_line() {
        let engine = EngineConfig::default();
        let spec = LaunchSpec::for_engine(&engine, Path::new("/app/data/garment.duckdb"));
        assert_eq!(spec.program, "duckdb");
        assert_eq!(
            spec.args,
            vec!["-bail", "-csv", "-noheader", "/app/data/garment.duckdb"]
                .into_iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let err = launch(&LaunchSpec::new("/nonexistent/engine-binary")).unwrap_err();
        assert!(matches!(err, SupervisorError::Launch { .. }));
    }

    #[tokio::test]
    async fn stderr_lands_in_tail_and_exit_is_observed() {
        let spec = LaunchSpec::new("sh")
            .arg("-c")
            .arg("echo out; echo oops >&2; exit 3");
        let mut launched = launch(&spec).unwrap();

        let mut out = String::new();
        launched.stdout.read_to_string(&mut out).await.unwrap();
        assert_eq!(out.trim(), "out");

        let mut status = None;
        for _ in 0..50 {
            status = launched.handle.poll_exit();
            if status.is_some() && !launched.handle.log_tail().snapshot().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(status.and_then(|s| s.code()), Some(3));
        assert!(!launched.handle.is_alive());
        assert_eq!(launched.handle.log_tail().snapshot(), vec!["oops"]);
    }

    #[tokio::test]
    async fn terminate_stops_a_sleeping_child() {
        let mut launched = launch(&LaunchSpec::new("sleep").arg("30")).unwrap();
        assert!(launched.handle.is_alive());

        let started = std::time::Instant::now();
        launched.handle.terminate(Duration::from_secs(2)).await;
        assert!(!launched.handle.is_alive());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn supervise_stops_on_request() {
        let launched = launch(&LaunchSpec::new("sleep").arg("30")).unwrap();
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(launched.handle.supervise(stop_rx, Duration::from_secs(2)));

        stop_tx.send(()).unwrap();
        let status = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(status.is_some_and(|s| !s.success()));
    }
}
