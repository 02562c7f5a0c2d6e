//! Command runner seam and the shared `gio` handle
//!
//! Every component talks to the external tool through a [`Gio`] handle. The
//! handle owns a [`CommandRunner`] (the real `gio` binary in production, canned
//! fixtures in tests) and a shared [`ToolProbe`] that records the outcome of the
//! one-time `gio version` availability check.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::error::{GioAdapterError, Result};

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Diagnostic text printed on stderr, trimmed
    pub fn diagnostic(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Runs the external tool.
///
/// Arguments are handed over as argv entries and never pass through a shell.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the tool to completion, capturing stdout and stderr
    async fn output(&self, args: &[String]) -> std::io::Result<CommandOutput>;

    /// Start the tool with stdout and stderr piped
    fn spawn(&self, args: &[String]) -> std::io::Result<Child>;
}

/// Runner backed by the real `gio` executable
#[derive(Debug, Clone)]
pub struct GioCommand {
    program: PathBuf,
}

impl GioCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GioCommand {
    fn default() -> Self {
        Self::new("gio")
    }
}

#[async_trait]
impl CommandRunner for GioCommand {
    async fn output(&self, args: &[String]) -> std::io::Result<CommandOutput> {
        let out = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            success: out.status.success(),
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }

    fn spawn(&self, args: &[String]) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }
}

/// Write-once outcome of the availability probe.
///
/// The first caller runs `gio version`; everyone after that gets the cached
/// version string or the cached failure.
#[derive(Debug, Default)]
pub struct ToolProbe {
    outcome: OnceCell<std::result::Result<String, String>>,
}

impl ToolProbe {
    pub fn new() -> Self {
        Self::default()
    }

    async fn check(&self, runner: &dyn CommandRunner) -> Result<()> {
        let outcome = self
            .outcome
            .get_or_init(|| async {
                let args = ["version".to_string()];
                match runner.output(&args).await {
                    Ok(out) if out.success => {
                        let version = String::from_utf8_lossy(&out.stdout).trim_end().to_string();
                        debug!("gio available: {}", version);
                        Ok(version)
                    }
                    Ok(out) => Err(format!("`gio version` failed: {}", out.diagnostic())),
                    Err(e) => Err(e.to_string()),
                }
            })
            .await;

        match outcome {
            Ok(_) => Ok(()),
            Err(msg) => Err(GioAdapterError::ToolUnavailable(msg.clone())),
        }
    }

    /// Version reported by the probe, if it has run and succeeded
    pub fn version(&self) -> Option<&str> {
        match self.outcome.get() {
            Some(Ok(version)) => Some(version.as_str()),
            _ => None,
        }
    }
}

/// Cloneable handle to the external tool
#[derive(Clone)]
pub struct Gio {
    runner: Arc<dyn CommandRunner>,
    probe: Arc<ToolProbe>,
}

impl Gio {
    /// Create a handle with its own, not yet computed, probe
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_probe(runner, Arc::new(ToolProbe::new()))
    }

    /// Create a handle sharing an existing probe
    pub fn with_probe(runner: Arc<dyn CommandRunner>, probe: Arc<ToolProbe>) -> Self {
        Self { runner, probe }
    }

    /// Handle for the real executable at `program`
    pub fn system(program: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(GioCommand::new(program)))
    }

    pub fn probe(&self) -> &ToolProbe {
        &self.probe
    }

    /// Fail with `ToolUnavailable` unless the probe succeeded
    pub async fn ensure_available(&self) -> Result<()> {
        self.probe.check(self.runner.as_ref()).await
    }

    /// Run a subcommand to completion and return its stdout.
    ///
    /// `op` and `path` only label the error when the subcommand exits non-zero.
    pub async fn run(&self, op: &str, path: &str, args: Vec<String>) -> Result<Vec<u8>> {
        self.ensure_available().await?;
        trace!("gio {:?}", args);

        let out = self.runner.output(&args).await?;
        if !out.success {
            let mut message = out.diagnostic();
            if message.is_empty() {
                message = format!("gio {} exited with failure", args.first().map(String::as_str).unwrap_or(""));
            }
            return Err(GioAdapterError::process(op, path, message));
        }
        Ok(out.stdout)
    }

    /// Start a long-running subcommand with piped output
    pub async fn spawn(&self, args: Vec<String>) -> Result<Child> {
        self.ensure_available().await?;
        trace!("gio {:?} (streaming)", args);
        Ok(self.runner.spawn(&args)?)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeRunner;
    use super::*;

    #[tokio::test]
    async fn test_probe_runs_once() {
        let (runner, gio) = FakeRunner::new().with_ok("remove", "").into_gio();

        for _ in 0..3 {
            gio.run("remove", "a", vec!["remove".into(), "file:///a".into()])
                .await
                .unwrap();
        }
        // Clones share the cached outcome
        gio.clone().ensure_available().await.unwrap();

        assert_eq!(runner.count("version"), 1);
        assert_eq!(runner.count("remove"), 3);
        assert_eq!(gio.probe().version(), Some("gio 2.80.0"));
    }

    #[tokio::test]
    async fn test_probe_failure_is_cached() {
        let (runner, gio) = FakeRunner::default()
            .with_failure("version", "command not found")
            .with_ok("info", "")
            .into_gio();

        for _ in 0..2 {
            let err = gio.run("stat", "x", vec!["info".into()]).await.unwrap_err();
            match err {
                GioAdapterError::ToolUnavailable(msg) => assert!(msg.contains("command not found")),
                other => panic!("Expected ToolUnavailable, got {:?}", other),
            }
        }

        assert_eq!(runner.count("version"), 1);
        assert_eq!(runner.count("info"), 0);
        assert_eq!(gio.probe().version(), None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let gio = Gio::system("/nonexistent/gio-binary");
        let err = gio.ensure_available().await.unwrap_err();
        assert!(matches!(err, GioAdapterError::ToolUnavailable(_)));
    }

    #[tokio::test]
    async fn test_run_failure_wraps_stderr() {
        let (_, gio) = FakeRunner::new()
            .with_failure("remove", "gio: file:///x: No such file or directory\n")
            .into_gio();

        let err = gio
            .run("remove", "x", vec!["remove".into(), "file:///x".into()])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "remove x: gio: file:///x: No such file or directory"
        );
    }
}
