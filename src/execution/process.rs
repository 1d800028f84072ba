//! Local process execution collaborator.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::ExecError;

/// Captured output of one process run.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait for backends that can run a file-resident program.
///
/// A non-zero exit is not an error at this layer; it is an `ExecOutput`
/// the caller inspects. Errors are reserved for failures to run at all
/// (spawn failure, timeout).
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, file: &Path, cwd: &Path) -> Result<ExecOutput, ExecError>;
}

/// Runs Python files on the local host.
pub struct LocalRunner {
    interpreter: String,
    timeout: Duration,
}

impl LocalRunner {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new("python3", Duration::from_secs(300))
    }
}

#[async_trait]
impl ProcessRunner for LocalRunner {
    async fn run(&self, file: &Path, cwd: &Path) -> Result<ExecOutput, ExecError> {
        debug!(file = %file.display(), "Running local process");

        let child = Command::new(&self.interpreter)
            .arg(file)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| ExecError::Timeout {
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|source| ExecError::Spawn {
                program: self.interpreter.clone(),
                source,
            })?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_output_success() {
        let ok = ExecOutput {
            stdout: "done".to_string(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert!(ok.success());

        let failed = ExecOutput {
            stdout: String::new(),
            stderr: "Traceback".to_string(),
            exit_code: 1,
        };
        assert!(!failed.success());
    }

    #[tokio::test]
    async fn test_local_runner_spawn_failure() {
        let runner = LocalRunner::new("definitely-not-an-interpreter", Duration::from_secs(5));
        let dir = tempfile::tempdir().expect("temp dir");

        let result = runner.run(Path::new("script.py"), dir.path()).await;
        assert!(matches!(result, Err(ExecError::Spawn { .. })));
    }
}
