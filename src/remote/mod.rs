//! Remote dispatch over SSH.
//!
//! Shells out to the `ssh` and `scp` binaries rather than pulling in a
//! libssh binding; BatchMode keeps runs non-interactive and the identity
//! file comes from configuration. Step files are copied to a remote
//! scratch path and executed there; the assembled solution is mirrored
//! into the remote user's home.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::RemoteError;
use crate::execution::ExecOutput;
use crate::pipeline::config::RemoteServerConfig;

/// Remote scratch directory for step execution.
const REMOTE_STEP_DIR: &str = "/tmp";

/// Trait for backends that move artifacts to a remote host and run them.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Copies a local file to `remote_path` on the server.
    async fn transfer(
        &self,
        server: &RemoteServerConfig,
        local: &Path,
        remote_path: &str,
    ) -> Result<(), RemoteError>;

    /// Runs a shell command on the server, capturing its output.
    ///
    /// A non-zero remote exit is reported in the `ExecOutput`, not as an
    /// error; errors mean the command could not be dispatched at all.
    async fn execute(
        &self,
        server: &RemoteServerConfig,
        command: &str,
    ) -> Result<ExecOutput, RemoteError>;

    /// Transfers one step file and executes it remotely.
    async fn run_step(
        &self,
        server: &RemoteServerConfig,
        step_file: &Path,
    ) -> Result<ExecOutput, RemoteError> {
        let file_name = step_file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "step.py".to_string());
        let remote_path = format!("{REMOTE_STEP_DIR}/{file_name}");

        self.transfer(server, step_file, &remote_path).await?;
        self.execute(server, &format!("python3 {remote_path}")).await
    }

    /// Mirrors the solution directory to the remote user's home.
    ///
    /// Recreates the directory structure file by file so the solution can
    /// be run remotely as-is.
    async fn deploy_solution(
        &self,
        server: &RemoteServerConfig,
        solution_dir: &Path,
    ) -> Result<(), RemoteError> {
        let remote_root = format!("/home/{}/solution", server.username);
        let mkdir = self
            .execute(server, &format!("mkdir -p {remote_root}"))
            .await?;
        if !mkdir.success() {
            return Err(RemoteError::Execution {
                host: server.hostname.clone(),
                exit_code: mkdir.exit_code,
                stderr: mkdir.stderr,
            });
        }

        for entry in WalkDir::new(solution_dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let relative = entry
                .path()
                .strip_prefix(solution_dir)
                .unwrap_or(entry.path());
            let remote_path = format!("{}/{}", remote_root, relative.display());

            if let Some(parent) = Path::new(&remote_path).parent() {
                self.execute(server, &format!("mkdir -p {}", parent.display()))
                    .await?;
            }
            self.transfer(server, entry.path(), &remote_path).await?;
        }

        info!(host = %server.hostname, root = %remote_root, "Deployed solution to remote host");
        Ok(())
    }
}

/// Production dispatcher shelling out to `ssh`/`scp`.
#[derive(Debug, Default)]
pub struct SshDispatcher;

impl SshDispatcher {
    pub fn new() -> Self {
        Self
    }

    fn destination(server: &RemoteServerConfig) -> String {
        format!("{}@{}", server.username, server.hostname)
    }

    /// Options shared by ssh and scp invocations.
    fn common_options(server: &RemoteServerConfig) -> Vec<String> {
        let mut options = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        if let Some(key) = &server.ssh_key_path {
            options.push("-i".to_string());
            options.push(expand_home(&key.to_string_lossy()));
        }
        options
    }

    async fn run_local(program: &str, args: &[String]) -> Result<ExecOutput, RemoteError> {
        debug!(program, ?args, "Spawning transport command");
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RemoteError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

#[async_trait]
impl RemoteExecutor for SshDispatcher {
    async fn transfer(
        &self,
        server: &RemoteServerConfig,
        local: &Path,
        remote_path: &str,
    ) -> Result<(), RemoteError> {
        let mut args = Self::common_options(server);
        args.push("-P".to_string());
        args.push(server.port.to_string());
        args.push(local.display().to_string());
        args.push(format!("{}:{}", Self::destination(server), remote_path));

        let output = Self::run_local("scp", &args).await?;
        if !output.success() {
            return Err(RemoteError::Transfer {
                host: server.hostname.clone(),
                stderr: output.stderr,
            });
        }

        debug!(host = %server.hostname, remote = remote_path, "Transferred file");
        Ok(())
    }

    async fn execute(
        &self,
        server: &RemoteServerConfig,
        command: &str,
    ) -> Result<ExecOutput, RemoteError> {
        let mut args = Self::common_options(server);
        args.push("-p".to_string());
        args.push(server.port.to_string());
        args.push(Self::destination(server));
        args.push(command.to_string());

        Self::run_local("ssh", &args).await
    }
}

/// Expands a leading `~/` against `$HOME`.
fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    path.to_string()
}
