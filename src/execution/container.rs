//! Containerized solution execution.
//!
//! Builds a minimal image whose only job is to run `main.py` from the
//! mounted solution directory, then runs a container from it and captures
//! what happened. Building and running are strictly sequential; a run is
//! never attempted after a failed build.

use std::path::Path;

use tracing::info;

use crate::error::DockerError;
use crate::execution::DockerClient;

/// Outcome of one containerized solution run.
#[derive(Debug, Clone)]
pub struct ContainerOutcome {
    pub logs: String,
    pub exit_code: i64,
}

impl ContainerOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Builds and runs the solution container.
pub struct ContainerRunner {
    client: DockerClient,
    base_image: String,
    image_tag: String,
    container_name: String,
}

impl ContainerRunner {
    pub fn new(
        client: DockerClient,
        base_image: impl Into<String>,
        image_tag: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_image: base_image.into(),
            image_tag: image_tag.into(),
            container_name: container_name.into(),
        }
    }

    /// Renders the Dockerfile for the solution image.
    ///
    /// The solution directory is bind-mounted at run time, so the image
    /// itself stays solution-independent: base interpreter, workdir, and
    /// the `main.py` entry command.
    fn dockerfile(&self) -> String {
        format!(
            "FROM {}\nWORKDIR /app\nCMD [\"python3\", \"main.py\"]\n",
            self.base_image
        )
    }

    /// Stages the build context in a temp dir and returns it as a tar
    /// archive.
    fn build_context(&self) -> Result<Vec<u8>, DockerError> {
        let staging = tempfile::tempdir()?;
        std::fs::write(staging.path().join("Dockerfile"), self.dockerfile())?;

        let mut builder = tar::Builder::new(Vec::new());
        builder.append_dir_all(".", staging.path())?;
        Ok(builder.into_inner()?)
    }

    /// Builds the solution image with the configured tag, returning the
    /// image ID.
    ///
    /// # Errors
    ///
    /// Returns `DockerError::BuildFailed` when the daemon rejects the
    /// build.
    pub async fn build(&self) -> Result<String, DockerError> {
        info!(tag = %self.image_tag, "Building solution image");
        let context = self.build_context()?;
        let image_id = self.client.build_image(context, &self.image_tag).await?;
        info!(image = %image_id, "Built solution image");
        Ok(image_id)
    }

    /// Runs the solution container with `solution_dir` mounted at `/app`.
    ///
    /// # Errors
    ///
    /// Returns `DockerError::RunFailed` when the container cannot be
    /// created, started, or observed. A non-zero solution exit code is not
    /// an error; it is reported in the outcome.
    pub async fn run(&self, solution_dir: &Path) -> Result<ContainerOutcome, DockerError> {
        let host_dir = std::fs::canonicalize(solution_dir)?;
        let binds = vec![format!("{}:/app", host_dir.display())];

        info!(container = %self.container_name, "Starting solution container");
        let id = self
            .client
            .run_container(&self.container_name, &self.image_tag, binds)
            .await?;

        let exit_code = self.client.wait_container(&id).await?;
        let logs = self.client.container_logs(&id).await?;
        self.client.remove_container_if_exists(&self.container_name).await;

        info!(exit_code, "Solution container exited");
        Ok(ContainerOutcome { logs, exit_code })
    }

    /// Builds the image, then runs the container.
    pub async fn execute(&self, solution_dir: &Path) -> Result<ContainerOutcome, DockerError> {
        self.build().await?;
        self.run(solution_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_outcome_success() {
        let ok = ContainerOutcome {
            logs: "done".to_string(),
            exit_code: 0,
        };
        assert!(ok.success());

        let failed = ContainerOutcome {
            logs: "Traceback".to_string(),
            exit_code: 1,
        };
        assert!(!failed.success());
    }

    #[test]
    fn test_dockerfile_render() {
        let runner = test_runner();
        let dockerfile = runner.dockerfile();

        assert!(dockerfile.starts_with("FROM python:3.11-slim\n"));
        assert!(dockerfile.contains("WORKDIR /app"));
        assert!(dockerfile.contains("CMD [\"python3\", \"main.py\"]"));
    }

    #[test]
    fn test_build_context_contains_dockerfile() {
        let runner = test_runner();
        let context = runner.build_context().expect("build context");

        let mut archive = tar::Archive::new(context.as_slice());
        let names: Vec<String> = archive
            .entries()
            .expect("entries")
            .map(|e| {
                e.expect("entry")
                    .path()
                    .expect("path")
                    .display()
                    .to_string()
            })
            .collect();

        assert!(
            names.iter().any(|n| n.ends_with("Dockerfile")),
            "archive should contain a Dockerfile, got: {:?}",
            names
        );
    }

    fn test_runner() -> ContainerRunner {
        // Connecting lazily: the handle is only used by async operations,
        // which these tests never invoke.
        let docker = bollard::Docker::connect_with_local_defaults()
            .expect("bollard local defaults should construct");
        ContainerRunner::new(
            DockerClient::from_docker(docker),
            "python:3.11-slim",
            "planforge-solution:latest",
            "planforge-solution",
        )
    }
}
