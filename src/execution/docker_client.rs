//! Docker API wrapper using the bollard crate.

use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::BuildImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use tracing::debug;

use crate::error::DockerError;

/// Docker client wrapper for the image build and container run operations
/// the pipeline needs.
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Connects to the local Docker daemon.
    ///
    /// # Errors
    ///
    /// Returns `DockerError::DaemonUnavailable` if the daemon is not
    /// accessible.
    pub fn new() -> Result<Self, DockerError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DockerError::DaemonUnavailable(format!("Failed to connect: {e}")))?;
        Ok(Self { docker })
    }

    /// Creates a client from an existing bollard handle.
    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }

    /// Builds an image from a tarred build context.
    ///
    /// # Returns
    ///
    /// The tag the image was built under, usable as the image reference
    /// for subsequent runs.
    ///
    /// # Errors
    ///
    /// Returns `DockerError::BuildFailed` if the daemon reports a build
    /// error or the stream fails.
    pub async fn build_image(&self, context_tar: Vec<u8>, tag: &str) -> Result<String, DockerError> {
        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: tag.to_string(),
            rm: true,
            ..Default::default()
        };

        let mut stream = self
            .docker
            .build_image(options, None, Some(context_tar.into()));

        while let Some(update) = stream.next().await {
            let info =
                update.map_err(|e| DockerError::BuildFailed(format!("Build stream error: {e}")))?;
            if let Some(line) = info.stream {
                let line = line.trim_end();
                if !line.is_empty() {
                    debug!(build = %line, "docker build");
                }
            }
            if let Some(error) = info.error {
                return Err(DockerError::BuildFailed(error));
            }
        }

        Ok(tag.to_string())
    }

    /// Creates and starts a container, returning its ID.
    ///
    /// # Arguments
    ///
    /// * `name` - Container name; a stale container with the same name is
    ///   removed first, retries reuse the slot.
    /// * `image` - Image tag to run.
    /// * `binds` - Host bind mounts in `host:container` form.
    pub async fn run_container(
        &self,
        name: &str,
        image: &str,
        binds: Vec<String>,
    ) -> Result<String, DockerError> {
        self.remove_container_if_exists(name).await;

        let host_config = HostConfig {
            binds: if binds.is_empty() { None } else { Some(binds) },
            ..Default::default()
        };

        let config = Config {
            image: Some(image.to_string()),
            host_config: Some(host_config),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| DockerError::RunFailed(format!("Failed to create container: {e}")))?;

        self.docker
            .start_container(&response.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| DockerError::RunFailed(format!("Failed to start container: {e}")))?;

        Ok(response.id)
    }

    /// Waits for a container to exit and returns its status code.
    pub async fn wait_container(&self, id: &str) -> Result<i64, DockerError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = self.docker.wait_container(id, Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            Some(Err(e)) => Err(DockerError::RunFailed(format!(
                "Error waiting for container: {e}"
            ))),
            None => Err(DockerError::RunFailed(
                "Container did not exit normally".to_string(),
            )),
        }
    }

    /// Returns the combined stdout/stderr logs of a container.
    pub async fn container_logs(&self, id: &str) -> Result<String, DockerError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            timestamps: false,
            ..Default::default()
        };

        let mut logs = self.docker.logs(id, Some(options));
        let mut output = String::new();

        while let Some(chunk) = logs.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                    output.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(DockerError::RunFailed(format!("Error reading logs: {e}")));
                }
            }
        }

        Ok(output)
    }

    /// Force-removes a container, ignoring "not found".
    pub async fn remove_container_if_exists(&self, name: &str) {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };

        if self
            .docker
            .remove_container(name, Some(options))
            .await
            .is_ok()
        {
            debug!(container = name, "Removed stale container");
        }
    }
}
