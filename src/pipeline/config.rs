//! Pipeline configuration.
//!
//! Configuration is loaded once at startup from a YAML file (written with
//! defaults on first run), validated, and then passed by reference into
//! every component. Nothing reads configuration ambiently.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// A remote host that designated steps (or the whole solution) run on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteServerConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    /// Identity file for key-based auth; agent/defaults apply when unset.
    pub ssh_key_path: Option<PathBuf>,
    /// When set, the assembled solution is shipped to this host after the
    /// run.
    pub execute_remotely: bool,
    /// 1-based plan step indices executed on this host instead of locally.
    pub steps_to_execute: Vec<usize>,
}

impl Default for RemoteServerConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            port: 22,
            username: String::new(),
            ssh_key_path: None,
            execute_remotely: false,
            steps_to_execute: Vec::new(),
        }
    }
}

/// Docker settings for containerized solution execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DockerConfig {
    pub enabled: bool,
    pub base_image: String,
    pub image_tag: String,
    pub container_name: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_image: "python:3.11-slim".to_string(),
            image_tag: "planforge-solution:latest".to_string(),
            container_name: "planforge-solution".to_string(),
        }
    }
}

/// Process-wide configuration, read-only for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory the assembled solution (and its `steps/` package) is
    /// written to.
    pub solution_directory: PathBuf,

    /// Maximum generate-and-run attempts per step.
    pub max_step_retries: u32,
    /// Maximum execution attempts for the assembled solution.
    pub max_solution_retries: u32,

    /// Model used for code generation.
    pub model: String,
    pub temperature: f64,
    pub max_generation_tokens: u32,

    /// Interpreter used for local step and solution execution.
    pub python_interpreter: String,
    /// Wall-clock bound for one local execution.
    pub step_timeout_secs: u64,

    pub log_file: PathBuf,
    pub log_level: String,

    /// Abort the whole run when a step exhausts its retries, instead of
    /// excluding it from assembly and continuing.
    pub abort_on_step_failure: bool,
    /// Run the container/remote stages even when local solution execution
    /// failed.
    pub deploy_failed_solution: bool,

    pub docker: DockerConfig,
    pub remote_servers: Vec<RemoteServerConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            solution_directory: PathBuf::from("solution"),
            max_step_retries: 5,
            max_solution_retries: 5,
            model: "gpt-4".to_string(),
            temperature: 0.2,
            max_generation_tokens: 800,
            python_interpreter: "python3".to_string(),
            step_timeout_secs: 300,
            log_file: PathBuf::from("pipeline.log"),
            log_level: "info".to_string(),
            abort_on_step_failure: false,
            deploy_failed_solution: false,
            docker: DockerConfig::default(),
            remote_servers: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// A missing file is not an error: defaults are written to it (so the
    /// operator has something to edit) and returned.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on unreadable/unparseable content or failed
    /// validation.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            std::fs::write(path, serde_yaml::to_string(&config)?)?;
            info!(path = %path.display(), "Wrote default configuration");
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.solution_directory.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "solution_directory cannot be empty".to_string(),
            ));
        }

        if self.max_step_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_step_retries must be greater than 0".to_string(),
            ));
        }

        if self.max_solution_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_solution_retries must be greater than 0".to_string(),
            ));
        }

        if self.model.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.python_interpreter.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "python_interpreter cannot be empty".to_string(),
            ));
        }

        if self.step_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "step_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !matches!(
            self.log_level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::ValidationFailed(format!(
                "log_level '{}' is not one of trace, debug, info, warn, error",
                self.log_level
            )));
        }

        if self.docker.enabled {
            if self.docker.base_image.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "docker.base_image cannot be empty".to_string(),
                ));
            }
            if self.docker.image_tag.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "docker.image_tag cannot be empty".to_string(),
                ));
            }
        }

        for server in &self.remote_servers {
            if server.hostname.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "remote server hostname cannot be empty".to_string(),
                ));
            }
            if server.username.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "remote server '{}' has no username",
                    server.hostname
                )));
            }
            if server.port == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "remote server '{}' has port 0",
                    server.hostname
                )));
            }
            if server.steps_to_execute.iter().any(|&i| i == 0) {
                return Err(ConfigError::ValidationFailed(format!(
                    "remote server '{}' lists step index 0; step indices are 1-based",
                    server.hostname
                )));
            }
        }

        Ok(())
    }

    /// The remote server a step index is routed to, if any.
    pub fn server_for_step(&self, step_index: usize) -> Option<&RemoteServerConfig> {
        self.remote_servers
            .iter()
            .find(|server| server.steps_to_execute.contains(&step_index))
    }

    /// Directory the per-step artifacts are written to.
    pub fn steps_directory(&self) -> PathBuf {
        self.solution_directory.join("steps")
    }

    /// Builder method to set the solution directory.
    pub fn with_solution_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.solution_directory = dir.into();
        self
    }

    /// Builder method to set the per-step retry bound.
    pub fn with_max_step_retries(mut self, retries: u32) -> Self {
        self.max_step_retries = retries;
        self
    }

    /// Builder method to set the solution retry bound.
    pub fn with_max_solution_retries(mut self, retries: u32) -> Self {
        self.max_solution_retries = retries;
        self
    }

    /// Builder method to set the generation model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Builder method to enable or disable Docker execution.
    pub fn with_docker_enabled(mut self, enabled: bool) -> Self {
        self.docker.enabled = enabled;
        self
    }

    /// Builder method to set the remote server list.
    pub fn with_remote_servers(mut self, servers: Vec<RemoteServerConfig>) -> Self {
        self.remote_servers = servers;
        self
    }

    /// Builder method to set abort-on-step-failure behavior.
    pub fn with_abort_on_step_failure(mut self, abort: bool) -> Self {
        self.abort_on_step_failure = abort;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.solution_directory, PathBuf::from("solution"));
        assert_eq!(config.max_step_retries, 5);
        assert_eq!(config.max_solution_retries, 5);
        assert_eq!(config.model, "gpt-4");
        assert!(!config.docker.enabled);
        assert!(!config.abort_on_step_failure);
        assert!(config.remote_servers.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_steps_directory_is_nested() {
        let config = PipelineConfig::default().with_solution_directory("/tmp/out");
        assert_eq!(config.steps_directory(), PathBuf::from("/tmp/out/steps"));
    }

    #[test]
    fn test_validation_zero_retries() {
        let config = PipelineConfig::default().with_max_step_retries(0);
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("max_step_retries"));
    }

    #[test]
    fn test_validation_bad_log_level() {
        let mut config = PipelineConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_remote_server() {
        let config = PipelineConfig::default().with_remote_servers(vec![RemoteServerConfig {
            hostname: "build-1".to_string(),
            username: String::new(),
            ..Default::default()
        }]);
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("username"));

        let config = PipelineConfig::default().with_remote_servers(vec![RemoteServerConfig {
            hostname: "build-1".to_string(),
            username: "ci".to_string(),
            steps_to_execute: vec![0],
            ..Default::default()
        }]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_for_step() {
        let config = PipelineConfig::default().with_remote_servers(vec![
            RemoteServerConfig {
                hostname: "build-1".to_string(),
                username: "ci".to_string(),
                steps_to_execute: vec![2, 4],
                ..Default::default()
            },
            RemoteServerConfig {
                hostname: "build-2".to_string(),
                username: "ci".to_string(),
                steps_to_execute: vec![3],
                ..Default::default()
            },
        ]);

        assert_eq!(
            config.server_for_step(2).map(|s| s.hostname.as_str()),
            Some("build-1")
        );
        assert_eq!(
            config.server_for_step(3).map(|s| s.hostname.as_str()),
            Some("build-2")
        );
        assert!(config.server_for_step(1).is_none());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = PipelineConfig::default()
            .with_model("gpt-4o")
            .with_docker_enabled(true);

        let yaml = serde_yaml::to_string(&config).expect("serialize");
        let parsed: PipelineConfig = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "model: gpt-4o\nmax_step_retries: 2\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).expect("deserialize");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_step_retries, 2);
        assert_eq!(config.max_solution_retries, 5);
        assert_eq!(config.python_interpreter, "python3");
    }

    #[test]
    fn test_load_or_init_writes_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.yaml");

        let config = PipelineConfig::load_or_init(&path).expect("load");
        assert_eq!(config, PipelineConfig::default());
        assert!(path.exists());

        // Second load reads the file it just wrote.
        let reloaded = PipelineConfig::load_or_init(&path).expect("reload");
        assert_eq!(reloaded, config);
    }
}
