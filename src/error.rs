//! Error types for planforge operations.
//!
//! One enum per subsystem:
//! - Plan parsing and problem loading (fatal: the run aborts)
//! - Step generation/persistence/execution (step-scoped, retried)
//! - Solution assembly and execution
//! - Docker image build and container runs
//! - Remote transfer and execution
//! - LLM API interactions

use thiserror::Error;

/// Errors raised while turning plan text into a step graph.
///
/// Plan errors are fatal: a malformed plan is a configuration problem,
/// not a transient one.
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("Failed to read plan file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No steps found in plan text")]
    NoSteps,
}

/// Errors raised while loading the problem definition.
#[derive(Debug, Error)]
pub enum ProblemLoadError {
    #[error("Failed to read problem file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Problem definition is empty")]
    Empty,
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: PLANFORGE_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Model returned no content")]
    EmptyResponse,
}

/// Errors that can occur while running a program on the local host.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Execution timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

/// Errors scoped to a single step.
///
/// Generation and execution failures are retryable: the step is regenerated
/// from scratch on the next attempt. Persistence failures are not; a host
/// that cannot write the step file will not recover by regenerating it.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Code generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error("Failed to persist step file '{path}': {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Step exited with code {exit_code}: {stderr}")]
    Execution { exit_code: i32, stderr: String },

    #[error("Step execution failed: {0}")]
    Exec(#[from] ExecError),

    #[error("Remote execution failed: {0}")]
    Remote(#[from] RemoteError),
}

impl StepError {
    /// Whether the failure is worth another generate-and-run attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StepError::Persist { .. })
    }
}

/// Errors scoped to solution assembly and execution.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("No successfully executed steps to assemble")]
    NoExecutedSteps,

    #[error("Failed to write solution file '{path}': {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during Docker operations.
#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Docker build failed: {0}")]
    BuildFailed(String),

    #[error("Docker run failed: {0}")]
    RunFailed(String),

    #[error("Docker daemon not available: {0}")]
    DaemonUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while dispatching work to a remote host.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transfer to {host} failed: {stderr}")]
    Transfer { host: String, stderr: String },

    #[error("Remote execution on {host} exited with code {exit_code}: {stderr}")]
    Execution {
        host: String,
        exit_code: i32,
        stderr: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_retryability() {
        let gen = StepError::Generation(LlmError::EmptyResponse);
        assert!(gen.is_retryable());

        let exec = StepError::Execution {
            exit_code: 1,
            stderr: "Traceback".to_string(),
        };
        assert!(exec.is_retryable());

        let persist = StepError::Persist {
            path: "steps/step_001.py".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!persist.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = PlanParseError::NoSteps;
        assert!(err.to_string().contains("No steps"));

        let err = LlmError::ApiError {
            code: 429,
            message: "rate limited".to_string(),
        };
        assert!(err.to_string().contains("429"));

        let err = RemoteError::Execution {
            host: "build-1".to_string(),
            exit_code: 2,
            stderr: "python3: not found".to_string(),
        };
        assert!(err.to_string().contains("build-1"));
        assert!(err.to_string().contains("not found"));
    }
}
