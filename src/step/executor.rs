//! Drives one step from description to an executed artifact.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::StepError;
use crate::execution::{ExecOutput, ProcessRunner};
use crate::generator::{CodeGenerator, GenerationContext};
use crate::pipeline::config::{PipelineConfig, RemoteServerConfig};
use crate::plan::Step;
use crate::remote::RemoteExecutor;

use super::{
    conventional_entry, extract_class_name, inject_main_guard, step_file_name, Attempt,
    AttemptOutcome, StepResult, StepStatus,
};

/// What a successful attempt produced.
struct AttemptArtifact {
    source: String,
    entry: String,
    file_path: PathBuf,
    output: ExecOutput,
}

/// Executes steps against the configured collaborators.
///
/// Owns no per-step state; each call to [`StepExecutor::process_step`]
/// produces a fresh [`StepResult`]. Retries are bounded by
/// `max_step_retries` and regenerate the code from scratch every time;
/// a failure may well be the generated code's fault, so stale code is
/// never re-executed.
pub struct StepExecutor {
    config: Arc<PipelineConfig>,
    generator: Arc<dyn CodeGenerator>,
    runner: Arc<dyn ProcessRunner>,
    remote: Arc<dyn RemoteExecutor>,
}

impl StepExecutor {
    pub fn new(
        config: Arc<PipelineConfig>,
        generator: Arc<dyn CodeGenerator>,
        runner: Arc<dyn ProcessRunner>,
        remote: Arc<dyn RemoteExecutor>,
    ) -> Self {
        Self {
            config,
            generator,
            runner,
            remote,
        }
    }

    /// Processes one step to completion or retry exhaustion.
    ///
    /// Always returns a `StepResult`; failures are recorded, not
    /// propagated. Exactly one file slot is written per step; retries
    /// overwrite it.
    pub async fn process_step(
        &self,
        step: &Step,
        problem: &str,
        context: &GenerationContext,
    ) -> StepResult {
        let server = self.config.server_for_step(step.index);
        let mut result = StepResult::new(
            step.index,
            step.description.clone(),
            server.map(|s| s.hostname.clone()),
        );

        let max_retries = self.config.max_step_retries;
        let mut last_failure: Option<String> = None;

        for attempt in 1..=max_retries {
            result.attempts = attempt;
            info!(step = step.index, attempt, max_retries, "Processing step");

            match self
                .attempt_step(step, problem, context, last_failure.as_deref(), server)
                .await
            {
                Ok(artifact) => {
                    result.status = StepStatus::Executed;
                    result.entry = Some(artifact.entry);
                    result.file_path = Some(artifact.file_path);
                    result.source = Some(artifact.source);
                    result.stdout = artifact.output.stdout.clone();
                    result.stderr = artifact.output.stderr;
                    result.history.push(Attempt {
                        number: attempt,
                        outcome: AttemptOutcome::Executed {
                            stdout: artifact.output.stdout,
                        },
                    });
                    info!(step = step.index, attempt, "Step executed");
                    return result;
                }
                Err(error) => {
                    warn!(
                        step = step.index,
                        attempt,
                        error = %error,
                        "Step attempt failed"
                    );

                    let outcome = match &error {
                        StepError::Generation(e) => AttemptOutcome::GenerationFailed(e.to_string()),
                        StepError::Persist { .. } => AttemptOutcome::PersistFailed(error.to_string()),
                        _ => {
                            // Execution-shaped failures: carry diagnostics
                            // into the next generation attempt.
                            last_failure = Some(error.to_string());
                            result.status = StepStatus::Generated;
                            AttemptOutcome::ExecutionFailed(error.to_string())
                        }
                    };
                    result.stderr = error.to_string();
                    result.history.push(Attempt {
                        number: attempt,
                        outcome,
                    });

                    if !error.is_retryable() {
                        break;
                    }
                }
            }
        }

        result.status = StepStatus::Failed;
        warn!(
            step = step.index,
            attempts = result.attempts,
            "Step failed after exhausting retries"
        );
        result
    }

    /// One generate → transform → persist → identify → execute pass.
    async fn attempt_step(
        &self,
        step: &Step,
        problem: &str,
        context: &GenerationContext,
        last_failure: Option<&str>,
        server: Option<&RemoteServerConfig>,
    ) -> Result<AttemptArtifact, StepError> {
        let retry_context = match last_failure {
            Some(failure) => context.with_failure(failure),
            None => context.clone(),
        };

        let generated = self
            .generator
            .generate(problem, step, &retry_context)
            .await?;

        let conventional = conventional_entry(step.index);
        let source = inject_main_guard(&generated, &conventional);

        let steps_dir = self.config.steps_directory();
        let file_path = steps_dir.join(step_file_name(step.index));
        std::fs::create_dir_all(&steps_dir).map_err(|source| StepError::Persist {
            path: steps_dir.display().to_string(),
            source,
        })?;
        std::fs::write(&file_path, &source).map_err(|e| StepError::Persist {
            path: file_path.display().to_string(),
            source: e,
        })?;

        let entry = match extract_class_name(&source) {
            Some(name) => name,
            None => {
                warn!(
                    step = step.index,
                    fallback = %conventional,
                    "No class declaration found; using conventional entry name"
                );
                conventional
            }
        };

        let output = match server {
            Some(server) => self.remote.run_step(server, &file_path).await?,
            None => {
                self.runner
                    .run(&file_path, &self.config.solution_directory)
                    .await?
            }
        };

        if !output.success() {
            return Err(StepError::Execution {
                exit_code: output.exit_code,
                stderr: if output.stderr.is_empty() {
                    output.stdout
                } else {
                    output.stderr
                },
            });
        }

        Ok(AttemptArtifact {
            source,
            entry,
            file_path,
            output,
        })
    }
}
