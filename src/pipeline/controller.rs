//! The pipeline controller state machine.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::error::{PlanParseError, ProblemLoadError};
use crate::execution::{ContainerRunner, DockerClient, LocalRunner, ProcessRunner};
use crate::generator::{CodeGenerator, GenerationContext, LlmGenerator, PriorStep};
use crate::llm::OpenAiClient;
use crate::plan::{load_problem, Plan};
use crate::remote::{RemoteExecutor, SshDispatcher};
use crate::solution::{Solution, SolutionAssembler};
use crate::step::StepExecutor;

use super::config::{ConfigError, PipelineConfig, RemoteServerConfig};

/// Fatal pipeline errors. Everything else becomes a failure record in the
/// run summary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Plan error: {0}")]
    Plan(#[from] PlanParseError),

    #[error("Problem error: {0}")]
    Problem(#[from] ProblemLoadError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

/// States of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    PlanLoaded,
    ProblemLoaded,
    StepsProcessing,
    Assembling,
    ContainerExecuting,
    RemoteDispatching,
    Done,
    Aborted,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::PlanLoaded => "plan_loaded",
            RunState::ProblemLoaded => "problem_loaded",
            RunState::StepsProcessing => "steps_processing",
            RunState::Assembling => "assembling",
            RunState::ContainerExecuting => "container_executing",
            RunState::RemoteDispatching => "remote_dispatching",
            RunState::Done => "done",
            RunState::Aborted => "aborted",
        };
        write!(f, "{name}")
    }
}

/// Outcome of the containerized execution stage.
#[derive(Debug, Clone)]
pub struct ContainerReport {
    /// Attempts made at the build-and-run sequence.
    pub attempts: u32,
    /// Container exit code, when a run completed.
    pub exit_code: Option<i64>,
    pub logs: String,
    /// Build/run error from the last attempt, if the stage never
    /// completed.
    pub error: Option<String>,
}

impl ContainerReport {
    pub fn success(&self) -> bool {
        self.error.is_none() && self.exit_code == Some(0)
    }
}

/// Outcome of deploying the solution to one remote host.
#[derive(Debug, Clone)]
pub struct RemoteDeployment {
    pub hostname: String,
    pub error: Option<String>,
}

impl RemoteDeployment {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything a run leaves behind.
#[derive(Debug)]
pub struct RunSummary {
    pub state: RunState,
    pub step_results: Vec<crate::step::StepResult>,
    pub solution: Option<Solution>,
    /// Why assembly produced no solution, when it didn't.
    pub assembly_error: Option<String>,
    pub container: Option<ContainerReport>,
    pub remote_deployments: Vec<RemoteDeployment>,
}

impl RunSummary {
    pub fn executed_steps(&self) -> usize {
        self.step_results.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed_steps(&self) -> usize {
        self.step_results.len() - self.executed_steps()
    }

    /// Human-readable per-step and per-solution report.
    pub fn report(&self) -> String {
        let mut lines = vec![format!("Run finished: {}", self.state)];

        for result in &self.step_results {
            let mut line = format!(
                "  step {}: {} (attempts: {})",
                result.index, result.status, result.attempts
            );
            if let Some(host) = &result.remote_host {
                line.push_str(&format!(" [remote: {host}]"));
            }
            lines.push(line);
        }

        match (&self.solution, &self.assembly_error) {
            (Some(solution), _) => {
                lines.push(format!(
                    "  solution: {} (attempts: {}, steps included: {}, omitted: {})",
                    if solution.success { "executed" } else { "failed" },
                    solution.attempts,
                    solution.included_steps.len(),
                    solution.omitted_steps.len(),
                ));
            }
            (None, Some(reason)) => lines.push(format!("  solution: not assembled ({reason})")),
            (None, None) => lines.push("  solution: not reached".to_string()),
        }

        if let Some(container) = &self.container {
            lines.push(match (&container.error, container.exit_code) {
                (Some(err), _) => format!("  container: failed ({err})"),
                (None, Some(code)) => format!("  container: exit code {code}"),
                (None, None) => "  container: no outcome".to_string(),
            });
        }

        for deployment in &self.remote_deployments {
            lines.push(match &deployment.error {
                Some(err) => format!("  remote {}: failed ({err})", deployment.hostname),
                None => format!("  remote {}: deployed", deployment.hostname),
            });
        }

        lines.join("\n")
    }
}

/// Wires the components into the end-to-end control flow.
///
/// Steps and the solution are processed strictly sequentially: later
/// steps' generation context depends on earlier steps' artifacts, so
/// nothing here runs two steps at once.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    plan_path: PathBuf,
    problem_path: PathBuf,
    generator: Arc<dyn CodeGenerator>,
    runner: Arc<dyn ProcessRunner>,
    remote: Arc<dyn RemoteExecutor>,
    state: RunState,
}

impl Pipeline {
    /// Creates a pipeline with production collaborators.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` if configuration is invalid or the LLM
    /// client cannot be constructed from the environment.
    pub fn new(
        config: PipelineConfig,
        plan_path: PathBuf,
        problem_path: PathBuf,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let client = OpenAiClient::from_env()
            .map_err(|e| PipelineError::InitializationFailed(e.to_string()))?;
        let generator = LlmGenerator::new(
            Box::new(client),
            config.model.clone(),
            config.temperature,
            config.max_generation_tokens,
        );
        let runner = LocalRunner::new(
            config.python_interpreter.clone(),
            std::time::Duration::from_secs(config.step_timeout_secs),
        );

        Ok(Self::with_collaborators(
            config,
            plan_path,
            problem_path,
            Arc::new(generator),
            Arc::new(runner),
            Arc::new(SshDispatcher::new()),
        ))
    }

    /// Creates a pipeline with explicit collaborators.
    pub fn with_collaborators(
        config: PipelineConfig,
        plan_path: PathBuf,
        problem_path: PathBuf,
        generator: Arc<dyn CodeGenerator>,
        runner: Arc<dyn ProcessRunner>,
        remote: Arc<dyn RemoteExecutor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            plan_path,
            problem_path,
            generator,
            runner,
            remote,
            state: RunState::Init,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "Pipeline state transition");
        self.state = next;
    }

    /// Runs the pipeline to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` only for fatal load failures; step,
    /// solution, container and remote failures are recorded in the
    /// returned [`RunSummary`].
    pub async fn run(&mut self) -> Result<RunSummary, PipelineError> {
        let plan = match Plan::load(&self.plan_path) {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, "Aborting: plan failed to load");
                self.transition(RunState::Aborted);
                return Err(e.into());
            }
        };
        self.transition(RunState::PlanLoaded);
        info!(
            sections = plan.sections.len(),
            steps = plan.step_count(),
            "Loaded plan"
        );

        let problem = match load_problem(&self.problem_path) {
            Ok(problem) => problem,
            Err(e) => {
                error!(error = %e, "Aborting: problem failed to load");
                self.transition(RunState::Aborted);
                return Err(e.into());
            }
        };
        self.transition(RunState::ProblemLoaded);

        // Step processing, strictly in plan order.
        self.transition(RunState::StepsProcessing);
        let executor = StepExecutor::new(
            Arc::clone(&self.config),
            Arc::clone(&self.generator),
            Arc::clone(&self.runner),
            Arc::clone(&self.remote),
        );

        let mut context = GenerationContext::new();
        let mut step_results = Vec::new();

        for step in plan.steps() {
            let result = executor.process_step(step, &problem, &context).await;

            if result.succeeded() {
                context.push(PriorStep {
                    index: result.index,
                    entry: result.entry.clone().unwrap_or_default(),
                    source: result.source.clone().unwrap_or_default(),
                });
            } else if self.config.abort_on_step_failure {
                warn!(step = result.index, "Aborting run on step failure");
                step_results.push(result);
                self.transition(RunState::Aborted);
                return Ok(RunSummary {
                    state: self.state,
                    step_results,
                    solution: None,
                    assembly_error: None,
                    container: None,
                    remote_deployments: Vec::new(),
                });
            }

            step_results.push(result);
        }

        // Assembly runs regardless of individual step outcomes.
        self.transition(RunState::Assembling);
        let assembler = SolutionAssembler::new(Arc::clone(&self.config), Arc::clone(&self.runner));
        let (solution, assembly_error) = match assembler.assemble(&step_results) {
            Ok(assembled) => (Some(assembler.execute(assembled).await), None),
            Err(e) => {
                warn!(error = %e, "Assembly produced no solution");
                (None, Some(e.to_string()))
            }
        };

        let container = self.container_stage(solution.as_ref()).await;
        let remote_deployments = self.remote_stage(solution.as_ref()).await;

        self.transition(RunState::Done);
        Ok(RunSummary {
            state: self.state,
            step_results,
            solution,
            assembly_error,
            container,
            remote_deployments,
        })
    }

    /// Whether deploy-shaped stages apply to this solution outcome.
    fn should_dispatch(&self, solution: &Solution) -> bool {
        solution.success || self.config.deploy_failed_solution
    }

    /// Containerized execution, retried as a whole on build/run errors.
    async fn container_stage(&mut self, solution: Option<&Solution>) -> Option<ContainerReport> {
        if !self.config.docker.enabled {
            return None;
        }
        let solution = solution?;
        if !self.should_dispatch(solution) {
            info!("Skipping container stage: solution failed locally");
            return None;
        }

        self.transition(RunState::ContainerExecuting);

        let max_retries = self.config.max_solution_retries;
        let mut last_error = String::new();

        for attempt in 1..=max_retries {
            let client = match DockerClient::new() {
                Ok(client) => client,
                Err(e) => {
                    warn!(attempt, error = %e, "Container stage failed");
                    last_error = e.to_string();
                    continue;
                }
            };
            let runner = ContainerRunner::new(
                client,
                self.config.docker.base_image.clone(),
                self.config.docker.image_tag.clone(),
                self.config.docker.container_name.clone(),
            );

            match runner.execute(&self.config.solution_directory).await {
                Ok(outcome) => {
                    return Some(ContainerReport {
                        attempts: attempt,
                        exit_code: Some(outcome.exit_code),
                        logs: outcome.logs,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Container stage failed");
                    last_error = e.to_string();
                }
            }
        }

        Some(ContainerReport {
            attempts: max_retries,
            exit_code: None,
            logs: String::new(),
            error: Some(last_error),
        })
    }

    /// Ships the solution to every host flagged for whole-solution
    /// execution. Failures are per-host records; one bad host does not
    /// stop the others.
    async fn remote_stage(&mut self, solution: Option<&Solution>) -> Vec<RemoteDeployment> {
        let Some(solution) = solution else {
            return Vec::new();
        };
        if !self.should_dispatch(solution) {
            return Vec::new();
        }

        let targets: Vec<RemoteServerConfig> = self
            .config
            .remote_servers
            .iter()
            .filter(|s| s.execute_remotely)
            .cloned()
            .collect();
        if targets.is_empty() {
            return Vec::new();
        }

        self.transition(RunState::RemoteDispatching);

        let mut deployments = Vec::new();
        for server in targets {
            info!(host = %server.hostname, "Dispatching solution to remote host");
            let error = self
                .remote
                .deploy_solution(&server, &self.config.solution_directory)
                .await
                .err()
                .map(|e| {
                    warn!(host = %server.hostname, error = %e, "Remote deployment failed");
                    e.to_string()
                });
            deployments.push(RemoteDeployment {
                hostname: server.hostname.clone(),
                error,
            });
        }
        deployments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::Init.to_string(), "init");
        assert_eq!(RunState::StepsProcessing.to_string(), "steps_processing");
        assert_eq!(RunState::Done.to_string(), "done");
        assert_eq!(RunState::Aborted.to_string(), "aborted");
    }

    #[test]
    fn test_container_report_success() {
        let ok = ContainerReport {
            attempts: 1,
            exit_code: Some(0),
            logs: String::new(),
            error: None,
        };
        assert!(ok.success());

        let nonzero = ContainerReport {
            attempts: 1,
            exit_code: Some(3),
            logs: String::new(),
            error: None,
        };
        assert!(!nonzero.success());

        let errored = ContainerReport {
            attempts: 2,
            exit_code: None,
            logs: String::new(),
            error: Some("daemon unavailable".to_string()),
        };
        assert!(!errored.success());
    }

    #[test]
    fn test_summary_report_covers_units() {
        use crate::step::{StepResult, StepStatus};

        let mut executed = StepResult::new(1, "first", None);
        executed.status = StepStatus::Executed;
        executed.attempts = 1;
        let mut failed = StepResult::new(2, "second", Some("build-1".to_string()));
        failed.status = StepStatus::Failed;
        failed.attempts = 2;

        let summary = RunSummary {
            state: RunState::Done,
            step_results: vec![executed, failed],
            solution: None,
            assembly_error: Some("No successfully executed steps to assemble".to_string()),
            container: None,
            remote_deployments: vec![RemoteDeployment {
                hostname: "build-1".to_string(),
                error: Some("unreachable".to_string()),
            }],
        };

        let report = summary.report();
        assert!(report.contains("Run finished: done"));
        assert!(report.contains("step 1: executed (attempts: 1)"));
        assert!(report.contains("step 2: failed (attempts: 2) [remote: build-1]"));
        assert!(report.contains("not assembled"));
        assert!(report.contains("remote build-1: failed"));

        assert_eq!(summary.executed_steps(), 1);
        assert_eq!(summary.failed_steps(), 1);
    }
}
