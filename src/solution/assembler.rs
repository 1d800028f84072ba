//! Builds `main.py` from step artifacts and executes it.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::AssemblyError;
use crate::execution::ProcessRunner;
use crate::pipeline::config::PipelineConfig;
use crate::step::{step_module_name, StepResult};

use super::Solution;

/// Name of the assembled solution file, overwritten on every run.
const SOLUTION_FILE: &str = "main.py";

/// An assembled solution that has not run yet.
#[derive(Debug)]
pub struct AssembledSolution {
    pub file_path: PathBuf,
    pub code: String,
    pub included_steps: Vec<usize>,
    pub omitted_steps: Vec<usize>,
}

/// Merges step artifacts into one program and runs it with bounded
/// retries.
pub struct SolutionAssembler {
    config: Arc<PipelineConfig>,
    runner: Arc<dyn ProcessRunner>,
}

impl SolutionAssembler {
    pub fn new(config: Arc<PipelineConfig>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    /// Concatenates successful steps, in step order, into `main.py`.
    ///
    /// # Errors
    ///
    /// Returns `AssemblyError::NoExecutedSteps` when nothing survived step
    /// processing, or `AssemblyError::Persist` on write failure. Both are
    /// reported by the controller, not thrown past it.
    pub fn assemble(&self, results: &[StepResult]) -> Result<AssembledSolution, AssemblyError> {
        let mut included = Vec::new();
        let mut omitted = Vec::new();

        let mut imports = String::new();
        let mut body = String::new();

        for result in results {
            let (Some(entry), true) = (result.entry.as_deref(), result.succeeded()) else {
                omitted.push(result.index);
                continue;
            };

            let module = step_module_name(result.index);
            imports.push_str(&format!("from steps.{module} import {entry}\n"));
            body.push_str(&format!(
                "    step{index} = {entry}()\n    step{index}.execute()\n\n",
                index = result.index,
                entry = entry,
            ));
            included.push(result.index);
        }

        if included.is_empty() {
            return Err(AssemblyError::NoExecutedSteps);
        }

        let code = format!(
            "{imports}\n\ndef main():\n{body}\nif __name__ == \"__main__\":\n    main()\n"
        );

        let file_path = self.config.solution_directory.join(SOLUTION_FILE);
        std::fs::create_dir_all(&self.config.solution_directory).map_err(|source| {
            AssemblyError::Persist {
                path: self.config.solution_directory.display().to_string(),
                source,
            }
        })?;
        std::fs::write(&file_path, &code).map_err(|source| AssemblyError::Persist {
            path: file_path.display().to_string(),
            source,
        })?;

        info!(
            path = %file_path.display(),
            included = included.len(),
            omitted = omitted.len(),
            "Assembled solution"
        );

        Ok(AssembledSolution {
            file_path,
            code,
            included_steps: included,
            omitted_steps: omitted,
        })
    }

    /// Executes the assembled solution with bounded retries.
    ///
    /// Exhausting retries yields a `Solution` flagged as failed with the
    /// last captured diagnostics; the outcome is reported, never thrown,
    /// so downstream container/remote stages stay reachable by policy.
    pub async fn execute(&self, assembled: AssembledSolution) -> Solution {
        let max_retries = self.config.max_solution_retries;
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut attempts = 0;

        for attempt in 1..=max_retries {
            attempts = attempt;
            info!(attempt, max_retries, "Executing assembled solution");

            match self
                .runner
                .run(&assembled.file_path, &self.config.solution_directory)
                .await
            {
                Ok(output) if output.success() => {
                    info!(attempt, "Solution executed");
                    return Solution {
                        file_path: assembled.file_path,
                        code: assembled.code,
                        included_steps: assembled.included_steps,
                        omitted_steps: assembled.omitted_steps,
                        stdout: output.stdout,
                        stderr: output.stderr,
                        attempts,
                        success: true,
                    };
                }
                Ok(output) => {
                    warn!(
                        attempt,
                        exit_code = output.exit_code,
                        "Solution execution failed"
                    );
                    stdout = output.stdout;
                    stderr = output.stderr;
                }
                Err(error) => {
                    warn!(attempt, error = %error, "Solution execution failed to run");
                    stderr = error.to_string();
                }
            }
        }

        warn!(attempts, "Solution failed after exhausting retries");
        Solution {
            file_path: assembled.file_path,
            code: assembled.code,
            included_steps: assembled.included_steps,
            omitted_steps: assembled.omitted_steps,
            stdout,
            stderr,
            attempts,
            success: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecError;
    use crate::execution::ExecOutput;
    use crate::step::{StepResult, StepStatus};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    struct ScriptedRunner {
        outputs: Mutex<Vec<ExecOutput>>,
    }

    impl ScriptedRunner {
        fn new(outputs: Vec<ExecOutput>) -> Self {
            Self {
                outputs: Mutex::new(outputs),
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for ScriptedRunner {
        async fn run(&self, _file: &Path, _cwd: &Path) -> Result<ExecOutput, ExecError> {
            let mut outputs = self.outputs.lock().expect("lock");
            assert!(!outputs.is_empty(), "runner invoked more times than scripted");
            Ok(outputs.remove(0))
        }
    }

    fn executed_step(index: usize, entry: &str) -> StepResult {
        let mut result = StepResult::new(index, format!("step {index}"), None);
        result.status = StepStatus::Executed;
        result.entry = Some(entry.to_string());
        result
    }

    fn failed_step(index: usize) -> StepResult {
        let mut result = StepResult::new(index, format!("step {index}"), None);
        result.status = StepStatus::Failed;
        result
    }

    fn assembler(dir: &Path, retries: u32, outputs: Vec<ExecOutput>) -> SolutionAssembler {
        let config = Arc::new(
            PipelineConfig::default()
                .with_solution_directory(dir)
                .with_max_solution_retries(retries),
        );
        SolutionAssembler::new(config, Arc::new(ScriptedRunner::new(outputs)))
    }

    #[test]
    fn test_assemble_omits_failed_steps() {
        let dir = tempfile::tempdir().expect("temp dir");
        let assembler = assembler(dir.path(), 1, vec![]);

        let results = vec![
            executed_step(1, "Step1"),
            failed_step(2),
            executed_step(3, "FlowSolver"),
        ];
        let assembled = assembler.assemble(&results).expect("assemble");

        assert_eq!(assembled.included_steps, vec![1, 3]);
        assert_eq!(assembled.omitted_steps, vec![2]);

        // Step 1 before step 3, step 2 nowhere.
        assert!(assembled.code.contains("from steps.step_001 import Step1"));
        assert!(assembled.code.contains("from steps.step_003 import FlowSolver"));
        assert!(!assembled.code.contains("step_002"));
        let pos1 = assembled.code.find("step1 = Step1()").expect("step1 call");
        let pos3 = assembled.code.find("step3 = FlowSolver()").expect("step3 call");
        assert!(pos1 < pos3);

        // Persisted at the fixed solution path.
        let written =
            std::fs::read_to_string(dir.path().join("main.py")).expect("main.py on disk");
        assert_eq!(written, assembled.code);
    }

    #[test]
    fn test_assemble_with_no_executed_steps_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let assembler = assembler(dir.path(), 1, vec![]);

        let result = assembler.assemble(&[failed_step(1), failed_step(2)]);
        assert!(matches!(result, Err(AssemblyError::NoExecutedSteps)));
    }

    #[test]
    fn test_assemble_overwrites_prior_run() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("main.py"), "stale").expect("seed stale file");

        let assembler = assembler(dir.path(), 1, vec![]);
        let assembled = assembler
            .assemble(&[executed_step(1, "Step1")])
            .expect("assemble");

        let written =
            std::fs::read_to_string(dir.path().join("main.py")).expect("main.py on disk");
        assert_ne!(written, "stale");
        assert_eq!(written, assembled.code);
    }

    #[tokio::test]
    async fn test_execute_succeeds_on_retry() {
        let dir = tempfile::tempdir().expect("temp dir");
        let assembler = assembler(
            dir.path(),
            3,
            vec![
                ExecOutput {
                    stdout: String::new(),
                    stderr: "ModuleNotFoundError".to_string(),
                    exit_code: 1,
                },
                ExecOutput {
                    stdout: "all steps done".to_string(),
                    stderr: String::new(),
                    exit_code: 0,
                },
            ],
        );

        let assembled = assembler
            .assemble(&[executed_step(1, "Step1")])
            .expect("assemble");
        let solution = assembler.execute(assembled).await;

        assert!(solution.success);
        assert_eq!(solution.attempts, 2);
        assert_eq!(solution.stdout, "all steps done");
    }

    #[tokio::test]
    async fn test_execute_reports_failure_after_retries() {
        let dir = tempfile::tempdir().expect("temp dir");
        let failing = ExecOutput {
            stdout: String::new(),
            stderr: "Traceback".to_string(),
            exit_code: 1,
        };
        let assembler = assembler(dir.path(), 2, vec![failing.clone(), failing]);

        let assembled = assembler
            .assemble(&[executed_step(1, "Step1")])
            .expect("assemble");
        let solution = assembler.execute(assembled).await;

        assert!(!solution.success);
        assert_eq!(solution.attempts, 2);
        assert!(solution.stderr.contains("Traceback"));
        assert!(!solution.is_partial());
    }
}
