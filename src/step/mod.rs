//! Step processing: model, source transforms, and the executor.
//!
//! A step goes from description to an executed, file-resident artifact:
//! generate → make self-executing → persist → identify the entry class →
//! run (locally or on a configured remote host). Every attempt regenerates
//! from scratch and is recorded, so retry history stays inspectable.

pub mod executor;

pub use executor::StepExecutor;

use std::path::PathBuf;

use regex::Regex;

/// Processing status of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Not yet processed.
    Pending,
    /// Source text exists but has not run successfully.
    Generated,
    /// Ran to completion.
    Executed,
    /// Exhausted its retries.
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Generated => write!(f, "generated"),
            StepStatus::Executed => write!(f, "executed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What a single generate-and-run attempt did.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    GenerationFailed(String),
    PersistFailed(String),
    ExecutionFailed(String),
    Executed { stdout: String },
}

/// One attempt at a step: attempt number plus its outcome. Attempts never
/// reuse earlier generated code.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub number: u32,
    pub outcome: AttemptOutcome,
}

/// The record a processed step leaves behind, in step order, success or
/// not. Retained for assembly and post-run diagnostics.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub index: usize,
    pub description: String,
    pub status: StepStatus,
    /// Callable class name used to invoke the step from the assembled
    /// solution.
    pub entry: Option<String>,
    pub file_path: Option<PathBuf>,
    /// Final source text, kept as generation context for later steps.
    pub source: Option<String>,
    pub stdout: String,
    pub stderr: String,
    /// Attempts actually made.
    pub attempts: u32,
    pub history: Vec<Attempt>,
    /// Hostname this step was routed to, when configured for remote
    /// execution.
    pub remote_host: Option<String>,
}

impl StepResult {
    pub fn new(index: usize, description: impl Into<String>, remote_host: Option<String>) -> Self {
        Self {
            index,
            description: description.into(),
            status: StepStatus::Pending,
            entry: None,
            file_path: None,
            source: None,
            stdout: String::new(),
            stderr: String::new(),
            attempts: 0,
            history: Vec::new(),
            remote_host,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Executed
    }
}

/// Conventional entry class name for a step.
pub fn conventional_entry(index: usize) -> String {
    format!("Step{index}")
}

/// File name a step's artifact is persisted under.
pub fn step_file_name(index: usize) -> String {
    format!("step_{index:03}.py")
}

/// Module name the assembled solution imports a step as.
pub fn step_module_name(index: usize) -> String {
    format!("step_{index:03}")
}

/// Makes generated source self-executing.
///
/// Appends a `__main__` guard instantiating `entry` and calling
/// `execute()` unless the source already has one. Deterministic text
/// transformation, never regeneration.
pub fn inject_main_guard(source: &str, entry: &str) -> String {
    if source.contains("if __name__") {
        return source.to_string();
    }

    format!(
        "{}\n\n\nif __name__ == \"__main__\":\n    step = {}()\n    step.execute()\n",
        source.trim_end(),
        entry
    )
}

/// Best-effort extraction of the first top-level class name.
///
/// Generated text is inherently variable, so absence is not an error;
/// callers fall back to [`conventional_entry`].
pub fn extract_class_name(source: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^class\s+([A-Za-z_][A-Za-z0-9_]*)").expect("invalid class regex");
    re.captures(source).map(|cap| cap[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_helpers() {
        assert_eq!(conventional_entry(3), "Step3");
        assert_eq!(step_file_name(3), "step_003.py");
        assert_eq!(step_file_name(12), "step_012.py");
        assert_eq!(step_module_name(3), "step_003");
    }

    #[test]
    fn test_inject_main_guard_appends() {
        let source = "class Step1:\n    def execute(self):\n        print('ok')";
        let injected = inject_main_guard(source, "Step1");

        assert!(injected.contains("if __name__ == \"__main__\":"));
        assert!(injected.contains("step = Step1()"));
        assert!(injected.contains("step.execute()"));
    }

    #[test]
    fn test_inject_main_guard_idempotent() {
        let source = "class Step1:\n    pass\n\nif __name__ == \"__main__\":\n    Step1().execute()\n";
        assert_eq!(inject_main_guard(source, "Step1"), source);
    }

    #[test]
    fn test_extract_class_name() {
        let source = "import math\n\nclass FlowSolver:\n    def execute(self):\n        pass\n";
        assert_eq!(extract_class_name(source), Some("FlowSolver".to_string()));
    }

    #[test]
    fn test_extract_class_name_ignores_indented_classes() {
        let source = "def outer():\n    class Inner:\n        pass\n";
        assert_eq!(extract_class_name(source), None);
    }

    #[test]
    fn test_extract_class_name_absent() {
        assert_eq!(extract_class_name("print('no class here')"), None);
    }

    #[test]
    fn test_step_result_initial_state() {
        let result = StepResult::new(1, "Compute area", None);
        assert_eq!(result.status, StepStatus::Pending);
        assert_eq!(result.attempts, 0);
        assert!(!result.succeeded());
        assert!(result.history.is_empty());
    }
}
