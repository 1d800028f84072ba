//! Pipeline orchestration.
//!
//! This module owns the end-to-end control flow: load the plan and the
//! problem, drive each step through the step executor, assemble and run
//! the combined solution, then hand it to the container and remote stages
//! when configuration asks for them.
//!
//! # Run states
//!
//! ```text
//! Init → PlanLoaded → ProblemLoaded → StepsProcessing → Assembling
//!      → [ContainerExecuting] → [RemoteDispatching] → Done | Aborted
//! ```
//!
//! Load failures abort the run: malformed inputs are a configuration
//! error, not a transient one. A step exhausting its retries does not
//! abort by default; it is recorded as failed and excluded from assembly
//! (`abort_on_step_failure` flips that). The run always terminates in
//! `Done` or `Aborted` with a [`RunSummary`] covering every unit.
//!
//! # Example
//!
//! ```rust,ignore
//! use planforge::pipeline::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::load_or_init(Path::new("planforge.yaml"))?;
//! let mut pipeline = Pipeline::new(config, "plan.txt".into(), "problem.txt".into())?;
//! let summary = pipeline.run().await?;
//! println!("{}", summary.report());
//! ```

pub mod config;
pub mod controller;

pub use config::{ConfigError, DockerConfig, PipelineConfig, RemoteServerConfig};
pub use controller::{
    ContainerReport, Pipeline, PipelineError, RemoteDeployment, RunState, RunSummary,
};
