//! planforge: plan-driven code generation pipeline.
//!
//! Parses a structured textual plan into an ordered step graph, generates
//! code for each step through an LLM collaborator, executes the steps with
//! bounded retries, assembles the surviving artifacts into one program,
//! and optionally runs that program inside a Docker container or on
//! remote hosts.

pub mod cli;
pub mod error;
pub mod execution;
pub mod generator;
pub mod llm;
pub mod pipeline;
pub mod plan;
pub mod remote;
pub mod solution;
pub mod step;

// Re-export commonly used error types
pub use error::{
    AssemblyError, DockerError, ExecError, LlmError, PlanParseError, ProblemLoadError,
    RemoteError, StepError,
};
