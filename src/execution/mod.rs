//! Execution layer: local processes and Docker containers.
//!
//! Step and solution artifacts are Python files. Locally they run through
//! the [`ProcessRunner`] collaborator; the assembled solution can also run
//! inside a container built and driven over the Docker API.
//!
//! Container flow:
//! ```text
//! stage build context → build image → remove stale container →
//! create + start → wait → logs → remove
//! ```

pub mod container;
pub mod docker_client;
pub mod process;

pub use container::{ContainerOutcome, ContainerRunner};
pub use docker_client::DockerClient;
pub use process::{ExecOutput, LocalRunner, ProcessRunner};
