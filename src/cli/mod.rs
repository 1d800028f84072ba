//! Command-line interface for planforge.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use crate::pipeline::{Pipeline, PipelineConfig, RunState};

/// Plan-driven code generation pipeline.
#[derive(Parser, Debug)]
#[command(name = "planforge")]
#[command(about = "Turn a structured plan and a problem statement into an executed program")]
#[command(version)]
#[command(
    long_about = "planforge parses a plan into ordered steps, generates code for each step with \
an LLM, executes the steps with bounded retries, assembles the survivors into one program, and \
optionally runs it in Docker or ships it to remote hosts.\n\nExample usage:\n  planforge --plan \
plan.txt --problem problem.txt"
)]
pub struct Cli {
    /// Path to the plan file.
    #[arg(long)]
    pub plan: PathBuf,

    /// Path to the problem definition file.
    #[arg(long)]
    pub problem: PathBuf,

    /// Path to the YAML configuration file (written with defaults if
    /// absent).
    #[arg(long, default_value = "planforge.yaml")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides the
    /// configured level; RUST_LOG overrides both.
    #[arg(short, long)]
    pub log_level: Option<String>,
}

/// Parses command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Runs the pipeline for the given arguments and configuration.
///
/// # Errors
///
/// Returns an error (and a non-zero exit) only for fatal outcomes: bad
/// configuration, unreadable plan/problem, or a run aborted by
/// `abort_on_step_failure`. Partial step failures exit 0 and are reported
/// in the summary.
pub async fn run_with_cli(cli: Cli, config: PipelineConfig) -> anyhow::Result<()> {
    let mut pipeline = Pipeline::new(config, cli.plan, cli.problem)?;
    let summary = pipeline.run().await?;

    println!("{}", summary.report());
    info!(
        executed = summary.executed_steps(),
        failed = summary.failed_steps(),
        state = %summary.state,
        "Pipeline run complete"
    );

    if summary.state != RunState::Done {
        anyhow::bail!("Pipeline run aborted");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses_required_flags() {
        let cli = Cli::parse_from(["planforge", "--plan", "plan.txt", "--problem", "problem.txt"]);
        assert_eq!(cli.plan, PathBuf::from("plan.txt"));
        assert_eq!(cli.problem, PathBuf::from("problem.txt"));
        assert_eq!(cli.config, PathBuf::from("planforge.yaml"));
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn test_cli_requires_plan_and_problem() {
        assert!(Cli::try_parse_from(["planforge"]).is_err());
        assert!(Cli::try_parse_from(["planforge", "--plan", "plan.txt"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
