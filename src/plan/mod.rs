//! Plan model and input loading.
//!
//! A plan is an ordered tree of sections, each holding an ordered list of
//! steps. Step order is execution order; steps carry a contiguous 1-based
//! index across the whole plan so files, logs and remote routing can refer
//! to them unambiguously.

pub mod parser;
pub mod problem;

pub use parser::parse_plan;
pub use problem::load_problem;

use std::path::Path;

use crate::error::PlanParseError;

/// One unit of work to generate and execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// 1-based position across the whole plan.
    pub index: usize,
    /// What the generated code is supposed to do. Immutable.
    pub description: String,
}

/// A titled group of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub steps: Vec<Step>,
}

/// An ordered tree of sections and steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub sections: Vec<Section>,
}

impl Plan {
    /// Reads and parses a plan file.
    ///
    /// # Errors
    ///
    /// Returns `PlanParseError` if the file cannot be read or yields no
    /// steps. Both are fatal to the run.
    pub fn load(path: &Path) -> Result<Self, PlanParseError> {
        let content = std::fs::read_to_string(path).map_err(|source| PlanParseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_plan(&content)
    }

    /// All steps in execution order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.sections.iter().flat_map(|s| s.steps.iter())
    }

    /// Total number of steps across all sections.
    pub fn step_count(&self) -> usize {
        self.sections.iter().map(|s| s.steps.len()).sum()
    }
}
