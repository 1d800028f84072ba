//! Plan text parsing.
//!
//! Plans are plain text. Sections are separated by a literal `---` line,
//! introduced by a `## <n>. **<title>**` header and followed by
//! `<n>. **<description>**:` step lines. Prose between matches is ignored,
//! so the format tolerates the commentary LLM-written plans tend to carry.

use regex::Regex;
use tracing::{debug, warn};

use super::{Plan, Section, Step};
use crate::error::PlanParseError;

/// Parses raw plan text into a [`Plan`].
///
/// Chunks that match neither the section nor the step pattern are
/// discarded, not errors. Emitted order is input order.
///
/// # Errors
///
/// Returns [`PlanParseError::NoSteps`] if the text yields zero steps
/// overall.
pub fn parse_plan(content: &str) -> Result<Plan, PlanParseError> {
    let section_re = Regex::new(r"(?m)^##\s+\d+\.\s+\*\*(.+?)\*\*").expect("invalid section regex");
    let step_re = Regex::new(r"(?m)^\s*\d+\.\s+\*\*(.+?)\*\*:").expect("invalid step regex");

    let mut sections = Vec::new();
    let mut index = 0usize;

    for chunk in content.split("---") {
        let Some(header) = section_re.captures(chunk) else {
            if !chunk.trim().is_empty() {
                debug!("Discarding plan chunk without a section header");
            }
            continue;
        };
        let title = header[1].trim().to_string();

        let steps: Vec<Step> = step_re
            .captures_iter(chunk)
            .map(|cap| {
                index += 1;
                Step {
                    index,
                    description: cap[1].trim().trim_end_matches(':').to_string(),
                }
            })
            .collect();

        if steps.is_empty() {
            warn!(section = %title, "No steps found in section");
            continue;
        }

        sections.push(Section { title, steps });
    }

    if index == 0 {
        return Err(PlanParseError::NoSteps);
    }

    Ok(Plan { sections })
}
