//! Code generation collaborator.
//!
//! The pipeline treats generation as an external service: give it the
//! problem, one step description, and what came before; get source text
//! back. [`CodeGenerator`] is that seam, and [`LlmGenerator`] is the
//! production implementation on top of the chat client.

pub mod prompts;

use async_trait::async_trait;
use tracing::debug;

use crate::error::LlmError;
use crate::llm::{ChatRequest, LlmProvider, Message};
use crate::plan::Step;

/// Code generated for an earlier step, carried as context for later ones.
#[derive(Debug, Clone)]
pub struct PriorStep {
    pub index: usize,
    pub entry: String,
    pub source: String,
}

/// Accumulated context passed to every generation call.
///
/// Grows as steps succeed; a retry attaches the last failure diagnostics
/// without mutating the shared history.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    prior_steps: Vec<PriorStep>,
    last_failure: Option<String>,
}

impl GenerationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successfully executed step's source.
    pub fn push(&mut self, prior: PriorStep) {
        self.prior_steps.push(prior);
    }

    /// Returns a copy carrying the given failure diagnostics.
    pub fn with_failure(&self, failure: impl Into<String>) -> Self {
        Self {
            prior_steps: self.prior_steps.clone(),
            last_failure: Some(failure.into()),
        }
    }

    pub fn prior_steps(&self) -> &[PriorStep] {
        &self.prior_steps
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }
}

/// Trait for backends that turn a step description into source text.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Generates source for one step.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` if the backend fails or produces no usable text.
    /// Callers treat every variant as retryable.
    async fn generate(
        &self,
        problem: &str,
        step: &Step,
        context: &GenerationContext,
    ) -> Result<String, LlmError>;
}

/// LLM-backed code generator.
pub struct LlmGenerator {
    provider: Box<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl LlmGenerator {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        model: impl Into<String>,
        temperature: f64,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl CodeGenerator for LlmGenerator {
    async fn generate(
        &self,
        problem: &str,
        step: &Step,
        context: &GenerationContext,
    ) -> Result<String, LlmError> {
        let request = ChatRequest::new(
            &self.model,
            vec![
                Message::system(prompts::GENERATOR_SYSTEM_PROMPT),
                Message::user(prompts::step_prompt(problem, step, context)),
            ],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let response = self.provider.complete(request).await?;
        let content = response.first_content().ok_or(LlmError::EmptyResponse)?;

        let code = strip_code_fences(content).trim().to_string();
        if code.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        debug!(step = step.index, bytes = code.len(), "Generated step code");
        Ok(code)
    }
}

/// Removes a surrounding markdown code fence, if present.
///
/// Models answer with ```` ```python ... ``` ```` blocks no matter how
/// firmly the prompt forbids it, so the fence is handled here rather than
/// trusted away.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("python", "py", or nothing) up to the newline.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => return trimmed,
    };
    body.strip_suffix("```").map(str::trim).unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_plain_text() {
        assert_eq!(strip_code_fences("class Step1: pass"), "class Step1: pass");
    }

    #[test]
    fn test_strip_code_fences_python_block() {
        let fenced = "```python\nclass Step1:\n    pass\n```";
        assert_eq!(strip_code_fences(fenced), "class Step1:\n    pass");
    }

    #[test]
    fn test_strip_code_fences_bare_block() {
        let fenced = "```\nprint('x')\n```";
        assert_eq!(strip_code_fences(fenced), "print('x')");
    }

    #[test]
    fn test_strip_code_fences_unterminated_block_kept() {
        let fenced = "```python\nprint('x')";
        assert_eq!(strip_code_fences(fenced), fenced);
    }

    #[test]
    fn test_generation_context_with_failure_preserves_history() {
        let mut context = GenerationContext::new();
        context.push(PriorStep {
            index: 1,
            entry: "Step1".to_string(),
            source: "class Step1: pass".to_string(),
        });

        let retry = context.with_failure("boom");
        assert_eq!(retry.prior_steps().len(), 1);
        assert_eq!(retry.last_failure(), Some("boom"));
        // The shared history is untouched.
        assert!(context.last_failure().is_none());
    }
}
