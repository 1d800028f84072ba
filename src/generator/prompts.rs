//! Prompts for step code generation.

use crate::plan::Step;

use super::GenerationContext;

/// System prompt for every generation call.
pub const GENERATOR_SYSTEM_PROMPT: &str =
    "You are a professional Python programmer. You write correct, self-contained \
     Python modules and reply with code only, never with explanations.";

/// Builds the user prompt for one step generation attempt.
///
/// The prompt pins down the contract the rest of the pipeline relies on:
/// a class named `Step<N>` with an `execute` method. Earlier steps' code is
/// included so later steps can build on what already exists, and a prior
/// failure (if any) is included so a regeneration can avoid repeating it.
pub fn step_prompt(problem: &str, step: &Step, context: &GenerationContext) -> String {
    let mut prompt = format!(
        "I am building a project with the following problem definition:\n\
         {problem}\n\n\
         Step {index}: {description}\n\n\
         Requirements:\n\
         - Create a Python class named Step{index}.\n\
         - Implement an execute method within the class that performs the step's functionality.\n\
         - The module must be runnable on its own with `python3`.\n\
         - Ensure the code is syntactically correct and has no dependencies outside the standard library.\n\
         - Provide only the Python code without any explanations or comments.\n",
        problem = problem,
        index = step.index,
        description = step.description,
    );

    if !context.prior_steps().is_empty() {
        prompt.push_str("\nCode from earlier steps, for context:\n");
        for prior in context.prior_steps() {
            prompt.push_str(&format!(
                "\n# Step {} ({})\n{}\n",
                prior.index, prior.entry, prior.source
            ));
        }
    }

    if let Some(failure) = context.last_failure() {
        prompt.push_str(&format!(
            "\nA previous version of this step failed with:\n{failure}\n\
             Write a fresh implementation that avoids this failure.\n"
        ));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::PriorStep;

    fn step(index: usize, description: &str) -> Step {
        Step {
            index,
            description: description.to_string(),
        }
    }

    #[test]
    fn test_step_prompt_contains_contract() {
        let context = GenerationContext::new();
        let prompt = step_prompt("simulate pipe flow", &step(2, "Compute flow"), &context);

        assert!(prompt.contains("simulate pipe flow"));
        assert!(prompt.contains("Step 2: Compute flow"));
        assert!(prompt.contains("class named Step2"));
        assert!(prompt.contains("execute method"));
        assert!(!prompt.contains("failed with"));
    }

    #[test]
    fn test_step_prompt_includes_prior_steps_and_failure() {
        let mut context = GenerationContext::new();
        context.push(PriorStep {
            index: 1,
            entry: "Step1".to_string(),
            source: "class Step1:\n    def execute(self):\n        pass".to_string(),
        });
        let context = context.with_failure("ZeroDivisionError: division by zero");

        let prompt = step_prompt("p", &step(2, "Compute flow"), &context);
        assert!(prompt.contains("# Step 1 (Step1)"));
        assert!(prompt.contains("class Step1"));
        assert!(prompt.contains("ZeroDivisionError"));
    }
}
