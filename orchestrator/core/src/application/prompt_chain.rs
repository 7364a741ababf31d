// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Prompt Chain Runner
//
// Feeds an ordered list of prompt fragments through the orchestrator. Each
// step sees the previous step's output as context. A degraded step stops the
// chain and the text accumulated so far is returned.

use crate::application::orchestrator::{OrchestrationError, Orchestrator};
use crate::domain::llm::GenerationOptions;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ephemeral state of one chain execution
#[derive(Debug, Clone)]
struct PromptChainState {
    current_text: String,
    step_index: usize,
}

pub struct PromptChainRunner {
    orchestrator: Arc<Orchestrator>,
}

impl PromptChainRunner {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Run fragments in order, starting from empty context
    pub async fn run(&self, fragments: &[String]) -> Result<String, OrchestrationError> {
        self.run_with_input("", fragments).await
    }

    /// Run fragments in order, with `input` as the context of the first step
    pub async fn run_with_input(
        &self,
        input: &str,
        fragments: &[String],
    ) -> Result<String, OrchestrationError> {
        let steps: Vec<&str> = fragments
            .iter()
            .map(|fragment| fragment.trim())
            .filter(|fragment| !fragment.is_empty())
            .collect();

        if steps.len() <= 1 {
            // Single generate: the lone fragment, or the raw input when there is none
            let prompt = steps.first().copied().unwrap_or(input);
            let options = GenerationOptions::default().with_context(if steps.is_empty() {
                ""
            } else {
                input
            });
            let result = self.orchestrator.generate(prompt, None, &options).await?;
            return Ok(result.response);
        }

        info!("Running prompt chain with {} steps", steps.len());
        let mut state = PromptChainState {
            current_text: input.to_string(),
            step_index: 0,
        };

        for fragment in steps {
            state.step_index += 1;
            let options = GenerationOptions::default().with_context(state.current_text.as_str());
            let result = self.orchestrator.generate(fragment, None, &options).await?;

            if result.is_degraded() {
                warn!(
                    "Chain step {} degraded; stopping with output of step {}",
                    state.step_index,
                    state.step_index - 1
                );
                break;
            }

            debug!(
                "Chain step {} answered by {} ({} chars)",
                state.step_index,
                result.provider,
                result.response.chars().count()
            );
            state.current_text = result.response;
        }

        Ok(state.current_text)
    }
}
