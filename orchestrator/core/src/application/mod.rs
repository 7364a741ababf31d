// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod orchestrator;
pub mod prompt_chain;
pub mod selection;

// Re-export use cases for convenience
pub use orchestrator::{OrchestrationError, Orchestrator, OrchestratorStatus};
pub use prompt_chain::PromptChainRunner;
pub use selection::SelectionPolicy;
