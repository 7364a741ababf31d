// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Vendor-neutral interface every LLM provider adapter implements.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary between the orchestrator and vendor APIs

// LLM Provider Domain Interface (Anti-Corruption Layer)
//
// The orchestrator only ever talks to `dyn LLMProvider`. Vendor adapters live in
// infrastructure/llm/, test doubles implement the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Domain interface for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the LLM.
    ///
    /// Errors are never swallowed: the orchestrator decides whether to fall back.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError>;

    /// Check if provider is healthy and accessible
    async fn health_check(&self) -> Result<(), LLMError>;

    /// Cheap liveness probe. Never fails: any probe error maps to `false`.
    async fn is_available(&self) -> bool {
        match self.health_check().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Liveness probe failed: {}", e);
                false
            }
        }
    }

    /// Fast heuristic sanity check on generated text. Not a semantic check.
    fn validate_response(&self, _text: &str) -> bool {
        true
    }
}

/// Options for LLM generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Text prepended to the prompt (previous chain output, document excerpt, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,

    /// Model override for this call; adapters fall back to their configured model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sequences that stop generation
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            context: None,
            max_tokens: Some(2000),
            temperature: Some(0.7),
            model: None,
            stop_sequences: None,
        }
    }
}

impl GenerationOptions {
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = if context.trim().is_empty() { None } else { Some(context) };
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// The prompt actually sent to the vendor: context, blank line, prompt.
    pub fn render_prompt(&self, prompt: &str) -> String {
        match self.context.as_deref() {
            Some(context) if !context.trim().is_empty() => format!("{}\n\n{}", context, prompt),
            _ => prompt.to_string(),
        }
    }

    /// Resolve the model for this call
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model.as_deref().unwrap_or(default)
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// Generated text
    pub text: String,

    /// Token usage stats
    pub usage: TokenUsage,

    /// Usage provider type (e.g., "openai", "gemini")
    pub provider: String,

    /// Model used (e.g., "gpt-4o", "gemini-2.5-flash")
    pub model: String,

    /// Why generation stopped
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason why generation stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural completion (model decided to stop)
    Stop,

    /// Hit max_tokens limit
    Length,

    /// Blocked by content filter
    ContentFilter,
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Response rejected by heuristic check: {0}")]
    RejectedResponse(String),
}

impl LLMError {
    /// Map a non-success HTTP status to the matching error variant
    pub fn from_status(status: u16, body: String, model: &str) -> Self {
        match status {
            401 | 403 => LLMError::Authentication(body),
            429 => LLMError::RateLimit,
            404 => LLMError::ModelNotFound(model.to_string()),
            _ => LLMError::Provider(format!("HTTP {}: {}", status, body)),
        }
    }
}

/// Heuristic acceptance rules applied by `LLMProvider::validate_response`.
///
/// Catches empty output, truncated stubs and canned refusals. Anything
/// subtler belongs to the orchestrator's validation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeuristics {
    /// Minimum number of characters (after trimming)
    pub min_chars: usize,

    /// Phrases that mark a canned refusal
    #[serde(default)]
    pub refusal_phrases: Vec<String>,
}

impl ResponseHeuristics {
    pub fn new(min_chars: usize, refusal_phrases: Vec<String>) -> Self {
        Self {
            min_chars,
            refusal_phrases,
        }
    }

    pub fn with_refusals<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            refusal_phrases: phrases.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn accepts(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.chars().count() < self.min_chars {
            return false;
        }
        !self
            .refusal_phrases
            .iter()
            .any(|phrase| !phrase.is_empty() && trimmed.contains(phrase.as_str()))
    }
}

impl Default for ResponseHeuristics {
    fn default() -> Self {
        Self {
            min_chars: 10,
            refusal_phrases: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prompt_with_context() {
        let options = GenerationOptions::default().with_context("Previous summary");
        assert_eq!(
            options.render_prompt("Next step"),
            "Previous summary\n\nNext step"
        );
    }

    #[test]
    fn test_blank_context_is_dropped() {
        let options = GenerationOptions::default().with_context("   ");
        assert!(options.context.is_none());
        assert_eq!(options.render_prompt("Only prompt"), "Only prompt");
    }

    #[test]
    fn test_model_override() {
        let options = GenerationOptions::default();
        assert_eq!(options.model_or("gpt-4o"), "gpt-4o");

        let options = options.with_model("gpt-4o-mini");
        assert_eq!(options.model_or("gpt-4o"), "gpt-4o-mini");
    }

    #[test]
    fn test_heuristics_reject_short_and_empty() {
        let heuristics = ResponseHeuristics::default();
        assert!(!heuristics.accepts(""));
        assert!(!heuristics.accepts("   \n "));
        assert!(!heuristics.accepts("too short"));
        assert!(heuristics.accepts("A sufficiently long answer."));
    }

    #[test]
    fn test_heuristics_reject_refusals() {
        let heuristics = ResponseHeuristics::with_refusals(["I cannot", "I'm unable"]);
        assert!(!heuristics.accepts("I cannot help with analysing this statement."));
        assert!(!heuristics.accepts("Sorry, I'm unable to read the attachment."));
        assert!(heuristics.accepts("Monthly income is stable at around R$ 4.200."));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            LLMError::from_status(401, "bad key".into(), "m"),
            LLMError::Authentication(_)
        ));
        assert!(matches!(
            LLMError::from_status(429, String::new(), "m"),
            LLMError::RateLimit
        ));
        assert!(matches!(
            LLMError::from_status(404, String::new(), "gpt-x"),
            LLMError::ModelNotFound(m) if m == "gpt-x"
        ));
        assert!(matches!(
            LLMError::from_status(500, "boom".into(), "m"),
            LLMError::Provider(_)
        ));
    }
}
