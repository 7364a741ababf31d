// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Template Engine
//!
//! Renders the prompts the orchestrator sends during its optional stages,
//! using Handlebars for placeholder substitution.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Transform stage templates with placeholders into final prompts
//! - **Integration:** `spec.prompts` overrides → validation / enhancement / consensus stages
//!
//! # Supported Placeholders
//!
//! - `{{prompt}}` - The caller's original prompt
//! - `{{response}}` - The candidate response under review
//! - `{{#each answers}}{{provider}} / {{response}}{{/each}}` - Independent answers (consensus only)
//!
//! Output is never HTML-escaped: prompts are plain text.

use crate::domain::config::PromptTemplates;
use crate::domain::validation::CandidateAnswer;
use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};

const VALIDATION_TEMPLATE: &str = "validation";
const ENHANCEMENT_TEMPLATE: &str = "enhancement";
const CONSENSUS_TEMPLATE: &str = "consensus";

pub const DEFAULT_VALIDATION_TEMPLATE: &str = r#"Review the following answer to a financial analysis question.

ORIGINAL QUESTION:
{{prompt}}

ANSWER TO REVIEW:
{{response}}

Check whether the answer is correct and complete, whether it contains factual
errors or inconsistencies, and whether important information is missing.

Reply with ONLY a JSON object, no other text:
{"valid": true or false, "corrected": "full corrected answer, or null when valid", "notes": "one short sentence"}"#;

pub const DEFAULT_ENHANCEMENT_TEMPLATE: &str = r#"You received an initial financial analysis. Improve and expand it.

ORIGINAL QUESTION:
{{prompt}}

INITIAL ANALYSIS:
{{response}}

Add deeper insights, cover patterns the analysis missed, give more specific
recommendations and keep the original structure while expanding its content.

Provide the improved, expanded analysis:"#;

pub const DEFAULT_CONSENSUS_TEMPLATE: &str = r#"Several analysts answered the same financial analysis question independently.

QUESTION:
{{prompt}}

{{#each answers}}ANSWER {{@index}} ({{provider}}):
{{response}}

{{/each}}Write a single consensus answer that combines the best insights, resolves
contradictions in favour of the more precise information, stays clear and
professional, and keeps ONLY claims that appear in at least two answers.

CONSENSUS ANSWER:"#;

// ============================================================================
// Template Context
// ============================================================================

/// Context data for stage prompt rendering
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptContext {
    /// The caller's original prompt
    pub prompt: String,

    /// Candidate response under review
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    /// Independent answers gathered for consensus
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<CandidateAnswer>,
}

impl PromptContext {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Builder-style setter for the candidate response
    pub fn response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    /// Builder-style setter for consensus answers
    pub fn answers(mut self, answers: Vec<CandidateAnswer>) -> Self {
        self.answers = answers;
        self
    }
}

// ============================================================================
// Template Engine
// ============================================================================

pub struct PromptTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl PromptTemplateEngine {
    /// Create an engine with the built-in stage templates
    pub fn new() -> Result<Self> {
        Self::with_templates(&PromptTemplates::default())
    }

    /// Create an engine, replacing built-in templates with configured overrides
    pub fn with_templates(templates: &PromptTemplates) -> Result<Self> {
        let mut handlebars = Handlebars::new();

        // Don't fail on missing variables
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, custom, default) in [
            (VALIDATION_TEMPLATE, &templates.validation, DEFAULT_VALIDATION_TEMPLATE),
            (ENHANCEMENT_TEMPLATE, &templates.enhancement, DEFAULT_ENHANCEMENT_TEMPLATE),
            (CONSENSUS_TEMPLATE, &templates.consensus, DEFAULT_CONSENSUS_TEMPLATE),
        ] {
            let source = custom.as_deref().unwrap_or(default);
            handlebars
                .register_template_string(name, source)
                .with_context(|| format!("Invalid {} prompt template", name))?;
        }

        Ok(Self { handlebars })
    }

    /// Prompt asking a second provider to judge `response`
    pub fn render_validation(&self, prompt: &str, response: &str) -> Result<String> {
        self.render_named(VALIDATION_TEMPLATE, &PromptContext::new(prompt).response(response))
    }

    /// Prompt asking a second provider to expand `response`
    pub fn render_enhancement(&self, prompt: &str, response: &str) -> Result<String> {
        self.render_named(ENHANCEMENT_TEMPLATE, &PromptContext::new(prompt).response(response))
    }

    /// Prompt asking one provider to merge independent answers
    pub fn render_consensus(&self, prompt: &str, answers: &[CandidateAnswer]) -> Result<String> {
        self.render_named(
            CONSENSUS_TEMPLATE,
            &PromptContext::new(prompt).answers(answers.to_vec()),
        )
    }

    fn render_named(&self, name: &str, context: &PromptContext) -> Result<String> {
        self.handlebars
            .render(name, context)
            .with_context(|| format!("Failed to render {} prompt", name))
    }

    /// Render an ad-hoc template with context
    pub fn render(&self, template: &str, context: &PromptContext) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .context("Failed to render prompt template")
    }

    /// Validate template syntax without rendering
    pub fn validate_template(template: &str) -> Result<()> {
        handlebars::template::Template::compile(template)
            .map(|_| ())
            .context("Invalid Handlebars template syntax")
    }
}

// ============================================================================
// Tests
// ============================================================================
