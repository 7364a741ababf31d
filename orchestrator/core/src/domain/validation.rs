// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cross-Validation Domain
//!
//! A second provider judges the answer produced by the first one. The judge
//! must reply with a fixed-schema JSON document:
//!
//! ```json
//! { "valid": true, "corrected": null, "notes": "optional remarks" }
//! ```
//!
//! Only a surrounding Markdown code fence is tolerated; free-text replies are
//! rejected instead of being substring-matched, and the validation stage is
//! then skipped.
//!
//! Consensus answers are collected as [`CandidateAnswer`]s and handed to the
//! synthesis prompt.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured judgment returned by the validator provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// Whether the candidate response is correct and complete
    pub valid: bool,

    /// Replacement text when the response is not valid
    #[serde(default)]
    pub corrected: Option<String>,

    /// Short explanation from the validator
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Error)]
pub enum VerdictError {
    #[error("Validator reply contained no JSON object")]
    MissingJson,

    #[error("Validator reply did not match the verdict schema: {0}")]
    Schema(#[from] serde_json::Error),
}

impl ValidationVerdict {
    /// Parse a validator reply, accepting bare JSON or a fenced code block
    pub fn parse(reply: &str) -> Result<Self, VerdictError> {
        let trimmed = reply.trim();
        let json = match extract_json(trimmed) {
            Some(block) => block,
            None if trimmed.starts_with('{') => trimmed.to_string(),
            None => return Err(VerdictError::MissingJson),
        };
        Ok(serde_json::from_str(&json)?)
    }

    /// Non-empty correction, if the verdict rejected the response
    pub fn correction(&self) -> Option<&str> {
        if self.valid {
            return None;
        }
        self.corrected
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Pull the body out of a ```json (or bare ```) fenced block
pub fn extract_json(text: &str) -> Option<String> {
    // Find start of markdown code block
    let start_marker = "```json";
    if let Some(start) = text.find(start_marker) {
        let content_start = start + start_marker.len();
        // Find end marker AFTER the content start
        if let Some(end_offset) = text[content_start..].find("```") {
            let content_end = content_start + end_offset;
            return Some(text[content_start..content_end].trim().to_string());
        }
    }

    // Try generic code block if json specific one not found
    let generic_marker = "```";
    if let Some(start) = text.find(generic_marker) {
        let content_start = start + generic_marker.len();
        if let Some(end_offset) = text[content_start..].find("```") {
            let content_end = content_start + end_offset;
            return Some(text[content_start..content_end].trim().to_string());
        }
    }

    None
}

/// One independent answer gathered for consensus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAnswer {
    pub provider: String,
    pub response: String,
}
