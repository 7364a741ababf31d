// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Orchestration Domain
//!
//! Configuration and result types for multi-provider orchestration.
//!
//! | Type | Description |
//! |------|-------------|
//! | `OrchestrationConfig` | Primary/backup hierarchy, specializations, stage toggles, thresholds |
//! | `ConfigUpdate` | Partial reconfiguration merged into the active config |
//! | `StrategyMode` | Economic / balanced / premium presets for the stage toggles |
//! | `AnalysisResult` | The single well-formed result of every orchestration call |
//!
//! Confidence starts at [`BASELINE_CONFIDENCE`], is raised by successful
//! validation and enhancement, may be lifted to [`CONSENSUS_CONFIDENCE`] by
//! consensus, and never decreases within a call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Provider name reported on degraded results
pub const FALLBACK_PROVIDER: &str = "fallback";

/// Placeholder text returned when every provider failed
pub const DEGRADED_RESPONSE: &str =
    "Analysis is temporarily unavailable. Please try again shortly or use the local fallback.";

pub const BASELINE_CONFIDENCE: f64 = 0.8;
pub const DEGRADED_CONFIDENCE: f64 = 0.3;
pub const VALIDATION_CONFIDENCE_BONUS: f64 = 0.1;
pub const ENHANCEMENT_CONFIDENCE_BONUS: f64 = 0.15;
pub const CONSENSUS_CONFIDENCE: f64 = 0.9;

/// An enhanced response must be at least this many times longer than the prior one
pub const ENHANCEMENT_MIN_GROWTH: f64 = 1.2;

/// Process-wide orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Default provider name
    #[serde(default = "default_primary")]
    pub primary: String,

    /// Ordered backups used when primary and specialty routing fail
    #[serde(default = "default_backups")]
    pub backups: Vec<String>,

    /// task hint -> preferred provider name
    #[serde(default = "default_specializations")]
    pub specializations: HashMap<String, String>,

    #[serde(default)]
    pub strategies: StrategyFlags,

    #[serde(default)]
    pub thresholds: Thresholds,

    /// Providers preferred for the validation stage, strongest analyst first
    #[serde(default = "default_validator_preference")]
    pub validator_preference: Vec<String>,

    /// Providers preferred for the enhancement stage, strongest writer first
    #[serde(default = "default_enhancer_preference")]
    pub enhancer_preference: Vec<String>,

    /// Deadline for a single provider call; expiry counts as a failure
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,

    /// Base delay between failed attempts, doubled per attempt (0 disables)
    #[serde(default)]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyFlags {
    #[serde(default = "default_true")]
    pub validation: bool,

    #[serde(default = "default_true")]
    pub enhancement: bool,

    #[serde(default)]
    pub consensus: bool,

    #[serde(default = "default_true")]
    pub cost_optimization: bool,

    /// Route by task hint before falling back to the primary
    #[serde(default = "default_true")]
    pub specialty_routing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Consensus runs only while confidence is below this value
    #[serde(default = "default_confidence_min")]
    pub confidence_min: f64,

    /// Number of providers polled for consensus (at least 2)
    #[serde(default = "default_consensus_required")]
    pub consensus_required: usize,

    /// Extra `generate` attempts allowed after the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Stage toggle presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMode {
    /// Primary plus backups only
    Economic,
    /// Specialty routing, no extra stages
    Balanced,
    /// Specialty routing with validation and enhancement
    Premium,
}

impl StrategyMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "economic" => Some(Self::Economic),
            "balanced" => Some(Self::Balanced),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }

    /// Rewrite routing/validation/enhancement; consensus and cost flags are kept.
    pub fn apply(self, flags: &mut StrategyFlags) {
        let (routing, stages) = match self {
            Self::Economic => (false, false),
            Self::Balanced => (true, false),
            Self::Premium => (true, true),
        };
        flags.specialty_routing = routing;
        flags.validation = stages;
        flags.enhancement = stages;
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("confidence_min must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),

    #[error("consensus_required must be at least 2, got {0}")]
    ConsensusTooSmall(usize),

    #[error("primary provider name cannot be empty")]
    EmptyPrimary,

    #[error("provider_timeout_ms must be greater than zero")]
    ZeroTimeout,
}

impl OrchestrationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.thresholds.confidence_min) {
            return Err(ConfigError::ConfidenceOutOfRange(self.thresholds.confidence_min));
        }
        if self.thresholds.consensus_required < 2 {
            return Err(ConfigError::ConsensusTooSmall(self.thresholds.consensus_required));
        }
        if self.primary.trim().is_empty() {
            return Err(ConfigError::EmptyPrimary);
        }
        if self.provider_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Every provider name the config refers to, primary first
    pub fn referenced_providers(&self) -> Vec<&str> {
        let mut specialized: Vec<&str> = self.specializations.values().map(String::as_str).collect();
        specialized.sort_unstable();

        let mut names: Vec<&str> = Vec::new();
        let all = std::iter::once(self.primary.as_str())
            .chain(self.backups.iter().map(String::as_str))
            .chain(specialized);
        for name in all {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            backups: default_backups(),
            specializations: default_specializations(),
            strategies: StrategyFlags::default(),
            thresholds: Thresholds::default(),
            validator_preference: default_validator_preference(),
            enhancer_preference: default_enhancer_preference(),
            provider_timeout_ms: default_provider_timeout_ms(),
            retry_backoff_ms: 0,
        }
    }
}

impl Default for StrategyFlags {
    fn default() -> Self {
        Self {
            validation: true,
            enhancement: true,
            consensus: false,
            cost_optimization: true,
            specialty_routing: true,
        }
    }
}

impl StrategyFlags {
    /// All optional stages off, plain primary/backup routing
    pub fn disabled() -> Self {
        Self {
            validation: false,
            enhancement: false,
            consensus: false,
            cost_optimization: false,
            specialty_routing: true,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            confidence_min: default_confidence_min(),
            consensus_required: default_consensus_required(),
            max_retries: default_max_retries(),
        }
    }
}

/// Partial reconfiguration; `None` fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<StrategyMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backups: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specializations: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategies: Option<StrategyFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator_preference: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancer_preference: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<u64>,
}

impl ConfigUpdate {
    /// Merge into `config`, returning the updated copy.
    ///
    /// A whole `specializations` map replaces the old one; use
    /// `Orchestrator::update_specializations` to merge entries instead.
    /// `mode` is applied after `strategies`.
    pub fn merge_into(self, config: &OrchestrationConfig) -> OrchestrationConfig {
        let mut next = config.clone();
        if let Some(primary) = self.primary {
            next.primary = primary;
        }
        if let Some(backups) = self.backups {
            next.backups = backups;
        }
        if let Some(specializations) = self.specializations {
            next.specializations = specializations;
        }
        if let Some(strategies) = self.strategies {
            next.strategies = strategies;
        }
        if let Some(mode) = self.mode {
            mode.apply(&mut next.strategies);
        }
        if let Some(thresholds) = self.thresholds {
            next.thresholds = thresholds;
        }
        if let Some(preference) = self.validator_preference {
            next.validator_preference = preference;
        }
        if let Some(preference) = self.enhancer_preference {
            next.enhancer_preference = preference;
        }
        if let Some(timeout) = self.provider_timeout_ms {
            next.provider_timeout_ms = timeout;
        }
        if let Some(backoff) = self.retry_backoff_ms {
            next.retry_backoff_ms = backoff;
        }
        next
    }
}

/// Outcome of one orchestration call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Correlates logs and events for this call
    pub request_id: Uuid,

    pub response: String,

    /// Provider whose output became the base result, or "fallback"
    pub provider: String,

    pub enhanced: bool,

    pub validated: bool,

    /// 0.0 - 1.0, non-decreasing across stages
    pub confidence: f64,

    pub processing_time_ms: u64,

    /// Informational only
    pub estimated_cost: f64,

    #[serde(default)]
    pub enhancement_steps: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_details: Option<String>,

    #[serde(default)]
    pub consensus_sources: Vec<String>,
}

impl AnalysisResult {
    /// Base result from a successful provider call
    pub fn from_provider(request_id: Uuid, provider: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            request_id,
            response: response.into(),
            provider: provider.into(),
            enhanced: false,
            validated: false,
            confidence: BASELINE_CONFIDENCE,
            processing_time_ms: 0,
            estimated_cost: 0.0,
            enhancement_steps: Vec::new(),
            validation_details: None,
            consensus_sources: Vec::new(),
        }
    }

    /// Placeholder result when every candidate failed
    pub fn degraded(request_id: Uuid) -> Self {
        Self {
            confidence: DEGRADED_CONFIDENCE,
            ..Self::from_provider(request_id, FALLBACK_PROVIDER, DEGRADED_RESPONSE)
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.provider == FALLBACK_PROVIDER
    }

    /// Add `bonus` to confidence, capped at 1.0
    pub fn raise_confidence(&mut self, bonus: f64) {
        self.confidence = (self.confidence + bonus.max(0.0)).min(1.0);
    }

    /// Lift confidence to at least `floor`; never lowers it
    pub fn lift_confidence_to(&mut self, floor: f64) {
        self.confidence = self.confidence.max(floor.min(1.0));
    }
}

fn default_true() -> bool {
    true
}

fn default_primary() -> String {
    "gemini".to_string()
}

fn default_backups() -> Vec<String> {
    vec!["anthropic".to_string(), "openai".to_string(), "grok".to_string()]
}

fn default_specializations() -> HashMap<String, String> {
    [
        ("document_analysis", "anthropic"),
        ("financial_extraction", "gemini"),
        ("report_generation", "openai"),
        ("risk_assessment", "anthropic"),
        ("pattern_detection", "gemini"),
        ("summary_generation", "openai"),
    ]
    .into_iter()
    .map(|(task, provider)| (task.to_string(), provider.to_string()))
    .collect()
}

fn default_validator_preference() -> Vec<String> {
    ["anthropic", "openai", "gemini", "grok"].into_iter().map(String::from).collect()
}

fn default_enhancer_preference() -> Vec<String> {
    ["openai", "anthropic", "gemini", "grok"].into_iter().map(String::from).collect()
}

fn default_provider_timeout_ms() -> u64 {
    60_000
}

fn default_confidence_min() -> f64 {
    0.7
}

fn default_consensus_required() -> usize {
    2
}

fn default_max_retries() -> u32 {
    3
}
