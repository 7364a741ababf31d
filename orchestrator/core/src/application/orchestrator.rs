// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Orchestrator
//!
//! The single entry point the product layer calls:
//! `generate(prompt, task_hint, options) -> AnalysisResult`.
//!
//! ```text
//! SELECT → PRIMARY_ATTEMPT → [FALLBACK_ATTEMPT]* → VALIDATE? → ENHANCE? → CONSENSUS? → DONE
//!                                     └─ exhausted ─────────────────────────────────→ DEGRADED
//! ```
//!
//! Vendor and network failures never reach the caller: every call yields a
//! well-formed [`AnalysisResult`], degraded to the `"fallback"` placeholder
//! when no provider could answer. The only error is a registry with no
//! providers at all.
//!
//! Each provider call is bounded by `provider_timeout_ms`. The configuration
//! is read once per call as a snapshot, so a concurrent `update_config` only
//! affects later calls.

use crate::application::selection::SelectionPolicy;
use crate::domain::config::OrchestratorManifest;
use crate::domain::events::{OrchestrationEvent, Stage};
use crate::domain::llm::{GenerationOptions, GenerationResponse, LLMError, LLMProvider};
use crate::domain::orchestration::{
    AnalysisResult, ConfigError, ConfigUpdate, OrchestrationConfig, CONSENSUS_CONFIDENCE,
    ENHANCEMENT_CONFIDENCE_BONUS, ENHANCEMENT_MIN_GROWTH, VALIDATION_CONFIDENCE_BONUS,
};
use crate::domain::provider::ProviderDescriptor;
use crate::domain::validation::{CandidateAnswer, ValidationVerdict};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::llm::ProviderRegistry;
use crate::infrastructure::prompt_template_engine::PromptTemplateEngine;
use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("No LLM providers are registered")]
    NoProvidersRegistered,

    #[error("Invalid orchestration config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Result of one provider call
enum AttemptOutcome {
    Success(GenerationResponse),
    /// Liveness probe failed; does not count against the retry budget
    Unavailable,
    Failed(LLMError),
}

/// Snapshot returned by [`Orchestrator::status`]
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    /// Registered providers, priority ascending
    pub providers: Vec<ProviderDescriptor>,
    pub config: OrchestrationConfig,
    pub registered: usize,
    pub primary_registered: bool,
}

pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    config: RwLock<OrchestrationConfig>,
    templates: PromptTemplateEngine,
    event_bus: EventBus,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        config: OrchestrationConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            config: RwLock::new(config),
            templates: PromptTemplateEngine::new()?,
            event_bus: EventBus::with_default_capacity(),
        })
    }

    /// Build registry, templates and policy from a configuration manifest
    pub fn from_manifest(manifest: &OrchestratorManifest) -> anyhow::Result<Self> {
        let registry = Arc::new(ProviderRegistry::from_config(&manifest.spec.providers));
        Ok(Self::new(registry, manifest.orchestration_config())?
            .with_templates(PromptTemplateEngine::with_templates(&manifest.spec.prompts)?))
    }

    pub fn with_templates(mut self, templates: PromptTemplateEngine) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Current configuration snapshot
    pub fn config(&self) -> OrchestrationConfig {
        self.config.read().clone()
    }

    /// Run one orchestrated generation
    pub async fn generate(
        &self,
        prompt: &str,
        task_hint: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<AnalysisResult, OrchestrationError> {
        if self.registry.is_empty() {
            return Err(OrchestrationError::NoProvidersRegistered);
        }

        let request_id = Uuid::new_v4();
        let span = info_span!(
            "orchestrate",
            request_id = %request_id,
            task = task_hint.unwrap_or("none")
        );

        Ok(self
            .orchestrate(request_id, prompt, task_hint, options)
            .instrument(span)
            .await)
    }

    /// Convenience wrapper: `context` is prepended, only the text is returned
    pub async fn respond(&self, prompt: &str, context: &str) -> Result<String, OrchestrationError> {
        let options = GenerationOptions::default().with_context(context);
        Ok(self.generate(prompt, None, &options).await?.response)
    }

    async fn orchestrate(
        &self,
        request_id: Uuid,
        prompt: &str,
        task_hint: Option<&str>,
        options: &GenerationOptions,
    ) -> AnalysisResult {
        let started = Instant::now();
        let config = self.config();
        let candidates = SelectionPolicy::new(&config, &self.registry).candidates(task_hint);
        debug!("Candidate chain: {:?}", candidates);

        let Some((provider, text)) = self
            .attempt_chain(request_id, &config, &candidates, prompt, options)
            .await
        else {
            warn!("All providers failed; returning degraded result");
            self.event_bus.publish(OrchestrationEvent::Degraded {
                request_id,
                degraded_at: Utc::now(),
            });
            let mut result = AnalysisResult::degraded(request_id);
            result.processing_time_ms = started.elapsed().as_millis() as u64;
            return result;
        };

        let mut result = AnalysisResult::from_provider(request_id, provider, text);
        // Stage prompts quote what the provider actually saw
        let question = options.render_prompt(prompt);
        let multi_provider = self.registry.len() >= 2;

        if config.strategies.validation && multi_provider {
            self.validation_stage(&config, &mut result, &question).await;
        }

        if config.strategies.enhancement && multi_provider {
            self.enhancement_stage(&config, &mut result, &question).await;
        }

        if config.strategies.consensus && result.confidence < config.thresholds.confidence_min {
            self.consensus_stage(&config, &candidates, &mut result, prompt, options)
                .await;
        }

        result.processing_time_ms = started.elapsed().as_millis() as u64;
        result.estimated_cost = self
            .registry
            .descriptor(&result.provider)
            .map(|d| d.estimate_cost(result.response.chars().count()))
            .unwrap_or(0.0);

        info!(
            "Completed via {} (confidence {:.2}, validated {}, enhanced {}, {} ms)",
            result.provider,
            result.confidence,
            result.validated,
            result.enhanced,
            result.processing_time_ms
        );
        self.event_bus.publish(OrchestrationEvent::Completed {
            request_id,
            provider: result.provider.clone(),
            confidence: result.confidence,
            processing_time_ms: result.processing_time_ms,
            completed_at: Utc::now(),
        });

        result
    }

    /// Walk the candidate chain until one provider answers acceptably.
    /// At most `1 + max_retries` generate calls are made.
    async fn attempt_chain(
        &self,
        request_id: Uuid,
        config: &OrchestrationConfig,
        candidates: &[String],
        prompt: &str,
        options: &GenerationOptions,
    ) -> Option<(String, String)> {
        let budget = config.thresholds.max_retries.saturating_add(1);
        let timeout = Duration::from_millis(config.provider_timeout_ms);
        let mut calls: u32 = 0;

        for name in candidates {
            if calls >= budget {
                warn!("Retry budget of {} calls exhausted", budget);
                break;
            }

            let Some(provider) = self.registry.get(name) else {
                continue;
            };

            let delay = backoff_delay(config.retry_backoff_ms, calls);
            match attempt(provider.as_ref(), prompt, options, timeout, delay).await {
                AttemptOutcome::Success(response) => {
                    info!(
                        "Provider {} generated response ({} chars)",
                        name,
                        response.text.chars().count()
                    );
                    return Some((name.clone(), response.text));
                }
                AttemptOutcome::Unavailable => {
                    info!("Provider {} not available, skipping", name);
                    self.event_bus.publish(OrchestrationEvent::ProviderSkipped {
                        request_id,
                        provider: name.clone(),
                        skipped_at: Utc::now(),
                    });
                }
                AttemptOutcome::Failed(e) => {
                    calls += 1;
                    warn!("Provider {} failed (call {}/{}): {}", name, calls, budget, e);
                    self.event_bus.publish(OrchestrationEvent::AttemptFailed {
                        request_id,
                        provider: name.clone(),
                        reason: e.to_string(),
                        failed_at: Utc::now(),
                    });
                }
            }
        }

        None
    }

    /// One call to a named provider for an auxiliary stage
    async fn stage_call(
        &self,
        config: &OrchestrationConfig,
        name: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Option<String> {
        let provider = self.registry.get(name)?;
        let timeout = Duration::from_millis(config.provider_timeout_ms);

        match attempt(provider.as_ref(), prompt, options, timeout, Duration::ZERO).await {
            AttemptOutcome::Success(response) => Some(response.text),
            AttemptOutcome::Unavailable => {
                debug!("Stage provider {} not available", name);
                None
            }
            AttemptOutcome::Failed(e) => {
                warn!("Stage provider {} failed: {}", name, e);
                None
            }
        }
    }

    async fn validation_stage(
        &self,
        config: &OrchestrationConfig,
        result: &mut AnalysisResult,
        question: &str,
    ) {
        let policy = SelectionPolicy::new(config, &self.registry);
        let Some(validator) = policy.stage_provider(&config.validator_preference, &result.provider)
        else {
            return;
        };

        let stage_prompt = match self.templates.render_validation(question, &result.response) {
            Ok(stage_prompt) => stage_prompt,
            Err(e) => {
                warn!("Skipping validation: {:#}", e);
                return;
            }
        };

        debug!("Cross-validating with {}", validator);
        let Some(reply) = self
            .stage_call(config, &validator, &stage_prompt, &GenerationOptions::default())
            .await
        else {
            self.publish_stage(result.request_id, Stage::Validation, &validator, false);
            return;
        };

        let verdict = match ValidationVerdict::parse(&reply) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Discarding verdict from {}: {}", validator, e);
                self.publish_stage(result.request_id, Stage::Validation, &validator, false);
                return;
            }
        };

        result.validated = true;
        if verdict.valid {
            result.raise_confidence(VALIDATION_CONFIDENCE_BONUS);
        } else if let Some(correction) = verdict.correction() {
            debug!("Validator {} supplied a corrected response", validator);
            result.response = correction.to_string();
        }

        result.validation_details = Some(match verdict.notes.as_deref() {
            Some(notes) if !notes.trim().is_empty() => {
                format!("{}: valid={} ({})", validator, verdict.valid, notes.trim())
            }
            _ => format!("{}: valid={}", validator, verdict.valid),
        });
        self.publish_stage(result.request_id, Stage::Validation, &validator, true);
    }

    async fn enhancement_stage(
        &self,
        config: &OrchestrationConfig,
        result: &mut AnalysisResult,
        question: &str,
    ) {
        let policy = SelectionPolicy::new(config, &self.registry);
        let Some(enhancer) = policy.stage_provider(&config.enhancer_preference, &result.provider)
        else {
            return;
        };

        let stage_prompt = match self.templates.render_enhancement(question, &result.response) {
            Ok(stage_prompt) => stage_prompt,
            Err(e) => {
                warn!("Skipping enhancement: {:#}", e);
                return;
            }
        };

        debug!("Enhancing with {}", enhancer);
        let enhanced = self
            .stage_call(config, &enhancer, &stage_prompt, &GenerationOptions::default())
            .await;

        let prior_chars = result.response.chars().count();
        let accepted = enhanced.filter(|text| {
            text.chars().count() as f64 >= prior_chars as f64 * ENHANCEMENT_MIN_GROWTH
        });

        match accepted {
            Some(text) => {
                let enhanced_chars = text.chars().count();
                result.response = text;
                result.enhanced = true;
                result.raise_confidence(ENHANCEMENT_CONFIDENCE_BONUS);
                result.enhancement_steps.extend([
                    format!("Enhanced by {}", enhancer),
                    format!("Original: {} chars", prior_chars),
                    format!("Enhanced: {} chars", enhanced_chars),
                ]);
                self.publish_stage(result.request_id, Stage::Enhancement, &enhancer, true);
            }
            None => {
                debug!("Enhancement from {} not accepted", enhancer);
                self.publish_stage(result.request_id, Stage::Enhancement, &enhancer, false);
            }
        }
    }

    async fn consensus_stage(
        &self,
        config: &OrchestrationConfig,
        candidates: &[String],
        result: &mut AnalysisResult,
        prompt: &str,
        options: &GenerationOptions,
    ) {
        let pollers: Vec<&String> = candidates
            .iter()
            .take(config.thresholds.consensus_required)
            .collect();
        if pollers.len() < 2 {
            return;
        }

        debug!("Polling {:?} for consensus", pollers);
        let polls = pollers.iter().map(|name| async move {
            self.stage_call(config, name, prompt, options)
                .await
                .map(|response| CandidateAnswer {
                    provider: name.to_string(),
                    response,
                })
        });
        // join_all keeps selection order, so the first answer is the first responder
        let answers: Vec<CandidateAnswer> = join_all(polls).await.into_iter().flatten().collect();

        if answers.len() < 2 {
            debug!("Consensus needs two answers, got {}", answers.len());
            return;
        }

        let synthesizer = answers[0].provider.clone();
        let stage_prompt = match self
            .templates
            .render_consensus(&options.render_prompt(prompt), &answers)
        {
            Ok(stage_prompt) => stage_prompt,
            Err(e) => {
                warn!("Skipping consensus: {:#}", e);
                return;
            }
        };

        match self
            .stage_call(config, &synthesizer, &stage_prompt, &GenerationOptions::default())
            .await
        {
            Some(text) => {
                result.response = text;
                result.lift_confidence_to(CONSENSUS_CONFIDENCE);
                result.consensus_sources = answers.into_iter().map(|a| a.provider).collect();
                self.publish_stage(result.request_id, Stage::Consensus, &synthesizer, true);
            }
            None => self.publish_stage(result.request_id, Stage::Consensus, &synthesizer, false),
        }
    }

    fn publish_stage(&self, request_id: Uuid, stage: Stage, provider: &str, applied: bool) {
        self.event_bus.publish(OrchestrationEvent::StageCompleted {
            request_id,
            stage,
            provider: provider.to_string(),
            applied,
            completed_at: Utc::now(),
        });
    }

    /// Merge a partial update; rejected (and nothing changes) if the result is invalid
    pub fn update_config(&self, update: ConfigUpdate) -> Result<OrchestrationConfig, OrchestrationError> {
        let mut config = self.config.write();
        let next = update.merge_into(&config);
        next.validate()?;
        *config = next.clone();
        info!("Orchestration config updated: primary={}", next.primary);
        Ok(next)
    }

    /// Merge task-hint → provider entries into the active map
    pub fn update_specializations(&self, specializations: HashMap<String, String>) {
        let mut config = self.config.write();
        for (task, provider) in specializations {
            info!("Specialization {} -> {}", task, provider);
            config.specializations.insert(task, provider);
        }
    }

    /// Replace a provider's specialty tags. Returns false for unknown providers.
    pub fn reassign_specialties(&self, provider: &str, specialties: Vec<String>) -> bool {
        self.registry.update_specialties(provider, specialties)
    }

    pub fn register_provider(&self, descriptor: ProviderDescriptor, adapter: Arc<dyn LLMProvider>) {
        info!("Registering provider {}", descriptor.name);
        self.registry.register(descriptor, adapter);
    }

    /// Probe every registered provider concurrently
    pub async fn health_check(&self) -> HashMap<String, bool> {
        let timeout = Duration::from_millis(self.config.read().provider_timeout_ms);
        let probes = self.registry.all().into_iter().filter_map(|name| {
            let provider = self.registry.get(&name)?;
            Some(async move {
                let available = tokio::time::timeout(timeout, provider.is_available())
                    .await
                    .unwrap_or(false);
                (name, available)
            })
        });

        join_all(probes).await.into_iter().collect()
    }

    pub fn status(&self) -> OrchestratorStatus {
        let config = self.config();
        OrchestratorStatus {
            providers: self.registry.descriptors(),
            registered: self.registry.len(),
            primary_registered: self.registry.contains(&config.primary),
            config,
        }
    }
}

fn backoff_delay(base_ms: u64, failed_calls: u32) -> Duration {
    if base_ms == 0 || failed_calls == 0 {
        return Duration::ZERO;
    }
    let factor = 1u64 << (failed_calls - 1).min(16);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Probe, call and sanity-check one provider
async fn attempt(
    provider: &dyn LLMProvider,
    prompt: &str,
    options: &GenerationOptions,
    timeout: Duration,
    delay: Duration,
) -> AttemptOutcome {
    // A hung probe is as good as a failed one
    if !tokio::time::timeout(timeout, provider.is_available())
        .await
        .unwrap_or(false)
    {
        return AttemptOutcome::Unavailable;
    }

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    match tokio::time::timeout(timeout, provider.generate(prompt, options)).await {
        Err(_) => AttemptOutcome::Failed(LLMError::Timeout(timeout.as_millis() as u64)),
        Ok(Err(e)) => AttemptOutcome::Failed(e),
        Ok(Ok(response)) if provider.validate_response(&response.text) => {
            AttemptOutcome::Success(response)
        }
        Ok(Ok(response)) => AttemptOutcome::Failed(LLMError::RejectedResponse(format!(
            "{} chars from {}",
            response.text.chars().count(),
            response.model
        ))),
    }
}
