// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scripted `LLMProvider` test double shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use ledgerlens_core::application::Orchestrator;
use ledgerlens_core::domain::llm::{
    FinishReason, GenerationOptions, GenerationResponse, LLMError, LLMProvider, ResponseHeuristics,
    TokenUsage,
};
use ledgerlens_core::domain::orchestration::{OrchestrationConfig, StrategyFlags};
use ledgerlens_core::domain::provider::ProviderDescriptor;
use ledgerlens_core::infrastructure::llm::ProviderRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Handler = Box<dyn Fn(&str, &GenerationOptions) -> Result<String, LLMError> + Send + Sync>;

/// One recorded `generate` call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub context: Option<String>,
}

pub struct ScriptedProvider {
    available: bool,
    delay: Option<Duration>,
    handler: Handler,
    heuristics: ResponseHeuristics,
    calls: AtomicUsize,
    probes: AtomicUsize,
    recorded: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn with_handler(
        handler: impl Fn(&str, &GenerationOptions) -> Result<String, LLMError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            available: true,
            delay: None,
            handler: Box::new(handler),
            heuristics: ResponseHeuristics::default(),
            calls: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `text`
    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::with_handler(move |_, _| Ok(text.clone()))
    }

    /// Available, but every call errors
    pub fn failing() -> Self {
        Self::with_handler(|_, _| Err(LLMError::Provider("scripted failure".into())))
    }

    /// Liveness probe says no
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::replying("never used because the probe fails")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.recorded.lock().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().push(RecordedCall {
            prompt: prompt.to_string(),
            context: options.context.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let text = (self.handler)(prompt, options)?;
        Ok(GenerationResponse {
            text,
            usage: TokenUsage::default(),
            provider: "scripted".to_string(),
            model: "scripted-model".to_string(),
            finish_reason: FinishReason::Stop,
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.available {
            Ok(())
        } else {
            Err(LLMError::Network("scripted outage".into()))
        }
    }

    fn validate_response(&self, text: &str) -> bool {
        self.heuristics.accepts(text)
    }
}

/// Plain primary/backup routing with every optional stage off
pub fn plain_config(primary: &str) -> OrchestrationConfig {
    OrchestrationConfig {
        primary: primary.to_string(),
        backups: Vec::new(),
        specializations: HashMap::new(),
        strategies: StrategyFlags::disabled(),
        provider_timeout_ms: 2_000,
        ..OrchestrationConfig::default()
    }
}

/// Registers `(name, priority, provider)` triples and builds an orchestrator
pub fn orchestrator(
    providers: &[(&str, u32, &Arc<ScriptedProvider>)],
    config: OrchestrationConfig,
) -> Orchestrator {
    let registry = Arc::new(ProviderRegistry::new());
    for (name, priority, provider) in providers {
        let adapter: Arc<dyn LLMProvider> = (*provider).clone();
        registry.register(ProviderDescriptor::new(*name, *priority), adapter);
    }
    Orchestrator::new(registry, config).expect("valid test config")
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
