// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry - Provider Registration and Lookup
//
// Holds every configured adapter together with its descriptor (priority,
// specialty tags, cost weight). Retry and fallback live in the orchestrator;
// the registry only answers "who is there" and "who is preferred for this hint".

use crate::domain::config::ProviderConfig;
use crate::domain::llm::{LLMError, LLMProvider, ResponseHeuristics};
use crate::domain::provider::ProviderDescriptor;
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::anthropic::{AnthropicAdapter, ANTHROPIC_REFUSALS};
use super::gemini::GeminiAdapter;
use super::openai::{OpenAIAdapter, OPENAI_ENDPOINT, OPENAI_REFUSALS, XAI_ENDPOINT};

#[derive(Clone)]
struct Registration {
    descriptor: ProviderDescriptor,
    adapter: Arc<dyn LLMProvider>,
}

/// Registry of configured LLM providers
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Registration>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create provider registry from the configured providers, reading
    /// credentials from the process environment
    pub fn from_config(providers: &[ProviderConfig]) -> Self {
        Self::from_config_with(providers, |var| std::env::var(var).ok())
    }

    /// Same as [`from_config`](Self::from_config) with an explicit variable lookup
    pub fn from_config_with(
        providers: &[ProviderConfig],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let registry = Self::new();

        info!("Initializing LLM provider registry");

        for provider_config in providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            match Self::create_provider(provider_config, &lookup) {
                Ok(adapter) => {
                    info!(
                        "Initialized provider: {} ({} / {})",
                        provider_config.name, provider_config.provider_type, provider_config.model
                    );
                    let descriptor = ProviderDescriptor::new(
                        provider_config.name.clone(),
                        provider_config.priority,
                    )
                    .with_specialties(provider_config.specialties.iter().cloned())
                    .with_cost_weight(provider_config.cost_weight);
                    registry.register(descriptor, adapter);
                }
                Err(e) => {
                    // Continue with other providers
                    warn!("Skipping provider '{}': {}", provider_config.name, e);
                }
            }
        }

        if registry.is_empty() {
            warn!("No LLM providers registered - every request will be rejected");
        }

        registry
    }

    /// Create a provider instance from configuration
    fn create_provider(
        config: &ProviderConfig,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let api_key = Self::resolve_api_key(&config.api_key, lookup)?;
        let required_key = || {
            api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("No API key configured"))
        };
        let model = config.model.clone();

        let provider: Arc<dyn LLMProvider> = match config.provider_type.as_str() {
            "gemini" => {
                let mut adapter = GeminiAdapter::new(required_key()?, model)
                    .with_heuristics(Self::heuristics(config, &[]));
                if let Some(endpoint) = &config.endpoint {
                    adapter = adapter.with_endpoint(endpoint.clone());
                }
                Arc::new(adapter)
            }
            "anthropic" => {
                let mut adapter = AnthropicAdapter::new(required_key()?, model)
                    .with_heuristics(Self::heuristics(config, ANTHROPIC_REFUSALS));
                if let Some(endpoint) = &config.endpoint {
                    adapter = adapter.with_endpoint(endpoint.clone());
                }
                Arc::new(adapter)
            }
            "openai" => {
                let endpoint = config.endpoint.clone().unwrap_or_else(|| OPENAI_ENDPOINT.to_string());
                Arc::new(
                    OpenAIAdapter::new(endpoint, Some(required_key()?), model)
                        .with_provider_name(config.name.clone())
                        .with_heuristics(Self::heuristics(config, OPENAI_REFUSALS)),
                )
            }
            "grok" => {
                let endpoint = config.endpoint.clone().unwrap_or_else(|| XAI_ENDPOINT.to_string());
                Arc::new(
                    OpenAIAdapter::new(endpoint, Some(required_key()?), model)
                        .with_provider_name(config.name.clone())
                        .with_heuristics(Self::heuristics(config, &[])),
                )
            }
            "openai-compatible" => {
                // OpenAI-compatible APIs (LM Studio, vLLM, etc.)
                let endpoint = config
                    .endpoint
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("openai-compatible provider requires an endpoint"))?;
                Arc::new(
                    OpenAIAdapter::new(endpoint, api_key.clone(), model)
                        .with_provider_name(config.name.clone())
                        .with_heuristics(Self::heuristics(config, &[])),
                )
            }
            _ => anyhow::bail!("Unsupported provider type: {}", config.provider_type),
        };

        Ok(provider)
    }

    fn heuristics(config: &ProviderConfig, vendor_refusals: &[&str]) -> ResponseHeuristics {
        let defaults = ResponseHeuristics::default();
        ResponseHeuristics::new(
            config.min_response_chars.unwrap_or(defaults.min_chars),
            config
                .refusal_phrases
                .clone()
                .unwrap_or_else(|| vendor_refusals.iter().map(|p| p.to_string()).collect()),
        )
    }

    /// Resolve API key from config (supports "env:VAR_NAME" syntax)
    fn resolve_api_key(
        key: &Option<String>,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Option<String>> {
        match key.as_deref() {
            Some(k) => match k.strip_prefix("env:") {
                Some(var_name) => lookup(var_name)
                    .filter(|value| !value.trim().is_empty())
                    .map(Some)
                    .ok_or_else(|| anyhow::anyhow!("Environment variable not set: {}", var_name)),
                None => Ok(Some(k.to_string())),
            },
            // For local providers without auth
            None => Ok(None),
        }
    }

    /// Add or replace a provider; last write wins
    pub fn register(&self, descriptor: ProviderDescriptor, adapter: Arc<dyn LLMProvider>) {
        let name = descriptor.name.clone();
        let previous = self
            .providers
            .write()
            .insert(name.clone(), Registration { descriptor, adapter });
        if previous.is_some() {
            info!("Replaced provider registration: {}", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LLMProvider>> {
        self.providers
            .read()
            .get(name)
            .map(|registration| registration.adapter.clone())
    }

    pub fn descriptor(&self, name: &str) -> Option<ProviderDescriptor> {
        self.providers
            .read()
            .get(name)
            .map(|registration| registration.descriptor.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.read().contains_key(name)
    }

    /// Mapped provider for a task hint, if that provider is registered.
    ///
    /// Descriptor specialty tags are informational and never route.
    pub fn specialized(
        &self,
        task_hint: &str,
        specializations: &HashMap<String, String>,
    ) -> Option<String> {
        let name = specializations.get(task_hint)?;
        self.providers
            .read()
            .contains_key(name)
            .then(|| name.clone())
    }

    /// Registered names, priority ascending (ties by name)
    pub fn all(&self) -> Vec<String> {
        self.descriptors().into_iter().map(|d| d.name).collect()
    }

    /// Registered descriptors, priority ascending (ties by name)
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        let mut descriptors: Vec<ProviderDescriptor> = self
            .providers
            .read()
            .values()
            .map(|registration| registration.descriptor.clone())
            .collect();
        descriptors.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        descriptors
    }

    /// Replace a provider's specialty tags. Returns false for unknown names.
    pub fn update_specialties(&self, name: &str, specialties: Vec<String>) -> bool {
        match self.providers.write().get_mut(name) {
            Some(registration) => {
                registration.descriptor.specialties = specialties.into_iter().collect();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }

    /// Check health of all providers concurrently
    pub async fn health_check_all(&self) -> HashMap<String, Result<(), LLMError>> {
        let snapshot: Vec<(String, Arc<dyn LLMProvider>)> = self
            .providers
            .read()
            .iter()
            .map(|(name, registration)| (name.clone(), registration.adapter.clone()))
            .collect();

        let probes = snapshot.into_iter().map(|(name, provider)| async move {
            info!("Health checking provider: {}", name);
            let result = provider.health_check().await;
            (name, result)
        });

        join_all(probes).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::default_providers;
    use crate::domain::llm::{GenerationOptions, GenerationResponse};
    use async_trait::async_trait;

    struct StubProvider;

    #[async_trait]
    impl LLMProvider for StubProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _options: &GenerationOptions,
        ) -> Result<GenerationResponse, LLMError> {
            Err(LLMError::Provider("stub".into()))
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn stub() -> Arc<dyn LLMProvider> {
        Arc::new(StubProvider)
    }

    #[test]
    fn test_registry_creation_skips_missing_credentials() {
        let registry = ProviderRegistry::from_config_with(&default_providers(), |var| match var {
            "GEMINI_API_KEY" => Some("g-key".to_string()),
            "OPENAI_API_KEY" => Some("sk-key".to_string()),
            "XAI_API_KEY" => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(registry.all(), vec!["gemini".to_string(), "openai".to_string()]);
        assert!(!registry.contains("anthropic"));
        assert!(!registry.contains("grok"));
        assert_eq!(registry.descriptor("gemini").map(|d| d.cost_weight), Some(0.5));
    }

    #[test]
    fn test_disabled_and_unknown_types_are_skipped() {
        let mut providers = default_providers();
        providers[0].enabled = false;
        providers[1].provider_type = "mistral".to_string();

        let registry = ProviderRegistry::from_config_with(&providers, |_| Some("key".to_string()));
        assert_eq!(registry.all(), vec!["openai".to_string(), "grok".to_string()]);
    }

    #[test]
    fn test_resolve_api_key() {
        let lookup = |var: &str| (var == "SET").then(|| "value".to_string());
        assert_eq!(
            ProviderRegistry::resolve_api_key(&Some("env:SET".into()), &lookup).unwrap(),
            Some("value".to_string())
        );
        assert!(ProviderRegistry::resolve_api_key(&Some("env:UNSET".into()), &lookup).is_err());
        assert_eq!(
            ProviderRegistry::resolve_api_key(&Some("literal".into()), &lookup).unwrap(),
            Some("literal".to_string())
        );
        assert_eq!(ProviderRegistry::resolve_api_key(&None, &lookup).unwrap(), None);
    }

    #[test]
    fn test_all_orders_by_priority_then_name() {
        let registry = ProviderRegistry::new();
        registry.register(ProviderDescriptor::new("zeta", 1), stub());
        registry.register(ProviderDescriptor::new("alpha", 2), stub());
        registry.register(ProviderDescriptor::new("beta", 1), stub());

        assert_eq!(registry.all(), vec!["beta", "zeta", "alpha"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_register_replaces() {
        let registry = ProviderRegistry::new();
        registry.register(ProviderDescriptor::new("x", 5), stub());
        registry.register(ProviderDescriptor::new("x", 1), stub());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.descriptor("x").map(|d| d.priority), Some(1));
    }

    #[test]
    fn test_specialized() {
        let registry = ProviderRegistry::new();
        registry.register(
            ProviderDescriptor::new("gemini", 1).with_specialties(["pattern_detection"]),
            stub(),
        );
        registry.register(
            ProviderDescriptor::new("anthropic", 2).with_specialties(["pattern_detection"]),
            stub(),
        );

        let mut specializations = HashMap::new();
        specializations.insert("document_analysis".to_string(), "anthropic".to_string());
        specializations.insert("report_generation".to_string(), "openai".to_string());

        // Explicit mapping
        assert_eq!(
            registry.specialized("document_analysis", &specializations).as_deref(),
            Some("anthropic")
        );
        // Mapping to an unregistered provider
        assert_eq!(registry.specialized("report_generation", &specializations), None);
        // Tags alone never route
        assert_eq!(registry.specialized("pattern_detection", &specializations), None);
        assert_eq!(registry.specialized("unknown", &specializations), None);
    }

    #[test]
    fn test_update_specialties() {
        let registry = ProviderRegistry::new();
        registry.register(ProviderDescriptor::new("grok", 4), stub());

        assert!(registry.update_specialties("grok", vec!["anomaly_detection".to_string()]));
        assert!(registry
            .descriptor("grok")
            .map(|d| d.has_specialty("anomaly_detection"))
            .unwrap_or(false));
        assert!(!registry.update_specialties("missing", vec![]));
    }

    #[tokio::test]
    async fn test_health_check_all() {
        let registry = ProviderRegistry::new();
        registry.register(ProviderDescriptor::new("a", 1), stub());
        registry.register(ProviderDescriptor::new("b", 2), stub());

        let results = registry.health_check_all().await;
        assert_eq!(results.len(), 2);
        assert!(results.values().all(|r| r.is_ok()));
    }
}
