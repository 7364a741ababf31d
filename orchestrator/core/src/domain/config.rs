// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// ledgerlens.yaml
//
// An `apiVersion: ledgerlens/v1`, `kind: OrchestratorConfig` document. The
// `spec` section lists vendor adapters (keys as "env:VAR_NAME"), the routing
// and stage policy, optional Handlebars prompt overrides and the default
// chain. Unset sections fall back to built-in defaults.

use crate::domain::orchestration::{OrchestrationConfig, StrategyMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "ledgerlens/v1";
pub const KIND: &str = "OrchestratorConfig";

/// A parsed `ledgerlens.yaml` document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorManifest {
    /// Always "ledgerlens/v1"
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Always "OrchestratorConfig"
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: OrchestratorSpec,
}

/// Identifies the deployment in logs and `config show`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Defaults to the host name
    pub name: String,

    /// Free-form revision label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Everything under `spec:`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSpec {
    /// Vendor adapters to build at startup
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub orchestration: OrchestrationSection,

    /// Handlebars overrides for the stage prompts
    #[serde(default)]
    pub prompts: PromptTemplates,

    /// Default prompt chain fragments, run in order
    #[serde(default)]
    pub chain: Vec<String>,
}

/// Orchestration policy plus an optional preset applied on load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestrationSection {
    /// Preset that rewrites the strategy flags ("economic", "balanced", "premium")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<StrategyMode>,

    #[serde(flatten)]
    pub config: OrchestrationConfig,
}

impl OrchestrationSection {
    /// Effective config with the mode preset applied
    pub fn resolve(&self) -> OrchestrationConfig {
        let mut config = self.config.clone();
        if let Some(mode) = self.mode {
            mode.apply(&mut config.strategies);
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name (e.g., "gemini", "anthropic")
    pub name: String,

    /// Provider type
    #[serde(rename = "type")]
    pub provider_type: String, // "gemini", "anthropic", "openai", "grok", "openai-compatible"

    /// API endpoint URL (vendor default when omitted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier for the provider API
    pub model: String,

    /// Whether this provider is active
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lower = preferred in the default fallback order
    pub priority: u32,

    /// Task hints this provider is preferred for
    #[serde(default)]
    pub specialties: Vec<String>,

    /// Relative per-token cost (informational)
    #[serde(default = "default_cost_weight")]
    pub cost_weight: f64,

    /// Override the vendor's minimum accepted response length
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_response_chars: Option<usize>,

    /// Override the vendor's canned refusal phrases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal_phrases: Option<Vec<String>>,
}

/// Handlebars templates for the stage prompts; built-in defaults when unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptTemplates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhancement: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus: Option<String>,
}

impl ProviderConfig {
    fn vendor(
        name: &str,
        model: &str,
        priority: u32,
        key_var: &str,
        cost_weight: f64,
        specialties: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            provider_type: name.to_string(),
            endpoint: None,
            api_key: Some(format!("env:{}", key_var)),
            model: model.to_string(),
            enabled: true,
            priority,
            specialties: specialties.iter().map(|s| s.to_string()).collect(),
            cost_weight,
            min_response_chars: None,
            refusal_phrases: None,
        }
    }
}

/// The four hosted vendors, each keyed from its conventional environment variable
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::vendor(
            "gemini",
            "gemini-2.5-flash",
            1,
            "GEMINI_API_KEY",
            0.5,
            &["financial_extraction", "pattern_detection", "multimodal_analysis"],
        ),
        ProviderConfig::vendor(
            "anthropic",
            "claude-sonnet-4-20250514",
            2,
            "ANTHROPIC_API_KEY",
            1.0,
            &["document_analysis", "risk_assessment", "complex_reasoning"],
        ),
        ProviderConfig::vendor(
            "openai",
            "gpt-4o",
            3,
            "OPENAI_API_KEY",
            0.8,
            &["report_generation", "summary_generation", "creative_writing"],
        ),
        ProviderConfig::vendor(
            "grok",
            "grok-2-1212",
            4,
            "XAI_API_KEY",
            0.6,
            &["risk_assessment", "anomaly_detection", "contrarian_analysis"],
        ),
    ]
}

impl Default for OrchestratorSpec {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            orchestration: OrchestrationSection::default(),
            prompts: PromptTemplates::default(),
            chain: Vec::new(),
        }
    }
}

impl Default for OrchestratorManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "ledgerlens".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: OrchestratorSpec::default(),
        }
    }
}

impl OrchestratorManifest {
    /// Parse a manifest file; no validation or overrides
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Places searched for `ledgerlens.yaml`, most specific first
    pub fn candidate_paths(env_path: Option<String>, home: Option<PathBuf>) -> Vec<PathBuf> {
        #[cfg(windows)]
        let system = PathBuf::from("C:\\ProgramData\\LedgerLens\\config.yaml");
        #[cfg(not(windows))]
        let system = PathBuf::from("/etc/ledgerlens/config.yaml");

        env_path
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .into_iter()
            .chain([PathBuf::from("./ledgerlens.yaml")])
            .chain(home.map(|home| home.join(".ledgerlens").join("config.yaml")))
            .chain([system])
            .collect()
    }

    /// Candidates for this process (`LEDGERLENS_CONFIG_PATH`, home directory)
    pub fn search_paths() -> Vec<PathBuf> {
        Self::candidate_paths(std::env::var("LEDGERLENS_CONFIG_PATH").ok(), dirs::home_dir())
    }

    /// First existing candidate for this process
    pub fn discover_config() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|path| path.exists())
    }

    /// `--config` must exist and parse; otherwise the first discovered file,
    /// or built-in defaults when none is found. Env overrides apply either way.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = match cli_path {
            Some(path) => {
                tracing::info!("Reading manifest {:?} (--config)", path);
                Self::from_yaml_file(&path)
                    .map_err(|e| anyhow::anyhow!("Cannot read manifest {:?}: {}", path, e))?
            }
            None => match Self::discover_config() {
                Some(path) => {
                    tracing::info!("Reading manifest {:?}", path);
                    Self::from_yaml_file(path)?
                }
                None => {
                    tracing::warn!("No ledgerlens.yaml found; running with built-in defaults");
                    Self::default()
                }
            },
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// `LEDGERLENS_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Same overrides, read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let orchestration = &mut self.spec.orchestration;

        if let Some(primary) = lookup("LEDGERLENS_PRIMARY_PROVIDER") {
            if !primary.trim().is_empty() {
                tracing::info!("Environment override: LEDGERLENS_PRIMARY_PROVIDER={}", primary);
                orchestration.config.primary = primary.trim().to_string();
            }
        }

        if let Some(val) = lookup("LEDGERLENS_STRATEGY_MODE") {
            match StrategyMode::parse(&val) {
                Some(mode) => {
                    tracing::info!("Environment override: LEDGERLENS_STRATEGY_MODE={:?}", mode);
                    orchestration.mode = Some(mode);
                }
                None => tracing::warn!(
                    "Invalid value for LEDGERLENS_STRATEGY_MODE: '{}'. Expected economic/balanced/premium. Ignoring.",
                    val
                ),
            }
        }

        let flags = &mut orchestration.config.strategies;
        for (key, flag) in [
            ("LEDGERLENS_ENABLE_VALIDATION", &mut flags.validation),
            ("LEDGERLENS_ENABLE_ENHANCEMENT", &mut flags.enhancement),
            ("LEDGERLENS_ENABLE_CONSENSUS", &mut flags.consensus),
        ] {
            if let Some(val) = lookup(key) {
                match parse_bool(&val) {
                    Some(enabled) => {
                        tracing::info!("Environment override: {}={}", key, enabled);
                        *flag = enabled;
                    }
                    None => tracing::warn!(
                        "Invalid value for {}: '{}'. Expected true/false. Ignoring.",
                        key,
                        val
                    ),
                }
            }
        }

        if let Some(val) = lookup("LEDGERLENS_PROVIDER_TIMEOUT_MS") {
            match val.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => {
                    tracing::info!("Environment override: LEDGERLENS_PROVIDER_TIMEOUT_MS={}", ms);
                    orchestration.config.provider_timeout_ms = ms;
                }
                _ => tracing::warn!(
                    "Invalid value for LEDGERLENS_PROVIDER_TIMEOUT_MS: '{}'. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Effective orchestration config (mode preset applied)
    pub fn orchestration_config(&self) -> OrchestrationConfig {
        self.spec.orchestration.resolve()
    }

    /// Structural checks; unknown names in backups or specializations only warn
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mut seen = std::collections::HashSet::new();
        for provider in &self.spec.providers {
            if provider.name.is_empty() {
                anyhow::bail!("LLM provider name cannot be empty");
            }

            if !seen.insert(provider.name.as_str()) {
                anyhow::bail!("Duplicate LLM provider name: {}", provider.name);
            }

            if provider.model.is_empty() {
                anyhow::bail!("LLM provider must name a model: {}", provider.name);
            }

            if provider.provider_type == "openai-compatible" && provider.endpoint.is_none() {
                anyhow::bail!("openai-compatible provider requires an endpoint: {}", provider.name);
            }

            if provider.cost_weight < 0.0 {
                anyhow::bail!("cost_weight cannot be negative for: {}", provider.name);
            }
        }

        for (stage, template) in [
            ("validation", &self.spec.prompts.validation),
            ("enhancement", &self.spec.prompts.enhancement),
            ("consensus", &self.spec.prompts.consensus),
        ] {
            if let Some(source) = template {
                handlebars::template::Template::compile(source).map_err(|e| {
                    anyhow::anyhow!("Invalid {} prompt template: {}", stage, e)
                })?;
            }
        }

        let orchestration = self.orchestration_config();
        orchestration.validate()?;

        if !self.spec.providers.iter().any(|p| p.name == orchestration.primary) {
            anyhow::bail!(
                "Primary provider '{}' not found in providers",
                orchestration.primary
            );
        }

        // Stale backup/specialization names are tolerated at runtime
        for name in orchestration.referenced_providers() {
            if !self.spec.providers.iter().any(|p| p.name == name) {
                tracing::warn!("Orchestration references unknown provider '{}'", name);
            }
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_true() -> bool {
    true
}

fn default_cost_weight() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = OrchestratorManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.metadata.name.is_empty());
        assert_eq!(manifest.spec.providers.len(), 4);
        assert_eq!(
            manifest.spec.providers[0].api_key.as_deref(),
            Some("env:GEMINI_API_KEY")
        );
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
apiVersion: ledgerlens/v1
kind: OrchestratorConfig
metadata:
  name: statements-chat
spec:
  providers:
    - name: claude
      type: anthropic
      api_key: env:ANTHROPIC_API_KEY
      model: claude-sonnet-4-20250514
      priority: 1
      specialties: [document_analysis]
    - name: local
      type: openai-compatible
      endpoint: http://localhost:8080/v1
      model: qwen2.5
      priority: 2
      cost_weight: 0.0
  orchestration:
    mode: economic
    primary: claude
    backups: [local]
    specializations:
      document_analysis: claude
    thresholds:
      max_retries: 1
  chain:
    - Extract every transaction.
    - Summarise monthly cash flow.
"#;
        let manifest = OrchestratorManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.metadata.name, "statements-chat");
        assert_eq!(manifest.spec.providers.len(), 2);
        assert_eq!(manifest.spec.providers[1].provider_type, "openai-compatible");
        assert!(manifest.spec.providers[1].enabled);
        assert_eq!(manifest.spec.chain.len(), 2);

        let config = manifest.orchestration_config();
        assert_eq!(config.primary, "claude");
        assert_eq!(config.backups, vec!["local".to_string()]);
        assert_eq!(config.thresholds.max_retries, 1);
        assert_eq!(config.thresholds.consensus_required, 2);
        // economic preset switched the stages off
        assert!(!config.strategies.validation);
        assert!(!config.strategies.specialty_routing);

        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgerlens.yaml");

        let mut manifest = OrchestratorManifest::default();
        manifest.metadata.name = "roundtrip".to_string();
        manifest.spec.chain = vec!["step one".to_string()];
        manifest.to_yaml_file(&path).unwrap();

        let loaded = OrchestratorManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.metadata.name, "roundtrip");
        assert_eq!(loaded.spec.chain, vec!["step one".to_string()]);
        assert_eq!(loaded.spec.providers.len(), 4);
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let result = OrchestratorManifest::load_or_default(Some(PathBuf::from(
            "/definitely/not/here/ledgerlens.yaml",
        )));
        assert!(result.is_err());
    }

    #[test]
    fn test_candidate_paths_order() {
        let paths = OrchestratorManifest::candidate_paths(
            Some("/srv/ledgerlens/prod.yaml".to_string()),
            Some(PathBuf::from("/home/ana")),
        );
        assert_eq!(paths.len(), 4);
        assert_eq!(paths[0], PathBuf::from("/srv/ledgerlens/prod.yaml"));
        assert_eq!(paths[1], PathBuf::from("./ledgerlens.yaml"));
        assert_eq!(
            paths[2],
            PathBuf::from("/home/ana").join(".ledgerlens").join("config.yaml")
        );
        assert!(paths[3].ends_with("config.yaml"));

        // Blank variable and no home directory
        let paths = OrchestratorManifest::candidate_paths(Some("  ".to_string()), None);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0], PathBuf::from("./ledgerlens.yaml"));
    }

    #[test]
    fn test_overrides() {
        let mut manifest = OrchestratorManifest::default();
        let env: HashMap<&str, &str> = HashMap::from([
            ("LEDGERLENS_PRIMARY_PROVIDER", "openai"),
            ("LEDGERLENS_ENABLE_CONSENSUS", "yes"),
            ("LEDGERLENS_ENABLE_VALIDATION", "off"),
            ("LEDGERLENS_PROVIDER_TIMEOUT_MS", "1500"),
            ("LEDGERLENS_STRATEGY_MODE", "nonsense"),
        ]);
        manifest.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        let config = manifest.orchestration_config();
        assert_eq!(config.primary, "openai");
        assert!(config.strategies.consensus);
        assert!(!config.strategies.validation);
        assert_eq!(config.provider_timeout_ms, 1500);
        assert!(manifest.spec.orchestration.mode.is_none());
    }

    #[test]
    fn test_validation() {
        let mut manifest = OrchestratorManifest::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "WrongKind".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.metadata.name = "".to_string();
        assert!(manifest.validate().is_err());
        manifest.metadata.name = "test".to_string();

        // Primary must be a configured provider
        manifest.spec.orchestration.config.primary = "mistral".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.orchestration.config.primary = "gemini".to_string();

        // Duplicate names
        let duplicate = manifest.spec.providers[0].clone();
        manifest.spec.providers.push(duplicate);
        assert!(manifest.validate().is_err());
        manifest.spec.providers.pop();

        // Broken Handlebars override
        manifest.spec.prompts.enhancement = Some("{{#if answer}}unclosed".to_string());
        assert!(manifest.validate().is_err());
        manifest.spec.prompts.enhancement = None;

        // openai-compatible needs an endpoint
        manifest.spec.providers.push(ProviderConfig {
            name: "local".to_string(),
            provider_type: "openai-compatible".to_string(),
            endpoint: None,
            api_key: None,
            model: "llama".to_string(),
            enabled: true,
            priority: 9,
            specialties: vec![],
            cost_weight: 0.0,
            min_response_chars: None,
            refusal_phrases: None,
        });
        assert!(manifest.validate().is_err());
    }
}
