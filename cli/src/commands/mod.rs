// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the LedgerLens CLI

pub mod ask;
pub mod chain;
pub mod config;
pub mod health;
pub mod status;

pub use self::ask::AskArgs;
pub use self::chain::ChainArgs;
pub use self::config::ConfigCommand;

use anyhow::{bail, Context, Result};
use ledgerlens_core::application::Orchestrator;
use ledgerlens_core::domain::config::OrchestratorManifest;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Load and validate the manifest (discovery unless `config_override` is set)
pub(crate) fn load_manifest(config_override: Option<PathBuf>) -> Result<OrchestratorManifest> {
    let manifest = OrchestratorManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    manifest
        .validate()
        .context("Configuration validation failed")?;
    Ok(manifest)
}

/// Build an orchestrator; fails when no provider could be registered
pub(crate) fn build_orchestrator(
    manifest: &OrchestratorManifest,
) -> Result<Arc<Orchestrator>> {
    let orchestrator =
        Orchestrator::from_manifest(manifest).context("Failed to initialize orchestrator")?;

    if orchestrator.registry().is_empty() {
        bail!(
            "No LLM providers registered. Set provider API keys (e.g. GEMINI_API_KEY) or enable a provider in the configuration"
        );
    }

    info!(
        "Orchestrator ready with {} providers (primary: {})",
        orchestrator.registry().len(),
        orchestrator.config().primary
    );
    Ok(Arc::new(orchestrator))
}
