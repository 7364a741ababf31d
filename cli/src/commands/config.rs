// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `ledgerlens config` - inspect, check and scaffold `ledgerlens.yaml`

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use ledgerlens_core::domain::config::OrchestratorManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective manifest (keys are never echoed)
    Show {
        /// Also list where the manifest is searched for
        #[arg(long)]
        paths: bool,
    },

    /// Check a manifest without contacting any provider
    Validate {
        /// Manifest to check (discovered when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write a starter manifest
    Generate {
        /// Destination file
        #[arg(short, long, default_value = "./ledgerlens.yaml")]
        output: PathBuf,

        /// Annotated template with every field
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    // Shown even when invalid, so problems can be inspected
    let manifest = OrchestratorManifest::load_or_default(config_override.clone())
        .context("Cannot read manifest")?;

    if show_paths {
        println!("{}", "Search order:".bold());
        let candidates = OrchestratorManifest::search_paths();
        for line in search_order(config_override.as_deref(), &candidates) {
            println!("  {}", line);
        }
        println!();
    }

    let revision = manifest.metadata.version.as_deref().unwrap_or("unversioned");
    println!(
        "{} {} ({})",
        "Deployment:".bold(),
        manifest.metadata.name,
        revision.dimmed()
    );
    println!();

    println!("{}", "Providers:".bold());
    for provider in &manifest.spec.providers {
        let state = if provider.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!(
            "  {} ({}, {}) [{}]",
            provider.name.bold(),
            provider.provider_type,
            provider.model,
            state
        );
        let key = match provider.api_key.as_deref() {
            Some(key) if key.starts_with("env:") => key.normal(),
            Some(_) => "inline key".yellow(),
            None => "no key".dimmed(),
        };
        println!(
            "    priority {}  {}{}",
            provider.priority,
            key,
            provider
                .endpoint
                .as_deref()
                .map(|endpoint| format!("  {}", endpoint))
                .unwrap_or_default()
        );
    }
    println!();

    let config = manifest.orchestration_config();
    let mode = manifest
        .spec
        .orchestration
        .mode
        .map(|mode| format!(" [{:?}]", mode))
        .unwrap_or_default();
    println!("{}{}", "Routing:".bold(), mode);
    let order: Vec<&str> = std::iter::once(config.primary.as_str())
        .chain(config.backups.iter().map(String::as_str))
        .collect();
    println!("  {}", order.join(" -> "));
    println!("  validators: {}", config.validator_preference.join(", "));
    println!("  enhancers:  {}", config.enhancer_preference.join(", "));
    if !manifest.spec.chain.is_empty() {
        println!("  default chain: {} steps", manifest.spec.chain.len());
    }

    Ok(())
}

/// One line per search location; `--config` short-circuits discovery
fn search_order(config_override: Option<&Path>, candidates: &[PathBuf]) -> Vec<String> {
    match config_override {
        Some(path) => vec![format!("{} (--config, discovery skipped)", path.display())],
        None => candidates
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let marker = if path.exists() { "found" } else { "missing" };
                format!("{}. {} [{}]", i + 1, path.display(), marker)
            })
            .collect(),
    }
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    let manifest = super::load_manifest(config_path)?;
    println!(
        "{} {} ({} providers)",
        "✓".green(),
        manifest.metadata.name,
        manifest.spec.providers.len()
    );
    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Cannot write {}", output.display()))?;

    println!("{} wrote {}", "✓".green(), output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_bundled_templates_are_valid() {
        for sample in [
            include_str!("../../templates/config-minimal.yaml"),
            include_str!("../../templates/config-with-examples.yaml"),
        ] {
            let manifest = ledgerlens_core::domain::config::OrchestratorManifest::from_yaml_str(sample)
                .unwrap();
            manifest.validate().unwrap();
        }
    }

    #[test]
    fn test_search_order_lists_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("ledgerlens.yaml");
        std::fs::write(&present, "").unwrap();
        let absent = dir.path().join("missing.yaml");

        let lines = super::search_order(None, &[present.clone(), absent.clone()]);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1. ") && lines[0].ends_with("[found]"));
        assert!(lines[1].starts_with("2. ") && lines[1].ends_with("[missing]"));

        let lines = super::search_order(Some(present.as_path()), &[absent]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("--config"));
    }

    #[tokio::test]
    async fn test_generate_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("ledgerlens.yaml");
        super::generate(output.clone(), false).await.unwrap();
        assert!(output.exists());
    }
}
