// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `ledgerlens health` - probe every registered provider

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

pub async fn execute(config_override: Option<PathBuf>) -> Result<()> {
    let manifest = super::load_manifest(config_override)?;
    let orchestrator = super::build_orchestrator(&manifest)?;

    let mut results: Vec<_> = orchestrator
        .registry()
        .health_check_all()
        .await
        .into_iter()
        .collect();
    results.sort_by(|a, b| a.0.cmp(&b.0));

    println!("{}", "Provider health:".bold());
    for (name, result) in &results {
        match result {
            Ok(()) => println!("  {} {}", "✓".green(), name.bold()),
            Err(e) => println!("  {} {} - {}", "✗".red(), name.bold(), e),
        }
    }

    // Configured but never registered (disabled or missing key)
    for provider in &manifest.spec.providers {
        if !orchestrator.registry().contains(&provider.name) {
            println!(
                "  {} {} - {}",
                "-".dimmed(),
                provider.name.bold(),
                "not registered".dimmed()
            );
        }
    }

    Ok(())
}
