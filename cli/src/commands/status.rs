// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `ledgerlens status` - registered providers and effective policy

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

pub async fn execute(config_override: Option<PathBuf>) -> Result<()> {
    let manifest = super::load_manifest(config_override)?;
    let orchestrator = super::build_orchestrator(&manifest)?;
    let status = orchestrator.status();
    let config = &status.config;

    println!("{}", "Registered providers:".bold());
    for descriptor in &status.providers {
        let specialties: Vec<&str> = descriptor.specialties.iter().map(String::as_str).collect();
        println!(
            "  {} (priority {}, cost weight {:.2})",
            descriptor.name.bold(),
            descriptor.priority,
            descriptor.cost_weight
        );
        if !specialties.is_empty() {
            println!("    Specialties: {}", specialties.join(", "));
        }
    }
    println!();

    println!("{}", "Orchestration:".bold());
    let primary_note = if status.primary_registered {
        "".normal()
    } else {
        " (not registered)".yellow()
    };
    println!("  Primary: {}{}", config.primary, primary_note);
    println!("  Backups: {}", config.backups.join(", "));
    println!(
        "  Strategies: validation={} enhancement={} consensus={} cost_optimization={} specialty_routing={}",
        config.strategies.validation,
        config.strategies.enhancement,
        config.strategies.consensus,
        config.strategies.cost_optimization,
        config.strategies.specialty_routing
    );
    println!(
        "  Thresholds: confidence_min={:.2} consensus_required={} max_retries={}",
        config.thresholds.confidence_min,
        config.thresholds.consensus_required,
        config.thresholds.max_retries
    );
    println!("  Provider timeout: {} ms", config.provider_timeout_ms);

    let mut specializations: Vec<_> = config.specializations.iter().collect();
    specializations.sort();
    if !specializations.is_empty() {
        println!("  Specializations:");
        for (task, provider) in specializations {
            println!("    {} → {}", task, provider);
        }
    }

    Ok(())
}
