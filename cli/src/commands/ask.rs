// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `ledgerlens ask` - one orchestrated generation

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use ledgerlens_core::domain::llm::GenerationOptions;
use ledgerlens_core::domain::orchestration::AnalysisResult;
use std::path::PathBuf;

#[derive(Args)]
pub struct AskArgs {
    /// The question to ask
    #[arg(value_name = "PROMPT")]
    prompt: String,

    /// Task hint for specialty routing (e.g. document_analysis)
    #[arg(short, long, value_name = "HINT")]
    task: Option<String>,

    /// Context prepended to the prompt
    #[arg(long, value_name = "TEXT")]
    context: Option<String>,

    /// Model override for the answering provider
    #[arg(long)]
    model: Option<String>,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: AskArgs, config_override: Option<PathBuf>) -> Result<()> {
    let manifest = super::load_manifest(config_override)?;
    let orchestrator = super::build_orchestrator(&manifest)?;

    let mut options = GenerationOptions::default();
    if let Some(context) = args.context {
        options = options.with_context(context);
    }
    if let Some(model) = args.model {
        options = options.with_model(model);
    }

    let result = orchestrator
        .generate(&args.prompt, args.task.as_deref(), &options)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    Ok(())
}

fn print_result(result: &AnalysisResult) {
    println!("{}", result.response);
    println!();

    let provider = if result.is_degraded() {
        result.provider.red()
    } else {
        result.provider.green()
    };
    println!(
        "{} {}  {} {:.2}  {} {} ms  {} ${:.4}",
        "provider:".dimmed(),
        provider,
        "confidence:".dimmed(),
        result.confidence,
        "time:".dimmed(),
        result.processing_time_ms,
        "cost:".dimmed(),
        result.estimated_cost
    );

    if let Some(details) = &result.validation_details {
        println!("{} {}", "validation:".dimmed(), details);
    }
    for step in &result.enhancement_steps {
        println!("{} {}", "enhancement:".dimmed(), step);
    }
    if !result.consensus_sources.is_empty() {
        println!(
            "{} {}",
            "consensus:".dimmed(),
            result.consensus_sources.join(", ")
        );
    }
}
