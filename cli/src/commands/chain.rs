// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `ledgerlens chain` - run prompt fragments in sequence

use anyhow::{bail, Result};
use clap::Args;
use ledgerlens_core::application::PromptChainRunner;
use std::path::PathBuf;

#[derive(Args)]
pub struct ChainArgs {
    /// Prompt fragments (default: `spec.chain` from the configuration)
    #[arg(value_name = "FRAGMENT")]
    fragments: Vec<String>,

    /// Input text handed to the first step as context
    #[arg(short, long, value_name = "TEXT", default_value = "")]
    input: String,
}

pub async fn execute(args: ChainArgs, config_override: Option<PathBuf>) -> Result<()> {
    let manifest = super::load_manifest(config_override)?;

    let fragments = if args.fragments.is_empty() {
        manifest.spec.chain.clone()
    } else {
        args.fragments
    };
    if fragments.is_empty() && args.input.trim().is_empty() {
        bail!("Nothing to run: pass fragments, --input, or configure spec.chain");
    }

    let orchestrator = super::build_orchestrator(&manifest)?;
    let runner = PromptChainRunner::new(orchestrator);

    let output = runner.run_with_input(&args.input, &fragments).await?;
    println!("{}", output);

    Ok(())
}
