// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # LedgerLens CLI
//!
//! Drives the multi-provider orchestration core from the command line.
//!
//! ## Commands
//!
//! - `ledgerlens ask <PROMPT>` - One orchestrated generation
//! - `ledgerlens chain [FRAGMENT...]` - Sequential prompt chain
//! - `ledgerlens health` - Probe every configured provider
//! - `ledgerlens status` - Registered providers and effective policy
//! - `ledgerlens config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

use commands::{AskArgs, ChainArgs, ConfigCommand};

/// LedgerLens - multi-provider LLM orchestration
#[derive(Parser)]
#[command(name = "ledgerlens")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "LEDGERLENS_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LEDGERLENS_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one orchestrated generation
    #[command(name = "ask")]
    Ask(AskArgs),

    /// Run prompt fragments in sequence
    #[command(name = "chain")]
    Chain(ChainArgs),

    /// Check availability of every configured provider
    #[command(name = "health")]
    Health,

    /// Show registered providers and the effective orchestration policy
    #[command(name = "status")]
    Status,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Provider keys usually live in .env during development
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Some(Commands::Ask(args)) => commands::ask::execute(args, cli.config).await,
        Some(Commands::Chain(args)) => commands::chain::execute(args, cli.config).await,
        Some(Commands::Health) => commands::health::execute(cli.config).await,
        Some(Commands::Status) => commands::status::execute(cli.config).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
