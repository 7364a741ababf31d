// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Multi-provider LLM orchestration core for LedgerLens.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Provider registry, selection, fallback and the validate / enhance / consensus stages

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
