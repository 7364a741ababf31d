// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Provider contract, orchestration policy and configuration types.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Vendor-neutral types shared by the application and infrastructure layers

pub mod config;
pub mod events;
pub mod llm;
pub mod orchestration;
pub mod provider;
pub mod validation;
