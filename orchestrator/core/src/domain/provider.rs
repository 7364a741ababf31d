// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Descriptor - registration metadata for one LLM vendor
//
// Priority and cost weight drive the selection policy; specialty tags are
// descriptive only (status output), routing uses the specializations map.
// The adapter itself is held separately by the registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Registration metadata for one configured provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique provider name (e.g., "gemini", "anthropic")
    pub name: String,

    /// Lower = preferred in the default fallback order
    pub priority: u32,

    /// Task hints this provider is preferred for
    #[serde(default)]
    pub specialties: BTreeSet<String>,

    /// Relative per-token cost. Informational, never enforced as a budget.
    #[serde(default = "default_cost_weight")]
    pub cost_weight: f64,
}

impl ProviderDescriptor {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            specialties: BTreeSet::new(),
            cost_weight: default_cost_weight(),
        }
    }

    pub fn with_specialties<I, S>(mut self, specialties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.specialties = specialties.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cost_weight(mut self, cost_weight: f64) -> Self {
        self.cost_weight = cost_weight;
        self
    }

    pub fn has_specialty(&self, task_hint: &str) -> bool {
        self.specialties.contains(task_hint)
    }

    /// Informational cost of a response of `response_chars` characters
    /// (roughly four characters per token, priced per thousand tokens).
    pub fn estimate_cost(&self, response_chars: usize) -> f64 {
        let tokens = response_chars.div_ceil(4) as f64;
        self.cost_weight * tokens * 0.001
    }
}

fn default_cost_weight() -> f64 {
    1.0
}
