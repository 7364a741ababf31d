// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Selection Policy
//!
//! Turns a task hint plus the registry state into an ordered candidate list:
//!
//! 1. the specialized provider for the hint (when specialty routing is on),
//! 2. the configured primary,
//! 3. the configured backups in order,
//! 4. every other registered provider by priority.
//!
//! Names that are not registered are dropped and duplicates keep their first
//! position, so the result is always a deterministic permutation of a subset
//! of the registry.

use crate::domain::orchestration::OrchestrationConfig;
use crate::domain::provider::ProviderDescriptor;
use crate::infrastructure::llm::ProviderRegistry;
use std::cmp::Ordering;

pub struct SelectionPolicy<'a> {
    config: &'a OrchestrationConfig,
    registry: &'a ProviderRegistry,
}

impl<'a> SelectionPolicy<'a> {
    pub fn new(config: &'a OrchestrationConfig, registry: &'a ProviderRegistry) -> Self {
        Self { config, registry }
    }

    /// First provider to try for this hint
    pub fn primary_candidate(&self, task_hint: Option<&str>) -> Option<String> {
        if self.config.strategies.specialty_routing {
            if let Some(hint) = task_hint {
                if let Some(name) = self.registry.specialized(hint, &self.config.specializations) {
                    return Some(name);
                }
            }
        }

        if self.registry.contains(&self.config.primary) {
            return Some(self.config.primary.clone());
        }

        self.remaining_in_priority_order().into_iter().next()
    }

    /// Full fallback chain for this hint
    pub fn candidates(&self, task_hint: Option<&str>) -> Vec<String> {
        let mut chain: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if self.registry.contains(name) && !chain.iter().any(|n| n == name) {
                chain.push(name.to_string());
            }
        };

        if let Some(first) = self.primary_candidate(task_hint) {
            push(&first);
        }
        push(&self.config.primary);
        for backup in &self.config.backups {
            push(backup);
        }
        for name in self.remaining_in_priority_order() {
            push(&name);
        }

        chain
    }

    /// Provider for an auxiliary stage: first registered entry of `preference`
    /// other than `exclude`, else any other registered provider by priority.
    pub fn stage_provider(&self, preference: &[String], exclude: &str) -> Option<String> {
        preference
            .iter()
            .find(|name| name.as_str() != exclude && self.registry.contains(name))
            .cloned()
            .or_else(|| {
                self.remaining_in_priority_order()
                    .into_iter()
                    .find(|name| name != exclude)
            })
    }

    /// Registered names by priority; with cost optimization, cheaper first
    /// among equal priorities. Remaining ties break by name.
    fn remaining_in_priority_order(&self) -> Vec<String> {
        let mut descriptors = self.registry.descriptors();
        let cost_optimization = self.config.strategies.cost_optimization;
        descriptors.sort_by(|a, b| compare(a, b, cost_optimization));
        descriptors.into_iter().map(|d| d.name).collect()
    }
}

fn compare(a: &ProviderDescriptor, b: &ProviderDescriptor, cost_optimization: bool) -> Ordering {
    let by_cost = if cost_optimization {
        a.cost_weight
            .partial_cmp(&b.cost_weight)
            .unwrap_or(Ordering::Equal)
    } else {
        Ordering::Equal
    };

    a.priority
        .cmp(&b.priority)
        .then(by_cost)
        .then_with(|| a.name.cmp(&b.name))
}
