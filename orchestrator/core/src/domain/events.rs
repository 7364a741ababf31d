// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Optional post-processing stage run after the base result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Enhancement,
    Consensus,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::Enhancement => "enhancement",
            Stage::Consensus => "consensus",
        };
        f.write_str(name)
    }
}

/// Events emitted while one orchestration call runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrchestrationEvent {
    /// Liveness probe said no; the retry budget was not consumed
    ProviderSkipped {
        request_id: Uuid,
        provider: String,
        skipped_at: DateTime<Utc>,
    },
    AttemptFailed {
        request_id: Uuid,
        provider: String,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    StageCompleted {
        request_id: Uuid,
        stage: Stage,
        provider: String,
        /// Whether the stage changed the result
        applied: bool,
        completed_at: DateTime<Utc>,
    },
    Completed {
        request_id: Uuid,
        provider: String,
        confidence: f64,
        processing_time_ms: u64,
        completed_at: DateTime<Utc>,
    },
    /// Every candidate failed; the placeholder result was returned
    Degraded {
        request_id: Uuid,
        degraded_at: DateTime<Utc>,
    },
}

impl OrchestrationEvent {
    pub fn request_id(&self) -> Uuid {
        match self {
            OrchestrationEvent::ProviderSkipped { request_id, .. }
            | OrchestrationEvent::AttemptFailed { request_id, .. }
            | OrchestrationEvent::StageCompleted { request_id, .. }
            | OrchestrationEvent::Completed { request_id, .. }
            | OrchestrationEvent::Degraded { request_id, .. } => *request_id,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrchestrationEvent::ProviderSkipped { skipped_at, .. } => *skipped_at,
            OrchestrationEvent::AttemptFailed { failed_at, .. } => *failed_at,
            OrchestrationEvent::StageCompleted { completed_at, .. } => *completed_at,
            OrchestrationEvent::Completed { completed_at, .. } => *completed_at,
            OrchestrationEvent::Degraded { degraded_at, .. } => *degraded_at,
        }
    }
}
