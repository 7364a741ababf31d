// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the optional validation, enhancement and consensus
//! stages.

mod support;

use ledgerlens_core::domain::events::{OrchestrationEvent, Stage};
use ledgerlens_core::domain::llm::{GenerationOptions, LLMError};
use ledgerlens_core::domain::orchestration::{OrchestrationConfig, BASELINE_CONFIDENCE};
use std::sync::Arc;
use support::{approx_eq, orchestrator, plain_config, ScriptedProvider};

const BASE_ANSWER: &str = "12345678901234567890";

fn is_validation(prompt: &str) -> bool {
    prompt.starts_with("Review the following answer")
}

fn is_enhancement(prompt: &str) -> bool {
    prompt.starts_with("You received an initial")
}

fn is_consensus(prompt: &str) -> bool {
    prompt.starts_with("Several analysts")
}

/// Second provider that answers stage prompts with fixed replies
fn reviewer(verdict: &'static str, enhancement: String) -> ScriptedProvider {
    ScriptedProvider::with_handler(move |prompt: &str, _: &GenerationOptions| {
        if is_validation(prompt) {
            Ok(verdict.to_string())
        } else if is_enhancement(prompt) {
            Ok(enhancement.clone())
        } else {
            Ok("Reviewer answering the base prompt.".to_string())
        }
    })
}

fn stage_config(validation: bool, enhancement: bool) -> OrchestrationConfig {
    let mut config = plain_config("A");
    config.strategies.validation = validation;
    config.strategies.enhancement = enhancement;
    config.validator_preference = vec!["B".to_string(), "A".to_string()];
    config.enhancer_preference = vec!["B".to_string(), "A".to_string()];
    config
}

#[tokio::test]
async fn test_validation_uses_a_different_provider() {
    let a = Arc::new(ScriptedProvider::replying(BASE_ANSWER));
    let b = Arc::new(reviewer(r#"{"valid": true, "notes": "figures check out"}"#, String::new()));

    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], stage_config(true, false));
    let result = orchestrator
        .generate("Is my spending up?", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(result.provider, "A");
    assert!(result.validated);
    assert!(approx_eq(result.confidence, 0.9));
    assert_eq!(result.response, BASE_ANSWER);
    assert_eq!(
        result.validation_details.as_deref(),
        Some("B: valid=true (figures check out)")
    );

    // The validator saw the question and the answer under review
    let recorded = b.recorded();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].prompt.contains("Is my spending up?"));
    assert!(recorded[0].prompt.contains(BASE_ANSWER));
    assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn test_validator_preference_naming_base_provider_is_skipped() {
    let a = Arc::new(ScriptedProvider::replying(BASE_ANSWER));
    let b = Arc::new(reviewer(r#"{"valid": true}"#, String::new()));

    let mut config = stage_config(true, false);
    config.validator_preference = vec!["A".to_string()];
    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], config);

    let result = orchestrator
        .generate("Hello", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert!(result.validated);
    assert_eq!(result.validation_details.as_deref(), Some("B: valid=true"));
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn test_invalid_verdict_applies_correction() {
    let a = Arc::new(ScriptedProvider::replying(BASE_ANSWER));
    let b = Arc::new(reviewer(
        "```json\n{\"valid\": false, \"corrected\": \"Spending rose 12% in March.\", \"notes\": \"wrong month\"}\n```",
        String::new(),
    ));

    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], stage_config(true, false));
    let result = orchestrator
        .generate("Hello", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert!(result.validated);
    assert_eq!(result.response, "Spending rose 12% in March.");
    // No bonus for a rejected answer
    assert!(approx_eq(result.confidence, BASELINE_CONFIDENCE));
    assert_eq!(result.provider, "A");
}

#[tokio::test]
async fn test_free_text_verdict_is_discarded() {
    let a = Arc::new(ScriptedProvider::replying(BASE_ANSWER));
    let b = Arc::new(reviewer("Looks fine to me, nothing to add.", String::new()));

    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], stage_config(true, false));
    let mut receiver = orchestrator.event_bus().subscribe();

    let result = orchestrator
        .generate("Hello", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert!(!result.validated);
    assert!(result.validation_details.is_none());
    assert_eq!(result.response, BASE_ANSWER);
    assert!(approx_eq(result.confidence, BASELINE_CONFIDENCE));

    let mut saw_stage = false;
    while let Ok(event) = receiver.try_recv() {
        if let OrchestrationEvent::StageCompleted { stage, applied, .. } = event {
            assert_eq!(stage, Stage::Validation);
            assert!(!applied);
            saw_stage = true;
        }
    }
    assert!(saw_stage);
}

#[tokio::test]
async fn test_enhancement_below_growth_threshold_is_rejected() {
    let a = Arc::new(ScriptedProvider::replying(BASE_ANSWER));
    let b = Arc::new(reviewer(r#"{"valid": true}"#, "e".repeat(23)));

    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], stage_config(false, true));
    let result = orchestrator
        .generate("Hello", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert!(!result.enhanced);
    assert_eq!(result.response, BASE_ANSWER);
    assert!(result.enhancement_steps.is_empty());
    assert!(approx_eq(result.confidence, BASELINE_CONFIDENCE));
}

#[tokio::test]
async fn test_enhancement_at_growth_threshold_is_accepted() {
    let a = Arc::new(ScriptedProvider::replying(BASE_ANSWER));
    let b = Arc::new(reviewer(r#"{"valid": true}"#, "e".repeat(24)));

    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], stage_config(false, true));
    let result = orchestrator
        .generate("Hello", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert!(result.enhanced);
    assert_eq!(result.response, "e".repeat(24));
    assert!(approx_eq(result.confidence, 0.95));
    assert_eq!(
        result.enhancement_steps,
        vec!["Enhanced by B", "Original: 20 chars", "Enhanced: 24 chars"]
    );
    // Provider still names whoever produced the base answer
    assert_eq!(result.provider, "A");
}

#[tokio::test]
async fn test_confidence_is_capped_at_one() {
    let a = Arc::new(ScriptedProvider::replying(BASE_ANSWER));
    let b = Arc::new(reviewer(r#"{"valid": true}"#, "e".repeat(40)));

    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], stage_config(true, true));
    let result = orchestrator
        .generate("Hello", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert!(result.validated && result.enhanced);
    assert!(approx_eq(result.confidence, 1.0));
}

#[tokio::test]
async fn test_single_provider_skips_cross_provider_stages() {
    let a = Arc::new(ScriptedProvider::replying(BASE_ANSWER));

    let orchestrator = orchestrator(&[("A", 1, &a)], stage_config(true, true));
    let result = orchestrator
        .generate("Hello", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert!(!result.validated);
    assert!(!result.enhanced);
    assert!(approx_eq(result.confidence, BASELINE_CONFIDENCE));
    assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn test_validator_error_leaves_result_untouched() {
    let a = Arc::new(ScriptedProvider::replying(BASE_ANSWER));
    let b = Arc::new(ScriptedProvider::failing());

    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], stage_config(true, false));
    let mut receiver = orchestrator.event_bus().subscribe();

    let result = orchestrator
        .generate("Hello", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(result.provider, "A");
    assert!(!result.validated);
    assert!(result.validation_details.is_none());
    assert_eq!(result.response, BASE_ANSWER);
    assert!(approx_eq(result.confidence, BASELINE_CONFIDENCE));
    assert_eq!(b.calls(), 1);

    let mut saw_stage = false;
    while let Ok(event) = receiver.try_recv() {
        if let OrchestrationEvent::StageCompleted { stage, provider, applied, .. } = event {
            assert_eq!(stage, Stage::Validation);
            assert_eq!(provider, "B");
            assert!(!applied);
            saw_stage = true;
        }
    }
    assert!(saw_stage);
}

#[tokio::test]
async fn test_unavailable_validator_leaves_result_untouched() {
    let a = Arc::new(ScriptedProvider::replying(BASE_ANSWER));
    let b = Arc::new(ScriptedProvider::unavailable());

    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], stage_config(true, false));
    let result = orchestrator
        .generate("Hello", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert!(!result.validated);
    assert_eq!(result.response, BASE_ANSWER);
    assert!(approx_eq(result.confidence, BASELINE_CONFIDENCE));
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_enhancer_error_leaves_result_untouched() {
    let a = Arc::new(ScriptedProvider::replying(BASE_ANSWER));
    let b = Arc::new(ScriptedProvider::failing());

    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], stage_config(false, true));
    let result = orchestrator
        .generate("Hello", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert!(!result.enhanced);
    assert!(result.enhancement_steps.is_empty());
    assert_eq!(result.response, BASE_ANSWER);
    assert!(approx_eq(result.confidence, BASELINE_CONFIDENCE));
    assert_eq!(b.calls(), 1);
}

fn consensus_config() -> OrchestrationConfig {
    let mut config = plain_config("A");
    config.strategies.consensus = true;
    config.thresholds.confidence_min = 0.95;
    config.thresholds.consensus_required = 2;
    config
}

#[tokio::test]
async fn test_consensus_replaces_low_confidence_answer() {
    let a = Arc::new(ScriptedProvider::with_handler(|prompt: &str, _: &GenerationOptions| {
        if is_consensus(prompt) {
            Ok("Both analysts agree income rose.".to_string())
        } else {
            Ok("Income rose in the last quarter.".to_string())
        }
    }));
    let b = Arc::new(ScriptedProvider::replying("Income went up over the quarter."));

    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], consensus_config());
    let result = orchestrator
        .generate("Did income rise?", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(result.response, "Both analysts agree income rose.");
    assert!(approx_eq(result.confidence, 0.9));
    assert_eq!(result.consensus_sources, vec!["A", "B"]);

    // Base answer, independent poll, synthesis
    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 1);

    let synthesis = a.recorded().pop().unwrap();
    assert!(synthesis.prompt.contains("Income rose in the last quarter."));
    assert!(synthesis.prompt.contains("Income went up over the quarter."));
}

#[tokio::test]
async fn test_consensus_with_one_answer_keeps_result() {
    let a = Arc::new(ScriptedProvider::replying("Income rose in the last quarter."));
    let b = Arc::new(ScriptedProvider::with_handler(|_: &str, _: &GenerationOptions| {
        Err(LLMError::RateLimit)
    }));

    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], consensus_config());
    let result = orchestrator
        .generate("Did income rise?", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(result.response, "Income rose in the last quarter.");
    assert!(result.consensus_sources.is_empty());
    assert!(approx_eq(result.confidence, BASELINE_CONFIDENCE));
}

#[tokio::test]
async fn test_consensus_not_triggered_above_threshold() {
    let a = Arc::new(ScriptedProvider::replying("Income rose in the last quarter."));
    let b = Arc::new(ScriptedProvider::replying("Income went up over the quarter."));

    let mut config = consensus_config();
    config.thresholds.confidence_min = 0.7;
    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], config);

    let result = orchestrator
        .generate("Did income rise?", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert!(result.consensus_sources.is_empty());
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_failed_synthesis_keeps_prior_answer() {
    let a = Arc::new(ScriptedProvider::with_handler(|prompt: &str, _: &GenerationOptions| {
        if is_consensus(prompt) {
            Err(LLMError::Timeout(60_000))
        } else {
            Ok("Income rose in the last quarter.".to_string())
        }
    }));
    let b = Arc::new(ScriptedProvider::replying("Income went up over the quarter."));

    let orchestrator = orchestrator(&[("A", 1, &a), ("B", 2, &b)], consensus_config());
    let result = orchestrator
        .generate("Did income rise?", None, &GenerationOptions::default())
        .await
        .unwrap();

    assert_eq!(result.provider, "A");
    assert_eq!(result.response, "Income rose in the last quarter.");
    assert!(result.consensus_sources.is_empty());
    assert!(approx_eq(result.confidence, BASELINE_CONFIDENCE));

    // Both polls answered; only the synthesis failed
    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 1);
    assert!(is_consensus(&a.recorded()[2].prompt));
}
