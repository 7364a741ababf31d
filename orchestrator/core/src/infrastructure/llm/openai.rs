// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI LLM Provider Adapter
//
// Anti-Corruption Layer for the Chat Completions API.
// Also serves xAI Grok and self-hosted OpenAI-compatible endpoints (vLLM, LM Studio, ...)

use crate::domain::llm::{
    FinishReason, GenerationOptions, GenerationResponse, LLMError, LLMProvider, ResponseHeuristics,
    TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
pub const XAI_ENDPOINT: &str = "https://api.x.ai/v1";

/// Canned apology openers that mark an OpenAI refusal
pub const OPENAI_REFUSALS: &[&str] = &["I apologize", "I cannot provide"];

pub struct OpenAIAdapter {
    client: reqwest::Client,
    /// Label reported in `GenerationResponse::provider`
    provider: String,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    heuristics: ResponseHeuristics,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAIAdapter {
    pub fn new(endpoint: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider: "openai".to_string(),
            endpoint,
            api_key,
            model,
            heuristics: ResponseHeuristics::with_refusals(OPENAI_REFUSALS.iter().copied()),
        }
    }

    /// xAI Grok through its OpenAI-compatible API
    pub fn grok(api_key: String, model: String) -> Self {
        Self::new(XAI_ENDPOINT.to_string(), Some(api_key), model)
            .with_provider_name("grok")
            .with_heuristics(ResponseHeuristics::default())
    }

    pub fn with_provider_name(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_heuristics(mut self, heuristics: ResponseHeuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIAdapter {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError> {
        let model = options.model_or(&self.model).to_string();

        // Translate our domain types to OpenAI's types
        let request = OpenAIRequest {
            model: model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: Some(options.render_prompt(prompt)),
            }],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stop: options.stop_sequences.clone(),
        };

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(status, error_text, &model));
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        // Translate OpenAI's response to our domain types
        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Provider("No response from model".into()))?;

        let usage = openai_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(GenerationResponse {
            text: choice.message.content.unwrap_or_default(),
            usage,
            provider: self.provider.clone(),
            model,
            finish_reason: match choice.finish_reason.as_deref() {
                Some("length") => FinishReason::Length,
                Some("content_filter") => FinishReason::ContentFilter,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        // Listing models is free and exercises the credential
        let url = format!("{}/models", self.endpoint.trim_end_matches('/'));

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(LLMError::Authentication("Invalid API key".into()))
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }

    fn validate_response(&self, text: &str) -> bool {
        self.heuristics.accepts(text)
    }
}
