//! OpenAI-backed text generation for idea plans.
//!
//! This module provides a client that connects directly to OpenAI's Chat
//! Completions API. Users provide their own OpenAI API key.

use crate::error::GenerationError;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument, warn};
use zeroize::Zeroize;

/// Maximum number of retry attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Initial delay between retries (doubles with each attempt).
const INITIAL_RETRY_DELAY_MS: u64 = 1000;

/// OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Producer of plan text from a single prompt.
///
/// Every call is a fresh single-prompt request: no streaming, no
/// multi-turn history.
#[async_trait]
pub(crate) trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Client for direct OpenAI Chat Completions API calls.
pub(crate) struct OpenAIGenerator {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

/// Request body for OpenAI Chat Completions API.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

/// Message in the OpenAI request.
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response from OpenAI Chat Completions API.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

/// Choice in the response.
#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

/// Response message content.
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAIGenerator {
    /// Create a new generator client.
    pub(crate) fn new(api_key: String, model: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client for OpenAIGenerator")?;

        Ok(Self {
            api_key,
            model,
            client,
        })
    }

    /// Extract text from the OpenAI response structure.
    fn extract_text(response: &ChatCompletionResponse) -> Result<String, GenerationError> {
        response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                GenerationError::InvalidResponse("No text content in OpenAI response".into())
            })
    }

    /// Check if a reqwest error is retryable (transient).
    fn is_retryable_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    /// Generate plan text for a single prompt.
    ///
    /// Includes retry logic for transient network failures.
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request_body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let mut last_error: Option<GenerationError> = None;
        let mut retry_delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                warn!(
                    attempt = attempt,
                    max_retries = MAX_RETRIES,
                    delay_ms = retry_delay.as_millis(),
                    "Retrying OpenAI generation request after transient failure"
                );
                tokio::time::sleep(retry_delay).await;
                retry_delay *= 2;
            }

            let result = self
                .client
                .post(OPENAI_API_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request_body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    if response.status().is_success() {
                        let chat_response: ChatCompletionResponse =
                            response.json().await.map_err(|e| {
                                GenerationError::InvalidResponse(format!(
                                    "Failed to parse OpenAI response: {}",
                                    e
                                ))
                            })?;

                        let text = Self::extract_text(&chat_response)?;

                        if attempt > 0 {
                            info!(
                                attempt = attempt,
                                "OpenAI generation request succeeded after retry"
                            );
                        }

                        return Ok(text);
                    }

                    let status = response.status().as_u16();
                    let message = response.text().await.unwrap_or_default();

                    let error = GenerationError::ServerError { status, message };

                    // Retry on 5xx server errors
                    if (500..600).contains(&status) && attempt < MAX_RETRIES {
                        warn!(
                            status = status,
                            attempt = attempt,
                            "Server error, will retry"
                        );
                        last_error = Some(error);
                        continue;
                    }

                    return Err(error);
                }
                Err(e) => {
                    // Retry on network errors
                    if Self::is_retryable_error(&e) && attempt < MAX_RETRIES {
                        warn!(error = %e, attempt = attempt, "Network error, will retry");
                        last_error = Some(GenerationError::Network(e));
                        continue;
                    }

                    return Err(GenerationError::Network(e));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GenerationError::InvalidResponse("Unexpected retry loop exit".into())))
    }
}

impl Drop for OpenAIGenerator {
    fn drop(&mut self) {
        // Clear API key from memory
        self.api_key.zeroize();
    }
}
