//! Conversation title generation.
//!
//! A plain request/response call that shares the endpoint and message shape
//! with the streaming path but none of its state machine. It never fails from
//! the caller's point of view: any error yields a fallback title.

use crate::types::{ChatCompletion, ChatCompletionRequest, ChatMessage};
use crate::{Error, Result};
use std::time::Duration;

/// Instruction appended to the conversation.
pub const TITLE_INSTRUCTION: &str = "Summarize our conversation in 5 words or less.";

/// Token budget for the title.
pub const TITLE_MAX_TOKENS: u32 = 18;

/// Sampling temperature for the title.
pub const TITLE_TEMPERATURE: f32 = 0.1;

/// Title used when the server answered without any choice.
pub const NO_CHOICES_TITLE: &str = "Generated Conversation";

/// Title used when the request failed.
pub const FAILED_TITLE: &str = "Untitled Conversation";

/// Builds the non-streaming title request body.
pub fn build_title_request(model: &str, messages: &[ChatMessage]) -> ChatCompletionRequest {
    let mut messages = messages.to_vec();
    messages.push(ChatMessage::user(TITLE_INSTRUCTION));

    ChatCompletionRequest {
        model: model.to_string(),
        messages,
        stream: None,
        max_tokens: Some(TITLE_MAX_TOKENS),
        temperature: Some(TITLE_TEMPERATURE),
    }
}

/// Picks the title out of a completion response.
pub fn title_from_completion(completion: ChatCompletion) -> String {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| NO_CHOICES_TITLE.to_string())
}

/// Asks the model for a short title. Returns [`FAILED_TITLE`] on any error.
pub async fn generate_title(
    http: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    model: &str,
    messages: &[ChatMessage],
    timeout: Duration,
) -> String {
    match request_title(http, endpoint, api_key, model, messages, timeout).await {
        Ok(title) => title,
        Err(e) => {
            log::error!("Title generation failed: {}", e);
            FAILED_TITLE.to_string()
        }
    }
}

async fn request_title(
    http: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    model: &str,
    messages: &[ChatMessage],
    timeout: Duration,
) -> Result<String> {
    let body = build_title_request(model, messages);

    let response = http
        .post(endpoint)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .timeout(timeout)
        .json(&body)
        .send()
        .await
        .map_err(Error::Http)?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::api(format!("API error {}: {}", status, body)));
    }

    let completion: ChatCompletion = response.json().await.map_err(Error::Http)?;
    Ok(title_from_completion(completion))
}
