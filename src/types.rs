//! Core types: stream options, chat messages, the immutable request, and the
//! OpenAI-compatible wire formats.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Options for configuring streamed chat completions
#[derive(Clone)]
pub struct StreamOptions {
    /// Full chat-completions URL
    pub endpoint: String,

    /// Model name (e.g., "deepseek-ai/DeepSeek-R1")
    pub model: String,

    /// Bearer credential; `None` defers to the client's credential source
    pub api_key: Option<String>,

    /// Sampling temperature (0.0 to 2.0)
    pub temperature: f32,

    /// TCP connect timeout in seconds
    pub connect_timeout: u64,

    /// Maximum silence between body chunks, in seconds. Expiry cancels the run.
    pub idle_timeout: Option<u64>,

    /// Whether the consumer should keep the view pinned to the newest text
    pub auto_scroll: bool,

    /// Model used for title generation (defaults to `model`)
    pub title_model: Option<String>,

    /// Whole-request timeout for title generation, in seconds
    pub title_timeout: u64,
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("temperature", &self.temperature)
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("auto_scroll", &self.auto_scroll)
            .field("title_model", &self.title_model)
            .field("title_timeout", &self.title_timeout)
            .finish()
    }
}

impl StreamOptions {
    /// Create a new builder for StreamOptions
    pub fn builder() -> StreamOptionsBuilder {
        StreamOptionsBuilder::default()
    }

    /// Options resolved from the environment (see [`crate::get_endpoint`] and
    /// [`crate::get_model`]).
    pub fn from_env() -> crate::Result<Self> {
        Self::builder()
            .endpoint(crate::get_endpoint(None))
            .model(crate::get_model(None, true))
            .build()
    }

    /// The idle timeout as a [`Duration`], if one is set.
    pub fn idle_timeout_duration(&self) -> Option<Duration> {
        self.idle_timeout.map(Duration::from_secs)
    }

    /// Model used for titles: `title_model` if set, else `model`.
    pub fn title_model(&self) -> &str {
        self.title_model.as_deref().unwrap_or(&self.model)
    }
}

/// Builder for StreamOptions
#[derive(Default)]
pub struct StreamOptionsBuilder {
    endpoint: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    temperature: Option<f32>,
    connect_timeout: Option<u64>,
    idle_timeout: Option<u64>,
    auto_scroll: Option<bool>,
    title_model: Option<String>,
    title_timeout: Option<u64>,
}

impl std::fmt::Debug for StreamOptionsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptionsBuilder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl StreamOptionsBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout = Some(secs);
        self
    }

    pub fn idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout = Some(secs);
        self
    }

    pub fn auto_scroll(mut self, auto: bool) -> Self {
        self.auto_scroll = Some(auto);
        self
    }

    pub fn title_model(mut self, model: impl Into<String>) -> Self {
        self.title_model = Some(model.into());
        self
    }

    pub fn title_timeout(mut self, secs: u64) -> Self {
        self.title_timeout = Some(secs);
        self
    }

    /// Validates the options. `endpoint` and `model` are required.
    pub fn build(self) -> crate::Result<StreamOptions> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| crate::Error::config("endpoint is required"))?;

        let model = self
            .model
            .ok_or_else(|| crate::Error::config("model is required"))?;

        let temperature = self.temperature.unwrap_or(0.7);
        if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
            return Err(crate::Error::config(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                temperature
            )));
        }

        if self.idle_timeout == Some(0) {
            return Err(crate::Error::config("idle_timeout must be at least 1 second"));
        }

        Ok(StreamOptions {
            endpoint,
            model,
            api_key: self.api_key,
            temperature,
            connect_timeout: self.connect_timeout.unwrap_or(30),
            idle_timeout: self.idle_timeout,
            auto_scroll: self.auto_scroll.unwrap_or(true),
            title_model: self.title_model,
            title_timeout: self.title_timeout.unwrap_or(30),
        })
    }
}

/// Message role in the conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in the conversation, in the `{role, content}` shape the API takes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }
}

/// One streamed completion request. Immutable once built.
#[derive(Clone)]
pub struct StreamRequest {
    endpoint: String,
    api_key: String,
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    cancel: CancellationToken,
}

impl std::fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRequest")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("messages", &self.messages.len())
            .field("temperature", &self.temperature)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl StreamRequest {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
        temperature: f32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            messages,
            temperature,
            cancel,
        }
    }

    /// Build a request from options plus a resolved credential.
    pub fn from_options(
        options: &StreamOptions,
        api_key: impl Into<String>,
        messages: Vec<ChatMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(
            options.endpoint.clone(),
            api_key,
            options.model.clone(),
            messages,
            options.temperature,
            cancel,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Token that aborts the run when cancelled.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The JSON body for the streaming call.
    pub fn body(&self) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: self.messages.clone(),
            stream: Some(true),
            max_tokens: None,
            temperature: Some(self.temperature),
        }
    }
}

/// Chat-completions request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Streaming chunk carried by one `data:` line
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// Choice in a streaming chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

/// Delta in a streaming chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

/// Non-streaming completion response (title generation)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_options_builder() {
        let options = StreamOptions::builder()
            .endpoint("http://localhost:1234/v1/chat/completions")
            .model("test-model")
            .api_key("test-key")
            .temperature(0.5)
            .connect_timeout(5)
            .idle_timeout(20)
            .auto_scroll(false)
            .title_model("small-model")
            .title_timeout(10)
            .build()
            .unwrap();

        assert_eq!(options.endpoint, "http://localhost:1234/v1/chat/completions");
        assert_eq!(options.model, "test-model");
        assert_eq!(options.api_key.as_deref(), Some("test-key"));
        assert_eq!(options.temperature, 0.5);
        assert_eq!(options.connect_timeout, 5);
        assert_eq!(options.idle_timeout_duration(), Some(Duration::from_secs(20)));
        assert!(!options.auto_scroll);
        assert_eq!(options.title_model(), "small-model");
        assert_eq!(options.title_timeout, 10);
    }

    #[test]
    fn test_stream_options_builder_defaults() {
        let options = StreamOptions::builder()
            .endpoint("http://localhost:1234/v1/chat/completions")
            .model("test-model")
            .build()
            .unwrap();

        assert_eq!(options.api_key, None);
        assert_eq!(options.temperature, 0.7);
        assert_eq!(options.connect_timeout, 30);
        assert_eq!(options.idle_timeout, None);
        assert!(options.auto_scroll);
        assert_eq!(options.title_model(), "test-model");
    }

    #[test]
    fn test_stream_options_builder_missing_required() {
        let result = StreamOptions::builder().model("test-model").build();
        assert!(result.is_err());

        let result = StreamOptions::builder()
            .endpoint("http://localhost:1234/v1/chat/completions")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_stream_options_rejects_bad_values() {
        let base = || {
            StreamOptions::builder()
                .endpoint("http://localhost/v1/chat/completions")
                .model("m")
        };
        assert!(base().temperature(2.5).build().is_err());
        assert!(base().temperature(f32::NAN).build().is_err());
        assert!(base().idle_timeout(0).build().is_err());
        assert!(base().temperature(0.0).build().is_ok());
    }

    #[test]
    fn test_debug_masks_api_key() {
        let options = StreamOptions::builder()
            .endpoint("http://localhost/v1/chat/completions")
            .model("m")
            .api_key("sk-very-secret")
            .build()
            .unwrap();
        assert!(!format!("{:?}", options).contains("sk-very-secret"));

        let request = StreamRequest::from_options(
            &options,
            "sk-very-secret",
            vec![ChatMessage::user("hi")],
            CancellationToken::new(),
        );
        assert!(!format!("{:?}", request).contains("sk-very-secret"));
    }

    #[test]
    fn test_message_role_serialization() {
        assert_eq!(serde_json::to_string(&MessageRole::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&MessageRole::System).unwrap(),
            "\"system\""
        );
        assert_eq!(
            serde_json::to_string(&MessageRole::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_stream_request_body() {
        let request = StreamRequest::new(
            "http://localhost/v1/chat/completions",
            "key",
            "deepseek-ai/DeepSeek-R1",
            vec![ChatMessage::system("be brief"), ChatMessage::user("Hello")],
            0.3,
            CancellationToken::new(),
        );

        let json = serde_json::to_value(request.body()).unwrap();
        assert_eq!(json["model"], "deepseek-ai/DeepSeek-R1");
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert!((json["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_chunk_deserialization_with_reasoning() {
        let json = r#"{
            "id": "chunk_1",
            "object": "chat.completion.chunk",
            "choices": [{
                "index": 0,
                "delta": {"content": null, "reasoning_content": "hmm"},
                "finish_reason": null
            }]
        }"#;

        let chunk: ChatCompletionChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.choices.len(), 1);
        assert_eq!(chunk.choices[0].delta.content, None);
        assert_eq!(
            chunk.choices[0].delta.reasoning_content.as_deref(),
            Some("hmm")
        );
    }

    #[test]
    fn test_chunk_without_choices() {
        let chunk: ChatCompletionChunk = serde_json::from_str(r#"{"usage":{}}"#).unwrap();
        assert!(chunk.choices.is_empty());
    }

    #[test]
    fn test_completion_deserialization() {
        let json =
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Rust chat"}}]}"#;
        let completion: ChatCompletion = serde_json::from_str(json).unwrap();
        assert_eq!(
            completion.choices[0].message.content.as_deref(),
            Some("Rust chat")
        );
    }
}
