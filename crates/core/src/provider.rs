//! Provider trait, the abstraction over chat-completion backends.
//!
//! A Provider takes an ordered turn list plus sampling parameters and an
//! optional tool catalog, and returns one assistant turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Turn;

/// Sampling knobs forwarded to the backend. `None` means "use the backend default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

/// How the model may use the offered tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
            ToolChoice::Required => "required",
        }
    }
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// One chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model identifier (e.g., "gpt-4o-mini-2024-07-18")
    pub model: String,

    /// The conversation, system turn first
    pub turns: Vec<Turn>,

    #[serde(default)]
    pub sampling: SamplingParams,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            model: model.into(),
            turns,
            sampling: SamplingParams::default(),
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>, choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = Some(choice);
        self
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant turn (may carry tool calls)
    pub message: Turn,

    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Backend finish reason, e.g. "stop" or "tool_calls"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl ProviderResponse {
    /// Finish reason carried by locally fabricated responses.
    pub const SYNTHETIC_FINISH_REASON: &'static str = "ERROR";

    /// A locally built response carrying a fixed apology text.
    ///
    /// Its shape matches a real completion so callers can treat it
    /// uniformly; usage is zero and the finish reason is `"ERROR"`.
    pub fn synthetic(text: impl Into<String>) -> Self {
        Self {
            message: Turn::assistant(text),
            usage: Some(Usage::default()),
            model: String::new(),
            finish_reason: Some(Self::SYNTHETIC_FINISH_REASON.to_string()),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.finish_reason.as_deref() == Some(Self::SYNTHETIC_FINISH_REASON)
    }

    pub fn content(&self) -> &str {
        self.message.content()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The conversation layer calls `complete()` without knowing which backend
/// answers; tests substitute scripted implementations.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_response_shape() {
        let resp = ProviderResponse::synthetic("메세지를 조금 짧게 보내주세요.");
        assert!(resp.is_synthetic());
        assert_eq!(resp.content(), "메세지를 조금 짧게 보내주세요.");
        assert_eq!(resp.message.role(), "assistant");
        assert_eq!(resp.usage.unwrap().total_tokens, 0);
    }

    #[test]
    fn request_builder_sets_tool_choice() {
        let tool = ToolDefinition {
            name: "search_internet".into(),
            description: "search".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        };
        let req = ProviderRequest::new("gpt-4o", vec![Turn::system("s")])
            .with_tools(vec![tool], ToolChoice::Auto);
        assert_eq!(req.tool_choice, Some(ToolChoice::Auto));
        assert_eq!(req.tools.len(), 1);
        assert!(req.sampling.temperature.is_none());
    }

    #[test]
    fn sampling_omits_unset_fields() {
        let json = serde_json::to_value(SamplingParams {
            temperature: Some(0.7),
            ..Default::default()
        })
        .unwrap();
        assert!(json.get("temperature").is_some());
        assert!(json.get("top_p").is_none());
    }
}
