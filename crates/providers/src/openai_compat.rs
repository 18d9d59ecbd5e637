//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI and any endpoint exposing `/chat/completions` with
//! function calling. Supports:
//! - Tool catalogs and `tool_choice`
//! - The full sampling parameter set
//! - A per-call timeout and a bounded retry on transient failures

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smartday_core::error::ProviderError;
use smartday_core::message::{ToolCallRequest, Turn};
use smartday_core::provider::*;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// An OpenAI-compatible chat-completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider with a 30 second timeout and one retry.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_retries: 1,
            client: build_client(Duration::from_secs(30)),
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert turns to OpenAI API messages.
    ///
    /// Tool turns are only emitted when a preceding assistant turn announced
    /// their call id, and announced calls are only kept when answered. Both
    /// can be broken by front eviction, which the API rejects.
    fn to_api_messages(turns: &[Turn]) -> Vec<ApiMessage> {
        let answered: HashSet<&str> = turns
            .iter()
            .filter_map(|t| match t {
                Turn::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();
        let mut announced: HashSet<&str> = HashSet::new();
        let mut out = Vec::with_capacity(turns.len());

        for turn in turns {
            match turn {
                Turn::Tool {
                    tool_call_id,
                    content,
                    ..
                } => {
                    if !announced.contains(tool_call_id.as_str()) {
                        debug!(call_id = %tool_call_id, "Skipping orphaned tool turn");
                        continue;
                    }
                    out.push(ApiMessage {
                        role: "tool".into(),
                        content: Some(content.clone()),
                        tool_calls: None,
                        tool_call_id: Some(tool_call_id.clone()),
                    });
                }
                Turn::Assistant { tool_calls, .. } => {
                    let calls: Vec<ApiToolCall> = tool_calls
                        .iter()
                        .filter(|tc| answered.contains(tc.id.as_str()))
                        .map(|tc| {
                            announced.insert(tc.id.as_str());
                            ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            }
                        })
                        .collect();
                    let content = turn.rendered_content().into_owned();
                    out.push(ApiMessage {
                        role: "assistant".into(),
                        content: if content.is_empty() && !calls.is_empty() {
                            None
                        } else {
                            Some(content)
                        },
                        tool_calls: if calls.is_empty() { None } else { Some(calls) },
                        tool_call_id: None,
                    });
                }
                other => out.push(ApiMessage {
                    role: other.role().into(),
                    content: Some(other.content().to_string()),
                    tool_calls: None,
                    tool_call_id: None,
                }),
            }
        }
        out
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.turns),
            "stream": false,
        });

        let s = &request.sampling;
        if let Some(v) = s.temperature {
            body["temperature"] = serde_json::json!(v);
        }
        if let Some(v) = s.top_p {
            body["top_p"] = serde_json::json!(v);
        }
        if let Some(v) = s.max_tokens {
            body["max_tokens"] = serde_json::json!(v);
        }
        if let Some(v) = s.frequency_penalty {
            body["frequency_penalty"] = serde_json::json!(v);
        }
        if let Some(v) = s.presence_penalty {
            body["presence_penalty"] = serde_json::json!(v);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            if let Some(choice) = request.tool_choice {
                body["tool_choice"] = serde_json::json!(choice.as_str());
            }
        }
        body
    }

    fn parse_response(api_response: ApiResponse) -> Result<ProviderResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallRequest {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let message = Turn::Assistant {
            content: choice.message.content.unwrap_or_default(),
            tags: Default::default(),
            tool_calls,
        };

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: api_response.model,
            finish_reason: choice.finish_reason,
        })
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        Self::parse_response(api_response)
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[async_trait]
impl smartday_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{}'",
                self.name
            )));
        }

        let body = Self::request_body(&request);
        debug!(
            provider = %self.name,
            model = %request.model,
            turns = request.turns.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(provider = %self.name, attempt, error = %e, "Retrying completion request");
                    if let ProviderError::RateLimited { retry_after_secs } = e {
                        tokio::time::sleep(Duration::from_secs(retry_after_secs.min(5))).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartday_core::{CapabilityTag, Provider};

    fn call(id: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.into(),
            name: "search_internet".into(),
            arguments: r#"{"search_query":"성수동 팝업"}"#.into(),
        }
    }

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test");
        assert_eq!(provider.name(), "openai");
        assert!(provider.base_url().contains("api.openai.com"));
    }

    #[test]
    fn turn_conversion() {
        let turns = vec![Turn::system("You plan days"), Turn::user("Hello")];
        let api = OpenAiCompatProvider::to_api_messages(&turns);
        assert_eq!(api.len(), 2);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
    }

    #[test]
    fn tool_call_sequence_is_preserved() {
        let turns = vec![
            Turn::system("s"),
            Turn::user("q"),
            Turn::Assistant {
                content: String::new(),
                tags: Default::default(),
                tool_calls: vec![call("call_1")],
            },
            Turn::tool_result("call_1", "search_internet", "answer"),
        ];
        let api = OpenAiCompatProvider::to_api_messages(&turns);
        assert_eq!(api.len(), 4);
        assert!(api[2].content.is_none());
        assert_eq!(api[2].tool_calls.as_ref().unwrap()[0].function.name, "search_internet");
        assert_eq!(api[3].role, "tool");
        assert_eq!(api[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn orphaned_tool_turn_is_skipped() {
        let turns = vec![
            Turn::system("s"),
            Turn::tool_result("call_9", "search_internet", "answer"),
            Turn::assistant("reply"),
        ];
        let api = OpenAiCompatProvider::to_api_messages(&turns);
        assert_eq!(api.len(), 2);
        assert_eq!(api[1].role, "assistant");
    }

    #[test]
    fn unanswered_call_is_dropped_from_assistant_turn() {
        let turns = vec![
            Turn::system("s"),
            Turn::Assistant {
                content: "thinking".into(),
                tags: Default::default(),
                tool_calls: vec![call("call_1")],
            },
        ];
        let api = OpenAiCompatProvider::to_api_messages(&turns);
        assert!(api[1].tool_calls.is_none());
        assert_eq!(api[1].content.as_deref(), Some("thinking"));
    }

    #[test]
    fn assistant_tags_are_sent_as_content() {
        let turns = vec![Turn::Assistant {
            content: "맑아요".into(),
            tags: [CapabilityTag::LiveWeather].into_iter().collect(),
            tool_calls: vec![],
        }];
        let api = OpenAiCompatProvider::to_api_messages(&turns);
        assert_eq!(api[0].content.as_deref(), Some("맑아요\n#실시간날씨"));
    }

    #[test]
    fn request_body_carries_sampling_and_tools() {
        let request = ProviderRequest::new("gpt-4o-mini", vec![Turn::user("hi")])
            .with_sampling(SamplingParams {
                temperature: Some(0.5),
                top_p: Some(1.0),
                max_tokens: Some(256),
                frequency_penalty: Some(0.0),
                presence_penalty: Some(0.0),
            })
            .with_tools(
                vec![ToolDefinition {
                    name: "search_internet".into(),
                    description: "search".into(),
                    parameters: serde_json::json!({"type": "object"}),
                }],
                ToolChoice::Auto,
            );
        let body = OpenAiCompatProvider::request_body(&request);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["top_p"], 1.0);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "search_internet");
    }

    #[test]
    fn request_body_omits_unset_fields() {
        let request = ProviderRequest::new("gpt-4o-mini", vec![Turn::user("hi")]);
        let body = OpenAiCompatProvider::request_body(&request);
        assert!(body.get("temperature").is_none());
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn parse_tool_call_response() {
        let data = r#"{
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "get_celsius_temperature", "arguments": "{\"location\":\"서울\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 100, "completion_tokens": 20, "total_tokens": 120}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = OpenAiCompatProvider::parse_response(parsed).unwrap();
        assert_eq!(resp.content(), "");
        assert_eq!(resp.message.tool_calls()[0].name, "get_celsius_temperature");
        assert_eq!(resp.usage.unwrap().total_tokens, 120);
        assert_eq!(resp.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn parse_empty_choices_is_malformed() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"model":"m","choices":[]}"#).unwrap();
        let err = OpenAiCompatProvider::parse_response(parsed).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let provider = OpenAiCompatProvider::new("openai", "http://127.0.0.1:9", "");
        let err = provider
            .complete(ProviderRequest::new("m", vec![Turn::user("hi")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    // ── Against a local endpoint ─────────────────────────────────────────

    use axum::{Router, http::StatusCode, response::IntoResponse, routing::post};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const OK_BODY: &str = r#"{"model":"m","choices":[{"message":{"role":"assistant","content":"맑아요"}}]}"#;

    /// Serves `/chat/completions`, answering each hit with the next scripted
    /// status. The last entry repeats once the script runs out.
    async fn endpoint(script: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/chat/completions",
            post(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = script[n.min(script.len() - 1)];
                async move {
                    (
                        StatusCode::from_u16(status).unwrap(),
                        [("retry-after", "0")],
                        body,
                    )
                        .into_response()
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    fn hello() -> ProviderRequest {
        ProviderRequest::new("m", vec![Turn::user("hi")])
    }

    #[tokio::test]
    async fn server_error_is_retried_once_then_surfaced() {
        let (base, hits) = endpoint(vec![(500, "boom")]).await;
        let provider = OpenAiCompatProvider::new("openai", base, "sk-test");

        let err = provider.complete(hello()).await.unwrap_err();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        match err {
            ProviderError::ApiError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_recovers_from_one_server_error() {
        let (base, hits) = endpoint(vec![(503, "busy"), (200, OK_BODY)]).await;
        let provider = OpenAiCompatProvider::new("openai", base, "sk-test");

        let resp = provider.complete(hello()).await.unwrap();
        assert_eq!(resp.content(), "맑아요");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let (base, hits) = endpoint(vec![(401, "nope")]).await;
        let provider = OpenAiCompatProvider::new("openai", base, "sk-bad");

        let err = provider.complete(hello()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let (base, hits) = endpoint(vec![(429, "slow down")]).await;
        let provider = OpenAiCompatProvider::new("openai", base, "sk-test");

        let err = provider.complete(hello()).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: 0
            }
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_retries_makes_a_single_attempt() {
        let (base, hits) = endpoint(vec![(500, "boom")]).await;
        let provider = OpenAiCompatProvider::new("openai", base, "sk-test").with_max_retries(0);

        let err = provider.complete(hello()).await.unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status_code: 500, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
