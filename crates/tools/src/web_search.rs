//! Web search tool backed by the Tavily answer API.
//!
//! Every failure (missing key, transport, HTTP status, bad payload) is
//! reported to the model as the same bracketed message.

use async_trait::async_trait;
use serde::Deserialize;
use smartday_core::error::ToolError;
use smartday_core::tool::{
    ParameterSpec, Tool, ToolArguments, ToolDescriptor, ToolKind, ToolOutput, required_str,
};
use std::time::Duration;
use tracing::warn;

pub const SEARCH_FAILED: &str = "[인터넷 검색 중 오류가 발생했습니다]";
pub const NO_ANSWER: &str = "검색 결과를 찾을 수 없습니다.";

/// `search_internet`
pub struct WebSearchTool {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: url.into(),
            api_key,
            client,
        }
    }

    async fn search(&self, query: &str) -> Result<Option<String>, String> {
        let key = self.api_key.as_deref().ok_or("TAVILY_API_KEY is not set")?;
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(key)
            .json(&serde_json::json!({ "query": query, "include_answer": true }))
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;
        let body: TavilyResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(body.answer)
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WebSearch
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.kind().name().into(),
            description: "답변 시 인터넷 검색이 필요하다고 판단되는 경우 수행".into(),
            parameters: vec![ParameterSpec::required_string(
                "search_query",
                "인터넷 검색을 위한 검색어",
            )],
        }
    }

    async fn invoke(&self, args: &ToolArguments) -> Result<ToolOutput, ToolError> {
        let query = required_str(args, "search_query")?;
        match self.search(query).await {
            Ok(Some(answer)) => Ok(ToolOutput::Text(answer)),
            Ok(None) => Ok(ToolOutput::Text(NO_ANSWER.into())),
            Err(reason) => {
                warn!(tool = %self.kind(), %reason, "Web search failed");
                Ok(ToolOutput::Unavailable(SEARCH_FAILED.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/search")
    }

    async fn fake_tavily(
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer tvly-test") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        assert_eq!(body["include_answer"], true);
        match body["query"].as_str() {
            Some("empty") => Ok(Json(serde_json::json!({"results": []}))),
            Some(q) => Ok(Json(serde_json::json!({"answer": format!("answer for {q}")}))),
            None => Err(StatusCode::BAD_REQUEST),
        }
    }

    fn args(query: &str) -> ToolArguments {
        let mut map = ToolArguments::new();
        map.insert("search_query".into(), serde_json::Value::String(query.into()));
        map
    }

    async fn tool(key: &str) -> WebSearchTool {
        let url = serve(Router::new().route("/search", post(fake_tavily))).await;
        WebSearchTool::new(url, Some(key.into()), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn returns_answer_field() {
        let out = tool("tvly-test").await.invoke(&args("성수 팝업")).await.unwrap();
        assert_eq!(out, ToolOutput::Text("answer for 성수 팝업".into()));
    }

    #[tokio::test]
    async fn missing_answer_uses_fixed_text() {
        let out = tool("tvly-test").await.invoke(&args("empty")).await.unwrap();
        assert_eq!(out, ToolOutput::Text(NO_ANSWER.into()));
    }

    #[tokio::test]
    async fn http_error_is_reported_as_unavailable() {
        let out = tool("wrong-key").await.invoke(&args("q")).await.unwrap();
        assert_eq!(out, ToolOutput::Unavailable(SEARCH_FAILED.into()));
    }

    #[tokio::test]
    async fn missing_key_is_reported_as_unavailable() {
        let tool = WebSearchTool::new("http://127.0.0.1:9/search", None, Duration::from_secs(1));
        let out = tool.invoke(&args("q")).await.unwrap();
        assert!(out.is_unavailable());
    }

    #[test]
    fn descriptor_matches_wire_name() {
        let tool = WebSearchTool::new("http://x", None, Duration::from_secs(1));
        let def = tool.descriptor().to_definition();
        assert_eq!(def.name, "search_internet");
        assert_eq!(def.parameters["required"][0], "search_query");
    }
}
