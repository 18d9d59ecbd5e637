//! Scripted provider and stub tools shared by the agent tests.

use async_trait::async_trait;
use smartday_core::error::{ProviderError, ToolError};
use smartday_core::message::{ToolCallRequest, Turn};
use smartday_core::provider::{
    Provider, ProviderRequest, ProviderResponse, SamplingParams, Usage,
};
use smartday_core::tool::{
    CurrentWeather, Forecast, ParameterSpec, Tool, ToolArguments, ToolDescriptor, ToolKind,
    ToolOutput, ToolRegistry, required_str,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::context::ContextSettings;

/// Returns canned responses in order and records every request.
pub struct ScriptedProvider {
    script: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(mut script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        script.reverse();
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(ProviderError::NotConfigured("script exhausted".into())))
    }
}

pub fn settings() -> ContextSettings {
    ContextSettings {
        model: "gpt-4o-mini".into(),
        instruction: "\ninstruction:\n1. 이모지를 사용할 것.\n".into(),
        max_context_tokens: 16384,
        sampling: SamplingParams {
            temperature: Some(0.5),
            top_p: Some(1.0),
            max_tokens: Some(256),
            frequency_penalty: Some(0.0),
            presence_penalty: Some(0.0),
        },
    }
}

pub fn usage_response(content: &str, total_tokens: u32) -> ProviderResponse {
    ProviderResponse {
        message: Turn::assistant(content),
        usage: Some(Usage {
            prompt_tokens: total_tokens.saturating_sub(10),
            completion_tokens: total_tokens.min(10),
            total_tokens,
        }),
        model: "gpt-4o-mini".into(),
        finish_reason: Some("stop".into()),
    }
}

pub fn text_response(content: &str) -> ProviderResponse {
    usage_response(content, 120)
}

pub fn tool_call_response(name: &str, arguments: &str) -> ProviderResponse {
    ProviderResponse {
        message: Turn::Assistant {
            content: String::new(),
            tags: BTreeSet::new(),
            tool_calls: vec![ToolCallRequest {
                id: "call_1".into(),
                name: name.into(),
                arguments: arguments.into(),
            }],
        },
        usage: Some(Usage::default()),
        model: "gpt-4o-mini".into(),
        finish_reason: Some("tool_calls".into()),
    }
}

fn descriptor(kind: ToolKind, params: &[&str]) -> ToolDescriptor {
    ToolDescriptor {
        name: kind.name().into(),
        description: format!("stub {kind}"),
        parameters: params
            .iter()
            .map(|p| ParameterSpec::required_string(p, p))
            .collect(),
    }
}

pub struct StubCurrentWeather;

#[async_trait]
impl Tool for StubCurrentWeather {
    fn kind(&self) -> ToolKind {
        ToolKind::CurrentWeather
    }

    fn descriptor(&self) -> ToolDescriptor {
        descriptor(self.kind(), &["location"])
    }

    async fn invoke(&self, args: &ToolArguments) -> Result<ToolOutput, ToolError> {
        required_str(args, "location")?;
        Ok(ToolOutput::CurrentWeather(CurrentWeather {
            temperature: 21.4,
            weather: "맑음".into(),
        }))
    }
}

/// Forecast stub that remembers `(location, date)` of every call.
/// The location "없는곳" yields an unavailable result.
#[derive(Default)]
pub struct StubForecast {
    pub calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Tool for StubForecast {
    fn kind(&self) -> ToolKind {
        ToolKind::WeatherForecast
    }

    fn descriptor(&self) -> ToolDescriptor {
        descriptor(self.kind(), &["location", "date"])
    }

    async fn invoke(&self, args: &ToolArguments) -> Result<ToolOutput, ToolError> {
        let location = required_str(args, "location")?.to_string();
        let date = required_str(args, "date")?.to_string();
        self.calls.lock().unwrap().push((location.clone(), date.clone()));
        if location == "없는곳" {
            return Ok(ToolOutput::Unavailable(format!(
                "[{location}의 위치 정보를 찾을 수 없습니다.]"
            )));
        }
        Ok(ToolOutput::Forecast(Forecast {
            date,
            location,
            max_temperature: Some(25.3),
            weather: "대체로 맑음".into(),
        }))
    }
}

pub struct StubSearch;

#[async_trait]
impl Tool for StubSearch {
    fn kind(&self) -> ToolKind {
        ToolKind::WebSearch
    }

    fn descriptor(&self) -> ToolDescriptor {
        descriptor(self.kind(), &["search_query"])
    }

    async fn invoke(&self, args: &ToolArguments) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::Text(format!("검색: {}", required_str(args, "search_query")?)))
    }
}

pub fn stub_registry_with(forecast: Arc<StubForecast>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(StubCurrentWeather));
    registry.register(forecast);
    registry.register(Arc::new(StubSearch));
    registry
}

pub fn stub_registry() -> ToolRegistry {
    stub_registry_with(Arc::new(StubForecast::default()))
}
