//! Tool trait, the abstraction over external data fetchers.
//!
//! Tools give the planner live data: current weather, forecasts and web
//! search answers. The set is fixed and known at compile time, so each
//! tool is identified by a [`ToolKind`] rather than a free-form name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ToolError;
use crate::message::{CapabilityTag, ToolCallRequest};
use crate::provider::ToolDefinition;

/// Named arguments passed to a tool.
pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

/// Fetch a required string argument.
pub fn required_str<'a>(args: &'a ToolArguments, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing string argument '{key}'")))
}

/// The closed set of tools the planner can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    #[serde(rename = "get_celsius_temperature")]
    CurrentWeather,
    #[serde(rename = "get_weather_forecast")]
    WeatherForecast,
    #[serde(rename = "search_internet")]
    WebSearch,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::CurrentWeather,
        ToolKind::WeatherForecast,
        ToolKind::WebSearch,
    ];

    /// The wire name the model uses to call this tool.
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::CurrentWeather => "get_celsius_temperature",
            ToolKind::WeatherForecast => "get_weather_forecast",
            ToolKind::WebSearch => "search_internet",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// The tag appended to an assistant reply built on this tool's output.
    pub fn capability_tag(&self) -> CapabilityTag {
        match self {
            ToolKind::CurrentWeather => CapabilityTag::LiveWeather,
            ToolKind::WeatherForecast => CapabilityTag::Forecast,
            ToolKind::WebSearch => CapabilityTag::Search,
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One parameter of a tool's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,

    /// JSON Schema type name, e.g. "string"
    #[serde(rename = "type")]
    pub kind: String,

    pub description: String,
    pub required: bool,
}

impl ParameterSpec {
    pub fn required_string(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: "string".to_string(),
            description: description.to_string(),
            required: true,
        }
    }
}

/// Immutable description of a tool, shared read-only across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

impl ToolDescriptor {
    /// Render as a function definition with a JSON Schema object.
    pub fn to_definition(&self) -> ToolDefinition {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &self.parameters {
            properties.insert(
                p.name.clone(),
                serde_json::json!({ "type": p.kind, "description": p.description }),
            );
            if p.required {
                required.push(serde_json::Value::String(p.name.clone()));
            }
        }
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

/// Current conditions at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub weather: String,
}

/// Forecast summary for one location and day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub date: String,
    pub location: String,
    /// `None` when the day has no hourly temperatures
    pub max_temperature: Option<f64>,
    pub weather: String,
}

/// What a tool hands back.
///
/// `Unavailable` is a data-unavailable condition (unknown location, past
/// date, search failure) carried as a bracketed user-facing message. It is
/// valid, if degraded, data and is passed through to the model untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    CurrentWeather(CurrentWeather),
    Forecast(Forecast),
    Text(String),
    Unavailable(String),
}

impl ToolOutput {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ToolOutput::Unavailable(_))
    }
}

impl std::fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = match self {
            ToolOutput::CurrentWeather(w) => serde_json::to_string(w),
            ToolOutput::Forecast(fc) => serde_json::to_string(fc),
            ToolOutput::Text(s) | ToolOutput::Unavailable(s) => return f.write_str(s),
        };
        match json {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(std::fmt::Error),
        }
    }
}

/// The core Tool trait.
///
/// Each fetcher implements this and is registered once at startup.
#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// Name, description and parameter schema sent to the model.
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool.
    ///
    /// Data-unavailable conditions come back as `Ok(ToolOutput::Unavailable)`;
    /// `Err` is reserved for bad arguments and transport failures.
    async fn invoke(&self, args: &ToolArguments) -> Result<ToolOutput, ToolError>;
}

/// A fixed table of tools, built at startup and shared as `Arc<ToolRegistry>`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Replaces any existing tool of the same kind.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let kind = tool.kind();
        match self.tools.iter_mut().find(|t| t.kind() == kind) {
            Some(slot) => *slot = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, kind: ToolKind) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.kind() == kind)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        ToolKind::from_name(name).and_then(|k| self.get(k))
    }

    pub fn kinds(&self) -> Vec<ToolKind> {
        self.tools.iter().map(|t| t.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    /// Tool catalog in registration order (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.descriptor().to_definition()).collect()
    }

    /// Invoke a tool by kind with already-parsed arguments.
    pub async fn invoke(&self, kind: ToolKind, args: &ToolArguments) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(kind)
            .ok_or_else(|| ToolError::NotFound(kind.name().to_string()))?;
        tool.invoke(args).await
    }

    /// Resolve a model-issued call, parse its argument payload and invoke it.
    pub async fn invoke_call(&self, call: &ToolCallRequest) -> Result<(ToolKind, ToolOutput), ToolError> {
        let kind = ToolKind::from_name(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let raw = if call.arguments.trim().is_empty() {
            "{}"
        } else {
            call.arguments.as_str()
        };
        let args: ToolArguments = serde_json::from_str(raw)
            .map_err(|e| ToolError::InvalidArguments(format!("{}: {e}", call.name)))?;
        let output = self.invoke(kind, &args).await?;
        Ok((kind, output))
    }
}
