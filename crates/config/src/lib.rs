//! Configuration loading, validation, and management for SmartDay.
//!
//! Loads configuration from `~/.smartday/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Persona prompt for the SMART DAY day planner.
pub const DEFAULT_SYSTEM_PROMPT: &str = "
당신은 정확한 정보를 기반으로 user의 하루 일정을 짜주는 'SMART DAY' 챗봇입니다.
일정을 바로 제안하지 말고, 최종 답변을 생성하기 전에만 user에게 2~3가지 선호(취미, 관심사, 원하는 활동 등)를 자연스럽게 물어보고, 그 답변을 바탕으로 맞춤 일정을 제안하세요. 일정표를 안내할 때는 추가 질문 없이 바로 일정을 안내하세요.
user가 궁금해하는 정보나 최신 이슈, 교통, 장소, 일정 등은 필요시 인터넷 검색 기능을 활용해 답변하세요.
만약 user가 지역을 명확히 언급하지 않으면, 먼저 지역을 물어보고, 바로 실시간 날씨 정보를 안내하세요. 이후 그 날씨 정보를 반영해 일정을 추천하세요.
일정 제안 시 반드시 실시간 날씨 정보(기온, 상태 등) 또는 미래 날짜의 날씨 예보(최고기온, 대표 상태)를 포함하고, 최신 정보(맛집, 행사, 트렌드 등)는 인터넷 검색을 통해 반드시 확인해서 반영하세요.
특히 날씨와 트렌드를 반영해, 실내/실외, 흐림/맑음 등 상황에 맞는 최신 인기 코스를 자연스럽게 추천하세요.
날씨 정보 안내나 인터넷 검색 결과 안내 시, \"정보를 확인해보겠다\", \"잠시만 기다려 주세요\" 등 중간 안내 문구 없이 바로 결과를 자연스럽게 안내하세요. 불필요한 안내 문구 없이, 사용자가 궁금한 정보만 간결하게 답변하세요.
user가 당신과의 대화를 통해 원하는 바를 더욱 정확히 알 수 있도록 user의 숨겨진 선호를 이끌어 냅니다.
user가 언급하는 내용에 대해 세심한 주의를 기울이며, 관련성 있고 구체적인 답변을 합니다.
[!IMPORTANT]
";

/// Reply-style instruction appended to the user turn for each model request.
pub const DEFAULT_INSTRUCTION: &str = "
instruction:
1. 대화에 대한 답변은 3문장 이내면서 10단어 이내로 짧게 할 것.
2. 최종 답변은 대화의 전체 내용을 고려하여 생성한 일정표를 테이블 형식으로 작성할 것.
3. 딱딱하지 않은 존댓말을 사용하며, 적절한 이모지를 함께 보낼 것.
4. 어떤 상황에서도 인공지능인지 눈치채지 못하도록 자연스럽게 답변하고, 항상 친절할 것.
";

/// The root configuration structure.
///
/// Maps directly to `~/.smartday/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the chat-completion backend (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub models: ModelsConfig,

    /// Conversation and sampling settings
    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub persona: PersonaConfig,

    /// External data fetchers
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    "openai".into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("providers", &self.providers)
            .field("models", &self.models)
            .field("chat", &self.chat)
            .field("persona", &self.persona)
            .field("tools", &self.tools)
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("weather_base_url", &self.weather_base_url)
            .field("search_url", &self.search_url)
            .field("tavily_api_key", &redact(&self.tavily_api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// Model identifiers. `basic` serves every conversation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_basic_model")]
    pub basic: String,
}

fn default_basic_model() -> String {
    "gpt-4o-mini-2024-07-18".into()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            basic: default_basic_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Transcript token ceiling for both the pre-send check and eviction
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Maximum tokens per model reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub frequency_penalty: f32,

    #[serde(default)]
    pub presence_penalty: f32,

    /// Per-call timeout for the chat-completion client
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Automatic low-level retries on transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Ceiling for routing one whole message
    #[serde(default = "default_route_timeout")]
    pub route_timeout_secs: u64,

    /// IANA timezone used as the base for relative dates
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_max_context_tokens() -> usize {
    16 * 1024
}
fn default_temperature() -> f32 {
    0.5
}
fn default_top_p() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    256
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    1
}
fn default_route_timeout() -> u64 {
    90
}
fn default_timezone() -> String {
    "Asia/Seoul".into()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            route_timeout_secs: default_route_timeout(),
            timezone: default_timezone(),
        }
    }
}

impl ChatConfig {
    /// The configured timezone, falling back to Asia/Seoul if it does not parse.
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::Asia::Seoul)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_instruction")]
    pub instruction: String,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}
fn default_instruction() -> String {
    DEFAULT_INSTRUCTION.into()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            instruction: default_instruction(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Open-Meteo API root
    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,

    /// Tavily search endpoint
    #[serde(default = "default_search_url")]
    pub search_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tavily_api_key: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_weather_base_url() -> String {
    "https://api.open-meteo.com/v1".into()
}
fn default_search_url() -> String {
    "https://api.tavily.com/search".into()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            weather_base_url: default_weather_base_url(),
            search_url: default_search_url(),
            tavily_api_key: None,
            timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Browser origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Upper bound on live sessions; the oldest is evicted beyond it
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_port() -> u16 {
    5000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://127.0.0.1:5500".into(),
        "http://localhost:5500".into(),
        "http://127.0.0.1:5501".into(),
        "http://localhost:5501".into(),
    ]
}
fn default_max_sessions() -> usize {
    1000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.smartday/config.toml).
    ///
    /// Environment variables override the file:
    /// - `SMARTDAY_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `TAVILY_API_KEY`
    /// - `SMARTDAY_MODEL` (replaces `models.basic`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("SMARTDAY_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(key) = lookup("TAVILY_API_KEY") {
            self.tools.tavily_api_key = Some(key);
        }
        if let Some(model) = lookup("SMARTDAY_MODEL") {
            self.models.basic = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".smartday")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chat = &self.chat;
        if !(0.0..=2.0).contains(&chat.temperature) {
            return Err(ConfigError::ValidationError(
                "chat.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if chat.top_p <= 0.0 || chat.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "chat.top_p must be in (0.0, 1.0]".into(),
            ));
        }
        if chat.max_context_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "chat.max_context_tokens must be > 0".into(),
            ));
        }
        if chat.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "unknown timezone '{}'",
                chat.timezone
            )));
        }
        if self.gateway.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_sessions must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            providers: HashMap::new(),
            models: ModelsConfig::default(),
            chat: ChatConfig::default(),
            persona: PersonaConfig::default(),
            tools: ToolsConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.gateway.port, 5000);
        assert_eq!(config.chat.max_context_tokens, 16384);
        assert_eq!(config.chat.max_tokens, 256);
        assert_eq!(config.models.basic, "gpt-4o-mini-2024-07-18");
        assert!(config.persona.instruction.contains("instruction:\n"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.gateway.allowed_origins, config.gateway.allowed_origins);
        assert_eq!(parsed.persona.system_prompt, config.persona.system_prompt);
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.chat.temperature = 5.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.chat.top_p = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.chat.timezone = "Mars/Olympus".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.chat.max_context_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[chat]
max_tokens = 512

[gateway]
port = 8080
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.chat.max_tokens, 512);
        assert_eq!(config.chat.temperature, 0.5);
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.max_sessions, 1000);
    }

    #[test]
    fn legacy_models_keys_are_ignored() {
        let parsed: AppConfig = toml::from_str(
            r#"
[models]
basic = "gpt-4o-mini"
advanced = "gpt-4o"
"#,
        )
        .unwrap();
        assert_eq!(parsed.models.basic, "gpt-4o-mini");
        let written = toml::to_string_pretty(&parsed).unwrap();
        assert!(!written.contains("advanced"));
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chat = [[[").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply_in_priority_order() {
        let vars: HashMap<&str, &str> = [
            ("SMARTDAY_API_KEY", "sk-smartday"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("TAVILY_API_KEY", "tvly-key"),
            ("SMARTDAY_MODEL", "gpt-4o"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-smartday"));
        assert_eq!(config.tools.tavily_api_key.as_deref(), Some("tvly-key"));
        assert_eq!(config.models.basic, "gpt-4o");

        let mut config = AppConfig::default();
        config.apply_env(|k| (k == "OPENAI_API_KEY").then(|| "sk-openai".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-openai"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        config.tools.tavily_api_key = Some("tvly-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("tvly-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn tz_parses_configured_zone() {
        let chat = ChatConfig::default();
        assert_eq!(chat.tz(), chrono_tz::Asia::Seoul);
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openai"));
        assert!(toml_str.contains("5000"));
        assert!(toml_str.contains("api.open-meteo.com"));
    }
}
