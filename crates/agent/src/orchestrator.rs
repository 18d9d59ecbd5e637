//! Orchestration Router.
//!
//! Decides, per incoming message, which of three paths produces the reply:
//!
//! - **Forecast**: the extractor finds a location and a date, so the
//!   forecast tool is called directly and the model adds a recommendation
//! - **Tool**: the intent analyzer asks for a tool, which runs on a copy of
//!   the transcript before its turns are merged back
//! - **Direct**: a plain round trip through the context manager
//!
//! Every path ends with the token-limit check and instruction cleanup.

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde_json::json;
use smartday_config::AppConfig;
use smartday_core::provider::{Provider, ProviderResponse};
use smartday_core::tool::{ToolArguments, ToolKind, ToolOutput, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::context::{ContextSettings, ConversationContext, SERVICE_APOLOGY};
use crate::dates::today_in;
use crate::extractor::KeywordExtractor;
use crate::intent::IntentAnalyzer;

/// One incoming message with its optional routing preference.
#[derive(Debug, Clone, Default)]
pub struct ChatInput {
    pub message: String,
    pub preference: Option<String>,
}

impl ChatInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            preference: None,
        }
    }

    pub fn with_preference(mut self, preference: impl Into<String>) -> Self {
        self.preference = Some(preference.into());
        self
    }

    /// The text stored in the transcript and shown to the analyzer.
    pub fn full_message(&self) -> String {
        match self.preference.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => format!("[사용자 선호도: {p}]\n{}", self.message),
            _ => self.message.clone(),
        }
    }
}

/// Which path produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Forecast,
    /// The analyzer asked for a tool; `None` if the name was not recognized
    Tool(Option<ToolKind>),
    Direct,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub text: String,
    pub route: Route,
}

pub struct Orchestrator {
    analyzer: IntentAnalyzer,
    tools: Arc<ToolRegistry>,
    extractor: KeywordExtractor,
    tz: Tz,
    route_timeout: Duration,
    base_date: Option<NaiveDate>,
}

impl Orchestrator {
    pub fn new(analyzer: IntentAnalyzer, tz: Tz, route_timeout: Duration) -> Self {
        Self {
            tools: analyzer.tools().clone(),
            analyzer,
            extractor: KeywordExtractor::with_gazetteer(),
            tz,
            route_timeout,
            base_date: None,
        }
    }

    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Self {
        let settings = ContextSettings::from_config(config);
        let analyzer = IntentAnalyzer::new(provider, settings.model, tools, settings.sampling);
        Self::new(
            analyzer,
            config.chat.tz(),
            Duration::from_secs(config.chat.route_timeout_secs),
        )
    }

    pub fn with_extractor(mut self, extractor: KeywordExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Pin "today" instead of reading the clock.
    pub fn with_base_date(mut self, date: NaiveDate) -> Self {
        self.base_date = Some(date);
        self
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    fn today(&self) -> NaiveDate {
        self.base_date.unwrap_or_else(|| today_in(self.tz))
    }

    /// [`route`](Self::route) bounded by the configured timeout.
    ///
    /// On expiry the context is still cleaned and an apology is returned.
    pub async fn respond_within(
        &self,
        ctx: &mut ConversationContext,
        input: &ChatInput,
    ) -> RouteOutcome {
        let result = tokio::time::timeout(self.route_timeout, self.route(ctx, input)).await;
        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout_secs = self.route_timeout.as_secs(), "Routing timed out");
                ctx.clean_context();
                RouteOutcome {
                    text: SERVICE_APOLOGY.to_string(),
                    route: Route::TimedOut,
                }
            }
        }
    }

    /// Produce the reply for one message, updating the transcript.
    pub async fn route(&self, ctx: &mut ConversationContext, input: &ChatInput) -> RouteOutcome {
        let full = input.full_message();
        let intent = self.extractor.extract(&input.message, self.today());

        let (text, response, route) = match (intent.location, intent.resolved_date) {
            (Some(location), Some(date)) => {
                info!(%location, %date, "Routing to forecast");
                let sentence = self.forecast_sentence(&location, &date).await;
                ctx.add_user_message(full);
                let note = format!("\n[날씨 정보: {}]", sentence.trim_end());
                let response = ctx.send_request_with_note(Some(&note)).await;
                ctx.add_response(&response);
                let text = format!("{sentence}{}", ctx.response_content());
                (text, response, Route::Forecast)
            }
            _ => {
                ctx.add_user_message(full.clone());
                let catalog = self.tools.definitions();
                let analysis = match self.analyzer.analyze(&full, &catalog).await {
                    Ok(analysis) => Some(analysis),
                    Err(e) => {
                        warn!(error = %e, "Intent analysis failed, answering directly");
                        None
                    }
                };

                match analysis.filter(|a| a.wants_tool()) {
                    Some(analysis) => {
                        let kind = analysis.tool_name().and_then(ToolKind::from_name);
                        info!(tool = analysis.tool_name().unwrap_or("-"), "Routing to tool");
                        let run = self.analyzer.run(&analysis, ctx.snapshot()).await;
                        if let Err(e) = ctx.merge_turns(run.turns) {
                            warn!(error = %e, "Could not merge tool turns");
                        }
                        ctx.add_response(&run.response);
                        (ctx.response_content(), run.response, Route::Tool(kind))
                    }
                    None => {
                        debug!("Routing to direct reply");
                        let response = ctx.send_request().await;
                        ctx.add_response(&response);
                        (ctx.response_content(), response, Route::Direct)
                    }
                }
            }
        };

        self.finish(ctx, &response);
        RouteOutcome { text, route }
    }

    fn finish(&self, ctx: &mut ConversationContext, response: &ProviderResponse) {
        ctx.handle_token_limit(response);
        ctx.clean_context();
    }

    /// Call the forecast tool and render its result as a sentence with a
    /// trailing space. Unavailable data and tool errors become bracketed text.
    async fn forecast_sentence(&self, location: &str, date: &str) -> String {
        let mut args = ToolArguments::new();
        args.insert("location".into(), json!(location));
        args.insert("date".into(), json!(date));

        match self.tools.invoke(ToolKind::WeatherForecast, &args).await {
            Ok(ToolOutput::Forecast(fc)) => match fc.max_temperature {
                Some(max) => format!(
                    "{} {}의 날씨는 최고 {max:.1}도, {}입니다. ",
                    fc.date, fc.location, fc.weather
                ),
                None => format!("{} {}의 날씨는 {}입니다. ", fc.date, fc.location, fc.weather),
            },
            Ok(other) => {
                debug!(unavailable = other.is_unavailable(), "Forecast returned no summary");
                format!("{other} ")
            }
            Err(e) => {
                warn!(%location, %date, error = %e, "Forecast lookup failed");
                format!("[{date} {location}의 날씨 정보를 가져오지 못했습니다.] ")
            }
        }
    }
}
