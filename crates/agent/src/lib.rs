//! Dialogue orchestration for SmartDay.
//!
//! Each incoming message goes through one pass:
//!
//! 1. **Extract** a location and date phrase from the raw text
//! 2. **Route**: forecast lookup, model-chosen tool, or direct reply
//! 3. **Update** the session transcript with the new turns
//! 4. **Maintain**: evict old turns on usage overage, strip the instruction
//!
//! [`ChatService`] ties sessions to the router and is what the gateway and
//! the CLI call.

pub mod context;
pub mod dates;
pub mod extractor;
pub mod intent;
pub mod orchestrator;
pub mod session;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{ContextSettings, ConversationContext};
pub use dates::{parse_natural_date, today_in};
pub use extractor::{ExtractedIntent, KeywordExtractor};
pub use intent::{Analysis, IntentAnalyzer, ToolRun};
pub use orchestrator::{ChatInput, Orchestrator, Route, RouteOutcome};
pub use session::SessionRegistry;

use smartday_config::AppConfig;
use smartday_core::message::SessionId;
use smartday_core::provider::Provider;
use smartday_core::tool::ToolRegistry;
use std::sync::Arc;
use tracing::info;

/// A reply and the session it belongs to.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub session_id: SessionId,
    pub text: String,
    pub route: Route,
}

/// Sessions plus the router, shared by every request.
pub struct ChatService {
    sessions: SessionRegistry,
    orchestrator: Orchestrator,
}

impl ChatService {
    pub fn new(sessions: SessionRegistry, orchestrator: Orchestrator) -> Self {
        Self {
            sessions,
            orchestrator,
        }
    }

    pub fn from_config(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        config: &AppConfig,
    ) -> Self {
        let sessions = SessionRegistry::new(
            provider.clone(),
            config.persona.system_prompt.clone(),
            ContextSettings::from_config(config),
            config.gateway.max_sessions,
        );
        let orchestrator = Orchestrator::from_config(provider, tools, config);
        Self::new(sessions, orchestrator)
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        self.orchestrator.tools()
    }

    /// Answer one message, creating the session if needed.
    ///
    /// Holds the session lock for the whole route so concurrent requests to
    /// the same session are serialized.
    pub async fn chat(&self, session_id: Option<SessionId>, input: ChatInput) -> ChatReply {
        let (session_id, ctx) = self.sessions.get_or_create(session_id).await;
        let mut ctx = ctx.lock().await;
        let outcome = self.orchestrator.respond_within(&mut ctx, &input).await;
        info!(session = %session_id, route = ?outcome.route, turns = ctx.transcript().len(), "Chat handled");
        ChatReply {
            session_id,
            text: outcome.text,
            route: outcome.route,
        }
    }
}
