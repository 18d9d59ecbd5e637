//! Conversation Context Manager.
//!
//! Owns one session's transcript and performs every mutation on it:
//! appending turns, injecting and retracting the per-request instruction,
//! the pre-send token check, and proportional eviction after an observed
//! usage overage.
//!
//! Not internally synchronized. Callers serialize access per session.

use smartday_config::AppConfig;
use smartday_core::error::ContextError;
use smartday_core::message::{Transcript, Turn};
use smartday_core::provider::{Provider, ProviderRequest, ProviderResponse, SamplingParams};
use smartday_core::tool::ToolKind;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::token::estimate_transcript_tokens;

/// Returned instead of calling the model when the transcript is over budget.
pub const SHORTEN_MESSAGE: &str = "메세지를 조금 짧게 보내주세요.";

/// Returned when a model call fails.
pub const SERVICE_APOLOGY: &str = "[SmartDayBot에 문제가 발생했습니다. 잠시 뒤에 다시 이용해주세요.]";

/// Per-session knobs shared by every context built from one config.
#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub model: String,
    pub instruction: String,
    pub max_context_tokens: usize,
    pub sampling: SamplingParams,
}

impl ContextSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let chat = &config.chat;
        Self {
            model: config.models.basic.clone(),
            instruction: config.persona.instruction.clone(),
            max_context_tokens: chat.max_context_tokens,
            sampling: SamplingParams {
                temperature: Some(chat.temperature),
                top_p: Some(chat.top_p),
                max_tokens: Some(chat.max_tokens),
                frequency_penalty: Some(chat.frequency_penalty),
                presence_penalty: Some(chat.presence_penalty),
            },
        }
    }
}

pub struct ConversationContext {
    transcript: Transcript,
    provider: Arc<dyn Provider>,
    settings: ContextSettings,
}

impl ConversationContext {
    pub fn new(
        provider: Arc<dyn Provider>,
        system_prompt: impl Into<String>,
        settings: ContextSettings,
    ) -> Self {
        Self {
            transcript: Transcript::new(system_prompt),
            provider,
            settings,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// A copy of the transcript for work that must not touch the live one.
    pub fn snapshot(&self) -> Transcript {
        self.transcript.clone()
    }

    /// Drop everything but the system turn.
    pub fn reset(&mut self) {
        self.transcript = Transcript::new(self.transcript.system_prompt().to_string());
    }

    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.transcript.push_user(text);
    }

    /// Append the instruction to the last user turn and ask the model.
    pub async fn send_request(&mut self) -> ProviderResponse {
        self.send_request_with_note(None).await
    }

    /// Like [`send_request`](Self::send_request), with `note` injected
    /// ahead of the instruction. Both are removed by
    /// [`clean_context`](Self::clean_context).
    pub async fn send_request_with_note(&mut self, note: Option<&str>) -> ProviderResponse {
        let injected = {
            let last = self.transcript.last_mut();
            if let Some(note) = note {
                last.inject_instruction(note);
            }
            last.inject_instruction(&self.settings.instruction)
        };
        if !injected {
            warn!(role = self.transcript.last().role(), "Last turn is not a user turn, sending without instruction");
        }

        let estimate = estimate_transcript_tokens(self.transcript.turns());
        if estimate > self.settings.max_context_tokens {
            info!(
                tokens = estimate,
                limit = self.settings.max_context_tokens,
                "Transcript over budget, dropping the new user turn"
            );
            self.transcript.pop_user();
            return ProviderResponse::synthetic(SHORTEN_MESSAGE);
        }

        let request = ProviderRequest::new(&self.settings.model, self.transcript.turns().to_vec())
            .with_sampling(self.settings.sampling.clone());
        debug!(tokens = estimate, turns = self.transcript.len(), "Sending conversation request");

        match self.provider.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Completion failed, substituting apology");
                ProviderResponse::synthetic(SERVICE_APOLOGY)
            }
        }
    }

    /// Append the reply as an assistant turn.
    ///
    /// If the previous turn is a tool result, the reply is tagged with the
    /// capability that produced it.
    pub fn add_response(&mut self, response: &ProviderResponse) {
        let mut tags = BTreeSet::new();
        if let Turn::Tool { tool_name, .. } = self.transcript.last() {
            if let Some(kind) = ToolKind::from_name(tool_name) {
                tags.insert(kind.capability_tag());
            }
        }
        self.transcript.push_assistant(response.content(), tags);
    }

    /// Content of the last turn as the user sees it.
    pub fn response_content(&self) -> String {
        self.transcript.last().rendered_content().into_owned()
    }

    /// Restore the most recent user turn to its pre-instruction content.
    pub fn clean_context(&mut self) {
        if let Some(turn) = self.transcript.last_user_mut() {
            turn.restore_pristine();
        }
    }

    /// Evict the oldest ⌈len/10⌉ non-system turns when the response reports
    /// usage above the budget. Best effort: problems are logged, never raised.
    pub fn handle_token_limit(&mut self, response: &ProviderResponse) {
        let Some(usage) = &response.usage else {
            warn!("Response carries no usage, skipping token-limit check");
            return;
        };
        let total = usage.total_tokens as usize;
        if total <= self.settings.max_context_tokens {
            return;
        }
        let count = self.transcript.len().div_ceil(10);
        let removed = self.transcript.evict_oldest(count);
        info!(total_tokens = total, removed, remaining = self.transcript.len(), "Evicted oldest turns");
    }

    /// Append turns produced elsewhere (e.g. a tool run on a snapshot).
    pub fn merge_turns(&mut self, turns: Vec<Turn>) -> Result<(), ContextError> {
        for turn in turns {
            self.transcript.push(turn)?;
        }
        Ok(())
    }
}
