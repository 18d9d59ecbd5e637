//! Turn and Transcript domain types.
//!
//! These are the value objects that flow through the whole system:
//! a user message becomes a `Turn`, the context manager appends it to the
//! session's `Transcript`, and the provider sees the transcript as the
//! ordered message list of a chat-completion request.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::ContextError;

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Label recording which capability supplied data for an assistant turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTag {
    Search,
    LiveWeather,
    Forecast,
}

impl CapabilityTag {
    /// The marker appended to assistant content.
    pub fn label(&self) -> &'static str {
        match self {
            CapabilityTag::Search => "#인터넷검색",
            CapabilityTag::LiveWeather => "#실시간날씨",
            CapabilityTag::Forecast => "#날씨예보",
        }
    }

    /// Render a tag set as the trailing line of an assistant reply.
    ///
    /// Returns an empty string for an empty set.
    pub fn render_suffix(tags: &BTreeSet<CapabilityTag>) -> String {
        if tags.is_empty() {
            return String::new();
        }
        let labels: Vec<&str> = tags.iter().map(|t| t.label()).collect();
        format!("\n{}", labels.join(" "))
    }
}

/// A tool call requested by the model.
///
/// Produced by the intent analyzer from a model response and consumed
/// exactly once by the tool invoker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque call identifier (matches the API's `tool_call.id`)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a serialized JSON object
    pub arguments: String,
}

/// One message-like unit of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Turn {
    /// System instructions; exactly one, always first.
    System { content: String },

    /// A user message.
    ///
    /// `pristine` holds the content as it was before a transient
    /// instruction was appended; it is never serialized.
    User {
        content: String,
        #[serde(skip)]
        pristine: Option<String>,
    },

    /// A model reply, with the capability tags derived from a preceding
    /// tool turn and any tool calls the model requested.
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        tags: BTreeSet<CapabilityTag>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },

    /// The stringified result of a tool invocation fed back to the model.
    Tool {
        tool_call_id: String,
        tool_name: String,
        content: String,
    },
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Turn::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Turn::User {
            content: content.into(),
            pristine: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Turn::Assistant {
            content: content.into(),
            tags: BTreeSet::new(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Turn::Tool {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
        }
    }

    /// The wire role name.
    pub fn role(&self) -> &'static str {
        match self {
            Turn::System { .. } => "system",
            Turn::User { .. } => "user",
            Turn::Assistant { .. } => "assistant",
            Turn::Tool { .. } => "tool",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Turn::System { content }
            | Turn::User { content, .. }
            | Turn::Assistant { content, .. }
            | Turn::Tool { content, .. } => content,
        }
    }

    /// Content as the user and the model see it: assistant turns carry their
    /// capability tags as a trailing line.
    pub fn rendered_content(&self) -> Cow<'_, str> {
        match self {
            Turn::Assistant { content, tags, .. } if !tags.is_empty() => {
                Cow::Owned(format!("{content}{}", CapabilityTag::render_suffix(tags)))
            }
            other => Cow::Borrowed(other.content()),
        }
    }

    pub fn tags(&self) -> Option<&BTreeSet<CapabilityTag>> {
        match self {
            Turn::Assistant { tags, .. } => Some(tags),
            _ => None,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Turn::User { .. })
    }

    /// Tool calls carried by an assistant turn (empty for every other role).
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Turn::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Append transient text to a user turn, remembering the prior content.
    ///
    /// Repeated injections keep the earliest pristine value. Returns `false`
    /// for non-user turns, which are left untouched.
    pub fn inject_instruction(&mut self, text: &str) -> bool {
        match self {
            Turn::User { content, pristine } => {
                if pristine.is_none() {
                    *pristine = Some(content.clone());
                }
                content.push_str(text);
                true
            }
            _ => false,
        }
    }

    /// Restore a user turn to its content before any injection.
    ///
    /// Returns `true` if something was restored.
    pub fn restore_pristine(&mut self) -> bool {
        match self {
            Turn::User { content, pristine } => match pristine.take() {
                Some(original) => {
                    *content = original;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }
}

/// The ordered turns of one conversation.
///
/// Invariant: the first turn is the only `System` turn. The constructor and
/// every mutator uphold it, and deserialization rejects transcripts that
/// violate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Turn>", into = "Vec<Turn>")]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Start a transcript with its system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Never true: the system turn is always present.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn system_prompt(&self) -> &str {
        self.turns[0].content()
    }

    pub fn last(&self) -> &Turn {
        // Non-empty by construction.
        &self.turns[self.turns.len() - 1]
    }

    pub fn last_mut(&mut self) -> &mut Turn {
        let idx = self.turns.len() - 1;
        &mut self.turns[idx]
    }

    /// Append a non-system turn.
    pub fn push(&mut self, turn: Turn) -> Result<(), ContextError> {
        if matches!(turn, Turn::System { .. }) {
            return Err(ContextError::UnexpectedTurn {
                expected: "non-system",
            });
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Append a user turn. Infallible: only system turns are rejected.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    /// Append a plain assistant reply carrying `tags`.
    pub fn push_assistant(&mut self, content: impl Into<String>, tags: BTreeSet<CapabilityTag>) {
        self.turns.push(Turn::Assistant {
            content: content.into(),
            tags,
            tool_calls: Vec::new(),
        });
    }

    /// Remove the last turn if it is a user turn.
    pub fn pop_user(&mut self) -> Option<Turn> {
        if self.turns.len() > 1 && self.last().is_user() {
            self.turns.pop()
        } else {
            None
        }
    }

    /// The most recent user turn, scanning backward from the end.
    pub fn last_user_mut(&mut self) -> Option<&mut Turn> {
        self.turns.iter_mut().rev().find(|t| t.is_user())
    }

    /// Drop up to `count` of the oldest non-system turns.
    ///
    /// Returns the number of turns removed.
    pub fn evict_oldest(&mut self, count: usize) -> usize {
        let removable = count.min(self.turns.len() - 1);
        self.turns.drain(1..1 + removable);
        removable
    }
}

impl TryFrom<Vec<Turn>> for Transcript {
    type Error = ContextError;

    fn try_from(turns: Vec<Turn>) -> Result<Self, Self::Error> {
        match turns.first() {
            Some(Turn::System { .. }) => {}
            _ => return Err(ContextError::MissingSystemTurn),
        }
        if turns[1..].iter().any(|t| matches!(t, Turn::System { .. })) {
            return Err(ContextError::UnexpectedTurn {
                expected: "non-system",
            });
        }
        Ok(Self { turns })
    }
}

impl From<Transcript> for Vec<Turn> {
    fn from(transcript: Transcript) -> Self {
        transcript.turns
    }
}
