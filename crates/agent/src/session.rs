//! Session registry.
//!
//! Each conversation gets its own [`ConversationContext`] behind a mutex, so
//! requests for one session run one at a time while different sessions run
//! in parallel.

use smartday_core::message::SessionId;
use smartday_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::context::{ContextSettings, ConversationContext};

pub type SharedContext = Arc<Mutex<ConversationContext>>;

struct Entry {
    context: SharedContext,
    created: u64,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Entry>>,
    provider: Arc<dyn Provider>,
    system_prompt: String,
    settings: ContextSettings,
    max_sessions: usize,
    counter: AtomicU64,
}

impl SessionRegistry {
    pub fn new(
        provider: Arc<dyn Provider>,
        system_prompt: impl Into<String>,
        settings: ContextSettings,
        max_sessions: usize,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            provider,
            system_prompt: system_prompt.into(),
            settings,
            max_sessions: max_sessions.max(1),
            counter: AtomicU64::new(0),
        }
    }

    /// Look up `id`, or start a fresh session (under `id` if given, else a
    /// new random id).
    pub async fn get_or_create(&self, id: Option<SessionId>) -> (SessionId, SharedContext) {
        if let Some(id) = &id {
            if let Some(ctx) = self.get(id).await {
                return (id.clone(), ctx);
            }
        }

        let id = id.unwrap_or_default();
        let mut sessions = self.sessions.write().await;
        // Another request may have created it between the two locks.
        if let Some(entry) = sessions.get(&id) {
            return (id, entry.context.clone());
        }

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, e)| e.created)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                info!(session = %oldest, cap = self.max_sessions, "Evicted oldest session");
            }
        }

        let context = Arc::new(Mutex::new(ConversationContext::new(
            self.provider.clone(),
            self.system_prompt.clone(),
            self.settings.clone(),
        )));
        sessions.insert(
            id.clone(),
            Entry {
                context: context.clone(),
                created: self.counter.fetch_add(1, Ordering::Relaxed),
            },
        );
        debug!(session = %id, total = sessions.len(), "Session created");
        (id, context)
    }

    pub async fn get(&self, id: &SessionId) -> Option<SharedContext> {
        self.sessions.read().await.get(id).map(|e| e.context.clone())
    }

    /// Forget a session. Returns `false` if it did not exist.
    pub async fn remove(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            debug!(session = %id, "Session removed");
        }
        removed
    }

    /// Clear a session's transcript back to the system prompt.
    pub async fn reset(&self, id: &SessionId) -> bool {
        match self.get(id).await {
            Some(ctx) => {
                ctx.lock().await.reset();
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
