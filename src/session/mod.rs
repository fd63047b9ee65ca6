//! Conversation state: `ChatSession` plus the keyed `SessionStore`.
//!
//! Sessions live in a process-wide store keyed by id.  A session is not safe
//! for concurrent mutation by two simultaneous turns; the design assumes at
//! most one in-flight turn per session id, and callers that allow more must
//! serialize them.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::errors::CoreError;
use crate::llm::{ChatMessage, ChatRole};

/// Conversation state for one session.
///
/// `messages` is append-only except for memory-policy compaction, which may
/// replace a prefix with a single synthetic summary message.  Order is
/// always chronological.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    /// Rolling summary of compacted history, if compaction has run.
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a session with a fresh v4 id.
    pub fn with_generated_id(system_prompt: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), system_prompt)
    }

    /// Append a message and touch `updated_at`.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// The last `n` non-system messages, oldest first.  Used to give the
    /// query expander and the summarizer recent conversational context.
    pub fn recent_dialogue(&self, n: usize) -> Vec<&ChatMessage> {
        let dialogue: Vec<&ChatMessage> = self
            .messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .collect();
        let skip = dialogue.len().saturating_sub(n);
        dialogue.into_iter().skip(skip).collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// Keyed session store.
///
/// `get` hands out an owned clone; `put` replaces the stored session
/// wholesale.  No TTL or eviction policy is defined — stale sessions stay
/// until an explicit `delete`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<ChatSession>, CoreError>;
    async fn put(&self, session: ChatSession) -> Result<(), CoreError>;
    async fn delete(&self, session_id: &str) -> Result<bool, CoreError>;
}

/// Reference in-memory store.  Created at process start and shared behind
/// an `Arc`; offers no persistence guarantee across restarts.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, ChatSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<ChatSession>, CoreError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn put(&self, session: ChatSession) -> Result<(), CoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, CoreError> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }
}
