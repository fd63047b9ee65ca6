//! Conversational memory policy — keeps long sessions bounded by compacting
//! older history into a single summary message.
//!
//! The policy is a two-state machine per session: *unbounded* while the
//! message count stays below the trigger, *compacted* once a summarization
//! pass has replaced the older prefix.  Threshold semantics are `>=`: a
//! session whose count reaches `summary_trigger_messages` compacts on that
//! turn.  A failed summarization leaves the session untouched and is retried
//! on the next triggering turn; it is never fatal to the chat turn itself.

use std::sync::Arc;

use crate::config::MemoryConfig;
use crate::llm::{ChatMessage, ChatRole, CompletionRequest, LanguageModel};
use crate::session::ChatSession;
use crate::usage::UsageMetrics;

const SUMMARY_SYSTEM_PROMPT: &str = "You condense chat transcripts. Write a compact \
third-person summary of the conversation below, keeping every fact, decision, and \
open question a future turn might rely on. Reply with the summary text only.";

/// Outcome of one compaction decision.
#[derive(Debug, Clone)]
pub enum CompactionOutcome {
    /// Below the trigger; nothing happened.
    Skipped { message_count: usize },
    /// The prefix was summarized and replaced.
    Compacted {
        /// How many messages were folded into the summary.
        summarized: usize,
        usage: UsageMetrics,
    },
    /// Summarization failed; the session is unchanged.
    Failed { error: String },
}

impl CompactionOutcome {
    pub fn compacted(&self) -> bool {
        matches!(self, Self::Compacted { .. })
    }
}

pub struct MemoryPolicy {
    llm: Arc<dyn LanguageModel>,
    config: MemoryConfig,
}

impl MemoryPolicy {
    pub fn new(llm: Arc<dyn LanguageModel>, config: MemoryConfig) -> Self {
        Self {
            llm,
            config: config.clamped(),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Compact `session` if its history has reached the trigger threshold.
    ///
    /// On compaction, everything but the most recent `retained_recent`
    /// messages is summarized into one system-authored message prepended
    /// before the retained tail, and `session.summary` is replaced.
    pub async fn maybe_compact(&self, session: &mut ChatSession) -> CompactionOutcome {
        let count = session.messages.len();
        if count < self.config.summary_trigger_messages {
            return CompactionOutcome::Skipped {
                message_count: count,
            };
        }

        let cut = count - self.config.retained_recent.min(count);
        if cut == 0 {
            return CompactionOutcome::Skipped {
                message_count: count,
            };
        }

        let prompt = render_summary_prompt(session.summary.as_deref(), &session.messages[..cut]);
        let request = CompletionRequest::new(prompt)
            .with_system(SUMMARY_SYSTEM_PROMPT)
            .with_max_tokens(self.config.max_summary_tokens);

        let completion = match self.llm.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::warn!(session = %session.id, "history summarization failed: {e}");
                return CompactionOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let summary = completion.text.trim().to_string();
        if summary.is_empty() {
            tracing::warn!(session = %session.id, "summarizer returned an empty summary");
            return CompactionOutcome::Failed {
                error: "empty summary".to_string(),
            };
        }

        let tail = session.messages.split_off(cut);
        let mut rebuilt = Vec::with_capacity(tail.len() + 1);
        rebuilt.push(ChatMessage::system(format!(
            "Summary of the conversation so far: {summary}"
        )));
        rebuilt.extend(tail);
        session.messages = rebuilt;
        session.summary = Some(summary);
        session.touch();

        tracing::debug!(
            session = %session.id,
            summarized = cut,
            retained = session.messages.len(),
            "compacted conversation history"
        );

        CompactionOutcome::Compacted {
            summarized: cut,
            usage: completion.usage.tagged("summary"),
        }
    }
}

fn render_summary_prompt(previous_summary: Option<&str>, messages: &[ChatMessage]) -> String {
    let mut lines = Vec::with_capacity(messages.len() + 1);
    if let Some(previous) = previous_summary {
        lines.push(format!("Summary of earlier conversation: {previous}"));
    }
    for message in messages {
        let speaker = match message.role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        };
        lines.push(format!("{speaker}: {}", message.content));
    }
    lines.join("\n")
}
