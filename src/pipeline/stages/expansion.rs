//! QueryExpansionStep — rewrites the user message into a better search query.
//!
//! Renders recent conversation history plus the user message into a prompt
//! asking the model for an expanded query and keyphrases.  Best-effort only:
//! every failure path leaves `ctx.query` equal to the original user message
//! and reports `query_expanded = false` instead of erroring.
//!
//! Reads: `ctx.session`, `ctx.user_message`.
//! Mutates: `ctx.query`, metadata `keyphrases` / `query_expanded`, usage.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::llm::{ChatRole, CompletionRequest, LanguageModel};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::stage::{PipelineStage, StageError};

const STAGE_NAME: &str = "QueryExpansionStep";

const EXPANSION_SYSTEM_PROMPT: &str = "You rewrite user questions into search queries \
for a document retrieval system. Reply with a single JSON object of the form \
{\"query\": \"...\", \"keyphrases\": [\"...\"]} and nothing else. The query should \
resolve pronouns and references using the conversation, and the keyphrases should \
be 3-8 short terms worth matching literally.";

/// Expected shape of the model reply.
#[derive(Debug, Deserialize)]
struct ExpansionReply {
    query: String,
    #[serde(default)]
    keyphrases: Vec<String>,
}

pub struct QueryExpansionStep {
    llm: Arc<dyn LanguageModel>,
    history_turns: usize,
    max_tokens: u32,
}

impl QueryExpansionStep {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            history_turns: 6,
            max_tokens: 256,
        }
    }

    pub fn with_history_turns(mut self, history_turns: usize) -> Self {
        self.history_turns = history_turns.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn render_prompt(&self, ctx: &PipelineContext<'_>) -> String {
        let mut lines = Vec::new();
        for message in ctx.session.recent_dialogue(self.history_turns) {
            let speaker = match message.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
                ChatRole::System => continue,
            };
            lines.push(format!("{speaker}: {}", message.content));
        }
        let history = if lines.is_empty() {
            "(no prior conversation)".to_string()
        } else {
            lines.join("\n")
        };
        format!(
            "Conversation so far:\n{history}\n\nLatest user message:\n{}",
            ctx.user_message
        )
    }
}

#[async_trait]
impl PipelineStage for QueryExpansionStep {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn run(&self, ctx: &mut PipelineContext<'_>) -> Result<(), StageError> {
        let request = CompletionRequest::new(self.render_prompt(ctx))
            .with_system(EXPANSION_SYSTEM_PROMPT)
            .with_max_tokens(self.max_tokens);

        let completion = match self.llm.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::warn!("query expansion unavailable, using original query: {e}");
                ctx.set_metadata("query_expanded", json!(false));
                return Ok(());
            }
        };

        // Tokens were spent even when the reply turns out unusable.
        ctx.record_usage(completion.usage.clone().tagged("expansion"));

        match parse_expansion(&completion.text) {
            Some(reply) if !reply.query.trim().is_empty() => {
                ctx.query = reply.query.trim().to_string();
                ctx.set_metadata("keyphrases", json!(reply.keyphrases));
                ctx.set_metadata("query_expanded", json!(true));
            }
            _ => {
                tracing::warn!("unparseable expansion reply, using original query");
                ctx.set_metadata("query_expanded", json!(false));
            }
        }

        Ok(())
    }
}

/// Parse the model reply, tolerating a Markdown code fence around the JSON.
fn parse_expansion(text: &str) -> Option<ExpansionReply> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(body).ok()
}
