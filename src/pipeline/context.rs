//! PipelineContext — shared mutable state for one retrieval run.
//!
//! Each turn creates a fresh context that flows through the stage chain.
//! Stages read only the fields they need and confine their side effects to
//! this object; the orchestrator extracts a `RetrievalBundle` from it and
//! then discards it.  Contexts are never shared across runs.

use std::collections::HashMap;

use serde_json::Value;

use crate::retrieval::RetrievalResult;
use crate::session::ChatSession;
use crate::usage::UsageMetrics;

/// Per-run mutable state, owned exclusively by one pipeline run.
pub struct PipelineContext<'a> {
    /// The conversation this turn belongs to.  Read-only.
    pub session: &'a ChatSession,
    /// The raw user message, untouched by any stage.
    pub user_message: String,
    /// Current search query.  Starts equal to `user_message`; the expansion
    /// stage may rewrite it.
    pub query: String,
    /// Ranked results, populated by the search stage.
    pub results: Vec<RetrievalResult>,
    /// Free-form diagnostics written by stages and the pipeline executor.
    pub metadata: HashMap<String, Value>,
    usage: Vec<UsageMetrics>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(session: &'a ChatSession, user_message: impl Into<String>) -> Self {
        let user_message = user_message.into();
        Self {
            session,
            query: user_message.clone(),
            user_message,
            results: Vec::new(),
            metadata: HashMap::new(),
            usage: Vec::new(),
        }
    }

    /// Record the cost of a model call.  The usage list is append-only
    /// within a run; entries are never removed or rewritten.
    pub fn record_usage(&mut self, usage: UsageMetrics) {
        self.usage.push(usage);
    }

    pub fn usage(&self) -> &[UsageMetrics] {
        &self.usage
    }

    pub fn into_usage(self) -> Vec<UsageMetrics> {
        self.usage
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Typed read of a metadata entry; `None` when absent or mismatched.
    pub fn metadata_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(Value::as_bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_starts_as_user_message() {
        let session = ChatSession::new("s1", "");
        let ctx = PipelineContext::new(&session, "what about corner lots?");
        assert_eq!(ctx.query, ctx.user_message);
        assert!(ctx.results.is_empty());
        assert!(ctx.usage().is_empty());
    }

    #[test]
    fn test_usage_accumulates_in_order() {
        let session = ChatSession::new("s1", "");
        let mut ctx = PipelineContext::new(&session, "q");
        ctx.record_usage(UsageMetrics::new(10, 2, "m", 5).tagged("expansion"));
        ctx.record_usage(UsageMetrics::new(20, 4, "m", 7).tagged("answer"));

        let ops: Vec<&str> = ctx.usage().iter().map(|u| u.operation.as_str()).collect();
        assert_eq!(ops, vec!["expansion", "answer"]);
    }
}
