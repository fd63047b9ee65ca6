//! Usage ledger — cost and latency accounting for model calls.
//!
//! Every stage or caller that invokes the language model records one
//! `UsageMetrics` entry tagged with its operation name.  At the end of a
//! turn the orchestrator folds the entries into an `AggregatedUsageMetrics`
//! for cost-transparency reporting.

use serde::{Deserialize, Serialize};

/// Cost of a single model call.
///
/// Created by the language-model provider (token counts and wall-clock
/// latency) and re-tagged by the calling stage via [`UsageMetrics::tagged`].
/// Never mutated after it has been recorded into a pipeline context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    /// Model identifier as reported by the provider.
    pub model: String,
    /// Wall-clock latency of the call in milliseconds.
    pub latency_ms: u64,
    /// Operation tag, e.g. "expansion", "summary", "answer".
    pub operation: String,
}

impl UsageMetrics {
    pub fn new(
        prompt_tokens: u32,
        completion_tokens: u32,
        model: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            model: model.into(),
            latency_ms,
            operation: String::new(),
        }
    }

    /// Re-tag this entry with the operation that spent the tokens.
    pub fn tagged(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }
}

/// Cost summary across every model call made during one turn.
///
/// Pure derivation from a list of [`UsageMetrics`]; the constituent list is
/// preserved in recording order for per-operation breakdown reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatedUsageMetrics {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub total_latency_ms: u64,
    pub operations: Vec<UsageMetrics>,
}

impl AggregatedUsageMetrics {
    /// Sum token and latency fields across all recorded operations.
    pub fn from_operations(operations: Vec<UsageMetrics>) -> Self {
        let mut agg = Self {
            operations: Vec::new(),
            ..Default::default()
        };
        for usage in &operations {
            agg.prompt_tokens += usage.prompt_tokens;
            agg.completion_tokens += usage.completion_tokens;
            agg.total_tokens += usage.total_tokens;
            agg.total_latency_ms += usage.latency_ms;
        }
        agg.operations = operations;
        agg
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
