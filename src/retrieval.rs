//! Retrieval output types: ranked results and the per-turn bundle.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::index::{PassageKind, PassageRecord, ScoredPassage, SourceRef};

/// Why a passage is in the result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
    /// Returned by the similarity search itself.
    Hit,
    /// Pulled in as window context adjacent to a hit.
    Context,
}

/// One retrieved passage.  Immutable once created by the search stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: String,
    pub document_id: String,
    /// Ordering index of the passage within its document.
    pub position: u32,
    pub score: f32,
    pub text: String,
    pub source: SourceRef,
    pub kind: PassageKind,
    pub origin: ResultOrigin,
}

impl RetrievalResult {
    /// A true similarity hit.
    pub fn hit(scored: ScoredPassage) -> Self {
        Self::from_record(scored.record, scored.score, ResultOrigin::Hit)
    }

    /// A window-context passage; carries its anchor hit's score so every
    /// score in a bundle stays on one comparable scale.
    pub fn window_context(record: PassageRecord, anchor_score: f32) -> Self {
        Self::from_record(record, anchor_score, ResultOrigin::Context)
    }

    fn from_record(record: PassageRecord, score: f32, origin: ResultOrigin) -> Self {
        Self {
            id: record.id,
            document_id: record.document_id,
            position: record.position,
            score,
            text: record.text,
            source: record.source,
            kind: record.kind,
            origin,
        }
    }
}

/// Packaged output of one retrieval turn.  Read-only after the orchestrator
/// extracts it from the pipeline context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalBundle {
    pub original_query: String,
    /// Equals `original_query` whenever query expansion was skipped or
    /// failed; never empty when the original query is non-empty.
    pub expanded_query: String,
    pub keyphrases: Vec<String>,
    pub results: Vec<RetrievalResult>,
    pub diagnostics: HashMap<String, Value>,
}

impl RetrievalBundle {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Render the ranked results into a numbered context block suitable for
    /// injection into an answer prompt.
    pub fn context_text(&self) -> String {
        self.results
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let section = r
                    .source
                    .section
                    .as_deref()
                    .map(|s| format!(", {s}"))
                    .unwrap_or_default();
                format!(
                    "[{}] (score: {:.2}) {} — {}{}",
                    i + 1,
                    r.score,
                    r.text,
                    r.source.filename,
                    section
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
