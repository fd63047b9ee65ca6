//! Vector index boundary — the similarity-search backend this core consumes.
//!
//! The index stores passages keyed by id, each carrying its owning document
//! id and an explicit per-document `position`.  Adjacency (window expansion)
//! is always resolved through that position field, never by parsing an
//! identifier string, so the core tolerates any id format and non-sequential
//! ids.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::CoreError;

/// What kind of content a passage holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassageKind {
    /// Plain text chunk cut from a document body.
    Chunk,
    /// Structured artifact (table, figure caption, code block).
    Artifact,
}

/// Where a passage came from, for citation display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub filename: String,
    pub section: Option<String>,
}

/// One stored passage as the index returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageRecord {
    pub id: String,
    pub document_id: String,
    /// Ordering index of this passage within its document.
    pub position: u32,
    pub text: String,
    pub source: SourceRef,
    pub kind: PassageKind,
}

/// A passage with its similarity score.  Scores within one search response
/// share a single scale (unit interval or provider-native).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPassage {
    pub record: PassageRecord,
    pub score: f32,
}

/// Restriction applied to a search or fetch.
///
/// `document_ids` is an "id in set" predicate (a one-element set is plain
/// equality); `position_range` is an inclusive range over the per-document
/// ordering index, used for window expansion.
#[derive(Debug, Clone, Default)]
pub struct PassageFilter {
    pub document_ids: Option<Vec<String>>,
    pub position_range: Option<(u32, u32)>,
}

impl PassageFilter {
    pub fn for_documents(document_ids: Vec<String>) -> Self {
        Self {
            document_ids: Some(document_ids),
            position_range: None,
        }
    }

    /// Filter selecting the passages within `window` positions of `center`
    /// inside a single document.
    pub fn window(document_id: &str, center: u32, window: u32) -> Self {
        Self {
            document_ids: Some(vec![document_id.to_string()]),
            position_range: Some((center.saturating_sub(window), center.saturating_add(window))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.document_ids.is_none() && self.position_range.is_none()
    }

    /// Whether a record satisfies this filter.  Reference semantics for
    /// in-memory backends; networked backends translate the predicates into
    /// their native filter language instead.
    pub fn matches(&self, record: &PassageRecord) -> bool {
        if let Some(ids) = &self.document_ids {
            if !ids.iter().any(|id| id == &record.document_id) {
                return false;
            }
        }
        if let Some((lo, hi)) = self.position_range {
            if record.position < lo || record.position > hi {
                return false;
            }
        }
        true
    }
}

/// Vector similarity search backend.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return up to `top_k` passages most similar to `vector`, restricted by
    /// `filter`, ordered by descending score.
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &PassageFilter,
    ) -> Result<Vec<ScoredPassage>, CoreError>;

    /// Unscored lookup by filter, used to pull window-context passages
    /// around a hit.  Results are ordered by (document_id, position).
    async fn fetch(
        &self,
        filter: &PassageFilter,
        limit: usize,
    ) -> Result<Vec<PassageRecord>, CoreError>;
}
