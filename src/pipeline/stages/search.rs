//! SearchStep — embeds the current query and runs the similarity search,
//! optionally widening each hit with adjacent passages from the same
//! document ("window expansion").
//!
//! Reads: `ctx.query`.
//! Mutates: `ctx.results`, metadata `search_latency_ms`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::embedding::Embedder;
use crate::index::{PassageFilter, VectorIndex};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::stage::{PipelineStage, StageError};
use crate::retrieval::RetrievalResult;

const STAGE_NAME: &str = "SearchStep";

pub struct SearchStep {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
    window: u32,
    document_ids: Option<Vec<String>>,
}

impl SearchStep {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            top_k: 8,
            window: 0,
            document_ids: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Number of adjacent passages to include on each side of a hit.
    pub fn with_window(mut self, window: u32) -> Self {
        self.window = window;
        self
    }

    /// Restrict the search to an allow-list of document ids.
    pub fn with_documents(mut self, document_ids: Option<Vec<String>>) -> Self {
        self.document_ids = document_ids;
        self
    }
}

#[async_trait]
impl PipelineStage for SearchStep {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn run(&self, ctx: &mut PipelineContext<'_>) -> Result<(), StageError> {
        let started = Instant::now();

        let vector = self
            .embedder
            .embed(&ctx.query)
            .await
            .map_err(|e| StageError::failed(STAGE_NAME, e.to_string()))?;

        let filter = PassageFilter {
            document_ids: self.document_ids.clone(),
            position_range: None,
        };
        let mut hits = self
            .index
            .search(&vector, self.top_k, &filter)
            .await
            .map_err(|e| StageError::failed(STAGE_NAME, e.to_string()))?;

        // The backend contract says descending, but the bundle invariant is
        // ours to uphold.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));

        // Build the full result list locally so a window-fetch failure
        // leaves the context untouched.
        let mut seen: HashSet<String> = hits.iter().map(|h| h.record.id.clone()).collect();
        let mut results: Vec<RetrievalResult> = Vec::with_capacity(hits.len());
        let mut context_rows: Vec<RetrievalResult> = Vec::new();

        for hit in hits {
            if self.window > 0 {
                let window_filter =
                    PassageFilter::window(&hit.record.document_id, hit.record.position, self.window);
                let neighbours = self
                    .index
                    .fetch(&window_filter, (2 * self.window + 1) as usize)
                    .await
                    .map_err(|e| StageError::failed(STAGE_NAME, e.to_string()))?;
                for record in neighbours {
                    if seen.insert(record.id.clone()) {
                        context_rows.push(RetrievalResult::window_context(record, hit.score));
                    }
                }
            }
            results.push(RetrievalResult::hit(hit));
        }

        // Window context reads best in document order, after the scored hits.
        context_rows.sort_by(|a, b| {
            (a.document_id.as_str(), a.position).cmp(&(b.document_id.as_str(), b.position))
        });
        results.extend(context_rows);

        tracing::debug!(
            hits = results.len(),
            query = %ctx.query,
            "similarity search completed"
        );

        ctx.results = results;
        ctx.set_metadata(
            "search_latency_ms",
            json!(started.elapsed().as_millis() as u64),
        );
        Ok(())
    }
}
