//! ScoreFilter — drops results below a similarity threshold.
//!
//! Optional stage, omitted from the default pipeline unless a `min_score`
//! is configured.  Stateless; must run after the search and before
//! diagnostics to be useful.
//!
//! Reads/mutates: `ctx.results`; metadata `filtered_by_score` / `min_score`.

use async_trait::async_trait;
use serde_json::json;

use crate::pipeline::context::PipelineContext;
use crate::pipeline::stage::{PipelineStage, StageError};

const STAGE_NAME: &str = "ScoreFilter";

pub struct ScoreFilter {
    min_score: f32,
}

impl ScoreFilter {
    pub fn new(min_score: f32) -> Self {
        Self { min_score }
    }
}

#[async_trait]
impl PipelineStage for ScoreFilter {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn run(&self, ctx: &mut PipelineContext<'_>) -> Result<(), StageError> {
        let before = ctx.results.len();
        ctx.results.retain(|r| r.score >= self.min_score);
        let removed = before - ctx.results.len();

        if removed > 0 {
            tracing::debug!(removed, min_score = self.min_score, "filtered low-score results");
        }
        ctx.set_metadata("filtered_by_score", json!(removed));
        ctx.set_metadata("min_score", json!(self.min_score));
        Ok(())
    }
}
