//! PipelineStage trait and the Pipeline executor.
//!
//! Stages are composable units that each transform the shared
//! `PipelineContext` (rewrite the query, populate results, filter, annotate
//! diagnostics).  The pipeline chains them in caller-specified order with
//! per-stage failure isolation: no single stage failure aborts the run.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::context::PipelineContext;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage '{name}' failed: {message}")]
    Failed { name: String, message: String },

    #[error("stage '{name}' skipped: {reason}")]
    Skipped { name: String, reason: String },
}

impl StageError {
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Skipped {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a skip (stage declined to run; not recorded as
    /// an error in the context).
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// The inner message, without the stage-name prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Failed { message, .. } => message,
            Self::Skipped { reason, .. } => reason,
        }
    }
}

/// A single unit of retrieval processing.
///
/// Implementations must not assume other stages ran before them, and must
/// confine side effects to the context they are handed.  Stages that call a
/// model append a tagged `UsageMetrics` entry.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Stage name, used for logging and for the `"<name>_error"` metadata
    /// key on failure.
    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut PipelineContext<'_>) -> Result<(), StageError>;
}

/// Ordered, sequential stage executor.
///
/// Stage order is strict and caller-specified.  The default order is
/// Expansion → Search → (optional) ScoreFilter → Diagnostics; placing a
/// filter before the search is a configuration error this executor does not
/// detect.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn PipelineStage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage to the end of the pipeline.
    pub fn add_stage(mut self, stage: Box<dyn PipelineStage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Execute all stages in order against one context.
    ///
    /// - `Ok` → continue.
    /// - A **skip** is logged and continues; nothing is recorded.
    /// - Any other failure is caught: `"<name>_error"` is written into
    ///   `ctx.metadata` and execution proceeds, the context unchanged by the
    ///   failing stage.
    pub async fn run(&self, ctx: &mut PipelineContext<'_>) {
        for stage in &self.stages {
            match stage.run(ctx).await {
                Ok(()) => {
                    tracing::debug!(stage = stage.name(), "stage completed");
                }
                Err(e) if e.is_skip() => {
                    tracing::info!(stage = stage.name(), "stage skipped: {}", e.message());
                }
                Err(e) => {
                    tracing::error!(stage = stage.name(), "stage failed: {}", e.message());
                    ctx.set_metadata(
                        format!("{}_error", stage.name()),
                        Value::String(e.message().to_string()),
                    );
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
