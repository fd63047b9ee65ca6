//! Context orchestrator — the single entry point for one retrieval turn.
//!
//! Assembles the default pipeline (or accepts a caller-supplied one), runs
//! it, and translates the final context into a `RetrievalBundle` plus an
//! `AggregatedUsageMetrics`.  Retrieval-quality trouble never surfaces as an
//! error from here; the only fatal condition is a missing collaborator,
//! raised by the builder at construction time.

use std::sync::Arc;

use crate::config::{RetrievalConfig, RetrievalParams};
use crate::core::errors::CoreError;
use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::llm::LanguageModel;
use crate::pipeline::stages::{DiagnosticsStep, QueryExpansionStep, ScoreFilter, SearchStep};
use crate::pipeline::{Pipeline, PipelineContext};
use crate::retrieval::RetrievalBundle;
use crate::session::ChatSession;
use crate::usage::AggregatedUsageMetrics;

pub struct ContextOrchestrator {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LanguageModel>,
    config: RetrievalConfig,
}

impl std::fmt::Debug for ContextOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ContextOrchestrator {
    pub fn builder() -> ContextOrchestratorBuilder {
        ContextOrchestratorBuilder::default()
    }

    /// Per-turn parameters seeded from the configured defaults.
    pub fn default_params(&self) -> RetrievalParams {
        RetrievalParams::from(&self.config)
    }

    /// The default stage chain for the given parameters:
    /// Expansion → Search → (ScoreFilter when `min_score` is set) → Diagnostics.
    pub fn default_pipeline(&self, params: &RetrievalParams) -> Pipeline {
        let expansion = QueryExpansionStep::new(self.llm.clone())
            .with_history_turns(self.config.history_turns)
            .with_max_tokens(self.config.max_expansion_tokens);
        let search = SearchStep::new(self.embedder.clone(), self.index.clone())
            .with_top_k(params.top_k)
            .with_window(params.window)
            .with_documents(params.document_ids.clone());

        let mut pipeline = Pipeline::new()
            .add_stage(Box::new(expansion))
            .add_stage(Box::new(search));
        if let Some(min_score) = params.min_score {
            pipeline = pipeline.add_stage(Box::new(ScoreFilter::new(min_score)));
        }
        pipeline.add_stage(Box::new(DiagnosticsStep))
    }

    /// Run one retrieval turn with the default pipeline.
    ///
    /// Always yields a bundle, even when every stage degraded or zero
    /// results were found.
    pub async fn build_context(
        &self,
        session: &ChatSession,
        user_message: &str,
        params: &RetrievalParams,
    ) -> (RetrievalBundle, AggregatedUsageMetrics) {
        let pipeline = self.default_pipeline(params);
        self.build_context_with(&pipeline, session, user_message)
            .await
    }

    /// Run one retrieval turn with a caller-supplied pipeline.
    pub async fn build_context_with(
        &self,
        pipeline: &Pipeline,
        session: &ChatSession,
        user_message: &str,
    ) -> (RetrievalBundle, AggregatedUsageMetrics) {
        let mut ctx = PipelineContext::new(session, user_message);
        pipeline.run(&mut ctx).await;

        let keyphrases = ctx
            .metadata
            .get("keyphrases")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let bundle = RetrievalBundle {
            original_query: ctx.user_message.clone(),
            expanded_query: ctx.query.clone(),
            keyphrases,
            results: std::mem::take(&mut ctx.results),
            diagnostics: std::mem::take(&mut ctx.metadata),
        };
        let usage = AggregatedUsageMetrics::from_operations(ctx.into_usage());

        tracing::debug!(
            session = %session.id,
            results = bundle.results.len(),
            total_tokens = usage.total_tokens,
            "retrieval turn completed"
        );

        (bundle, usage)
    }
}

/// Builder validating that every mandatory collaborator is present.
#[derive(Default)]
pub struct ContextOrchestratorBuilder {
    embedder: Option<Arc<dyn Embedder>>,
    index: Option<Arc<dyn VectorIndex>>,
    llm: Option<Arc<dyn LanguageModel>>,
    config: Option<RetrievalConfig>,
}

impl ContextOrchestratorBuilder {
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn language_model(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn config(mut self, config: RetrievalConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Fails with `CoreError::Config` when a collaborator is missing; this
    /// is the one error category that escapes the orchestrator.
    pub fn build(self) -> Result<ContextOrchestrator, CoreError> {
        Ok(ContextOrchestrator {
            embedder: self
                .embedder
                .ok_or_else(|| CoreError::Config("no embedder configured".to_string()))?,
            index: self
                .index
                .ok_or_else(|| CoreError::Config("no vector index configured".to_string()))?,
            llm: self
                .llm
                .ok_or_else(|| CoreError::Config("no language model configured".to_string()))?,
            config: self.config.unwrap_or_default().clamped(),
        })
    }
}
