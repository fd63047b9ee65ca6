//! DiagnosticsStep — purely observational enrichment, meant to run last.
//!
//! Reads: `ctx.results`, metadata `keyphrases`.
//! Mutates: metadata `result_count` / `results_by_kind` / `keyphrase_count`.
//! Never touches the result list; running it twice yields identical values.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::json;

use crate::index::PassageKind;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::stage::{PipelineStage, StageError};

const STAGE_NAME: &str = "DiagnosticsStep";

pub struct DiagnosticsStep;

#[async_trait]
impl PipelineStage for DiagnosticsStep {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn run(&self, ctx: &mut PipelineContext<'_>) -> Result<(), StageError> {
        let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
        for result in &ctx.results {
            let key = match result.kind {
                PassageKind::Chunk => "chunk",
                PassageKind::Artifact => "artifact",
            };
            *by_kind.entry(key).or_insert(0) += 1;
        }

        ctx.set_metadata("result_count", json!(ctx.results.len()));
        ctx.set_metadata("results_by_kind", json!(by_kind));

        if let Some(keyphrases) = ctx.metadata.get("keyphrases").and_then(|v| v.as_array()) {
            let count = keyphrases.len();
            ctx.set_metadata("keyphrase_count", json!(count));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SourceRef;
    use crate::retrieval::{ResultOrigin, RetrievalResult};
    use crate::session::ChatSession;

    fn result(id: &str, kind: PassageKind) -> RetrievalResult {
        RetrievalResult {
            id: id.to_string(),
            document_id: "d1".to_string(),
            position: 0,
            score: 0.5,
            text: String::new(),
            source: SourceRef {
                filename: "f".to_string(),
                section: None,
            },
            kind,
            origin: ResultOrigin::Hit,
        }
    }

    #[tokio::test]
    async fn test_counts_and_kind_breakdown() {
        let session = ChatSession::new("s1", "");
        let mut ctx = PipelineContext::new(&session, "q");
        ctx.results = vec![
            result("a", PassageKind::Chunk),
            result("b", PassageKind::Chunk),
            result("c", PassageKind::Artifact),
        ];
        ctx.set_metadata("keyphrases", json!(["corner lot", "setback"]));

        DiagnosticsStep.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.metadata.get("result_count"), Some(&json!(3)));
        assert_eq!(
            ctx.metadata.get("results_by_kind"),
            Some(&json!({"artifact": 1, "chunk": 2}))
        );
        assert_eq!(ctx.metadata.get("keyphrase_count"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_idempotent() {
        let session = ChatSession::new("s1", "");
        let mut ctx = PipelineContext::new(&session, "q");
        ctx.results = vec![result("a", PassageKind::Chunk)];

        DiagnosticsStep.run(&mut ctx).await.unwrap();
        let first = ctx.metadata.clone();
        DiagnosticsStep.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.metadata, first);
        assert_eq!(ctx.results.len(), 1);
    }

    #[tokio::test]
    async fn test_no_keyphrase_count_without_expansion() {
        let session = ChatSession::new("s1", "");
        let mut ctx = PipelineContext::new(&session, "q");

        DiagnosticsStep.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.metadata.get("result_count"), Some(&json!(0)));
        assert!(!ctx.metadata.contains_key("keyphrase_count"));
    }
}
