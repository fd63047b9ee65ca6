use async_trait::async_trait;

use crate::core::errors::CoreError;

/// Embedding collaborator: text in, query/passage vector out.
///
/// The pipeline only ever embeds single query strings; batch ingestion
/// belongs to the document-processing side, outside this core.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError>;
}
