use async_trait::async_trait;

use crate::core::errors::CoreError;

use super::types::{Completion, CompletionRequest};

/// Language-model backend.
///
/// Implementations must fill token counts and wall-clock latency in the
/// returned [`Completion::usage`]; callers re-tag the entry with their
/// operation name before recording it.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CoreError>;
}
