//! Language-model boundary: chat message types, completion request/response,
//! and the `LanguageModel` collaborator trait.

mod provider;
mod types;

pub use provider::LanguageModel;
pub use types::{ChatMessage, ChatRole, Completion, CompletionRequest};
