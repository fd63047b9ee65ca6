use thiserror::Error;

/// Crate-wide error type.
///
/// Only `Config` is ever fatal to a caller's turn: it is raised at
/// orchestrator construction when a mandatory collaborator is missing.
/// The remaining variants surface from collaborator traits and are caught
/// at the pipeline boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("language model error: {0}")]
    Llm(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("vector index error: {0}")]
    Index(String),
    #[error("session store error: {0}")]
    Session(String),
}

impl CoreError {
    pub fn config<E: std::fmt::Display>(err: E) -> Self {
        CoreError::Config(err.to_string())
    }

    pub fn llm<E: std::fmt::Display>(err: E) -> Self {
        CoreError::Llm(err.to_string())
    }

    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        CoreError::Embedding(err.to_string())
    }

    pub fn index<E: std::fmt::Display>(err: E) -> Self {
        CoreError::Index(err.to_string())
    }

    pub fn session<E: std::fmt::Display>(err: E) -> Self {
        CoreError::Session(err.to_string())
    }
}
