//! docquery — retrieval pipeline and conversational memory core for a
//! document-search assistant.
//!
//! Given a user message and a multi-turn session, the core produces a
//! ranked, diagnosable set of document passages and accounts for the cost
//! of every model call involved, while keeping long conversations bounded
//! via summarizing compaction.
//!
//! The main pieces:
//! - [`pipeline`] — composable stages over a shared per-turn context, with
//!   per-stage failure isolation.
//! - [`orchestrator::ContextOrchestrator`] — assembles and runs the default
//!   pipeline; the single entry point for one retrieval turn.
//! - [`memory::MemoryPolicy`] — compacts session history once it crosses a
//!   threshold.
//! - [`usage`] — the per-call usage ledger and its aggregation.
//!
//! Document chunking, embedding generation, the vector index, and the
//! language model are external collaborators behind the [`embedding`],
//! [`index`], and [`llm`] traits.

pub mod config;
pub mod core;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod logging;
pub mod memory;
pub mod orchestrator;
pub mod pipeline;
pub mod retrieval;
pub mod session;
pub mod usage;

pub use config::{MemoryConfig, RetrievalConfig, RetrievalParams};
pub use crate::core::errors::CoreError;
pub use embedding::Embedder;
pub use index::{PassageFilter, PassageKind, PassageRecord, ScoredPassage, SourceRef, VectorIndex};
pub use llm::{ChatMessage, ChatRole, Completion, CompletionRequest, LanguageModel};
pub use memory::{CompactionOutcome, MemoryPolicy};
pub use orchestrator::{ContextOrchestrator, ContextOrchestratorBuilder};
pub use pipeline::{Pipeline, PipelineContext, PipelineStage, StageError};
pub use retrieval::{ResultOrigin, RetrievalBundle, RetrievalResult};
pub use session::{ChatSession, InMemorySessionStore, SessionStore};
pub use usage::{AggregatedUsageMetrics, UsageMetrics};
