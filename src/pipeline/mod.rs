//! Retrieval pipeline framework: the shared per-run context, the stage
//! contract, the sequential executor with failure isolation, and the
//! built-in stage library.

pub mod context;
pub mod stage;
pub mod stages;

pub use context::PipelineContext;
pub use stage::{Pipeline, PipelineStage, StageError};
