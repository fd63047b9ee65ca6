//! The concrete stage library: query expansion, vector search with window
//! expansion, score filtering, and diagnostics enrichment.

mod diagnostics;
mod expansion;
mod score_filter;
mod search;

pub use diagnostics::DiagnosticsStep;
pub use expansion::QueryExpansionStep;
pub use score_filter::ScoreFilter;
pub use search::SearchStep;
