//! Typed configuration for retrieval and conversational memory.
//!
//! Callers deserialize these from their app config document; every knob has
//! a default and out-of-range values are clamped rather than rejected.

use serde::{Deserialize, Serialize};

/// Retrieval defaults used when the caller passes no per-turn overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum similarity hits per search.
    pub top_k: usize,
    /// Adjacent passages to pull in around each hit (0 disables).
    pub window: u32,
    /// Minimum similarity score; `None` omits the score filter stage.
    pub min_score: Option<f32>,
    /// Non-system messages of history given to the query expander.
    pub history_turns: usize,
    /// Token cap for the expansion completion.
    pub max_expansion_tokens: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            window: 0,
            min_score: None,
            history_turns: 6,
            max_expansion_tokens: 256,
        }
    }
}

impl RetrievalConfig {
    /// Clamp values into workable ranges.
    pub fn clamped(mut self) -> Self {
        self.top_k = self.top_k.clamp(1, 50);
        self.window = self.window.min(10);
        self.history_turns = self.history_turns.clamp(1, 20);
        self.max_expansion_tokens = self.max_expansion_tokens.clamp(32, 2048);
        self.min_score = self.min_score.map(|s| s.clamp(0.0, 1.0));
        self
    }
}

/// Conversational memory (compaction) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Compaction fires once `session.messages.len() >=` this value.
    pub summary_trigger_messages: usize,
    /// Most recent messages kept verbatim through a compaction.
    pub retained_recent: usize,
    /// Token cap for the summary completion.
    pub max_summary_tokens: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            summary_trigger_messages: 14,
            retained_recent: 4,
            max_summary_tokens: 512,
        }
    }
}

impl MemoryConfig {
    /// Clamp values into workable ranges; the retained tail always stays
    /// strictly below the trigger so compaction makes progress.
    pub fn clamped(mut self) -> Self {
        self.summary_trigger_messages = self.summary_trigger_messages.clamp(4, 200);
        self.retained_recent = self
            .retained_recent
            .clamp(1, self.summary_trigger_messages - 2);
        self.max_summary_tokens = self.max_summary_tokens.clamp(64, 4096);
        self
    }
}

/// Per-turn retrieval parameters.
#[derive(Debug, Clone, Default)]
pub struct RetrievalParams {
    pub top_k: usize,
    pub window: u32,
    /// Restrict the search to these document ids, if present.
    pub document_ids: Option<Vec<String>>,
    pub min_score: Option<f32>,
}

impl From<&RetrievalConfig> for RetrievalParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            window: config.window,
            document_ids: None,
            min_score: config.min_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_config_defaults_and_clamp() {
        let config = RetrievalConfig::default();
        assert_eq!(config.top_k, 8);
        assert_eq!(config.history_turns, 6);

        let clamped = RetrievalConfig {
            top_k: 0,
            window: 99,
            min_score: Some(3.0),
            history_turns: 100,
            max_expansion_tokens: 1,
        }
        .clamped();
        assert_eq!(clamped.top_k, 1);
        assert_eq!(clamped.window, 10);
        assert_eq!(clamped.min_score, Some(1.0));
        assert_eq!(clamped.history_turns, 20);
        assert_eq!(clamped.max_expansion_tokens, 32);
    }

    #[test]
    fn test_memory_config_retained_below_trigger() {
        let clamped = MemoryConfig {
            summary_trigger_messages: 6,
            retained_recent: 50,
            max_summary_tokens: 512,
        }
        .clamped();
        assert_eq!(clamped.retained_recent, 4);
        assert!(clamped.retained_recent < clamped.summary_trigger_messages);
    }

    #[test]
    fn test_config_deserializes_with_partial_keys() {
        let config: RetrievalConfig =
            serde_json::from_str(r#"{"top_k": 12, "min_score": 0.4}"#).unwrap();
        assert_eq!(config.top_k, 12);
        assert_eq!(config.min_score, Some(0.4));
        assert_eq!(config.history_turns, 6);
    }
}
