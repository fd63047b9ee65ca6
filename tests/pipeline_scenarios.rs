//! End-to-end retrieval turns against stub collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use docquery::{
    ChatMessage, ChatSession, CompactionOutcome, Completion, CompletionRequest,
    ContextOrchestrator, CoreError, Embedder, InMemorySessionStore, LanguageModel, MemoryConfig,
    MemoryPolicy, PassageFilter, PassageKind, PassageRecord, RetrievalConfig, RetrievalParams,
    ScoredPassage, SessionStore, SourceRef, UsageMetrics, VectorIndex,
};

// ---------------------------------------------------------------------------
// Stub collaborators
// ---------------------------------------------------------------------------

struct StubEmbedder;

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CoreError> {
        Ok(vec![0.1, 0.2, 0.3])
    }
}

/// Index serving a fixed corpus; search returns the corpus scored by the
/// canned score list, fetch applies the filter against the corpus.
struct StubIndex {
    corpus: Vec<(PassageRecord, f32)>,
    fail_search: bool,
}

fn passage(id: &str, doc: &str, position: u32, text: &str) -> PassageRecord {
    PassageRecord {
        id: id.to_string(),
        document_id: doc.to_string(),
        position,
        text: text.to_string(),
        source: SourceRef {
            filename: "zoning-bylaws.pdf".to_string(),
            section: Some("Residential".to_string()),
        },
        kind: PassageKind::Chunk,
    }
}

#[async_trait]
impl VectorIndex for StubIndex {
    async fn search(
        &self,
        _vector: &[f32],
        top_k: usize,
        filter: &PassageFilter,
    ) -> Result<Vec<ScoredPassage>, CoreError> {
        if self.fail_search {
            return Err(CoreError::Index("connection reset by peer".to_string()));
        }
        let mut hits: Vec<ScoredPassage> = self
            .corpus
            .iter()
            .filter(|(record, _)| filter.matches(record))
            .map(|(record, score)| ScoredPassage {
                record: record.clone(),
                score: *score,
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn fetch(
        &self,
        filter: &PassageFilter,
        limit: usize,
    ) -> Result<Vec<PassageRecord>, CoreError> {
        let mut records: Vec<PassageRecord> = self
            .corpus
            .iter()
            .filter(|(record, _)| filter.matches(record))
            .map(|(record, _)| record.clone())
            .collect();
        records.sort_by(|a, b| {
            (a.document_id.as_str(), a.position).cmp(&(b.document_id.as_str(), b.position))
        });
        records.truncate(limit);
        Ok(records)
    }
}

struct StubLlm {
    reply: String,
}

impl StubLlm {
    fn working() -> Self {
        Self {
            reply: r#"{"query": "corner lot setback requirements", "keyphrases": ["corner lot", "setback", "frontage"]}"#
                .to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for StubLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<Completion, CoreError> {
        Ok(Completion {
            text: self.reply.clone(),
            usage: UsageMetrics::new(150, 35, "stub-7b", 80),
        })
    }
}

struct OfflineLlm;

#[async_trait]
impl LanguageModel for OfflineLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<Completion, CoreError> {
        Err(CoreError::Llm("connection refused".to_string()))
    }
}

fn five_hit_corpus() -> Vec<(PassageRecord, f32)> {
    vec![
        (passage("p0", "doc-a", 0, "Corner lots have two frontages."), 0.9),
        (passage("p1", "doc-a", 1, "Each frontage needs a setback."), 0.7),
        (passage("p2", "doc-b", 0, "Fences may be 1.8m tall."), 0.5),
        (passage("p3", "doc-b", 1, "Sheds need no permit under 10m2."), 0.3),
        (passage("p4", "doc-c", 0, "Variance requests go to the board."), 0.1),
    ]
}

fn orchestrator(
    index: StubIndex,
    llm: Arc<dyn LanguageModel>,
    config: RetrievalConfig,
) -> ContextOrchestrator {
    ContextOrchestrator::builder()
        .embedder(Arc::new(StubEmbedder))
        .index(Arc::new(index))
        .language_model(llm)
        .config(config)
        .build()
        .expect("all collaborators present")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// Scenario A: expansion uses prior history; keyphrases land in the bundle.
#[tokio::test]
async fn expansion_with_history_produces_keyphrases() {
    let orch = orchestrator(
        StubIndex {
            corpus: five_hit_corpus(),
            fail_search: false,
        },
        Arc::new(StubLlm::working()),
        RetrievalConfig::default(),
    );

    let mut session = ChatSession::new("s1", "You answer from the zoning bylaws.");
    session.push(ChatMessage::user("What are the setback rules?"));
    session.push(ChatMessage::assistant("Setbacks are minimum distances..."));
    session.push(ChatMessage::user("And for fences?"));

    let (bundle, usage) = orch
        .build_context(&session, "What about corner lots?", &orch.default_params())
        .await;

    assert_eq!(bundle.original_query, "What about corner lots?");
    assert_eq!(bundle.expanded_query, "corner lot setback requirements");
    assert!(!bundle.keyphrases.is_empty());
    assert_eq!(bundle.diagnostics.get("query_expanded"), Some(&json!(true)));
    assert_eq!(usage.operations.len(), 1);
    assert_eq!(usage.operations[0].operation, "expansion");
    assert_eq!(usage.total_tokens, 185);
}

/// Expansion failure: expanded query falls back to the original.
#[tokio::test]
async fn expansion_failure_falls_back_to_original_query() {
    let orch = orchestrator(
        StubIndex {
            corpus: five_hit_corpus(),
            fail_search: false,
        },
        Arc::new(OfflineLlm),
        RetrievalConfig::default(),
    );

    let session = ChatSession::new("s1", "");
    let (bundle, usage) = orch
        .build_context(&session, "What about corner lots?", &orch.default_params())
        .await;

    assert_eq!(bundle.expanded_query, bundle.original_query);
    assert_eq!(bundle.diagnostics.get("query_expanded"), Some(&json!(false)));
    assert!(usage.is_empty());
    // Retrieval still happened.
    assert_eq!(bundle.results.len(), 5);
}

/// Scenario B: min_score 0.5 over scores [0.9, 0.7, 0.5, 0.3, 0.1] keeps 3.
#[tokio::test]
async fn score_filter_keeps_inclusive_threshold() {
    let orch = orchestrator(
        StubIndex {
            corpus: five_hit_corpus(),
            fail_search: false,
        },
        Arc::new(StubLlm::working()),
        RetrievalConfig {
            min_score: Some(0.5),
            ..Default::default()
        },
    );

    let session = ChatSession::new("s1", "");
    let (bundle, _) = orch
        .build_context(&session, "corner lots", &orch.default_params())
        .await;

    let scores: Vec<f32> = bundle.results.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![0.9, 0.7, 0.5]);
    assert_eq!(bundle.diagnostics.get("filtered_by_score"), Some(&json!(2)));
    assert_eq!(bundle.diagnostics.get("result_count"), Some(&json!(3)));
}

/// Scenario D: index transport error → empty results, SearchStep_error set,
/// diagnostics still ran.
#[tokio::test]
async fn search_transport_error_degrades_not_aborts() {
    let orch = orchestrator(
        StubIndex {
            corpus: Vec::new(),
            fail_search: true,
        },
        Arc::new(StubLlm::working()),
        RetrievalConfig::default(),
    );

    let session = ChatSession::new("s1", "");
    let (bundle, usage) = orch
        .build_context(&session, "anything", &orch.default_params())
        .await;

    assert!(bundle.results.is_empty());
    let error = bundle
        .diagnostics
        .get("SearchStep_error")
        .and_then(|v| v.as_str())
        .expect("search error recorded");
    assert!(error.contains("connection reset"));
    assert_eq!(bundle.diagnostics.get("result_count"), Some(&json!(0)));
    // Expansion ran before the failure, so its cost is still accounted.
    assert_eq!(usage.operations.len(), 1);
}

/// Window expansion pulls document neighbours and keeps hits ranked first.
#[tokio::test]
async fn window_expansion_merges_neighbours() {
    let corpus = vec![
        (passage("a0", "doc-a", 0, "before"), 0.2),
        (passage("a1", "doc-a", 1, "the hit"), 0.95),
        (passage("a2", "doc-a", 2, "after"), 0.2),
    ];
    let orch = orchestrator(
        StubIndex {
            corpus,
            fail_search: false,
        },
        Arc::new(OfflineLlm),
        RetrievalConfig::default(),
    );

    let session = ChatSession::new("s1", "");
    let params = RetrievalParams {
        top_k: 1,
        window: 1,
        ..orch.default_params()
    };
    let (bundle, _) = orch.build_context(&session, "hit", &params).await;

    let ids: Vec<&str> = bundle.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a0", "a2"]);
    assert_eq!(bundle.results[0].origin, docquery::ResultOrigin::Hit);
    assert_eq!(bundle.results[1].origin, docquery::ResultOrigin::Context);
    assert_eq!(bundle.results[1].score, 0.95);
}

/// Document allow-list restricts the search.
#[tokio::test]
async fn document_filter_restricts_results() {
    let orch = orchestrator(
        StubIndex {
            corpus: five_hit_corpus(),
            fail_search: false,
        },
        Arc::new(OfflineLlm),
        RetrievalConfig::default(),
    );

    let session = ChatSession::new("s1", "");
    let params = RetrievalParams {
        document_ids: Some(vec!["doc-b".to_string()]),
        ..orch.default_params()
    };
    let (bundle, _) = orch.build_context(&session, "fences", &params).await;

    assert_eq!(bundle.results.len(), 2);
    assert!(bundle.results.iter().all(|r| r.document_id == "doc-b"));
}

// ---------------------------------------------------------------------------
// Memory policy across turns
// ---------------------------------------------------------------------------

/// Scenario C boundary plus the bounded-length property, driven through the
/// session store the way a chat caller would.
#[tokio::test]
async fn compaction_fires_at_trigger_and_bounds_history() {
    let store = InMemorySessionStore::new();
    let policy = MemoryPolicy::new(
        Arc::new(StubLlm {
            reply: "They discussed fences, sheds, and setbacks.".to_string(),
        }),
        MemoryConfig {
            summary_trigger_messages: 14,
            retained_recent: 4,
            max_summary_tokens: 256,
        },
    );

    let mut session = ChatSession::with_generated_id("system prompt");
    let id = session.id.clone();

    // 13 messages: still unbounded.
    for i in 0..13 {
        session.push(ChatMessage::user(format!("turn {i}")));
        let outcome = policy.maybe_compact(&mut session).await;
        assert!(
            !outcome.compacted(),
            "no compaction below the trigger (at {} messages)",
            session.message_count()
        );
    }
    assert_eq!(session.message_count(), 13);

    // The 14th message reaches the trigger exactly.
    session.push(ChatMessage::user("turn 13"));
    let outcome = policy.maybe_compact(&mut session).await;
    match outcome {
        CompactionOutcome::Compacted { summarized, usage } => {
            assert_eq!(summarized, 10);
            assert_eq!(usage.operation, "summary");
        }
        other => panic!("expected compaction at the trigger, got {other:?}"),
    }
    assert_eq!(session.message_count(), 5);
    assert!(session.summary.is_some());

    store.put(session).await.unwrap();
    let reloaded = store.get(&id).await.unwrap().unwrap();
    assert_eq!(reloaded.message_count(), 5);
    assert_eq!(reloaded.messages[0].role, docquery::ChatRole::System);
}

/// A full turn: retrieval, append, compaction decision — the caller-facing
/// control flow from the crate docs.
#[tokio::test]
async fn full_turn_control_flow() {
    let orch = orchestrator(
        StubIndex {
            corpus: five_hit_corpus(),
            fail_search: false,
        },
        Arc::new(StubLlm::working()),
        RetrievalConfig {
            min_score: Some(0.4),
            ..Default::default()
        },
    );
    let policy = MemoryPolicy::new(Arc::new(StubLlm::working()), MemoryConfig::default());
    let store = InMemorySessionStore::new();

    let mut session = ChatSession::with_generated_id("You answer from the bylaws.");
    let user_message = "What about corner lots?";

    let (bundle, usage) = orch
        .build_context(&session, user_message, &orch.default_params())
        .await;
    assert!(!bundle.is_empty());
    assert!(usage.total_tokens > 0);
    assert!(!bundle.context_text().is_empty());

    session.push(ChatMessage::user(user_message));
    session.push(ChatMessage::assistant("Corner lots need two setbacks."));
    let outcome = policy.maybe_compact(&mut session).await;
    assert!(matches!(outcome, CompactionOutcome::Skipped { .. }));

    store.put(session).await.unwrap();
    assert_eq!(store.len().await, 1);
}
