//! Test harness shared by the scenario suites: isolated temp-dir databases,
//! a deterministic clock, and scripted embedding/chat providers so the
//! remember pipeline's dedup/contradiction decisions are reproducible
//! without a real model in the loop.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recall_core::clock::FixedClock;
use recall_core::provider::{ChatClient, ChatMessage, ChatOptions, ChatResponse, EmbeddingClient, ProviderError};
use recall_core::storage::migrations::{BELIEF_MIGRATIONS, JOBS_MIGRATIONS, KNOWLEDGE_MIGRATIONS};
use recall_core::storage::migrations::{BELIEF_PLUGIN, JOBS_PLUGIN, KNOWLEDGE_PLUGIN};
use recall_core::storage::Storage;
use recall_core::{Knowledge, Memory};
use tempfile::TempDir;

/// An isolated, temp-dir-backed `Memory` + `Knowledge` pair sharing one
/// database, with a [`FixedClock`] the test can advance to simulate decay
/// without sleeping. Cleans itself up when dropped.
pub struct TestDatabaseManager {
    pub clock: Arc<FixedClock>,
    _temp_dir: TempDir,
}

impl TestDatabaseManager {
    /// Create a fresh temp-dir database, migrated and clocked, starting at
    /// a fixed instant.
    pub fn new_temp() -> (Self, Storage) {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let clock = Arc::new(FixedClock::new(fixed_epoch()));

        let storage = Storage::open(temp_dir.path())
            .expect("failed to open test storage")
            .with_clock(clock.clone());
        storage.migrate(BELIEF_PLUGIN, BELIEF_MIGRATIONS).expect("belief migration failed");
        storage.migrate(KNOWLEDGE_PLUGIN, KNOWLEDGE_MIGRATIONS).expect("knowledge migration failed");
        storage.migrate(JOBS_PLUGIN, JOBS_MIGRATIONS).expect("jobs migration failed");

        (Self { clock, _temp_dir: temp_dir }, storage)
    }
}

/// An arbitrary but fixed instant tests anchor their scenarios to.
fn fixed_epoch() -> DateTime<Utc> {
    "2026-01-01T00:00:00Z".parse().expect("valid fixed timestamp")
}

/// Build a `Memory` over a freshly migrated test database.
pub fn test_memory() -> (TestDatabaseManager, Memory) {
    let (manager, storage) = TestDatabaseManager::new_temp();
    let memory = Memory::from_storage(storage);
    (manager, memory)
}

/// Build a `Knowledge` store over a freshly migrated test database.
pub fn test_knowledge() -> (TestDatabaseManager, Knowledge) {
    let (manager, storage) = TestDatabaseManager::new_temp();
    let knowledge = Knowledge::from_storage(storage);
    (manager, knowledge)
}

/// An embedder whose vectors are fully controlled by the test: exact text
/// matches return the registered vector; anything else gets a deterministic
/// pseudo-random vector derived from its bytes, so unscripted text never
/// collides with a scripted one.
#[derive(Default)]
pub struct ScriptedEmbedder {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the exact vector `embed` should return for `text`.
    pub fn register(&self, text: impl Into<String>, vector: Vec<f32>) {
        self.vectors.lock().unwrap().insert(text.into(), vector);
    }

    fn fallback_vector(text: &str) -> Vec<f32> {
        let mut state: u64 = 1469598103934665603;
        for byte in text.bytes() {
            state ^= byte as u64;
            state = state.wrapping_mul(1099511628211);
        }
        (0..8)
            .map(|i| {
                let shifted = state.rotate_left(i * 8);
                (shifted % 1000) as f32 / 1000.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingClient for ScriptedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if let Some(vector) = self.vectors.lock().unwrap().get(text) {
            return Ok(vector.clone());
        }
        Ok(Self::fallback_vector(text))
    }
}

/// An embedder that always fails, for testing graceful degradation.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingClient for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError("embedding provider unavailable".into()))
    }
}

/// A chat client that returns a pre-loaded, ordered sequence of raw
/// responses — one per call, regardless of prompt content. Exhausting the
/// queue is a test bug, so it panics rather than silently degrading.
#[derive(Default)]
pub struct ScriptedChat {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next raw response this client should return.
    pub fn push(&self, response: impl Into<String>) -> &Self {
        self.responses.lock().unwrap().push_back(response.into());
        self
    }

    /// Build a scripted extraction response for a single-fact observation.
    pub fn extraction_json(fact: &str, fact_type: &str, importance: i32, subject: &str) -> String {
        serde_json::json!({
            "fact": fact,
            "factType": fact_type,
            "importance": importance,
            "insight": null,
            "subject": subject,
        })
        .to_string()
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn chat(&self, _messages: &[ChatMessage], _options: ChatOptions) -> Result<ChatResponse, ProviderError> {
        let mut queue = self.responses.lock().unwrap();
        let text = queue
            .pop_front()
            .expect("ScriptedChat queue exhausted: test scripted fewer responses than the pipeline needed");
        Ok(ChatResponse { text, usage: None })
    }
}
