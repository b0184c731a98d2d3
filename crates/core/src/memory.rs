//! The `Memory` and `Knowledge` facades: the external interface named in
//! spec §6, wiring storage, providers, and the lower-level modules
//! together. Callers pass in `Storage` and provider clients explicitly —
//! there is no global state (spec §9).

use std::path::Path;
use std::sync::Arc;

use crate::belief::{store, Belief, BeliefChange, BeliefStatus};
use crate::error::Result;
use crate::export::{self, ExportEnvelope, ImportOutcome};
use crate::jobs::{self, BackgroundJob, JobStatus};
use crate::knowledge::{self, KnowledgeMatch, KnowledgeSource, LearnOutcome};
use crate::provider::{ChatClient, EmbeddingClient};
use crate::reflection::{self, MergeOutcome, ReflectionReport, SynthesisOutcome};
use crate::remember::{self, RememberOutcome};
use crate::retrieval;
use crate::storage::migrations::{BELIEF_MIGRATIONS, JOBS_MIGRATIONS, KNOWLEDGE_MIGRATIONS};
use crate::storage::migrations::{BELIEF_PLUGIN, JOBS_PLUGIN, KNOWLEDGE_PLUGIN};
use crate::storage::Storage;

/// The belief lifecycle and retrieval engine: `remember`, `recall`,
/// `beliefs`, `forget`, `prune`, `reflect`, `synthesize`, `stats`,
/// `export`/`import`, `history`, `context` (spec §6).
pub struct Memory {
    storage: Storage,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    chat: Option<Arc<dyn ChatClient>>,
}

impl Memory {
    /// Open (creating if absent) a memory store at `data_dir`, applying all
    /// pending belief-store and jobs migrations.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let storage = Storage::open(data_dir)?;
        storage.migrate(BELIEF_PLUGIN, BELIEF_MIGRATIONS)?;
        storage.migrate(JOBS_PLUGIN, JOBS_MIGRATIONS)?;
        Ok(Self { storage, embedder: None, chat: None })
    }

    /// Open an in-memory store. Useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let storage = Storage::open_in_memory()?;
        storage.migrate(BELIEF_PLUGIN, BELIEF_MIGRATIONS)?;
        storage.migrate(JOBS_PLUGIN, JOBS_MIGRATIONS)?;
        Ok(Self { storage, embedder: None, chat: None })
    }

    /// Wrap an already-open, already-migrated `Storage` (for callers sharing
    /// one database across `Memory` and `Knowledge`).
    pub fn from_storage(storage: Storage) -> Self {
        Self { storage, embedder: None, chat: None }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingClient>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatClient>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Run the full remember pipeline over a raw observation. Requires both
    /// an embedder and a chat client to have been configured.
    pub async fn remember(&self, text: &str) -> Result<RememberOutcome> {
        let embedder = self.embedder.clone().ok_or_else(|| {
            crate::error::Error::InvalidArgument("remember requires an embedding client".into())
        })?;
        let chat = self.chat.clone().ok_or_else(|| {
            crate::error::Error::InvalidArgument("remember requires a chat client".into())
        })?;
        remember::remember(&self.storage, &embedder, &chat, text).await
    }

    /// Build the formatted memory-context string for `query`.
    pub async fn recall(&self, query: &str) -> Result<String> {
        retrieval::get_memory_context(&self.storage, self.embedder.as_ref(), query).await
    }

    /// Alias for [`Memory::recall`], matching the spec's `context(query)` name.
    pub async fn context(&self, query: &str) -> Result<String> {
        self.recall(query).await
    }

    /// List beliefs, optionally filtered by status.
    pub fn beliefs(&self, status_filter: Option<BeliefStatus>) -> Result<Vec<Belief>> {
        store::list_beliefs(&self.storage, status_filter)
    }

    /// Forget a belief by id or unambiguous prefix.
    pub fn forget(&self, id_or_prefix: &str) -> Result<Belief> {
        store::forget_belief(&self.storage, id_or_prefix)
    }

    /// Prune active beliefs whose effective confidence is below `threshold`.
    pub fn prune(&self, threshold: f64) -> Result<Vec<String>> {
        store::prune_beliefs(&self.storage, threshold)
    }

    /// Scan for duplicate clusters and stale beliefs.
    pub fn reflect(&self, similarity_threshold: Option<f64>) -> Result<ReflectionReport> {
        reflection::reflect(&self.storage, similarity_threshold)
    }

    /// Merge duplicate clusters from a prior [`Memory::reflect`] call.
    pub fn merge_duplicates(&self, clusters: &[reflection::DuplicateCluster]) -> Result<MergeOutcome> {
        reflection::merge_duplicates(&self.storage, clusters)
    }

    /// Synthesize meta-beliefs from duplicate clusters. Requires a chat
    /// client to have been configured.
    pub async fn synthesize(&self, clusters: &[reflection::DuplicateCluster]) -> Result<SynthesisOutcome> {
        let chat = self.chat.clone().ok_or_else(|| {
            crate::error::Error::InvalidArgument("synthesize requires a chat client".into())
        })?;
        reflection::synthesize(&self.storage, &chat, clusters).await
    }

    /// Aggregate belief statistics.
    pub fn stats(&self) -> Result<store::BeliefStats> {
        store::stats(&self.storage)
    }

    /// Export every belief, episode, change, and link as a portable snapshot.
    pub fn export(&self) -> Result<ExportEnvelope> {
        export::export(&self.storage)
    }

    /// Import a previously exported snapshot. Idempotent by id.
    pub fn import(&self, envelope: &ExportEnvelope) -> Result<ImportOutcome> {
        export::import(&self.storage, envelope)
    }

    /// The reverse-chronological change history for a belief.
    pub fn history(&self, belief_id_or_prefix: &str) -> Result<Vec<BeliefChange>> {
        store::history(&self.storage, belief_id_or_prefix)
    }

    // -- Background jobs (spec §4.7) --

    pub fn upsert_job(&self, id: &str, job_type: &str, label: &str, status: JobStatus, progress: f64) -> Result<BackgroundJob> {
        jobs::upsert_job(&self.storage, id, job_type, label, status, progress)
    }

    pub fn get_job(&self, id: &str) -> Result<BackgroundJob> {
        jobs::get_job(&self.storage, id)
    }

    pub fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<BackgroundJob>> {
        jobs::list_jobs(&self.storage, status)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_job_status(
        &self,
        id: &str,
        status: JobStatus,
        progress: Option<f64>,
        error: Option<&str>,
        result: Option<&str>,
        result_type: Option<&str>,
        structured_result: Option<&str>,
    ) -> Result<BackgroundJob> {
        jobs::update_job_status(&self.storage, id, status, progress, error, result, result_type, structured_result)
    }

    pub fn clear_completed_jobs(&self, older_than_ms: Option<i64>) -> Result<usize> {
        jobs::clear_completed_background_jobs(&self.storage, older_than_ms)
    }
}

/// The knowledge chunk store: `learn`, `search`, `sources`, `sourceChunks`,
/// `forgetSource`, `reindexSource`, `reindexAll` (spec §6).
pub struct Knowledge {
    storage: Storage,
    embedder: Option<Arc<dyn EmbeddingClient>>,
}

impl Knowledge {
    /// Open (creating if absent) a knowledge store at `data_dir`, applying
    /// all pending knowledge-store migrations.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let storage = Storage::open(data_dir)?;
        storage.migrate(KNOWLEDGE_PLUGIN, KNOWLEDGE_MIGRATIONS)?;
        Ok(Self { storage, embedder: None })
    }

    /// Open an in-memory store. Useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let storage = Storage::open_in_memory()?;
        storage.migrate(KNOWLEDGE_PLUGIN, KNOWLEDGE_MIGRATIONS)?;
        Ok(Self { storage, embedder: None })
    }

    /// Wrap an already-open, already-migrated `Storage`.
    pub fn from_storage(storage: Storage) -> Self {
        Self { storage, embedder: None }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingClient>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn learn(&self, url: &str, title: &str, markdown: &str, force: bool, tags: &[String]) -> Result<LearnOutcome> {
        knowledge::store::learn_from_content(
            &self.storage,
            self.embedder.as_deref(),
            url,
            title,
            markdown,
            force,
            tags,
        )
        .await
    }

    pub async fn search(&self, query: &str, limit: usize, query_embedding: Option<Vec<f32>>) -> Result<Vec<KnowledgeMatch>> {
        knowledge::store::knowledge_search(&self.storage, self.embedder.as_deref(), query, limit, query_embedding).await
    }

    pub fn sources(&self) -> Result<Vec<KnowledgeSource>> {
        knowledge::store::sources(&self.storage)
    }

    pub fn source_chunks(&self, id: &str) -> Result<Vec<knowledge::KnowledgeChunk>> {
        knowledge::store::source_chunks(&self.storage, id)
    }

    pub fn forget_source(&self, id: &str) -> Result<()> {
        knowledge::store::forget_source(&self.storage, id)
    }

    pub async fn reindex_source(&self, id: &str) -> Result<()> {
        knowledge::store::reindex_source(&self.storage, self.embedder.as_deref(), id).await
    }

    pub async fn reindex_all(&self) -> Result<usize> {
        knowledge::store::reindex_all(&self.storage, self.embedder.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::BeliefType;

    #[tokio::test]
    async fn recall_degrades_to_fts_without_an_embedder() {
        let memory = Memory::open_in_memory().unwrap();
        store::create_belief(memory.storage(), "User prefers TypeScript", 0.8, BeliefType::Preference, 5, "owner").unwrap();
        let context = memory.recall("TypeScript").await.unwrap();
        assert!(context.contains("User prefers TypeScript"));
    }

    #[test]
    fn forget_and_prune_round_trip() {
        let memory = Memory::open_in_memory().unwrap();
        let belief = store::create_belief(memory.storage(), "stmt", 0.8, BeliefType::Insight, 5, "owner").unwrap();
        let forgotten = memory.forget(&belief.id).unwrap();
        assert_eq!(forgotten.status, BeliefStatus::Forgotten);
    }
}
