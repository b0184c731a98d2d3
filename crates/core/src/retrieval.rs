//! Hybrid retrieval: `getMemoryContext` produces a single formatted string
//! safe to inject into a downstream prompt (spec §4.4).

use std::sync::Arc;

use crate::belief::{effective_confidence, store, BeliefStatus};
use crate::error::Result;
use crate::provider::EmbeddingClient;
use crate::storage::Storage;

/// Semantic-search cutoff used by retrieval (spec §4.4 step 1).
const SEMANTIC_CUTOFF: f64 = 0.2;

/// Cap on the number of beliefs surfaced in a single context string.
const MAX_BELIEFS: usize = 10;

/// Cap on the number of episodes surfaced in a single context string.
const MAX_EPISODES: usize = 10;

const NO_BELIEFS: &str = "No relevant beliefs";
const NO_OBSERVATIONS: &str = "No relevant observations";

/// Build the `## Relevant beliefs` / `## Recent observations` context
/// string for `query`. Embeds the query when `embedder` is supplied and
/// succeeds, then semantic-searches both beliefs and episodes against it
/// (cutoff [`SEMANTIC_CUTOFF`]); otherwise (or on embedding failure) falls
/// back to FTS for beliefs and timestamp-recency for episodes. Records
/// access on every belief surfaced.
pub async fn get_memory_context(
    storage: &Storage,
    embedder: Option<&Arc<dyn EmbeddingClient>>,
    query: &str,
) -> Result<String> {
    let now = storage.clock().now();

    let query_vector = match embedder {
        Some(client) => client.embed(query).await.ok(),
        None => None,
    };

    let candidate_ids: Vec<String> = if let Some(vector) = &query_vector {
        store::semantic_search(storage, vector, MAX_BELIEFS * 2, SEMANTIC_CUTOFF)?
            .into_iter()
            .map(|m| m.belief_id)
            .collect()
    } else {
        store::fts_search(storage, query, MAX_BELIEFS * 2)?
            .into_iter()
            .map(|m| m.belief_id)
            .collect()
    };

    // Re-rank by effective confidence (not raw), then recency, capping at MAX_BELIEFS.
    let mut with_meta = Vec::with_capacity(candidate_ids.len());
    for id in candidate_ids {
        let belief = store::get_belief(storage, &id)?;
        if belief.status != BeliefStatus::Active {
            continue;
        }
        let eff = effective_confidence(belief.confidence, belief.stability, belief.updated_at, now);
        with_meta.push((belief.id, belief.statement, belief.belief_type.to_string(), eff, belief.updated_at, belief.subject));
    }
    with_meta.sort_by(|a, b| {
        b.3.partial_cmp(&a.3)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.4.cmp(&a.4))
    });
    with_meta.truncate(MAX_BELIEFS);

    let mut belief_lines = Vec::with_capacity(with_meta.len());
    for (id, statement, type_label, eff, _, subject) in &with_meta {
        belief_lines.push(format!("[{type_label}|{eff:.2}|about:{subject}] {statement}"));
        store::record_access(storage, id)?;
    }

    let episodes = match &query_vector {
        Some(vector) => store::episode_semantic_search(storage, vector, MAX_EPISODES, SEMANTIC_CUTOFF)?,
        None => store::recent_episodes(storage, MAX_EPISODES)?,
    };
    let episode_lines: Vec<String> = episodes
        .iter()
        .map(|e| format!("[{}] {}", e.timestamp.format("%Y-%m-%d"), e.action))
        .collect();

    let beliefs_section = if belief_lines.is_empty() {
        NO_BELIEFS.to_string()
    } else {
        belief_lines.join("\n")
    };
    let observations_section = if episode_lines.is_empty() {
        NO_OBSERVATIONS.to_string()
    } else {
        episode_lines.join("\n")
    };

    Ok(format!(
        "## Relevant beliefs\n{beliefs_section}\n## Recent observations\n{observations_section}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::BeliefType;
    use crate::storage::{Storage, BELIEF_PLUGIN};

    fn open() -> Storage {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .migrate(BELIEF_PLUGIN, crate::storage::migrations::BELIEF_MIGRATIONS)
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn empty_store_yields_stable_empty_strings() {
        let storage = open();
        let context = get_memory_context(&storage, None, "anything").await.unwrap();
        assert!(context.contains(NO_BELIEFS));
        assert!(context.contains(NO_OBSERVATIONS));
    }

    #[tokio::test]
    async fn fts_fallback_surfaces_matching_belief() {
        let storage = open();
        store::create_belief(&storage, "User prefers TypeScript", 0.8, BeliefType::Preference, 5, "owner").unwrap();
        let context = get_memory_context(&storage, None, "TypeScript").await.unwrap();
        assert!(context.contains("User prefers TypeScript"));
    }

    struct FixedEmbedder(Vec<f32>);

    #[async_trait::async_trait]
    impl EmbeddingClient for FixedEmbedder {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, crate::provider::ProviderError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn episodes_are_ranked_by_embedding_similarity_not_recency() {
        let storage = open();
        let query_vector = vec![1.0_f32, 0.0];

        let stale = store::create_episode(&storage, "observed long ago but on-topic", None).unwrap();
        store::set_episode_embedding(&storage, &stale.id, &query_vector).unwrap();

        let recent_off_topic = store::create_episode(&storage, "observed just now but unrelated", None).unwrap();
        store::set_episode_embedding(&storage, &recent_off_topic.id, &[0.0, 1.0]).unwrap();

        let embedder: Arc<dyn EmbeddingClient> = Arc::new(FixedEmbedder(query_vector));
        let context = get_memory_context(&storage, Some(&embedder), "on-topic query").await.unwrap();

        assert!(context.contains("observed long ago but on-topic"));
        assert!(!context.contains("observed just now but unrelated"));
    }
}
