//! Reflection & synthesis: duplicate clustering, staleness detection,
//! merge, and LLM-driven meta-belief generation (spec §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use crate::belief::{effective_confidence, store, BeliefType, ChangeType};
use crate::error::Result;
use crate::provider::{ChatClient, ChatMessage, ChatOptions};
use crate::storage::Storage;
use crate::vector::{cosine_similarity, from_blob};

/// Pairwise cosine similarity above this groups two beliefs into one
/// duplicate cluster.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.90;

/// Effective confidence below this marks a belief stale.
pub const STALE_THRESHOLD: f64 = 0.1;

/// A cluster of beliefs judged near-duplicates of one another.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DuplicateCluster {
    pub ids: Vec<String>,
    pub statements: Vec<String>,
}

/// A belief whose effective confidence has decayed below [`STALE_THRESHOLD`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct StaleBelief {
    pub id: String,
    pub statement: String,
    pub effective_confidence: f64,
}

/// The result of a reflection pass.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReflectionReport {
    pub total: usize,
    pub duplicates: Vec<DuplicateCluster>,
    pub stale: Vec<StaleBelief>,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// Scan all `active` beliefs with an embedding, cluster near-duplicates by
/// pairwise cosine similarity, and flag beliefs whose effective confidence
/// has decayed below [`STALE_THRESHOLD`].
pub fn reflect(storage: &Storage, similarity_threshold: Option<f64>) -> Result<ReflectionReport> {
    let threshold = similarity_threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
    let now = storage.clock().now();

    let beliefs = store::list_beliefs(storage, Some(crate::belief::BeliefStatus::Active))?;

    let embedded: Vec<(usize, Vec<f32>)> = storage.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT belief_id, embedding FROM belief_embeddings WHERE belief_id = ?1")?;
        let mut out = Vec::new();
        for (idx, belief) in beliefs.iter().enumerate() {
            if let Some(blob) = stmt
                .query_row([&belief.id], |row| row.get::<_, Vec<u8>>(0))
                .optional()?
            {
                if let Some(vector) = from_blob(&blob) {
                    out.push((idx, vector));
                }
            }
        }
        Ok(out)
    })?;

    let mut uf = UnionFind::new(embedded.len());
    for i in 0..embedded.len() {
        for j in (i + 1)..embedded.len() {
            if cosine_similarity(&embedded[i].1, &embedded[j].1) > threshold {
                uf.union(i, j);
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..embedded.len() {
        let root = uf.find(i);
        groups.entry(root).or_default().push(i);
    }

    let duplicates: Vec<DuplicateCluster> = groups
        .into_values()
        .filter(|members| members.len() > 1)
        .map(|members| {
            let ids = members.iter().map(|&m| beliefs[embedded[m].0].id.clone()).collect();
            let statements = members.iter().map(|&m| beliefs[embedded[m].0].statement.clone()).collect();
            DuplicateCluster { ids, statements }
        })
        .collect();

    let stale: Vec<StaleBelief> = beliefs
        .iter()
        .filter_map(|b| {
            let eff = effective_confidence(b.confidence, b.stability, b.updated_at, now);
            (eff < STALE_THRESHOLD).then(|| StaleBelief { id: b.id.clone(), statement: b.statement.clone(), effective_confidence: eff })
        })
        .collect();

    Ok(ReflectionReport { total: beliefs.len(), duplicates, stale })
}

use rusqlite::OptionalExtension;

/// Outcome of a merge pass.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MergeOutcome {
    pub kept: Vec<String>,
    pub merged: usize,
}

/// For each cluster, keep the belief with the highest raw confidence,
/// invalidate the rest (change type `merged`), and re-point their
/// supersession to the kept id (spec §4.5 `mergeDuplicates`).
pub fn merge_duplicates(storage: &Storage, clusters: &[DuplicateCluster]) -> Result<MergeOutcome> {
    let mut kept = Vec::new();
    let mut merged = 0;

    for cluster in clusters {
        let mut members = Vec::with_capacity(cluster.ids.len());
        for id in &cluster.ids {
            members.push(store::get_belief(storage, id)?);
        }
        members.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        let Some((winner, losers)) = members.split_first() else { continue };

        for loser in losers {
            store::record_change(
                storage,
                &loser.id,
                ChangeType::Merged,
                Some(&format!("merged into {}", winner.id)),
                None,
            )?;
            storage.run(
                "UPDATE beliefs SET status = 'invalidated', superseded_by = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![winner.id, storage.clock().now().to_rfc3339(), loser.id],
            )?;
            merged += 1;
        }
        kept.push(winner.id.clone());
    }

    Ok(MergeOutcome { kept, merged })
}

/// The result of a synthesis pass.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SynthesisOutcome {
    pub clusters_processed: usize,
    pub meta_beliefs: Vec<String>,
}

const SYNTHESIS_SYSTEM_PROMPT: &str = "Given a list of related statements about the same subject, \
write one sentence summarizing the underlying theme they share. Respond with only that sentence.";

/// For each cluster of at least two statements, ask the LLM for one
/// meta-belief sentence, create it (`type=meta`, `confidence=0.7`,
/// `importance=7`), and link it to its sources with supersession-free
/// `synthesized` edges (spec §4.5 `synthesize`).
pub async fn synthesize(
    storage: &Storage,
    chat: &Arc<dyn ChatClient>,
    clusters: &[DuplicateCluster],
) -> Result<SynthesisOutcome> {
    let mut meta_beliefs = Vec::new();
    let mut processed = 0;

    for cluster in clusters.iter().filter(|c| c.statements.len() >= 2) {
        let joined = cluster.statements.join("\n- ");
        let messages = [
            ChatMessage::system(SYNTHESIS_SYSTEM_PROMPT),
            ChatMessage::user(format!("- {joined}")),
        ];
        let response = match chat.chat(&messages, ChatOptions::default()).await {
            Ok(r) => r,
            Err(e) => {
                storage.logger().warn("synthesis chat call failed, skipping cluster", Some(serde_json::json!({ "error": e.0 })));
                continue;
            }
        };
        let statement = response.text.trim().to_string();
        if statement.is_empty() {
            continue;
        }

        let meta = store::create_belief(storage, &statement, 0.7, BeliefType::Meta, 7, "owner")?;
        store::record_change(storage, &meta.id, ChangeType::Synthesized, None, None)?;
        for source_id in &cluster.ids {
            store::link_beliefs(storage, &meta.id, source_id)?;
        }

        meta_beliefs.push(statement);
        processed += 1;
    }

    Ok(SynthesisOutcome { clusters_processed: processed, meta_beliefs })
}
