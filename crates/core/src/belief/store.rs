//! Belief CRUD, FTS/semantic search, decay-aware pruning, and the audit
//! log. Free functions over `&Storage`, mirroring the teacher's
//! `impl Storage { pub fn ingest(...) }` style but kept in a separate module
//! since `Storage`'s fields are private to `storage::db`.

use rusqlite::{params, OptionalExtension};

use crate::error::{Error, Result};
use crate::ids::new_id;
use crate::storage::Storage;
use crate::vector::{cosine_similarity, from_blob, to_blob};

use super::decay::effective_confidence;
use super::model::{
    Belief, BeliefChange, BeliefLink, BeliefStatus, BeliefType, ChangeType, Episode, FtsMatch,
    SemanticMatch,
};
use super::fts::sanitize_fts5_query;

/// Default confidence assigned when the pipeline doesn't specify one.
pub const DEFAULT_CONFIDENCE: f64 = 0.6;

fn row_to_belief(row: &rusqlite::Row<'_>) -> rusqlite::Result<Belief> {
    let type_str: String = row.get("type")?;
    let status_str: String = row.get("status")?;
    Ok(Belief {
        id: row.get("id")?,
        statement: row.get("statement")?,
        belief_type: type_str.parse().unwrap_or(BeliefType::Insight),
        confidence: row.get("confidence")?,
        status: status_str.parse().unwrap_or(BeliefStatus::Active),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        importance: row.get("importance")?,
        stability: row.get("stability")?,
        subject: row.get("subject")?,
        supersedes: row.get("supersedes")?,
        superseded_by: row.get("superseded_by")?,
        last_accessed: row.get("last_accessed")?,
        access_count: row.get("access_count")?,
    })
}

const BELIEF_COLUMNS: &str = "id, statement, type, confidence, status, created_at, updated_at, \
    importance, stability, subject, supersedes, superseded_by, last_accessed, access_count";

/// Clamp a caller-supplied importance (accepted as `f64` per spec §9) into
/// `[1,10]` and round half-away-from-zero to the nearest integer.
pub fn clamp_importance(importance: f64) -> i32 {
    importance.round().clamp(1.0, 10.0) as i32
}

/// Create a new, `active` belief.
pub fn create_belief(
    storage: &Storage,
    statement: &str,
    confidence: f64,
    belief_type: BeliefType,
    importance: i32,
    subject: &str,
) -> Result<Belief> {
    let now = storage.clock().now();
    let id = new_id();
    let confidence = confidence.clamp(0.0, 1.0);
    let importance = importance.clamp(1, 10);
    let subject = subject.to_lowercase();

    storage.with_conn(|conn| {
        conn.execute(
            &format!(
                "INSERT INTO beliefs ({BELIEF_COLUMNS}) VALUES \
                (?1, ?2, ?3, ?4, 'active', ?5, ?5, ?6, 1.0, ?7, NULL, NULL, ?5, 0)"
            ),
            params![id, statement, belief_type.to_string(), confidence, now.to_rfc3339(), importance, subject],
        )
    })?;

    get_belief(storage, &id)
}

/// Fetch a belief by its exact id.
pub fn get_belief(storage: &Storage, id: &str) -> Result<Belief> {
    storage.with_conn(|conn| {
        conn.query_row(
            &format!("SELECT {BELIEF_COLUMNS} FROM beliefs WHERE id = ?1"),
            [id],
            row_to_belief,
        )
    })
    .map_err(|e| match e {
        Error::StorageFailure(rusqlite::Error::QueryReturnedNoRows) => {
            Error::NotFound(format!("belief {id}"))
        }
        other => other,
    })
}

/// List beliefs, optionally filtered by status, newest first.
pub fn list_beliefs(storage: &Storage, status: Option<BeliefStatus>) -> Result<Vec<Belief>> {
    storage.with_conn(|conn| {
        let sql = match status {
            Some(_) => format!(
                "SELECT {BELIEF_COLUMNS} FROM beliefs WHERE status = ?1 ORDER BY created_at DESC"
            ),
            None => format!("SELECT {BELIEF_COLUMNS} FROM beliefs ORDER BY created_at DESC"),
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = match status {
            Some(s) => stmt.query_map([s.to_string()], row_to_belief)?.collect(),
            None => stmt.query_map([], row_to_belief)?.collect(),
        };
        rows
    })
}

fn append_change(
    storage: &Storage,
    belief_id: &str,
    change_type: ChangeType,
    detail: Option<&str>,
    episode_id: Option<&str>,
) -> Result<BeliefChange> {
    let id = new_id();
    let now = storage.clock().now();
    storage.run(
        "INSERT INTO belief_changes (id, belief_id, change_type, detail, episode_id, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, belief_id, change_type.to_string(), detail, episode_id, now.to_rfc3339()],
    )?;
    Ok(BeliefChange {
        id,
        belief_id: belief_id.to_string(),
        change_type,
        detail: detail.map(String::from),
        episode_id: episode_id.map(String::from),
        created_at: now,
    })
}

/// The append-only, reverse-chronological change history for a belief.
pub fn history(storage: &Storage, belief_id_or_prefix: &str) -> Result<Vec<BeliefChange>> {
    let belief_id = storage.resolve_id_prefix("beliefs", belief_id_or_prefix, None)?;
    storage.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, belief_id, change_type, detail, episode_id, created_at \
             FROM belief_changes WHERE belief_id = ?1 ORDER BY created_at DESC",
        )?;
        stmt.query_map([&belief_id], |row| {
            let change_type: String = row.get("change_type")?;
            Ok(BeliefChange {
                id: row.get("id")?,
                belief_id: row.get("belief_id")?,
                change_type: match change_type.as_str() {
                    "created" => ChangeType::Created,
                    "reinforced" => ChangeType::Reinforced,
                    "weakened" => ChangeType::Weakened,
                    "contradicted" => ChangeType::Contradicted,
                    "forgotten" => ChangeType::Forgotten,
                    "pruned" => ChangeType::Pruned,
                    "merged" => ChangeType::Merged,
                    "superseded" => ChangeType::Superseded,
                    _ => ChangeType::Synthesized,
                },
                detail: row.get("detail")?,
                episode_id: row.get("episode_id")?,
                created_at: row.get("created_at")?,
            })
        })?
        .collect()
    })
}

/// `confidence = min(1.0, confidence + delta)`; `updated_at = now`;
/// `stability = min(5.0, stability + 0.1)` (spec §4.2, §9 open question #2:
/// the stability bump is only ever applied here).
pub fn reinforce_belief(storage: &Storage, id: &str, delta: f64) -> Result<Belief> {
    let belief = get_belief(storage, id)?;
    if belief.status != BeliefStatus::Active {
        return Err(Error::InvalidArgument(format!(
            "cannot reinforce belief {id}: status is {}",
            belief.status
        )));
    }

    let now = storage.clock().now();
    let confidence = (belief.confidence + delta).min(1.0);
    let stability = (belief.stability + 0.1).min(5.0);

    storage.run(
        "UPDATE beliefs SET confidence = ?1, stability = ?2, updated_at = ?3 WHERE id = ?4",
        params![confidence, stability, now.to_rfc3339(), id],
    )?;

    get_belief(storage, id)
}

/// Resolve `id_or_prefix` among `active` beliefs and set `status =
/// 'forgotten'`, appending a `forgotten` change.
pub fn forget_belief(storage: &Storage, id_or_prefix: &str) -> Result<Belief> {
    let id = storage.resolve_id_prefix("beliefs", id_or_prefix, Some("status = 'active'"))?;
    let now = storage.clock().now();
    storage.run(
        "UPDATE beliefs SET status = 'forgotten', updated_at = ?1 WHERE id = ?2",
        params![now.to_rfc3339(), id],
    )?;
    append_change(storage, &id, ChangeType::Forgotten, None, None)?;
    get_belief(storage, &id)
}

/// Set `status='pruned'` on every `active` belief whose effective
/// confidence is below `threshold`, recording a `pruned` change for each.
/// Returns the pruned ids.
pub fn prune_beliefs(storage: &Storage, threshold: f64) -> Result<Vec<String>> {
    let now = storage.clock().now();
    let active = list_beliefs(storage, Some(BeliefStatus::Active))?;

    let mut pruned = Vec::new();
    for belief in active {
        let eff = effective_confidence(belief.confidence, belief.stability, belief.updated_at, now);
        if eff < threshold {
            storage.run(
                "UPDATE beliefs SET status = 'pruned', updated_at = ?1 WHERE id = ?2",
                params![now.to_rfc3339(), belief.id],
            )?;
            append_change(
                storage,
                &belief.id,
                ChangeType::Pruned,
                Some(&format!("effective confidence {eff:.3} < threshold {threshold:.3}")),
                None,
            )?;
            pruned.push(belief.id);
        }
    }
    Ok(pruned)
}

/// Full-text search over `statement`, newest-ranked matches first. Empty or
/// all-stopword queries return an empty list without touching the database
/// (an empty `MATCH` string is a syntax error in FTS5).
pub fn fts_search(storage: &Storage, query: &str, limit: usize) -> Result<Vec<FtsMatch>> {
    let sanitized = sanitize_fts5_query(query);
    if sanitized.is_empty() {
        return Ok(Vec::new());
    }

    storage.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT b.id, b.statement, b.confidence \
             FROM beliefs_fts f \
             JOIN beliefs b ON b.id = f.id \
             WHERE beliefs_fts MATCH ?1 AND b.status = 'active' \
             ORDER BY rank LIMIT ?2",
        )?;
        stmt.query_map(params![sanitized, limit as i64], |row| {
            Ok(FtsMatch {
                belief_id: row.get(0)?,
                statement: row.get(1)?,
                confidence: row.get(2)?,
            })
        })?
        .collect()
    })
}

/// Store (or replace) a belief's embedding.
pub fn set_belief_embedding(storage: &Storage, belief_id: &str, embedding: &[f32]) -> Result<()> {
    let now = storage.clock().now();
    storage.run(
        "INSERT INTO belief_embeddings (belief_id, embedding, dimensions, created_at) \
         VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(belief_id) DO UPDATE SET embedding = excluded.embedding, \
         dimensions = excluded.dimensions, created_at = excluded.created_at",
        params![belief_id, to_blob(embedding), embedding.len() as i64, now.to_rfc3339()],
    )?;
    Ok(())
}

fn load_active_embeddings(
    storage: &Storage,
    exclude_id: Option<&str>,
) -> Result<Vec<(Belief, Vec<f32>)>> {
    storage.with_conn(|conn| {
        let sql = format!(
            "SELECT {BELIEF_COLUMNS}, e.embedding FROM beliefs b \
             JOIN belief_embeddings e ON e.belief_id = b.id \
             WHERE b.status = 'active' AND b.superseded_by IS NULL"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows: rusqlite::Result<Vec<(Belief, Vec<u8>)>> = stmt
            .query_map([], |row| Ok((row_to_belief(row)?, row.get::<_, Vec<u8>>("embedding")?)))?
            .collect();
        Ok(rows?
            .into_iter()
            .filter(|(b, _)| exclude_id != Some(b.id.as_str()))
            .filter_map(|(b, blob)| from_blob(&blob).map(|v| (b, v)))
            .collect())
    })
}

/// Semantic search over `active` beliefs by cosine similarity to
/// `query_vector`, filtered by `min_similarity`, highest first, capped at
/// `limit`.
pub fn semantic_search(
    storage: &Storage,
    query_vector: &[f32],
    limit: usize,
    min_similarity: f64,
) -> Result<Vec<SemanticMatch>> {
    let mut scored: Vec<SemanticMatch> = load_active_embeddings(storage, None)?
        .into_iter()
        .map(|(belief, vector)| SemanticMatch {
            belief_id: belief.id,
            statement: belief.statement,
            confidence: belief.confidence,
            belief_type: belief.belief_type,
            similarity: cosine_similarity(query_vector, &vector),
        })
        .filter(|m| m.similarity >= min_similarity)
        .collect();

    scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    Ok(scored)
}

/// Find beliefs similar to `embedding`, excluding `exclude_id` and any
/// non-active or superseded belief (spec §4.2 `findSimilarBeliefs`). Used
/// by the remember pipeline's dedup/contradiction check, so there is no
/// minimum-similarity floor here — callers threshold the top result
/// themselves against the grey-zone bands.
pub fn find_similar_beliefs(
    storage: &Storage,
    embedding: &[f32],
    limit: usize,
    exclude_id: Option<&str>,
) -> Result<Vec<SemanticMatch>> {
    let mut scored: Vec<SemanticMatch> = load_active_embeddings(storage, exclude_id)?
        .into_iter()
        .map(|(belief, vector)| SemanticMatch {
            belief_id: belief.id,
            statement: belief.statement,
            confidence: belief.confidence,
            belief_type: belief.belief_type,
            similarity: cosine_similarity(embedding, &vector),
        })
        .collect();

    scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    Ok(scored)
}

/// Count the episodes that support a belief (evidence for the
/// evidence-weighted contradiction decision, spec §4.3.5).
pub fn supporting_episode_count(storage: &Storage, belief_id: &str) -> Result<i64> {
    storage.with_conn(|conn| {
        conn.query_row(
            "SELECT COUNT(*) FROM episode_beliefs WHERE belief_id = ?1",
            [belief_id],
            |row| row.get(0),
        )
    })
}

/// Record access to a belief: increment `access_count`, set `last_accessed`.
pub fn record_access(storage: &Storage, belief_id: &str) -> Result<()> {
    let now = storage.clock().now();
    storage.run(
        "UPDATE beliefs SET access_count = access_count + 1, last_accessed = ?1 WHERE id = ?2",
        params![now.to_rfc3339(), belief_id],
    )?;
    Ok(())
}

/// Insert an undirected edge, normalizing order so `(a,b)` and `(b,a)`
/// collapse to the same row (the `a < b` check constraint enforces this).
pub fn link_beliefs(storage: &Storage, x: &str, y: &str) -> Result<Option<BeliefLink>> {
    if x == y {
        return Ok(None);
    }
    let (a, b) = if x < y { (x, y) } else { (y, x) };
    let now = storage.clock().now();
    let inserted = storage.run(
        "INSERT OR IGNORE INTO belief_links (a, b, created_at) VALUES (?1, ?2, ?3)",
        params![a, b, now.to_rfc3339()],
    )?;
    Ok((inserted > 0).then_some(BeliefLink { a: a.to_string(), b: b.to_string(), created_at: now }))
}

/// Set the supersession edge: `old -> new`, `old.status` left to the caller
/// (weaken vs. invalidate, spec §4.3.5 decide which), `new.superseded_by`
/// stays `NULL` (the new belief is the live one).
pub fn set_supersedes(storage: &Storage, old_id: &str, new_id: &str) -> Result<()> {
    storage.run("UPDATE beliefs SET superseded_by = ?1 WHERE id = ?2", params![new_id, old_id])?;
    storage.run("UPDATE beliefs SET supersedes = ?1 WHERE id = ?2", params![old_id, new_id])?;
    Ok(())
}

/// Weaken a contradicted belief whose evidence count is high (spec §4.3.5,
/// `k >= 3`): `confidence := max(0.1, confidence - min(0.2, 1/(k+1)))`.
pub fn weaken_belief(storage: &Storage, id: &str, supporting_episodes: i64) -> Result<Belief> {
    let belief = get_belief(storage, id)?;
    let now = storage.clock().now();
    let reduction = (1.0 / (supporting_episodes as f64 + 1.0)).min(0.2);
    let confidence = (belief.confidence - reduction).max(0.1);
    storage.run(
        "UPDATE beliefs SET confidence = ?1, updated_at = ?2 WHERE id = ?3",
        params![confidence, now.to_rfc3339(), id],
    )?;
    get_belief(storage, id)
}

/// Invalidate a contradicted belief whose evidence count is low (spec
/// §4.3.5, `k < 3`).
pub fn invalidate_belief(storage: &Storage, id: &str) -> Result<Belief> {
    let now = storage.clock().now();
    storage.run(
        "UPDATE beliefs SET status = 'invalidated', updated_at = ?1 WHERE id = ?2",
        params![now.to_rfc3339(), id],
    )?;
    get_belief(storage, id)
}

/// Record an episode-supports-belief link.
pub fn link_episode_to_belief(storage: &Storage, episode_id: &str, belief_id: &str) -> Result<()> {
    storage.run(
        "INSERT OR IGNORE INTO episode_beliefs (episode_id, belief_id) VALUES (?1, ?2)",
        params![episode_id, belief_id],
    )?;
    Ok(())
}

/// Create a new episode.
pub fn create_episode(storage: &Storage, action: &str, context: Option<&str>) -> Result<Episode> {
    let id = new_id();
    let now = storage.clock().now();
    storage.run(
        "INSERT INTO episodes (id, action, context, outcome, timestamp) VALUES (?1, ?2, ?3, NULL, ?4)",
        params![id, action, context, now.to_rfc3339()],
    )?;
    Ok(Episode { id, action: action.to_string(), context: context.map(String::from), outcome: None, timestamp: now })
}

/// Store (or replace) an episode's embedding. Failure to embed an episode
/// is non-fatal (spec §4.3 step 1) — callers simply don't call this on
/// failure, leaving the episode embedding-less.
pub fn set_episode_embedding(storage: &Storage, episode_id: &str, embedding: &[f32]) -> Result<()> {
    let now = storage.clock().now();
    storage.run(
        "INSERT INTO episode_embeddings (episode_id, embedding, dimensions, created_at) \
         VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(episode_id) DO UPDATE SET embedding = excluded.embedding, \
         dimensions = excluded.dimensions, created_at = excluded.created_at",
        params![episode_id, to_blob(embedding), embedding.len() as i64, now.to_rfc3339()],
    )?;
    Ok(())
}

/// Append an arbitrary change record (exposed for the pipeline/reflection
/// modules, which need change types this module doesn't otherwise produce).
pub fn record_change(
    storage: &Storage,
    belief_id: &str,
    change_type: ChangeType,
    detail: Option<&str>,
    episode_id: Option<&str>,
) -> Result<BeliefChange> {
    append_change(storage, belief_id, change_type, detail, episode_id)
}

/// Recent episodes, most recent first.
pub fn recent_episodes(storage: &Storage, limit: usize) -> Result<Vec<Episode>> {
    storage.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, action, context, outcome, timestamp FROM episodes \
             ORDER BY timestamp DESC LIMIT ?1",
        )?;
        stmt.query_map([limit as i64], |row| {
            Ok(Episode {
                id: row.get(0)?,
                action: row.get(1)?,
                context: row.get(2)?,
                outcome: row.get(3)?,
                timestamp: row.get(4)?,
            })
        })?
        .collect()
    })
}

/// Semantic search over embedded episodes by cosine similarity to
/// `query_vector`, filtered by `min_similarity`, highest similarity first,
/// capped at `limit`. Episodes without a stored embedding (the embedder was
/// unavailable or failed when the episode was recorded) are skipped rather
/// than scored, mirroring `load_active_embeddings`' inner-join over beliefs.
pub fn episode_semantic_search(
    storage: &Storage,
    query_vector: &[f32],
    limit: usize,
    min_similarity: f64,
) -> Result<Vec<Episode>> {
    let rows: Vec<(Episode, Vec<u8>)> = storage.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT e.id, e.action, e.context, e.outcome, e.timestamp, em.embedding \
             FROM episodes e JOIN episode_embeddings em ON em.episode_id = e.id",
        )?;
        stmt.query_map([], |row| {
            let episode = Episode {
                id: row.get(0)?,
                action: row.get(1)?,
                context: row.get(2)?,
                outcome: row.get(3)?,
                timestamp: row.get(4)?,
            };
            Ok((episode, row.get::<_, Vec<u8>>(5)?))
        })?
        .collect()
    })?;

    let mut scored: Vec<(Episode, f64)> = rows
        .into_iter()
        .filter_map(|(episode, blob)| from_blob(&blob).map(|vector| (episode, vector)))
        .map(|(episode, vector)| {
            let similarity = cosine_similarity(query_vector, &vector);
            (episode, similarity)
        })
        .filter(|(_, similarity)| *similarity >= min_similarity)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    Ok(scored.into_iter().map(|(episode, _)| episode).collect())
}

/// Counts and aggregate effective confidence used by `Memory::stats`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BeliefStats {
    pub total: i64,
    pub by_status: std::collections::BTreeMap<String, i64>,
    pub by_type: std::collections::BTreeMap<String, i64>,
    pub mean_effective_confidence: f64,
}

/// Aggregate belief statistics (spec §C: `stats()`).
pub fn stats(storage: &Storage) -> Result<BeliefStats> {
    let now = storage.clock().now();
    let all = list_beliefs(storage, None)?;

    let mut by_status = std::collections::BTreeMap::new();
    let mut by_type = std::collections::BTreeMap::new();
    let mut active_eff_sum = 0.0;
    let mut active_count = 0;

    for belief in &all {
        *by_status.entry(belief.status.to_string()).or_insert(0) += 1;
        *by_type.entry(belief.belief_type.to_string()).or_insert(0) += 1;
        if belief.status == BeliefStatus::Active {
            active_eff_sum += effective_confidence(belief.confidence, belief.stability, belief.updated_at, now);
            active_count += 1;
        }
    }

    Ok(BeliefStats {
        total: all.len() as i64,
        by_status,
        by_type,
        mean_effective_confidence: if active_count > 0 { active_eff_sum / active_count as f64 } else { 0.0 },
    })
}

/// Look up an episode by exact id.
pub fn get_episode(storage: &Storage, id: &str) -> Result<Episode> {
    storage
        .with_conn(|conn| {
            conn.query_row(
                "SELECT id, action, context, outcome, timestamp FROM episodes WHERE id = ?1",
                [id],
                |row| {
                    Ok(Episode {
                        id: row.get(0)?,
                        action: row.get(1)?,
                        context: row.get(2)?,
                        outcome: row.get(3)?,
                        timestamp: row.get(4)?,
                    })
                },
            )
            .optional()
        })?
        .ok_or_else(|| Error::NotFound(format!("episode {id}")))
}
