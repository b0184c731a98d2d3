//! Knowledge source registry, chunk store, and hybrid keyword+vector
//! search with source-diversity shaping (spec §4.6).

use std::collections::HashSet;

use rusqlite::{params, OptionalExtension};

use crate::belief::sanitize_fts5_query;
use crate::error::{Error, Result};
use crate::ids::new_id;
use crate::storage::Storage;
use crate::vector::{cosine_similarity, from_blob, to_blob};

use super::chunker::{chunk_markdown, strip_header};
use super::model::{KnowledgeChunk, KnowledgeMatch, KnowledgeSource, LearnOutcome};
use super::url::{hostname, normalize_url};

/// Minimum cosine similarity a candidate must clear to be returned (spec
/// §4.6 phase 3; 0.5 for knowledge vs. 0.2 for belief recall).
pub const SEMANTIC_MIN_SIMILARITY: f64 = 0.5;

/// Bonus added to candidates surfaced via source title/tag enrichment
/// (spec §4.6 phase 1b/3).
const TITLE_TAG_BONUS: f64 = 0.15;

/// FTS candidate pool size multiplier over the caller's `limit`.
const FTS_CANDIDATE_MULTIPLIER: usize = 10;

/// Once results span at least this many distinct sources, cap each source
/// at [`MAX_PER_SOURCE`] to preserve diversity (spec §4.6 phase 3).
const DIVERSITY_SOURCE_COUNT: usize = 3;
const MAX_PER_SOURCE: usize = 2;

fn row_to_source(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeSource> {
    let tags_json: String = row.get("tags")?;
    Ok(KnowledgeSource {
        id: row.get("id")?,
        url: row.get("url")?,
        title: row.get("title")?,
        fetched_at: row.get("fetched_at")?,
        chunk_count: row.get("chunk_count")?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        max_age_days: row.get("max_age_days")?,
    })
}

const SOURCE_COLUMNS: &str = "id, url, title, fetched_at, chunk_count, tags, max_age_days";

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeChunk> {
    Ok(KnowledgeChunk {
        id: row.get("id")?,
        source_id: row.get("source_id")?,
        content: row.get("content")?,
        chunk_index: row.get("chunk_index")?,
        created_at: row.get("created_at")?,
    })
}

const CHUNK_COLUMNS: &str = "id, source_id, content, chunk_index, created_at";

/// Look up a source by exact id.
pub fn get_source(storage: &Storage, id: &str) -> Result<KnowledgeSource> {
    storage
        .with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {SOURCE_COLUMNS} FROM knowledge_sources WHERE id = ?1"),
                [id],
                row_to_source,
            )
            .optional()
        })?
        .ok_or_else(|| Error::NotFound(format!("knowledge source {id}")))
}

fn get_source_by_url(storage: &Storage, normalized_url: &str) -> Result<Option<KnowledgeSource>> {
    storage.with_conn(|conn| {
        conn.query_row(
            &format!("SELECT {SOURCE_COLUMNS} FROM knowledge_sources WHERE url = ?1"),
            [normalized_url],
            row_to_source,
        )
        .optional()
    })
}

/// All sources, most recently fetched first.
pub fn sources(storage: &Storage) -> Result<Vec<KnowledgeSource>> {
    storage.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SOURCE_COLUMNS} FROM knowledge_sources ORDER BY fetched_at DESC"
        ))?;
        stmt.query_map([], row_to_source)?.collect()
    })
}

/// All chunks belonging to `source_id`, in chunk order.
pub fn source_chunks(storage: &Storage, source_id: &str) -> Result<Vec<KnowledgeChunk>> {
    storage.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHUNK_COLUMNS} FROM knowledge_chunks WHERE source_id = ?1 ORDER BY chunk_index"
        ))?;
        stmt.query_map([source_id], row_to_chunk)?.collect()
    })
}

/// Chunk `markdown` with a contextual header, embed each piece (failure
/// leaves that chunk's embedding `NULL`), and insert all of them under
/// `source_id` in `chunk_index` order. Returns the chunk count.
async fn store_chunks(
    storage: &Storage,
    source_id: &str,
    title: &str,
    host: &str,
    markdown: &str,
    embedder: Option<&(dyn crate::provider::EmbeddingClient)>,
) -> Result<i64> {
    let pieces = chunk_markdown(markdown, title, host);
    let now = storage.clock().now();

    for (index, content) in pieces.iter().enumerate() {
        let id = new_id();
        let embedding = match embedder {
            Some(client) => client.embed(content).await.ok(),
            None => None,
        };

        storage.run(
            "INSERT INTO knowledge_chunks (id, source_id, content, chunk_index, embedding, dimensions, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                source_id,
                content,
                index as i64,
                embedding.as_ref().map(|v| to_blob(v)),
                embedding.as_ref().map(|v| v.len() as i64),
                now.to_rfc3339(),
            ],
        )?;
    }

    Ok(pieces.len() as i64)
}

/// Learn a document: normalize its URL, skip if already known (unless
/// `force`), chunk and embed its content, and register it as a source
/// (spec §4.6 `learnFromContent`).
pub async fn learn_from_content(
    storage: &Storage,
    embedder: Option<&(dyn crate::provider::EmbeddingClient)>,
    url: &str,
    title: &str,
    markdown: &str,
    force: bool,
    tags: &[String],
) -> Result<LearnOutcome> {
    let normalized = normalize_url(url);

    if let Some(existing) = get_source_by_url(storage, &normalized)? {
        if !force {
            return Ok(LearnOutcome { skipped: true, source: existing });
        }
        storage.run("DELETE FROM knowledge_sources WHERE id = ?1", [&existing.id])?;
    }

    let id = new_id();
    let now = storage.clock().now();
    let host = hostname(&normalized);
    let tags_json = serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string());

    storage.run(
        "INSERT INTO knowledge_sources (id, url, title, fetched_at, chunk_count, tags, max_age_days) \
         VALUES (?1, ?2, ?3, ?4, 0, ?5, NULL)",
        params![id, normalized, title, now.to_rfc3339(), tags_json],
    )?;

    let chunk_count = store_chunks(storage, &id, title, &host, markdown, embedder).await?;
    storage.run(
        "UPDATE knowledge_sources SET chunk_count = ?1 WHERE id = ?2",
        params![chunk_count, id],
    )?;

    Ok(LearnOutcome { skipped: false, source: get_source(storage, &id)? })
}

/// Re-chunk a source from its existing chunks: strip each chunk's
/// contextual header, rejoin with blank lines, re-chunk with a fresh
/// header, and re-embed (spec §4.6 `reindexSource`).
pub async fn reindex_source(
    storage: &Storage,
    embedder: Option<&(dyn crate::provider::EmbeddingClient)>,
    id: &str,
) -> Result<()> {
    let source = get_source(storage, id)?;
    let title = source.title.clone().unwrap_or_default();
    let host = hostname(&source.url);

    let existing = source_chunks(storage, id)?;
    let bodies: Vec<&str> = existing
        .iter()
        .filter_map(|c| strip_header(&c.content, &title, &host))
        .collect();
    let markdown = bodies.join("\n\n");

    storage.run("DELETE FROM knowledge_chunks WHERE source_id = ?1", [id])?;
    let chunk_count = store_chunks(storage, id, &title, &host, &markdown, embedder).await?;
    storage.run(
        "UPDATE knowledge_sources SET chunk_count = ?1, fetched_at = ?2 WHERE id = ?3",
        params![chunk_count, storage.clock().now().to_rfc3339(), id],
    )?;
    Ok(())
}

/// Re-index every known source (spec §C). One source's failure is logged
/// and skipped rather than aborting the rest, mirroring `learnFromContent`'s
/// per-chunk degradation policy.
pub async fn reindex_all(storage: &Storage, embedder: Option<&(dyn crate::provider::EmbeddingClient)>) -> Result<usize> {
    let all = sources(storage)?;
    let mut count = 0;
    for source in all {
        match reindex_source(storage, embedder, &source.id).await {
            Ok(()) => count += 1,
            Err(err) => storage.logger().warn(
                "reindex_source failed, skipping source",
                Some(serde_json::json!({ "source_id": source.id, "error": err.to_string() })),
            ),
        }
    }
    Ok(count)
}

/// Delete a source's chunks then the source row itself. Cascade delete
/// handles this too, but the explicit order guards against partial FK
/// configurations (spec §4.6 `forgetSource`).
pub fn forget_source(storage: &Storage, id: &str) -> Result<()> {
    storage.run("DELETE FROM knowledge_chunks WHERE source_id = ?1", [id])?;
    storage.run("DELETE FROM knowledge_sources WHERE id = ?1", [id])?;
    Ok(())
}

struct Candidate {
    chunk: KnowledgeChunk,
    source: KnowledgeSource,
    enriched: bool,
}

fn fts_candidates(storage: &Storage, query: &str, pool_size: usize) -> Result<Vec<Candidate>> {
    let sanitized = sanitize_fts5_query(query);
    if sanitized.is_empty() {
        return Ok(Vec::new());
    }

    storage.with_conn(|conn| {
        let sql = format!(
            "SELECT {cols} FROM knowledge_chunks_fts f JOIN knowledge_chunks c ON c.id = f.id \
             WHERE knowledge_chunks_fts MATCH ?1 ORDER BY rank LIMIT ?2",
            cols = CHUNK_COLUMNS
                .split(", ")
                .map(|c| format!("c.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let chunks: Vec<KnowledgeChunk> =
            stmt.query_map(params![sanitized, pool_size as i64], row_to_chunk)?.collect::<rusqlite::Result<_>>()?;
        Ok(chunks)
    })?
    .into_iter()
    .map(|chunk| {
        let source = get_source(storage, &chunk.source_id)?;
        Ok(Candidate { chunk, source, enriched: false })
    })
    .collect()
}

fn title_tag_candidates(storage: &Storage, query: &str, exclude: &HashSet<String>) -> Result<Vec<Candidate>> {
    let words: Vec<String> = query.split_whitespace().map(|w| w.to_lowercase()).collect();
    if words.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for source in sources(storage)? {
        let title_lower = source.title.as_deref().unwrap_or_default().to_lowercase();
        let tag_match = source.tags.iter().any(|t| words.contains(&t.to_lowercase()));
        let title_match = words.iter().any(|w| title_lower.contains(w.as_str()));
        if !title_match && !tag_match {
            continue;
        }
        for chunk in source_chunks(storage, &source.id)? {
            if exclude.contains(&chunk.id) {
                continue;
            }
            out.push(Candidate { chunk, source: source.clone(), enriched: true });
        }
    }
    Ok(out)
}

fn all_embedded_chunks(storage: &Storage) -> Result<Vec<Candidate>> {
    storage.with_conn(|conn| {
        let sql = format!(
            "SELECT {cols} FROM knowledge_chunks c WHERE c.embedding IS NOT NULL",
            cols = CHUNK_COLUMNS.split(", ").map(|c| format!("c.{c}")).collect::<Vec<_>>().join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let chunks: Vec<KnowledgeChunk> = stmt.query_map([], row_to_chunk)?.collect::<rusqlite::Result<_>>()?;
        Ok(chunks)
    })?
    .into_iter()
    .map(|chunk| {
        let source = get_source(storage, &chunk.source_id)?;
        Ok(Candidate { chunk, source, enriched: false })
    })
    .collect()
}

fn chunk_embedding(storage: &Storage, chunk_id: &str) -> Result<Option<Vec<f32>>> {
    storage.with_conn(|conn| {
        conn.query_row(
            "SELECT embedding FROM knowledge_chunks WHERE id = ?1",
            [chunk_id],
            |row| row.get::<_, Option<Vec<u8>>>(0),
        )
        .optional()
    })
    .map(|opt| opt.flatten().and_then(|blob| from_blob(&blob)))
}

/// Hybrid FTS + vector knowledge search with source-diversity shaping
/// (spec §4.6 `knowledgeSearch`).
pub async fn knowledge_search(
    storage: &Storage,
    embedder: Option<&(dyn crate::provider::EmbeddingClient)>,
    query: &str,
    limit: usize,
    query_embedding: Option<Vec<f32>>,
) -> Result<Vec<KnowledgeMatch>> {
    let pool_size = limit * FTS_CANDIDATE_MULTIPLIER;
    let fts_hits = fts_candidates(storage, query, pool_size)?;

    let seen: HashSet<String> = fts_hits.iter().map(|c| c.chunk.id.clone()).collect();
    let enrichment = title_tag_candidates(storage, query, &seen)?;

    let mut candidates = fts_hits;
    candidates.extend(enrichment);

    let query_vector = match query_embedding {
        Some(v) => Some(v),
        None => match embedder {
            Some(client) => client.embed(query).await.ok(),
            None => None,
        },
    };

    let Some(query_vector) = query_vector else {
        // Embedding unavailable: short-circuit to FTS results scored at 0.5 (spec §4.6 phase 2).
        let mut results: Vec<KnowledgeMatch> = candidates
            .into_iter()
            .map(|c| KnowledgeMatch { chunk: c.chunk, source: c.source, score: 0.5 })
            .collect();
        results.truncate(limit);
        return Ok(apply_source_diversity(results, limit));
    };

    if candidates.is_empty() {
        candidates = all_embedded_chunks(storage)?;
    }

    let mut scored = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Some(vector) = chunk_embedding(storage, &candidate.chunk.id)? else { continue };
        let mut score = cosine_similarity(&query_vector, &vector);
        if candidate.enriched {
            score += TITLE_TAG_BONUS;
        }
        if score < SEMANTIC_MIN_SIMILARITY {
            continue;
        }
        scored.push(KnowledgeMatch { chunk: candidate.chunk, source: candidate.source, score });
    }

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(apply_source_diversity(scored, limit))
}

/// If results span at least [`DIVERSITY_SOURCE_COUNT`] distinct sources, cap
/// each source at [`MAX_PER_SOURCE`] while filling up to `limit`; otherwise
/// return the top `limit` unchanged (spec §4.6 phase 3).
fn apply_source_diversity(results: Vec<KnowledgeMatch>, limit: usize) -> Vec<KnowledgeMatch> {
    let distinct_sources: HashSet<&str> = results.iter().map(|r| r.source.id.as_str()).collect();
    if distinct_sources.len() < DIVERSITY_SOURCE_COUNT {
        let mut out = results;
        out.truncate(limit);
        return out;
    }

    let mut per_source: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut out = Vec::with_capacity(limit);
    for result in results {
        let count = per_source.entry(result.source.id.clone()).or_insert(0);
        if *count >= MAX_PER_SOURCE {
            continue;
        }
        *count += 1;
        out.push(result);
        if out.len() >= limit {
            break;
        }
    }
    out
}
