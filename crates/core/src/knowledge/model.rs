//! Knowledge store data model (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A learned document, identified by its normalized URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSource {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub chunk_count: i64,
    pub tags: Vec<String>,
    pub max_age_days: Option<i64>,
}

/// One chunk of a source's content, carrying the contextual header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    pub source_id: String,
    pub content: String,
    pub chunk_index: i64,
    pub created_at: DateTime<Utc>,
}

/// A scored knowledge search result, with its source attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    pub chunk: KnowledgeChunk,
    pub source: KnowledgeSource,
    pub score: f64,
}

/// The outcome of `learnFromContent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnOutcome {
    pub skipped: bool,
    pub source: KnowledgeSource,
}
