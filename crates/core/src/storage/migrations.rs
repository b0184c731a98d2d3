//! Per-plugin migration registries
//!
//! Each subsystem (belief store, knowledge store, background jobs) owns its
//! own monotonically increasing version sequence, applied independently by
//! [`super::Storage::migrate`]. This mirrors the teacher crate's single
//! `MIGRATIONS` array (`storage/migrations.rs`), generalized to the
//! multi-plugin registry spec §4.1 requires.

/// A single migration within one plugin's sequence.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Version number, unique and monotonically increasing within a plugin.
    pub version: u32,
    /// Human-readable description, surfaced in logs.
    pub description: &'static str,
    /// The SQL to apply, run inside `execute_batch` within a transaction.
    pub up: &'static str,
}

/// The name under which belief-store migrations are recorded in
/// `_migrations`.
pub const BELIEF_PLUGIN: &str = "beliefs";

/// The name under which knowledge-store migrations are recorded in
/// `_migrations`.
pub const KNOWLEDGE_PLUGIN: &str = "knowledge";

/// The name under which background-job migrations are recorded in
/// `_migrations`.
pub const JOBS_PLUGIN: &str = "jobs";

/// Belief store schema: beliefs, episodes, links, change log, and their
/// FTS/embedding mirrors.
pub const BELIEF_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial belief store schema: beliefs, episodes, links, change log",
    up: r#"
CREATE TABLE IF NOT EXISTS beliefs (
    id TEXT PRIMARY KEY,
    statement TEXT NOT NULL,
    type TEXT NOT NULL DEFAULT 'insight',
    confidence REAL NOT NULL DEFAULT 0.6,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    importance INTEGER NOT NULL DEFAULT 5,
    stability REAL NOT NULL DEFAULT 1.0,
    subject TEXT NOT NULL DEFAULT 'owner',
    supersedes TEXT REFERENCES beliefs(id),
    superseded_by TEXT REFERENCES beliefs(id),
    last_accessed TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_beliefs_status ON beliefs(status);
CREATE INDEX IF NOT EXISTS idx_beliefs_subject ON beliefs(subject);
CREATE INDEX IF NOT EXISTS idx_beliefs_updated_at ON beliefs(updated_at);
CREATE INDEX IF NOT EXISTS idx_beliefs_created_at ON beliefs(created_at);

CREATE TABLE IF NOT EXISTS belief_embeddings (
    belief_id TEXT PRIMARY KEY REFERENCES beliefs(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS beliefs_fts USING fts5(
    id, statement,
    content='beliefs',
    content_rowid='rowid',
    tokenize='porter ascii'
);

CREATE TRIGGER IF NOT EXISTS beliefs_ai AFTER INSERT ON beliefs BEGIN
    INSERT INTO beliefs_fts(rowid, id, statement) VALUES (NEW.rowid, NEW.id, NEW.statement);
END;

CREATE TRIGGER IF NOT EXISTS beliefs_ad AFTER DELETE ON beliefs BEGIN
    INSERT INTO beliefs_fts(beliefs_fts, rowid, id, statement) VALUES ('delete', OLD.rowid, OLD.id, OLD.statement);
END;

CREATE TRIGGER IF NOT EXISTS beliefs_au AFTER UPDATE ON beliefs BEGIN
    INSERT INTO beliefs_fts(beliefs_fts, rowid, id, statement) VALUES ('delete', OLD.rowid, OLD.id, OLD.statement);
    INSERT INTO beliefs_fts(rowid, id, statement) VALUES (NEW.rowid, NEW.id, NEW.statement);
END;

CREATE TABLE IF NOT EXISTS episodes (
    id TEXT PRIMARY KEY,
    action TEXT NOT NULL,
    context TEXT,
    outcome TEXT,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_episodes_timestamp ON episodes(timestamp);

CREATE TABLE IF NOT EXISTS episode_embeddings (
    episode_id TEXT PRIMARY KEY REFERENCES episodes(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS episode_beliefs (
    episode_id TEXT NOT NULL REFERENCES episodes(id) ON DELETE CASCADE,
    belief_id TEXT NOT NULL REFERENCES beliefs(id) ON DELETE CASCADE,
    PRIMARY KEY (episode_id, belief_id)
);

CREATE INDEX IF NOT EXISTS idx_episode_beliefs_belief ON episode_beliefs(belief_id);

CREATE TABLE IF NOT EXISTS belief_changes (
    id TEXT PRIMARY KEY,
    belief_id TEXT NOT NULL REFERENCES beliefs(id) ON DELETE CASCADE,
    change_type TEXT NOT NULL,
    detail TEXT,
    episode_id TEXT REFERENCES episodes(id),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_belief_changes_belief ON belief_changes(belief_id, created_at);

CREATE TABLE IF NOT EXISTS belief_links (
    a TEXT NOT NULL REFERENCES beliefs(id) ON DELETE CASCADE,
    b TEXT NOT NULL REFERENCES beliefs(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    PRIMARY KEY (a, b),
    CHECK (a < b)
);
"#,
}];

/// Knowledge store schema: sources and chunks, with FTS mirror.
pub const KNOWLEDGE_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial knowledge store schema: sources, chunks",
    up: r#"
CREATE TABLE IF NOT EXISTS knowledge_sources (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    title TEXT,
    fetched_at TEXT NOT NULL,
    chunk_count INTEGER NOT NULL DEFAULT 0,
    tags TEXT NOT NULL DEFAULT '[]',
    max_age_days INTEGER
);

CREATE TABLE IF NOT EXISTS knowledge_chunks (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL REFERENCES knowledge_sources(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    embedding BLOB,
    dimensions INTEGER,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_source ON knowledge_chunks(source_id, chunk_index);

CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_chunks_fts USING fts5(
    id, content,
    content='knowledge_chunks',
    content_rowid='rowid',
    tokenize='porter ascii'
);

CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON knowledge_chunks BEGIN
    INSERT INTO knowledge_chunks_fts(rowid, id, content) VALUES (NEW.rowid, NEW.id, NEW.content);
END;

CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON knowledge_chunks BEGIN
    INSERT INTO knowledge_chunks_fts(knowledge_chunks_fts, rowid, id, content) VALUES ('delete', OLD.rowid, OLD.id, OLD.content);
END;

CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON knowledge_chunks BEGIN
    INSERT INTO knowledge_chunks_fts(knowledge_chunks_fts, rowid, id, content) VALUES ('delete', OLD.rowid, OLD.id, OLD.content);
    INSERT INTO knowledge_chunks_fts(rowid, id, content) VALUES (NEW.rowid, NEW.id, NEW.content);
END;
"#,
}];

/// Background jobs schema: a single upsert-by-id table.
pub const JOBS_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial background_jobs table",
    up: r#"
CREATE TABLE IF NOT EXISTS background_jobs (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    label TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'running',
    progress REAL NOT NULL DEFAULT 0.0,
    started_at TEXT NOT NULL,
    error TEXT,
    result TEXT,
    result_type TEXT,
    structured_result TEXT,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON background_jobs(status);
"#,
}];
