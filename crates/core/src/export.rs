//! Export/import: a portable JSON snapshot of beliefs, episodes, change
//! log, and links (spec §6 "Export/Import format").

use serde::{Deserialize, Serialize};

use crate::belief::{Belief, BeliefChange, BeliefLink, Episode};
use crate::error::Result;
use crate::storage::Storage;

/// The current export envelope version.
pub const EXPORT_VERSION: u32 = 2;

/// A full export snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEnvelope {
    pub version: u32,
    pub beliefs: Vec<Belief>,
    pub episodes: Vec<Episode>,
    pub belief_changes: Vec<BeliefChange>,
    pub links: Vec<BeliefLink>,
}

/// Counts returned from an import.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub beliefs: usize,
    pub episodes: usize,
}

/// Export every belief, episode, change, and link in the store.
pub fn export(storage: &Storage) -> Result<ExportEnvelope> {
    let beliefs = crate::belief::store::list_beliefs(storage, None)?;

    let mut belief_changes = Vec::new();
    for belief in &beliefs {
        belief_changes.extend(crate::belief::store::history(storage, &belief.id)?);
    }

    let episodes = crate::belief::store::recent_episodes(storage, i64::MAX as usize)?;

    let links = storage.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT a, b, created_at FROM belief_links")?;
        stmt.query_map([], |row| {
            Ok(BeliefLink { a: row.get(0)?, b: row.get(1)?, created_at: row.get(2)? })
        })?
        .collect()
    })?;

    Ok(ExportEnvelope { version: EXPORT_VERSION, beliefs, episodes, belief_changes, links })
}

/// Import an export snapshot. Idempotent by id: rows whose id already
/// exists are skipped rather than overwritten.
///
/// Beliefs are exported newest-first, so a belief whose `supersedes` points
/// at an older id can arrive before that older row does; inserted one at a
/// time under `foreign_keys = ON` that would trip the self-referential FK
/// immediately (`INSERT OR IGNORE` only swallows the uniqueness conflict,
/// not a foreign-key violation). Deferring FK enforcement to the end of the
/// transaction lets every row land before the edges are checked.
pub fn import(storage: &Storage, envelope: &ExportEnvelope) -> Result<ImportOutcome> {
    let mut beliefs_imported = 0;
    let mut episodes_imported = 0;

    storage.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch("PRAGMA defer_foreign_keys = ON;")?;

        for episode in &envelope.episodes {
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO episodes (id, action, context, outcome, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![episode.id, episode.action, episode.context, episode.outcome, episode.timestamp.to_rfc3339()],
            )?;
            episodes_imported += inserted;
        }

        for belief in &envelope.beliefs {
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO beliefs (id, statement, type, confidence, status, created_at, \
                 updated_at, importance, stability, subject, supersedes, superseded_by, last_accessed, access_count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                rusqlite::params![
                    belief.id,
                    belief.statement,
                    belief.belief_type.to_string(),
                    belief.confidence,
                    belief.status.to_string(),
                    belief.created_at.to_rfc3339(),
                    belief.updated_at.to_rfc3339(),
                    belief.importance,
                    belief.stability,
                    belief.subject,
                    belief.supersedes,
                    belief.superseded_by,
                    belief.last_accessed.to_rfc3339(),
                    belief.access_count,
                ],
            )?;
            beliefs_imported += inserted;
        }

        for change in &envelope.belief_changes {
            tx.execute(
                "INSERT OR IGNORE INTO belief_changes (id, belief_id, change_type, detail, episode_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    change.id,
                    change.belief_id,
                    change.change_type.to_string(),
                    change.detail,
                    change.episode_id,
                    change.created_at.to_rfc3339(),
                ],
            )?;
        }

        for link in &envelope.links {
            tx.execute(
                "INSERT OR IGNORE INTO belief_links (a, b, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![link.a, link.b, link.created_at.to_rfc3339()],
            )?;
        }

        tx.commit()?;
        Ok(())
    })?;

    Ok(ImportOutcome { beliefs: beliefs_imported, episodes: episodes_imported })
}
