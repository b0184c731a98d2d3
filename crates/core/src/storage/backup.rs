//! Migration backup-and-rotate
//!
//! Before applying any pending migration, `Storage::migrate` takes a full
//! file copy of the database after a WAL checkpoint, then rotates old
//! backups. Rotation is best-effort: a filesystem error here must never
//! fail a migration that has already completed (spec §9).

use std::path::{Path, PathBuf};

use chrono::Utc;

/// Number of most-recent backups to keep, regardless of age.
const KEEP_MOST_RECENT: usize = 5;

/// Backups older than this are deleted during rotation.
const MAX_AGE_DAYS: i64 = 7;

/// What happened during a backup-and-rotate pass.
#[derive(Debug, Clone, Default)]
pub struct BackupOutcome {
    /// Path of the backup file created, if any (no pending migrations means
    /// no backup is taken).
    pub backup_path: Option<PathBuf>,
    /// Number of older backups deleted during rotation.
    pub rotated_away: usize,
}

/// Checkpoint the WAL (TRUNCATE mode) and copy `db_path` to a timestamped
/// backup file alongside it, then rotate.
pub fn checkpoint_and_backup(
    conn: &rusqlite::Connection,
    db_path: &Path,
) -> rusqlite::Result<BackupOutcome> {
    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;

    let backup_path = db_path.with_file_name(format!(
        "{}-backup-{}.db",
        db_path.file_stem().and_then(|s| s.to_str()).unwrap_or("db"),
        Utc::now().to_rfc3339().replace(':', "-"),
    ));

    if let Err(e) = std::fs::copy(db_path, &backup_path) {
        tracing::warn!("failed to write migration backup {:?}: {}", backup_path, e);
        return Ok(BackupOutcome::default());
    }

    let rotated_away = rotate_backups(db_path).unwrap_or_else(|e| {
        tracing::warn!("backup rotation failed (best-effort): {}", e);
        0
    });

    Ok(BackupOutcome { backup_path: Some(backup_path), rotated_away })
}

fn rotate_backups(db_path: &Path) -> std::io::Result<usize> {
    let dir = db_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = db_path.file_stem().and_then(|s| s.to_str()).unwrap_or("db");
    let prefix = format!("{stem}-backup-");

    let mut backups: Vec<(PathBuf, std::time::SystemTime)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".db"))
        })
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((entry.path(), modified))
        })
        .collect();

    // Newest first.
    backups.sort_by(|a, b| b.1.cmp(&a.1));

    let now = std::time::SystemTime::now();
    let max_age = std::time::Duration::from_secs(MAX_AGE_DAYS as u64 * 24 * 3600);
    let mut removed = 0;

    for (index, (path, modified)) in backups.into_iter().enumerate() {
        let too_old = now.duration_since(modified).map(|age| age > max_age).unwrap_or(false);
        if index >= KEEP_MOST_RECENT || too_old {
            if std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
    }

    Ok(removed)
}
