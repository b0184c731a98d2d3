//! Storage Layer
//!
//! SQLite-based storage with WAL durability, foreign keys, a per-plugin
//! migration registry, and an atomic migrate-with-backup primitive. See
//! spec §4.1.

mod backup;
mod db;
pub mod migrations;

pub use backup::BackupOutcome;
pub use db::{Storage, DB_FILE_NAME};
pub use migrations::{Migration, BELIEF_PLUGIN, JOBS_PLUGIN, KNOWLEDGE_PLUGIN};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent_and_backs_up_once() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let outcome = storage.migrate(BELIEF_PLUGIN, migrations::BELIEF_MIGRATIONS).unwrap();
        assert!(outcome.backup_path.is_some());

        let second = storage.migrate(BELIEF_PLUGIN, migrations::BELIEF_MIGRATIONS).unwrap();
        assert!(second.backup_path.is_none(), "no-op migrate must not take a backup");
    }

    #[test]
    fn resolve_id_prefix_errors_on_zero_and_ambiguous() {
        let storage = Storage::open_in_memory().unwrap();
        storage.migrate(BELIEF_PLUGIN, migrations::BELIEF_MIGRATIONS).unwrap();

        let err = storage.resolve_id_prefix("beliefs", "zzz", None).unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let now = "2026-01-01T00:00:00Z";
        storage
            .run(
                "INSERT INTO beliefs (id, statement, created_at, updated_at, last_accessed) VALUES ('abc123', 's1', ?1, ?1, ?1)",
                [now],
            )
            .unwrap();
        storage
            .run(
                "INSERT INTO beliefs (id, statement, created_at, updated_at, last_accessed) VALUES ('abc456', 's2', ?1, ?1, ?1)",
                [now],
            )
            .unwrap();

        let err = storage.resolve_id_prefix("beliefs", "abc", None).unwrap_err();
        assert_eq!(err.kind(), "ambiguous");

        let id = storage.resolve_id_prefix("beliefs", "abc123", None).unwrap();
        assert_eq!(id, "abc123");
    }
}
