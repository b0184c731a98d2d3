//! The storage layer: one SQLite database file per data directory, WAL
//! durability, foreign keys, and an atomic migrate-with-backup primitive.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::logger::{Logger, TracingLogger};

use super::backup::{checkpoint_and_backup, BackupOutcome};
use super::migrations::Migration;

/// The database file name within a data directory.
pub const DB_FILE_NAME: &str = "personal-ai.db";

/// Owns the single database handle for a data directory. All writes must be
/// routed through this type by a single process (spec §5); it does not
/// support concurrent writers.
pub struct Storage {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
    logger: Arc<dyn Logger>,
}

impl Storage {
    /// Open (creating if absent) the database at `data_dir/personal-ai.db`.
    /// `data_dir` is created if it does not exist. Enables WAL mode and
    /// foreign keys and ensures the `_migrations` table exists.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join(DB_FILE_NAME);

        let conn = Connection::open(&db_path)?;
        Self::configure(&conn)?;
        ensure_migrations_table(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
            clock: Arc::new(SystemClock),
            logger: Arc::new(TracingLogger),
        })
    }

    /// Open a private in-memory database. Useful for tests; migrations still
    /// apply normally but backups are skipped (there is no file to copy).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        ensure_migrations_table(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
            clock: Arc::new(SystemClock),
            logger: Arc::new(TracingLogger),
        })
    }

    /// Replace the clock (for deterministic tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the logger.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Run a closure with shared access to the underlying connection. This
    /// is the `query`/`run` primitive every higher-level store is built on.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock().expect("storage connection lock poisoned");
        f(&conn).map_err(Error::StorageFailure)
    }

    /// Execute a statement with no result rows.
    pub fn run(&self, sql: &str, params: impl rusqlite::Params) -> Result<usize> {
        self.with_conn(|conn| conn.execute(sql, params))
    }

    /// Apply any migrations in `migrations` not yet recorded for `plugin`.
    /// If any are pending, takes a checkpointed backup first (skipped for
    /// in-memory databases, since there is no file to copy), then applies
    /// each pending migration in its own transaction together with its
    /// `_migrations` row. On failure the transaction rolls back and the
    /// failed version is not recorded.
    pub fn migrate(&self, plugin: &str, migrations: &[Migration]) -> Result<BackupOutcome> {
        let conn = self.conn.lock().expect("storage connection lock poisoned");

        let applied: std::collections::HashSet<u32> = {
            let mut stmt = conn.prepare(
                "SELECT version FROM _migrations WHERE plugin = ?1",
            )?;
            stmt.query_map([plugin], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?
        };

        let pending: Vec<&Migration> = migrations
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .collect();

        if pending.is_empty() {
            return Ok(BackupOutcome::default());
        }

        let outcome = match &self.db_path {
            Some(path) => checkpoint_and_backup(&conn, path).unwrap_or_default(),
            None => BackupOutcome::default(),
        };

        for migration in pending {
            let tx = conn.unchecked_transaction()?;
            if let Err(e) = tx.execute_batch(migration.up) {
                let _ = tx.rollback();
                return Err(Error::MigrationFailure(format!(
                    "{plugin} v{}: {e}",
                    migration.version
                )));
            }
            if let Err(e) = tx.execute(
                "INSERT INTO _migrations (plugin, version, applied_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![plugin, migration.version, self.clock.now().to_rfc3339()],
            ) {
                let _ = tx.rollback();
                return Err(Error::MigrationFailure(format!(
                    "{plugin} v{}: recording version failed: {e}",
                    migration.version
                )));
            }
            tx.commit().map_err(|e| {
                Error::MigrationFailure(format!("{plugin} v{}: commit failed: {e}", migration.version))
            })?;
            tracing::info!("applied migration {plugin} v{}: {}", migration.version, migration.description);
        }

        Ok(outcome)
    }

    /// Resolve an id or unambiguous prefix to a full id within `table`,
    /// optionally narrowed by `where_clause` (a raw SQL fragment, ANDed in —
    /// callers must only pass fragments they control, never user input).
    /// Exact match wins outright; otherwise falls back to `LIKE 'prefix%'`
    /// ordered by `created_at DESC`, erroring on zero or ≥2 matches.
    pub fn resolve_id_prefix(
        &self,
        table: &'static str,
        prefix: &str,
        where_clause: Option<&str>,
    ) -> Result<String> {
        self.with_conn(|conn| {
            let extra = where_clause.map(|w| format!(" AND {w}")).unwrap_or_default();

            let exact_sql = format!("SELECT id FROM {table} WHERE id = ?1{extra}");
            if let Some(id) = conn
                .query_row(&exact_sql, [prefix], |row| row.get::<_, String>(0))
                .optional()?
            {
                return Ok(Ok(id));
            }

            let like_sql = format!(
                "SELECT id FROM {table} WHERE id LIKE ?1{extra} ORDER BY created_at DESC LIMIT 2"
            );
            let pattern = format!("{prefix}%");
            let mut stmt = conn.prepare(&like_sql)?;
            let matches: Vec<String> = stmt
                .query_map([&pattern], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;

            Ok(match matches.len() {
                0 => Err(Error::NotFound(format!("no row in {table} matching '{prefix}'"))),
                1 => Ok(matches.into_iter().next().expect("len checked")),
                _ => Err(Error::Ambiguous(format!(
                    "prefix '{prefix}' matches multiple rows in {table}"
                ))),
            })
        })?
    }

    /// Fail-safe close: best-effort WAL checkpoint, then drop.
    pub fn close(self) {
        if let Ok(conn) = self.conn.lock() {
            let _ = conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);");
        }
    }
}

use rusqlite::OptionalExtension;

fn ensure_migrations_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            plugin TEXT NOT NULL,
            version INTEGER NOT NULL,
            applied_at TEXT NOT NULL,
            PRIMARY KEY (plugin, version)
        );",
    )
}
