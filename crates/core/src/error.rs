//! Error taxonomy
//!
//! A fixed set of error kinds, each carrying a human-readable message, so
//! callers can match on `kind()` without depending on message text.

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A crate-wide error.
///
/// `NotFound`/`Ambiguous`/`InvalidArgument` surface to the caller unchanged.
/// `StorageFailure` and `MigrationFailure` are fatal to the operation in
/// progress. `ProviderFailure` is downgraded to structured degradation at
/// the points documented in each module (FTS fallback, create-without-dedup,
/// stored-without-embedding) and is never propagated from those call sites —
/// it is only returned when no degradation path exists.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An id or prefix did not resolve to any row.
    #[error("not found: {0}")]
    NotFound(String),

    /// A prefix resolved to two or more rows.
    #[error("ambiguous id prefix: {0}")]
    Ambiguous(String),

    /// Caller-supplied argument was out of range or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An embedding or chat provider call failed.
    #[error("provider failure: {0}")]
    ProviderFailure(String),

    /// The database layer failed in a way that is fatal to the current
    /// operation.
    #[error("storage failure: {0}")]
    StorageFailure(#[from] rusqlite::Error),

    /// A migration failed to apply; `_migrations` was left untouched for
    /// the failed version and any backup taken beforehand is retained.
    #[error("migration failure: {0}")]
    MigrationFailure(String),

    /// Filesystem error opening the data directory or database file.
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// A short, stable tag for the error kind, useful for machine-readable
    /// surfaces (e.g. an HTTP error body) without exposing `Display` text.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::Ambiguous(_) => "ambiguous",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::ProviderFailure(_) => "provider_failure",
            Error::StorageFailure(_) => "storage_failure",
            Error::MigrationFailure(_) => "migration_failure",
            Error::Io(_) => "io_failure",
        }
    }
}
