//! Logger collaborator contract
//!
//! The core never swallows a `StorageFailure`, but `ProviderFailure`
//! degradation (FTS fallback, create-without-dedup, stored-without-embedding)
//! is always logged at `warn` through this trait before the caller sees the
//! degraded result.

use serde_json::Value;

/// A structured logger. Implementations are free to ignore `data`.
pub trait Logger: Send + Sync {
    /// Log at error level.
    fn error(&self, msg: &str, data: Option<Value>);
    /// Log at warn level.
    fn warn(&self, msg: &str, data: Option<Value>);
    /// Log at info level.
    fn info(&self, msg: &str, data: Option<Value>);
    /// Log at debug level.
    fn debug(&self, msg: &str, data: Option<Value>);
}

/// The default `Logger`, forwarding to the `tracing` crate so the ambient
/// stack has real structured logging even when no caller-supplied logger is
/// wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, msg: &str, data: Option<Value>) {
        match data {
            Some(d) => tracing::error!(data = %d, "{msg}"),
            None => tracing::error!("{msg}"),
        }
    }

    fn warn(&self, msg: &str, data: Option<Value>) {
        match data {
            Some(d) => tracing::warn!(data = %d, "{msg}"),
            None => tracing::warn!("{msg}"),
        }
    }

    fn info(&self, msg: &str, data: Option<Value>) {
        match data {
            Some(d) => tracing::info!(data = %d, "{msg}"),
            None => tracing::info!("{msg}"),
        }
    }

    fn debug(&self, msg: &str, data: Option<Value>) {
        match data {
            Some(d) => tracing::debug!(data = %d, "{msg}"),
            None => tracing::debug!("{msg}"),
        }
    }
}
