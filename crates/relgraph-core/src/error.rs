//! Error taxonomy shared across the workspace.

use thiserror::Error;

/// Failure classes that callers need to branch on.
///
/// Everything else travels as `anyhow::Error` context on top of one of
/// these, or is logged and skipped where a single bad record must not
/// abort a batch.
#[derive(Debug, Error)]
pub enum RelgraphError {
    /// External collaborator or network failure; retried with backoff
    /// before the caller ever sees it, never fatal to an iteration.
    #[error("transient i/o failure: {0}")]
    Transient(String),

    /// A single unparseable or incomplete record. Skipped and logged at
    /// the point of discovery; surfaced only when the caller asked for a
    /// specific record.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// Missing files, unreachable store, out-of-range checkpoint fields.
    /// Fails fast at construction time; the system does not run degraded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Query arguments rejected before any store access happens.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
