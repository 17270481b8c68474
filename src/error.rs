//! Error types for the standby processing and visibility indexing pipeline.
//!
//! Each subsystem carries its own error enum; `ProcessError` is the umbrella
//! the transfer-task pipeline propagates. Retry and discard are *outcomes*,
//! not errors, and live in [`crate::standby::HandlerOutcome`].

use thiserror::Error;

/// Errors raised by the message bus client.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("message bus publish failed: {0}")]
    PublishFailed(String),
    #[error("message bus is closed")]
    Closed,
    #[error("visibility message decode failed: {0}")]
    Decode(String),
}

/// Errors raised by the transfer-task store, shard metadata, and the primary
/// visibility store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("transfer task read failed: {0}")]
    ReadFailed(String),
    #[error("ack level update failed: {0}")]
    AckUpdateFailed(String),
    #[error("visibility record write failed: {0}")]
    VisibilityWriteFailed(String),
}

/// Errors raised by the domain cache.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The domain id has no entry. Callers degrade to defaults on this.
    #[error("domain {0} not found")]
    NotFound(String),
    #[error("domain cache lookup failed: {0}")]
    Lookup(String),
}

/// Errors raised while loading workflow mutable state.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("mutable state load failed: {0}")]
    LoadFailed(String),
}

/// Errors raised by the matching client.
#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("matching rpc failed: {0}")]
    Rpc(String),
}

/// Errors raised by the Elasticsearch bulk path.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("bulk request serialization failed: {0}")]
    Serialization(String),
    #[error("malformed bulk framing: {0}")]
    MalformedFraming(String),
    #[error("elasticsearch request failed: {0}")]
    Http(String),
    #[error("no message type maps to document version {0}")]
    UnknownVersion(i64),
}

/// Umbrella error for the transfer-task processing pipeline. Everything in
/// here is treated as retryable by the queue processor, bounded by the
/// per-task retry budget.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Matching(#[from] MatchingError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    /// A task reached an operation that cannot handle its type. Programming
    /// error; the task is dropped after the retry budget.
    #[error("invalid task for operation: {0}")]
    InvalidTask(String),
}
