//! # Waypoint Core
//!
//! Cross-cluster visibility indexing pipeline for the Waypoint workflow
//! orchestration platform. Two subsystems share this crate:
//!
//! - the **standby transfer-queue processor** ([`standby`]): consumes the
//!   shard's transfer queue on behalf of a remote active cluster, replaying
//!   matching pushes and visibility records once replication has caught up;
//! - the **visibility indexer** ([`indexer`]): consumes visibility messages
//!   from the message bus and projects them into Elasticsearch with
//!   version-per-message-type conflict handling, acking exactly the
//!   messages that are durably represented in the index.
//!
//! External collaborators (task store, mutable-state source, domain cache,
//! matching, primary visibility store) are consumed through the contracts
//! in [`persistence`], [`history`], [`domain`], [`matching`], and
//! [`shard`].

pub mod collection;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod history;
pub mod indexer;
pub mod logging;
pub mod matching;
pub mod messaging;
pub mod metrics;
pub mod persistence;
pub mod shard;
pub mod standby;
pub mod test_helpers;

pub use config::{IndexerConfig, QueueProcessorConfig};
pub use error::{
    DomainError, HistoryError, IndexerError, MatchingError, MessagingError, PersistenceError,
    ProcessError,
};
pub use metrics::MetricsClient;
