//! Elasticsearch visibility indexing.
//!
//! The index processor consumes visibility messages from the bus, turns
//! them into versioned bulk requests, and hands them to the bulk processor,
//! which batches flushes to Elasticsearch and reconciles per-item outcomes
//! back into bus acks.

pub mod bulk;
pub mod es_client;
pub mod index_processor;
pub mod processor;

pub use bulk::{
    doc_version_for, message_type_for_version, parse_bulk_header, parse_bulk_lines, BulkHeader,
    BulkRequest, VERSION_FOR_CLOSE, VERSION_FOR_DELETE, VERSION_FOR_OPEN, VERSION_TYPE_EXTERNAL,
};
pub use es_client::{BulkItemResult, BulkResponse, ElasticsearchClient, HttpElasticsearchClient};
pub use index_processor::IndexProcessor;
pub use processor::EsBulkProcessor;
