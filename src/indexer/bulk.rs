//! # Bulk Request Model and NDJSON Framing
//!
//! Every bulk operation frames as one header line plus, for index
//! operations, one document line. The header is a single-key JSON object:
//! the key names the operation, the value carries index, id, mapping type,
//! and the external version.
//!
//! Document versions encode the message type: `Open < Closed < Delete`.
//! With external versioning, Elasticsearch rejects a lower version with a
//! 409, which collapses out-of-order delivery onto the highest-version
//! state — the 409 is then treated as success by the reconciler.

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::messaging::message::{VisibilityMessage, VisibilityMessageType};

/// Document version written for `Open` messages.
pub const VERSION_FOR_OPEN: i64 = 10;
/// Document version written for `Closed` messages.
pub const VERSION_FOR_CLOSE: i64 = 20;
/// Document version written for `Delete` messages.
pub const VERSION_FOR_DELETE: i64 = 30;
/// Elasticsearch external version type.
pub const VERSION_TYPE_EXTERNAL: &str = "external";

/// Version the document takes for a message type.
pub fn doc_version_for(msg_type: VisibilityMessageType) -> i64 {
    match msg_type {
        VisibilityMessageType::Open => VERSION_FOR_OPEN,
        VisibilityMessageType::Closed => VERSION_FOR_CLOSE,
        VisibilityMessageType::Delete => VERSION_FOR_DELETE,
    }
}

/// Inverse of [`doc_version_for`]; `None` for unknown versions.
pub fn message_type_for_version(version: i64) -> Option<VisibilityMessageType> {
    match version {
        VERSION_FOR_OPEN => Some(VisibilityMessageType::Open),
        VERSION_FOR_CLOSE => Some(VisibilityMessageType::Closed),
        VERSION_FOR_DELETE => Some(VisibilityMessageType::Delete),
        _ => None,
    }
}

const OP_INDEX: &str = "index";
const OP_DELETE: &str = "delete";

/// Typed view of a bulk header line's value object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkHeader {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    pub version: i64,
    pub version_type: String,
}

/// One staged bulk operation.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkRequest {
    Index {
        index: String,
        doc_type: String,
        id: String,
        version: i64,
        version_type: String,
        doc: VisibilityMessage,
    },
    Delete {
        index: String,
        doc_type: String,
        id: String,
        version: i64,
        version_type: String,
    },
}

impl BulkRequest {
    pub fn index(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
        version: i64,
        doc: VisibilityMessage,
    ) -> Self {
        BulkRequest::Index {
            index: index.into(),
            doc_type: doc_type.into(),
            id: id.into(),
            version,
            version_type: VERSION_TYPE_EXTERNAL.to_string(),
            doc,
        }
    }

    pub fn delete(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
        version: i64,
    ) -> Self {
        BulkRequest::Delete {
            index: index.into(),
            doc_type: doc_type.into(),
            id: id.into(),
            version,
            version_type: VERSION_TYPE_EXTERNAL.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            BulkRequest::Index { id, .. } | BulkRequest::Delete { id, .. } => id,
        }
    }

    pub fn version(&self) -> i64 {
        match self {
            BulkRequest::Index { version, .. } | BulkRequest::Delete { version, .. } => *version,
        }
    }

    fn op_name(&self) -> &'static str {
        match self {
            BulkRequest::Index { .. } => OP_INDEX,
            BulkRequest::Delete { .. } => OP_DELETE,
        }
    }

    fn header(&self) -> BulkHeader {
        match self {
            BulkRequest::Index {
                index,
                doc_type,
                id,
                version,
                version_type,
                ..
            }
            | BulkRequest::Delete {
                index,
                doc_type,
                id,
                version,
                version_type,
            } => BulkHeader {
                index: index.clone(),
                id: id.clone(),
                doc_type: doc_type.clone(),
                version: *version,
                version_type: version_type.clone(),
            },
        }
    }

    /// Serialize to bulk framing: the header line, plus the document line
    /// for index operations.
    pub fn to_lines(&self) -> Result<Vec<String>, IndexerError> {
        let mut header_object = serde_json::Map::new();
        let header_value = serde_json::to_value(self.header())
            .map_err(|e| IndexerError::Serialization(e.to_string()))?;
        header_object.insert(self.op_name().to_string(), header_value);
        let header_line = serde_json::to_string(&serde_json::Value::Object(header_object))
            .map_err(|e| IndexerError::Serialization(e.to_string()))?;

        match self {
            BulkRequest::Index { doc, .. } => {
                let body_line = serde_json::to_string(doc)
                    .map_err(|e| IndexerError::Serialization(e.to_string()))?;
                Ok(vec![header_line, body_line])
            }
            BulkRequest::Delete { .. } => Ok(vec![header_line]),
        }
    }
}

/// Parse a header line into its operation name and typed header.
pub fn parse_bulk_header(line: &str) -> Result<(String, BulkHeader), IndexerError> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(line)
        .map_err(|e| IndexerError::MalformedFraming(format!("header parse: {e}")))?;
    if object.len() != 1 {
        return Err(IndexerError::MalformedFraming(format!(
            "header must have exactly one operation key, got {}",
            object.len()
        )));
    }
    let Some((op, value)) = object.into_iter().next() else {
        return Err(IndexerError::MalformedFraming("empty header object".to_string()));
    };
    let header: BulkHeader = serde_json::from_value(value)
        .map_err(|e| IndexerError::MalformedFraming(format!("header fields: {e}")))?;
    Ok((op, header))
}

/// Rebuild a [`BulkRequest`] from its framed lines. Index and delete
/// rebuild symmetrically, so failed deletes retry exactly like failed
/// index operations.
pub fn parse_bulk_lines(lines: &[String]) -> Result<BulkRequest, IndexerError> {
    let Some(header_line) = lines.first() else {
        return Err(IndexerError::MalformedFraming("empty request".to_string()));
    };
    let (op, header) = parse_bulk_header(header_line)?;

    match op.as_str() {
        OP_INDEX => {
            let Some(body_line) = lines.get(1) else {
                return Err(IndexerError::MalformedFraming(
                    "index operation missing document line".to_string(),
                ));
            };
            let doc: VisibilityMessage = serde_json::from_str(body_line)
                .map_err(|e| IndexerError::MalformedFraming(format!("document parse: {e}")))?;
            Ok(BulkRequest::Index {
                index: header.index,
                doc_type: header.doc_type,
                id: header.id,
                version: header.version,
                version_type: header.version_type,
                doc,
            })
        }
        OP_DELETE => Ok(BulkRequest::Delete {
            index: header.index,
            doc_type: header.doc_type,
            id: header.id,
            version: header.version,
            version_type: header.version_type,
        }),
        other => Err(IndexerError::MalformedFraming(format!(
            "unsupported bulk operation {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_doc() -> VisibilityMessage {
        VisibilityMessage::open("d1", "wf1", "run1", "OrderWorkflow", 42)
    }

    #[test]
    fn version_ladder_is_strictly_increasing() {
        assert!(VERSION_FOR_OPEN < VERSION_FOR_CLOSE);
        assert!(VERSION_FOR_CLOSE < VERSION_FOR_DELETE);
    }

    #[test]
    fn version_mapping_round_trips() {
        for msg_type in [
            VisibilityMessageType::Open,
            VisibilityMessageType::Closed,
            VisibilityMessageType::Delete,
        ] {
            assert_eq!(
                message_type_for_version(doc_version_for(msg_type)),
                Some(msg_type)
            );
        }
        assert_eq!(message_type_for_version(999), None);
    }

    #[test]
    fn index_request_round_trips_through_framing() {
        let request = BulkRequest::index("vis", "visibility", "run1", VERSION_FOR_OPEN, open_doc());
        let lines = request.to_lines().unwrap();
        assert_eq!(lines.len(), 2);

        let rebuilt = parse_bulk_lines(&lines).unwrap();
        assert_eq!(rebuilt, request);
    }

    #[test]
    fn delete_request_round_trips_through_framing() {
        let request = BulkRequest::delete("vis", "visibility", "run1", VERSION_FOR_DELETE);
        let lines = request.to_lines().unwrap();
        assert_eq!(lines.len(), 1);

        let rebuilt = parse_bulk_lines(&lines).unwrap();
        assert_eq!(rebuilt, request);
    }

    #[test]
    fn header_preserves_all_routing_fields() {
        let request = BulkRequest::index("vis", "visibility", "run1", VERSION_FOR_CLOSE, open_doc());
        let lines = request.to_lines().unwrap();
        let (op, header) = parse_bulk_header(&lines[0]).unwrap();

        assert_eq!(op, "index");
        assert_eq!(header.index, "vis");
        assert_eq!(header.id, "run1");
        assert_eq!(header.doc_type, "visibility");
        assert_eq!(header.version, VERSION_FOR_CLOSE);
        assert_eq!(header.version_type, "external");
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(parse_bulk_header("not json").is_err());
        assert!(parse_bulk_header(r#"{"index":{},"delete":{}}"#).is_err());
        assert!(parse_bulk_lines(&[]).is_err());
        assert!(parse_bulk_lines(&[
            r#"{"update":{"_index":"v","_id":"r","_type":"t","version":10,"version_type":"external"}}"#.to_string()
        ])
        .is_err());
    }

    #[test]
    fn index_without_document_line_is_rejected() {
        let request = BulkRequest::index("vis", "visibility", "run1", VERSION_FOR_OPEN, open_doc());
        let lines = request.to_lines().unwrap();
        assert!(parse_bulk_lines(&lines[..1]).is_err());
    }
}
