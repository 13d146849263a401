use crux_core::capability::{Capability, CapabilityContext, Operation};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::event::Event;

/// Access to a remote document collection hosted by the shell's backend
/// client. The core never sees the wire protocol, only these operations.
pub struct Documents<Ev> {
    context: CapabilityContext<DocumentOperation, Ev>,
}

impl<Ev> Capability<Ev> for Documents<Ev> {
    type Operation = DocumentOperation;
    type MappedSelf<MappedEv> = Documents<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Documents::new(self.context.map_event(f))
    }
}

impl<Ev> Documents<Ev>
where
    Ev: Send + 'static,
{
    pub fn new(context: CapabilityContext<DocumentOperation, Ev>) -> Self {
        Self { context }
    }

    /// Registers a persistent listener. The shell answers with the full
    /// current document set on every change, or an error on transport failure.
    pub fn subscribe<F>(&self, collection: impl Into<String>, make_event: F)
    where
        F: Fn(DocumentResult) -> Ev + Send + Sync + 'static,
    {
        let ctx = self.context.clone();
        let operation = DocumentOperation::Subscribe {
            collection: collection.into(),
        };
        self.context.spawn(async move {
            let mut snapshots = ctx.stream_from_shell(operation);
            while let Some(result) = snapshots.next().await {
                ctx.update_app(make_event(result));
            }
        });
    }

    /// Upserts the document at `key`.
    pub fn set<F>(
        &self,
        collection: impl Into<String>,
        key: impl Into<String>,
        fields: Map<String, Value>,
        make_event: F,
    ) where
        F: FnOnce(DocumentResult) -> Ev + Send + 'static,
    {
        self.request(
            DocumentOperation::Set {
                collection: collection.into(),
                key: key.into(),
                fields,
            },
            make_event,
        );
    }

    pub fn delete<F>(&self, collection: impl Into<String>, key: impl Into<String>, make_event: F)
    where
        F: FnOnce(DocumentResult) -> Ev + Send + 'static,
    {
        self.request(
            DocumentOperation::Delete {
                collection: collection.into(),
                key: key.into(),
            },
            make_event,
        );
    }

    /// Applies all writes atomically: either every write lands or none does.
    pub fn commit<F>(&self, collection: impl Into<String>, writes: Vec<BatchWrite>, make_event: F)
    where
        F: FnOnce(DocumentResult) -> Ev + Send + 'static,
    {
        self.request(
            DocumentOperation::Commit {
                collection: collection.into(),
                writes,
            },
            make_event,
        );
    }

    fn request<F>(&self, operation: DocumentOperation, make_event: F)
    where
        F: FnOnce(DocumentResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(result));
        });
    }
}

pub type DocumentsCapability = Documents<Event>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DocumentOperation {
    Subscribe {
        collection: String,
    },
    Set {
        collection: String,
        key: String,
        fields: Map<String, Value>,
    },
    Delete {
        collection: String,
        key: String,
    },
    Commit {
        collection: String,
        writes: Vec<BatchWrite>,
    },
}

impl DocumentOperation {
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Subscribe { collection }
            | Self::Set { collection, .. }
            | Self::Delete { collection, .. }
            | Self::Commit { collection, .. } => collection,
        }
    }
}

impl Operation for DocumentOperation {
    type Output = DocumentResult;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "data")]
pub enum BatchWrite {
    Set {
        key: String,
        fields: Map<String, Value>,
    },
    Delete {
        key: String,
    },
}

/// A document as the backend delivers it: its key and a loosely typed field map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Document {
    pub key: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    #[must_use]
    pub fn new(key: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    /// Reads a string field. Missing fields and non-string values read as `""`.
    #[must_use]
    pub fn string_field(&self, name: &str) -> String {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentError {
    #[error("backend unavailable: {message}")]
    Unavailable { message: String },

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("document not found: {key}")]
    NotFound { key: String },

    #[error("write aborted: {message}")]
    Aborted { message: String },

    #[error("unknown backend error: {message}")]
    Unknown { message: String },
}

impl DocumentError {
    /// The backend's own description, without the variant prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Unavailable { message }
            | Self::PermissionDenied { message }
            | Self::Aborted { message }
            | Self::Unknown { message } => message,
            Self::NotFound { key } => key,
        }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum DocumentOutput {
    Snapshot(Vec<Document>),
    Written,
    Deleted,
    Committed,
}

pub type DocumentResult = Result<DocumentOutput, DocumentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn string_field_reads_strings() {
        let doc = Document::new("Kelowna", fields(json!({"name": "Kelowna", "province": "BC"})));
        assert_eq!(doc.string_field("name"), "Kelowna");
        assert_eq!(doc.string_field("province"), "BC");
    }

    #[test]
    fn string_field_defaults_missing_and_wrong_shape() {
        let doc = Document::new("x", fields(json!({"name": 42, "other": "y"})));
        assert_eq!(doc.string_field("name"), "");
        assert_eq!(doc.string_field("province"), "");
    }

    #[test]
    fn document_deserializes_without_fields() {
        let doc: Document = serde_json::from_str(r#"{"key":"Victoria"}"#).unwrap();
        assert_eq!(doc.key, "Victoria");
        assert!(doc.fields.is_empty());
    }

    #[test]
    fn operation_exposes_collection() {
        let op = DocumentOperation::Delete {
            collection: "cities".into(),
            key: "Kelowna".into(),
        };
        assert_eq!(op.collection(), "cities");
    }

    #[test]
    fn error_message_strips_variant() {
        let err = DocumentError::PermissionDenied {
            message: "missing rules".into(),
        };
        assert_eq!(err.message(), "missing rules");
        assert_eq!(err.to_string(), "permission denied: missing rules");
    }

    #[test]
    fn batch_write_serializes_tagged() {
        let write = BatchWrite::Delete { key: "Kelowna".into() };
        let encoded = serde_json::to_value(&write).unwrap();
        assert_eq!(encoded, json!({"op": "Delete", "data": {"key": "Kelowna"}}));
    }
}
