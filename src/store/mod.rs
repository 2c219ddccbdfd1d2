mod disk;
mod memory;
mod oplog;

pub use disk::{DiskStore, run_compactor};
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reservation document as the store sees it: schemaless JSON. The service
/// parses documents into typed records and owns what happens when one
/// doesn't parse.
pub type Document = serde_json::Value;

/// Store-assigned document id field.
pub const ID_FIELD: &str = "_id";

/// Filter field for the by-reservation operations.
pub const RESERVATION_ID_FIELD: &str = "reservation_id";

#[derive(Debug)]
pub enum StoreError {
    Io(String),
    Unavailable(&'static str),
    Timeout,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "store I/O failure: {e}"),
            StoreError::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
            StoreError::Timeout => write!(f, "store operation timed out"),
        }
    }
}

impl std::error::Error for StoreError {}

/// The document-collection operations the reservation service needs.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Persist a new document, assigning its store id. Returns the document
    /// as stored.
    async fn create(&self, doc: Document) -> Result<Document, StoreError>;

    /// The document whose `reservation_id` field matches `id`, if any.
    async fn find_by_reservation_id(&self, id: Uuid) -> Result<Option<Document>, StoreError>;

    /// Every document in the collection.
    async fn find_all(&self) -> Result<Vec<Document>, StoreError>;

    /// Delete documents whose `reservation_id` field matches `id`.
    /// Returns the deleted count (0 or 1 in practice).
    async fn delete_by_reservation_id(&self, id: Uuid) -> Result<u64, StoreError>;

    /// Cheap connectivity probe, used at startup.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Oplog record format — every mutation is one appended record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogRecord {
    Insert { doc: Document },
    Delete { store_id: String },
}

fn matches_reservation_id(doc: &Document, id: &str) -> bool {
    doc.get(RESERVATION_ID_FIELD)
        .and_then(|v| v.as_str())
        .is_some_and(|s| s == id)
}
