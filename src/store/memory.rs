use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use ulid::Ulid;
use uuid::Uuid;

use super::{Document, ID_FIELD, ReservationStore, StoreError, matches_reservation_id};

/// In-memory document store for tests and ephemeral runs. Same observable
/// semantics as `DiskStore`, no durability.
#[derive(Default)]
pub struct MemoryStore {
    documents: DashMap<String, Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document as-is, bypassing `create`. Test hook for seeding
    /// data the service would refuse to write (e.g. corrupt documents).
    pub fn insert_raw(&self, mut doc: Document) -> String {
        let store_id = Ulid::new().to_string();
        if let Value::Object(fields) = &mut doc {
            fields.insert(ID_FIELD.to_string(), Value::String(store_id.clone()));
        }
        self.documents.insert(store_id.clone(), doc);
        store_id
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn create(&self, mut doc: Document) -> Result<Document, StoreError> {
        let store_id = Ulid::new().to_string();
        match &mut doc {
            Value::Object(fields) => {
                fields.insert(ID_FIELD.to_string(), Value::String(store_id.clone()));
            }
            _ => return Err(StoreError::Io("document must be a JSON object".into())),
        }
        self.documents.insert(store_id, doc.clone());
        Ok(doc)
    }

    async fn find_by_reservation_id(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        let id = id.to_string();
        Ok(self
            .documents
            .iter()
            .find(|entry| matches_reservation_id(entry.value(), &id))
            .map(|entry| entry.value().clone()))
    }

    async fn find_all(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .documents
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn delete_by_reservation_id(&self, id: Uuid) -> Result<u64, StoreError> {
        let id = id.to_string();
        let store_ids: Vec<String> = self
            .documents
            .iter()
            .filter(|entry| matches_reservation_id(entry.value(), &id))
            .map(|entry| entry.key().clone())
            .collect();

        let mut deleted = 0;
        for store_id in store_ids {
            if self.documents.remove(&store_id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
