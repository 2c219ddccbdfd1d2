use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};
use ulid::Ulid;
use uuid::Uuid;

use crate::observability;

use super::oplog::Oplog;
use super::{Document, ID_FIELD, LogRecord, ReservationStore, StoreError, matches_reservation_id};

// ── Group-commit oplog channel ────────────────────────────

pub(super) enum LogCommand {
    Append {
        record: LogRecord,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        records: Vec<LogRecord>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the oplog and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn log_writer_loop(mut log: Oplog, mut rx: mpsc::Receiver<LogCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            LogCommand::Append { record, response } => {
                let mut batch = vec![(record, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(LogCommand::Append { record, response }) => {
                            batch.push((record, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut log, &mut batch);
                            handle_non_append(&mut log, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut log, &mut batch);
                }
            }
            other => handle_non_append(&mut log, other),
        }
    }
}

fn flush_and_respond(log: &mut Oplog, batch: &mut Vec<(LogRecord, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(observability::OPLOG_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(log, batch);
    metrics::histogram!(observability::OPLOG_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(
    log: &mut Oplog,
    batch: &mut [(LogRecord, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (record, _) in batch.iter() {
        if let Err(e) = log.append_buffered(record) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = log.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(
    batch: &mut Vec<(LogRecord, oneshot::Sender<io::Result<()>>)>,
    result: &io::Result<()>,
) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(log: &mut Oplog, cmd: LogCommand) {
    match cmd {
        LogCommand::Compact { records, response } => {
            let result = Oplog::write_compact_file(log.path(), &records)
                .and_then(|()| log.swap_compact_file());
            let _ = response.send(result);
        }
        LogCommand::AppendsSinceCompact { response } => {
            let _ = response.send(log.appends_since_compact());
        }
        LogCommand::Append { .. } => unreachable!(),
    }
}

/// Durable document store: an in-memory map of JSON documents backed by an
/// append-only oplog replayed at startup. Store ids are ULID strings.
pub struct DiskStore {
    documents: DashMap<String, Document>,
    log_tx: mpsc::Sender<LogCommand>,
}

impl DiskStore {
    /// Open (or create) the store at `path`, replaying the oplog into memory.
    /// Must be called from within a tokio runtime — the oplog writer task is
    /// spawned here.
    pub fn open(path: PathBuf) -> io::Result<Self> {
        let records = Oplog::replay(&path)?;
        let log = Oplog::open(&path)?;
        let (log_tx, log_rx) = mpsc::channel(4096);
        tokio::spawn(log_writer_loop(log, log_rx));

        let documents = DashMap::new();
        for record in records {
            match record {
                LogRecord::Insert { doc } => {
                    let store_id = match doc.get(ID_FIELD).and_then(|v| v.as_str()) {
                        Some(id) => id.to_string(),
                        None => continue, // replay: insert without a store id, skip
                    };
                    documents.insert(store_id, doc);
                }
                LogRecord::Delete { store_id } => {
                    documents.remove(&store_id);
                }
            }
        }

        Ok(Self { documents, log_tx })
    }

    /// Write a record to the oplog via the background group-commit writer.
    async fn log_append(&self, record: LogRecord) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.log_tx
            .send(LogCommand::Append {
                record,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Unavailable("oplog writer shut down"))?;
        rx.await
            .map_err(|_| StoreError::Unavailable("oplog writer dropped response"))?
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    /// Appends since the last compaction, or None if the writer is gone.
    pub async fn appends_since_compact(&self) -> Option<u64> {
        let (tx, rx) = oneshot::channel();
        self.log_tx
            .send(LogCommand::AppendsSinceCompact { response: tx })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Rewrite the oplog from the live document set.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let records: Vec<LogRecord> = self
            .documents
            .iter()
            .map(|entry| LogRecord::Insert {
                doc: entry.value().clone(),
            })
            .collect();
        let (tx, rx) = oneshot::channel();
        self.log_tx
            .send(LogCommand::Compact {
                records,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Unavailable("oplog writer shut down"))?;
        rx.await
            .map_err(|_| StoreError::Unavailable("oplog writer dropped response"))?
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

#[async_trait]
impl ReservationStore for DiskStore {
    async fn create(&self, mut doc: Document) -> Result<Document, StoreError> {
        let store_id = Ulid::new().to_string();
        match &mut doc {
            Value::Object(fields) => {
                fields.insert(ID_FIELD.to_string(), Value::String(store_id.clone()));
            }
            _ => return Err(StoreError::Io("document must be a JSON object".into())),
        }
        self.log_append(LogRecord::Insert { doc: doc.clone() }).await?;
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
            self.log_append(LogRecord::Delete {
                store_id: store_id.clone(),
            })
            .await?;
            if self.documents.remove(&store_id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.log_tx.is_closed() {
            return Err(StoreError::Unavailable("oplog writer shut down"));
        }
        Ok(())
    }
}

/// Background task that compacts the oplog once enough appends accumulate.
pub async fn run_compactor(store: Arc<DiskStore>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        match store.appends_since_compact().await {
            Some(appends) if appends >= threshold => match store.compact().await {
                Ok(()) => info!("compacted oplog after {appends} appends"),
                Err(e) => warn!("oplog compaction failed: {e}"),
            },
            Some(_) => {}
            None => return, // writer gone — nothing left to compact
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_store_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("innkeeper_test_disk");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn doc(reservation_id: Uuid) -> Document {
        json!({
            "reservation_id": reservation_id,
            "room_id": "A",
            "room_count": 1,
        })
    }

    #[tokio::test]
    async fn create_assigns_store_id() {
        let store = DiskStore::open(test_store_path("create.oplog")).unwrap();
        let id = Uuid::new_v4();

        let stored = store.create(doc(id)).await.unwrap();
        let store_id = stored.get(ID_FIELD).and_then(|v| v.as_str()).unwrap();
        assert!(!store_id.is_empty());

        let found = store.find_by_reservation_id(id).await.unwrap().unwrap();
        assert_eq!(found, stored);
    }

    #[tokio::test]
    async fn create_rejects_non_object() {
        let store = DiskStore::open(test_store_path("non_object.oplog")).unwrap();
        let result = store.create(json!("not an object")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn find_all_returns_everything() {
        let store = DiskStore::open(test_store_path("find_all.oplog")).unwrap();
        for _ in 0..3 {
            store.create(doc(Uuid::new_v4())).await.unwrap();
        }
        assert_eq!(store.find_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn delete_reports_count() {
        let store = DiskStore::open(test_store_path("delete.oplog")).unwrap();
        let id = Uuid::new_v4();
        store.create(doc(id)).await.unwrap();

        assert_eq!(store.delete_by_reservation_id(id).await.unwrap(), 1);
        assert_eq!(store.delete_by_reservation_id(id).await.unwrap(), 0);
        assert!(store.find_by_reservation_id(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reopen_replays_documents() {
        let path = test_store_path("reopen.oplog");
        let kept = Uuid::new_v4();
        let removed = Uuid::new_v4();

        {
            let store = DiskStore::open(path.clone()).unwrap();
            store.create(doc(kept)).await.unwrap();
            store.create(doc(removed)).await.unwrap();
            store.delete_by_reservation_id(removed).await.unwrap();
        }

        let store = DiskStore::open(path).unwrap();
        assert_eq!(store.document_count(), 1);
        assert!(store.find_by_reservation_id(kept).await.unwrap().is_some());
        assert!(store.find_by_reservation_id(removed).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn compaction_preserves_state() {
        let path = test_store_path("compaction.oplog");
        let kept = Uuid::new_v4();

        let store = DiskStore::open(path.clone()).unwrap();
        store.create(doc(kept)).await.unwrap();
        for _ in 0..10 {
            let churn = Uuid::new_v4();
            store.create(doc(churn)).await.unwrap();
            store.delete_by_reservation_id(churn).await.unwrap();
        }

        let before = std::fs::metadata(&path).unwrap().len();
        store.compact().await.unwrap();
        let after = std::fs::metadata(&path).unwrap().len();
        assert!(after < before);

        drop(store);
        let reopened = DiskStore::open(path).unwrap();
        assert_eq!(reopened.document_count(), 1);
        assert!(reopened.find_by_reservation_id(kept).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn ping_reports_live_writer() {
        let store = DiskStore::open(test_store_path("ping.oplog")).unwrap();
        assert!(store.ping().await.is_ok());
    }
}
