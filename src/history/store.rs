use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};

use crate::task::TaskId;

use super::HistorySink;
use super::error::{HistoryError, Result};
use super::item::HistoryItem;
use super::partitions::{HISTORY_PARTITION, decode_history_key, encode_history_key};

/// Fjall-backed append-only store of completed task records
#[derive(Clone)]
pub struct HistoryStore {
    keyspace: Keyspace,
    items: PartitionHandle,
}

impl HistoryStore {
    /// Open or create a history store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening history store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let items = keyspace.open_partition(HISTORY_PARTITION, PartitionCreateOptions::default())?;

        Ok(Self { keyspace, items })
    }

    /// Store a record; writing the same task twice keeps a single entry
    pub fn append(&self, item: &HistoryItem) -> Result<()> {
        let key = encode_history_key(&item.id);
        let value = serde_json::to_vec(item)?;
        self.items.insert(key, value)?;
        debug!(task_id = %item.id, "Appended history item");
        Ok(())
    }

    pub fn get(&self, id: &TaskId) -> Result<Option<HistoryItem>> {
        match self.items.get(encode_history_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Newest records first
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryItem>> {
        let mut items = Vec::with_capacity(limit.min(256));
        for entry in self.items.iter().rev().take(limit) {
            let (key, value) = entry?;
            if decode_history_key(&key).is_none() {
                return Err(HistoryError::InvalidKey(format!("{:?}", &*key)));
            }
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.items.len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.items.is_empty()?)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

impl HistorySink for HistoryStore {
    fn append_history_item(&self, item: &HistoryItem) -> Result<()> {
        self.append(item)?;
        self.persist()
    }

    fn recent_history_items(&self, limit: usize) -> Result<Vec<HistoryItem>> {
        self.recent(limit)
    }
}
