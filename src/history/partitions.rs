//! Key layout for the history partition
//!
//! - `history`: {task_id as 16 raw bytes} -> HistoryItem (JSON)
//!
//! Task ids are UUIDv7, so byte order is creation order and a reverse scan
//! yields the newest records first.

use crate::task::TaskId;

pub const HISTORY_PARTITION: &str = "history";

/// Encode a history key from a task id
pub fn encode_history_key(id: &TaskId) -> Vec<u8> {
    id.as_uuid().as_bytes().to_vec()
}

/// Decode a history key back into a task id
pub fn decode_history_key(key: &[u8]) -> Option<TaskId> {
    let bytes: [u8; 16] = key.try_into().ok()?;
    Some(TaskId::from(uuid::Uuid::from_bytes(bytes)))
}
