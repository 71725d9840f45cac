//! Durable history of completed tasks
//!
//! Records are written by the task manager once a task completes and are
//! read back to rebuild display-only history workers.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use snapx::history::{HistoryStore, HistorySink};
//!
//! let store = HistoryStore::open("data/history")?;
//! store.append_history_item(&item)?;
//! let newest = store.recent(20)?;
//! ```

pub mod error;
pub mod item;
pub mod partitions;
pub mod store;

pub use error::{HistoryError, Result};
pub use item::HistoryItem;
pub use store::HistoryStore;

/// Destination for completed task records
///
/// Calls may block; the task manager runs them on the blocking pool.
pub trait HistorySink: Send + Sync {
    fn append_history_item(&self, item: &HistoryItem) -> Result<()>;

    /// Newest records first; sinks that cannot read back return nothing
    fn recent_history_items(&self, _limit: usize) -> Result<Vec<HistoryItem>> {
        Ok(Vec::new())
    }
}
