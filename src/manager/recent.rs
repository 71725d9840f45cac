use std::collections::VecDeque;
use std::sync::Mutex;

use crate::task::TaskId;
use crate::worker::Worker;

/// Bounded most-recently-used list of completed workers, newest first
pub struct RecentTaskManager {
    capacity: usize,
    items: Mutex<VecDeque<Worker>>,
}

impl RecentTaskManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Add `worker` at the front; an existing entry with the same id moves
    pub fn add(&self, worker: Worker) {
        if self.capacity == 0 {
            return;
        }

        let mut items = self.lock();
        items.retain(|w| w.id() != worker.id());
        items.push_front(worker);
        items.truncate(self.capacity);
    }

    pub fn remove(&self, id: TaskId) -> bool {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|w| w.id() != id);
        items.len() != before
    }

    pub fn items(&self) -> Vec<Worker> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Worker>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}
