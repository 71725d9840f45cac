//! Pipeline counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters recorded by the task manager
#[derive(Debug, Default)]
pub struct Metrics {
    tasks_started: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_stopped: AtomicU64,
    history_appended: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_started(&self) {
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_started", "Metric incremented");
    }

    pub fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_completed", "Metric incremented");
    }

    pub fn task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_failed", "Metric incremented");
    }

    pub fn task_stopped(&self) {
        self.tasks_stopped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_stopped", "Metric incremented");
    }

    pub fn history_appended(&self) {
        self.history_appended.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "history_appended", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_started: self.tasks_started.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_stopped: self.tasks_stopped.load(Ordering::Relaxed),
            history_appended: self.history_appended.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tasks_started: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_stopped: u64,
    pub history_appended: u64,
}

impl MetricsSnapshot {
    /// Tasks that reached a terminal state
    pub fn finished(&self) -> u64 {
        self.tasks_completed + self.tasks_failed + self.tasks_stopped
    }
}
