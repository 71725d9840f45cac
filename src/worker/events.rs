use bytes::Bytes;
use std::time::Duration;

use super::Worker;
use crate::task::TaskStatus;

/// Snapshot of upload progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadProgress {
    pub position: u64,
    pub length: Option<u64>,
    pub elapsed: Duration,
}

impl UploadProgress {
    pub fn percentage(&self) -> Option<f64> {
        match self.length {
            Some(0) => Some(100.0),
            Some(length) => Some(self.position as f64 * 100.0 / length as f64),
            None => None,
        }
    }

    /// Bytes per second since the upload started
    pub fn speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.position as f64 / secs
        } else {
            0.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.length.is_some_and(|length| self.position >= length)
    }
}

#[derive(Debug, Clone)]
pub enum WorkerEventKind {
    StatusChanged(TaskStatus),
    ImageReady(Bytes),
    UploadStarted,
    UploadProgressChanged(UploadProgress),
    UploadCompleted,
    /// Terminal notification, sent exactly once per worker
    TaskCompleted,
}

/// Lifecycle event emitted by a worker
#[derive(Debug, Clone)]
pub struct WorkerEvent {
    pub worker: Worker,
    pub kind: WorkerEventKind,
}
