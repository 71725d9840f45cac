use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::Worker;
use super::events::{UploadProgress, WorkerEventKind};
use crate::task::TaskStatus;
use crate::uploaders::ProgressSink;

#[derive(Default)]
struct ReporterState {
    last_emit: Option<Instant>,
    pending: Option<UploadProgress>,
    final_sent: bool,
}

/// Forwards backend progress as rate-limited worker events
///
/// At most one event per `interval`, plus the final report once the payload
/// is fully sent.
pub struct ProgressReporter {
    worker: Worker,
    interval: Duration,
    started: Instant,
    state: Mutex<ReporterState>,
}

impl ProgressReporter {
    pub fn new(worker: Worker, interval: Duration) -> Self {
        Self {
            worker,
            interval,
            started: Instant::now(),
            state: Mutex::new(ReporterState::default()),
        }
    }

    /// Flush the latest swallowed report, if any
    pub fn finish(&self) {
        let pending = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.final_sent {
                None
            } else {
                state.final_sent = true;
                state.pending.take()
            }
        };
        if let Some(progress) = pending {
            self.emit(progress);
        }
    }

    fn emit(&self, progress: UploadProgress) {
        if self.worker.status() == TaskStatus::Working {
            self.worker
                .emit(WorkerEventKind::UploadProgressChanged(progress));
        }
    }
}

impl ProgressSink for ProgressReporter {
    fn report(&self, position: u64, total: Option<u64>) {
        let now = Instant::now();
        let progress = UploadProgress {
            position,
            length: total,
            elapsed: now.duration_since(self.started),
        };

        let send = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.final_sent {
                false
            } else {
                let due = state
                    .last_emit
                    .is_none_or(|last| now.duration_since(last) >= self.interval);
                if due || progress.is_complete() {
                    state.last_emit = Some(now);
                    state.pending = None;
                    state.final_sent = progress.is_complete();
                    true
                } else {
                    state.pending = Some(progress);
                    false
                }
            }
        };

        if send {
            self.emit(progress);
        }
    }
}
