//! Task manager
//!
//! Owns the worker registry and admission control. Workers report to one
//! unbounded event channel drained by a single processor task, which applies
//! the completion side effects (history, recent list, notifications, settings
//! flush) and then re-runs queue progression.
//!
//! ## Admission
//!
//! At most `upload_limit` workers are Preparing, Working or Stopping at once
//! (0 means unlimited). Queued workers start in registration order. Workers
//! removed while still active keep counting toward the limit until they
//! reach a terminal state.

mod policy;
mod recent;

pub use policy::HistoryPolicy;
pub use recent::RecentTaskManager;

use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::SettingsPersister;
use crate::history::{HistoryItem, HistorySink};
use crate::humanize::format_duration;
use crate::notify::{LogNotifier, NotificationSound, Notifier};
use crate::observability::{Metrics, MetricsSnapshot};
use crate::task::{AfterUploadTask, TaskId, TaskJob, TaskStatus};
use crate::worker::{Worker, WorkerContext, WorkerEvent, WorkerEventKind};

const OBSERVER_CAPACITY: usize = 256;

struct ManagerInner {
    registry: Mutex<Vec<Worker>>,
    /// Removed from the registry but not yet terminal
    draining: Mutex<Vec<Worker>>,
    upload_limit: usize,
    context: Arc<WorkerContext>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    observers: broadcast::Sender<WorkerEvent>,
    history: Option<Arc<dyn HistorySink>>,
    policy: HistoryPolicy,
    notifier: Arc<dyn Notifier>,
    settings: Option<Arc<dyn SettingsPersister>>,
    recent: RecentTaskManager,
    metrics: Arc<Metrics>,
    /// Managed workers that have not reported `TaskCompleted` yet
    outstanding: watch::Sender<usize>,
}

/// Registry and scheduler for task workers
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<ManagerInner>,
}

#[bon::bon]
impl TaskManager {
    /// Build the manager and spawn its event processor
    ///
    /// Must be called inside a tokio runtime.
    #[builder]
    pub fn new(
        context: Arc<WorkerContext>,
        #[builder(default)] upload_limit: usize,
        history: Option<Arc<dyn HistorySink>>,
        #[builder(default)] policy: HistoryPolicy,
        #[builder(default = Arc::new(LogNotifier) as Arc<dyn Notifier>)]
        notifier: Arc<dyn Notifier>,
        settings: Option<Arc<dyn SettingsPersister>>,
        #[builder(default = 10)] recent_capacity: usize,
        #[builder(default)] metrics: Arc<Metrics>,
    ) -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        let (observers, _) = broadcast::channel(OBSERVER_CAPACITY);
        let (outstanding, _) = watch::channel(0);

        let inner = Arc::new(ManagerInner {
            registry: Mutex::new(Vec::new()),
            draining: Mutex::new(Vec::new()),
            upload_limit,
            context,
            events,
            observers,
            history,
            policy,
            notifier,
            settings,
            recent: RecentTaskManager::new(recent_capacity),
            metrics,
            outstanding,
        });

        tokio::spawn(process_events(Arc::downgrade(&inner), receiver));
        info!(upload_limit, "Task manager started");

        Self { inner }
    }
}

impl TaskManager {
    /// Register a worker and start it when admission allows
    ///
    /// History workers are only listed. Any other worker must still be
    /// queued; it is subscribed to the manager's event channel.
    pub async fn start(&self, worker: Worker) {
        let status = worker.status();
        if status == TaskStatus::History {
            self.inner.registry.lock().await.push(worker);
            return;
        }
        if status != TaskStatus::InQueue {
            warn!(task_id = %worker.id(), %status, "Refusing to manage a worker that is not queued");
            return;
        }

        {
            let mut registry = self.inner.registry.lock().await;
            if registry.iter().any(|w| w.id() == worker.id()) {
                warn!(task_id = %worker.id(), "Worker already registered");
                return;
            }
            if !worker.subscribe(self.inner.events.clone()) {
                warn!(task_id = %worker.id(), "Worker is subscribed to another manager");
                return;
            }
            self.inner.outstanding.send_modify(|n| *n += 1);
            // Queued before any progression can see the worker
            worker.emit(WorkerEventKind::StatusChanged(TaskStatus::InQueue));
            registry.push(worker.clone());
        }

        debug!(task_id = %worker.id(), "Task queued");
        self.inner.progress().await;
    }

    /// Cancel a worker and drop it from the registry
    ///
    /// Returns false when the worker was not registered.
    pub async fn remove(&self, worker: &Worker) -> bool {
        {
            let mut registry = self.inner.registry.lock().await;
            let Some(index) = registry.iter().position(|w| w.is_same(worker)) else {
                return false;
            };
            let removed = registry.remove(index);
            if removed.status().is_active() {
                self.inner.draining.lock().await.push(removed);
            }
        }

        debug!(task_id = %worker.id(), "Task removed");
        worker.stop().await;
        worker.release_image();
        self.inner.recent.remove(worker.id());
        true
    }

    /// Request cancellation of every registered worker without waiting
    pub async fn stop_all_tasks(&self) {
        let workers = self.workers().await;
        info!(count = workers.len(), "Stopping all tasks");
        for worker in workers {
            worker.stop().await;
        }
    }

    /// Start as many queued workers as the limit allows
    pub async fn progress(&self) {
        self.inner.progress().await;
    }

    /// Observe every worker event after the manager handled it
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.inner.observers.subscribe()
    }

    /// Register the newest history records as display-only workers
    pub async fn load_history(&self, limit: usize) -> usize {
        let Some(history) = self.inner.history.clone() else {
            return 0;
        };

        let items = match tokio::task::spawn_blocking(move || history.recent_history_items(limit))
            .await
        {
            Ok(Ok(items)) => items,
            Ok(Err(e)) => {
                error!(error = %e, "Failed to load history");
                return 0;
            }
            Err(e) => {
                error!(error = %e, "History loader panicked");
                return 0;
            }
        };

        let count = items.len();
        let mut registry = self.inner.registry.lock().await;
        for item in items.into_iter().rev() {
            if registry.iter().any(|w| w.id() == item.id) {
                continue;
            }
            registry.push(Worker::from_history(item));
        }
        debug!(count, "History loaded");
        count
    }

    /// Wait until every managed worker finished and its completion was handled
    pub async fn wait_idle(&self) {
        let mut outstanding = self.inner.outstanding.subscribe();
        let _ = outstanding.wait_for(|n| *n == 0).await;
    }

    pub async fn workers(&self) -> Vec<Worker> {
        self.inner.registry.lock().await.clone()
    }

    pub async fn get(&self, id: TaskId) -> Option<Worker> {
        self.inner
            .registry
            .lock()
            .await
            .iter()
            .find(|w| w.id() == id)
            .cloned()
    }

    /// Workers counted against the limit, including removed ones
    pub async fn working_count(&self) -> usize {
        let registry = self.inner.registry.lock().await;
        let draining = self.inner.draining.lock().await;
        active_count(&registry, &draining)
    }

    pub async fn queued_count(&self) -> usize {
        self.inner
            .registry
            .lock()
            .await
            .iter()
            .filter(|w| w.status() == TaskStatus::InQueue)
            .count()
    }

    pub fn recent(&self) -> &RecentTaskManager {
        &self.inner.recent
    }

    pub fn upload_limit(&self) -> usize {
        self.inner.upload_limit
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl ManagerInner {
    async fn progress(&self) {
        let registry = self.registry.lock().await;
        let working = {
            let draining = self.draining.lock().await;
            active_count(&registry, &draining)
        };

        let queued: Vec<&Worker> = registry
            .iter()
            .filter(|w| w.status() == TaskStatus::InQueue)
            .collect();
        let admit = admittable(self.upload_limit, working, queued.len());
        if admit == 0 {
            return;
        }

        for worker in queued.into_iter().take(admit) {
            if worker.start(self.context.clone()) {
                self.metrics.task_started();
                debug!(task_id = %worker.id(), working, "Task admitted");
            }
        }
    }

    async fn handle(&self, event: &WorkerEvent) {
        let worker = &event.worker;
        match &event.kind {
            WorkerEventKind::StatusChanged(status) => {
                debug!(task_id = %worker.id(), %status, "Status changed");
            }
            WorkerEventKind::ImageReady(image) => {
                debug!(task_id = %worker.id(), size = image.len(), "Image ready");
            }
            WorkerEventKind::UploadStarted => {
                info!(task_id = %worker.id(), "Upload started");
            }
            WorkerEventKind::UploadProgressChanged(progress) => {
                debug!(
                    task_id = %worker.id(),
                    position = progress.position,
                    percentage = ?progress.percentage(),
                    "Upload progress"
                );
            }
            WorkerEventKind::UploadCompleted => {
                info!(task_id = %worker.id(), "Upload completed");
            }
            WorkerEventKind::TaskCompleted => self.task_completed(worker).await,
        }
    }

    async fn task_completed(&self, worker: &Worker) {
        let info = worker.info().await;
        let status = worker.status();

        match status {
            TaskStatus::Stopped => {
                self.metrics.task_stopped();
                info!(task_id = %info.id, job = ?info.job, "Task stopped");
            }
            TaskStatus::Failed => {
                self.metrics.task_failed();
                let title = info.result.first_error().unwrap_or("Task failed");
                error!(task_id = %info.id, job = ?info.job, error = title, "Task failed");
                self.notifier
                    .play_notification_sound(NotificationSound::Error)
                    .await;
                self.notifier
                    .show_error(title, &info.result.errors.join("\n"))
                    .await;
            }
            TaskStatus::Completed => {
                self.metrics.task_completed();
                let duration = info.task_duration().map(format_duration).unwrap_or_default();
                info!(
                    task_id = %info.id,
                    job = ?info.job,
                    %duration,
                    url = info.result.best_url().unwrap_or_default(),
                    "Task completed"
                );

                if self.policy.should_record(&info) {
                    self.append_history(HistoryItem::from_task(&info)).await;
                }
                self.recent.add(worker.clone());

                if info.job != TaskJob::ShareUrl {
                    let sound = if info.is_upload_job() {
                        NotificationSound::TaskCompleted
                    } else {
                        NotificationSound::ActionCompleted
                    };
                    self.notifier.play_notification_sound(sound).await;

                    if info
                        .settings
                        .has_after_upload(AfterUploadTask::ShowAfterUploadWindow)
                        && info.is_upload_job()
                    {
                        self.notifier.show_after_upload(&info).await;
                    }
                }
            }
            other => {
                warn!(task_id = %info.id, status = %other, "Completion reported for a non-terminal task");
            }
        }

        self.draining
            .lock()
            .await
            .retain(|w| !w.status().is_terminal());
        self.progress().await;
    }

    /// Last step for a completion, once observers saw it
    async fn settle(&self) {
        let remaining = self.outstanding.borrow().saturating_sub(1);
        if remaining == 0 {
            self.save_settings().await;
        }
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }

    async fn append_history(&self, item: HistoryItem) {
        let Some(history) = self.history.clone() else {
            return;
        };

        let id = item.id;
        match tokio::task::spawn_blocking(move || history.append_history_item(&item)).await {
            Ok(Ok(())) => {
                self.metrics.history_appended();
                debug!(task_id = %id, "History item appended");
            }
            Ok(Err(e)) => error!(task_id = %id, error = %e, "Failed to append history"),
            Err(e) => error!(task_id = %id, error = %e, "History writer panicked"),
        }
    }

    async fn save_settings(&self) {
        if let Some(settings) = &self.settings {
            if let Err(e) = settings.save_all_settings().await {
                error!(error = %e, "Failed to save settings");
            }
        }
    }
}

async fn process_events(
    manager: Weak<ManagerInner>,
    mut events: mpsc::UnboundedReceiver<WorkerEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = manager.upgrade() else {
            break;
        };
        inner.handle(&event).await;
        let completed = matches!(event.kind, WorkerEventKind::TaskCompleted);
        let _ = inner.observers.send(event);
        if completed {
            inner.settle().await;
        }
    }
    debug!("Task manager event loop stopped");
}

fn active_count(registry: &[Worker], draining: &[Worker]) -> usize {
    registry
        .iter()
        .chain(draining)
        .filter(|w| w.status().is_active())
        .count()
}

/// Workers to start now; `limit == 0` admits everything queued
fn admittable(limit: usize, working: usize, queued: usize) -> usize {
    if limit == 0 {
        queued
    } else {
        limit.saturating_sub(working).min(queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admittable() {
        assert_eq!(admittable(0, 7, 15), 15);
        assert_eq!(admittable(3, 0, 15), 3);
        assert_eq!(admittable(3, 2, 15), 1);
        assert_eq!(admittable(3, 3, 15), 0);
        assert_eq!(admittable(3, 5, 15), 0);
        assert_eq!(admittable(3, 0, 1), 1);
    }
}
