//! Task workers
//!
//! A [`Worker`] owns one [`TaskInfo`] and its input payload, runs the stage
//! plan on its own tokio task and reports every lifecycle step as a
//! [`WorkerEvent`] on the channel it was subscribed to. Status changes are
//! compare-and-set on a `watch` channel, so each transition happens once and
//! its event is queued in transition order.
//!
//! Every stage is raced against the cancellation token, so a stop normally
//! ends the pipeline at its next await. The stop watchdog covers the rest: a
//! pipeline that cannot finish within the grace period (a stage that never
//! yields, or one waiting on the task record) is aborted and `Stopped` is
//! forced.

pub mod events;
pub mod http;
mod progress;
pub mod runner;

pub use events::{UploadProgress, WorkerEvent, WorkerEventKind};
pub use http::{DownloadError, HttpClient};
pub use progress::ProgressReporter;
pub use runner::TaskError;

use bon::Builder;
use bytes::Bytes;
use chrono::Utc;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::history::HistoryItem;
use crate::task::{
    DataType, StagePlan, TaskId, TaskInfo, TaskMetadata, TaskSettings, TaskStatus, UploadResult,
};
use crate::uploaders::UploaderRegistry;

pub type EventSender = mpsc::UnboundedSender<WorkerEvent>;

const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Shared services handed to a worker when it starts
#[derive(Builder)]
pub struct WorkerContext {
    #[builder(default)]
    pub uploaders: Arc<UploaderRegistry>,
    pub http: Arc<HttpClient>,
    /// Hard deadline between a stop request and a forced `Stopped`
    #[builder(default = DEFAULT_STOP_GRACE)]
    pub stop_grace: Duration,
    #[builder(default = Duration::from_millis(250))]
    pub progress_interval: Duration,
}

/// Input payload consumed by the preparing stages
#[derive(Debug, Clone)]
pub enum TaskInput {
    None,
    Image(Bytes),
    Data(Bytes),
    Text(String),
}

struct Shared {
    id: TaskId,
    info: RwLock<TaskInfo>,
    status: watch::Sender<TaskStatus>,
    plan: StagePlan,
    is_upload_job: bool,
    cancel: CancellationToken,
    input: Mutex<TaskInput>,
    image: Mutex<Option<Bytes>>,
    events: OnceLock<EventSender>,
    context: OnceLock<Arc<WorkerContext>>,
    abort: OnceLock<AbortHandle>,
    finished: AtomicBool,
    upload_started: AtomicBool,
    upload_completed: AtomicBool,
}

/// Cheaply cloneable handle to one task's pipeline
#[derive(Clone)]
pub struct Worker {
    inner: Arc<Shared>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish()
    }
}

impl Worker {
    pub fn new(info: TaskInfo, input: TaskInput) -> Self {
        let image = match &input {
            TaskInput::Image(bytes) => Some(bytes.clone()),
            _ => None,
        };
        Self::build(info, input, image, TaskStatus::InQueue)
    }

    /// Display-only worker rebuilt from a persisted record
    pub fn from_history(item: HistoryItem) -> Self {
        let mut info = TaskInfo::new(item.job, Arc::new(TaskSettings::default()));
        info.id = item.id;
        if let Some(path) = &item.file_path {
            info.set_file_path(path);
        }
        if info.file_name().is_none() && !item.file_name.is_empty() {
            info.set_file_name(item.file_name.clone());
        }
        info.data_type = item.data_type;
        info.metadata = TaskMetadata::from_tags(&item.tags);
        info.task_end_time = Some(item.date_time);
        info.status = item.host.clone();
        info.result = UploadResult {
            url: item.url,
            thumbnail_url: item.thumbnail_url,
            deletion_url: item.deletion_url,
            shortened_url: item.shortened_url,
            ..UploadResult::default()
        };

        let worker = Self::build(info, TaskInput::None, None, TaskStatus::History);
        worker.inner.finished.store(true, Ordering::SeqCst);
        worker
    }

    fn build(info: TaskInfo, input: TaskInput, image: Option<Bytes>, status: TaskStatus) -> Self {
        let plan = StagePlan::resolve(info.job, &info.settings);
        let (status, _) = watch::channel(status);

        Self {
            inner: Arc::new(Shared {
                id: info.id,
                is_upload_job: info.is_upload_job(),
                info: RwLock::new(info),
                status,
                plan,
                cancel: CancellationToken::new(),
                input: Mutex::new(input),
                image: Mutex::new(image),
                events: OnceLock::new(),
                context: OnceLock::new(),
                abort: OnceLock::new(),
                finished: AtomicBool::new(false),
                upload_started: AtomicBool::new(false),
                upload_completed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn status(&self) -> TaskStatus {
        *self.inner.status.borrow()
    }

    /// Receiver that observes every status change
    pub fn status_receiver(&self) -> watch::Receiver<TaskStatus> {
        self.inner.status.subscribe()
    }

    /// Snapshot of the task record
    pub async fn info(&self) -> TaskInfo {
        self.inner.info.read().await.clone()
    }

    pub async fn set_keep_image(&self, keep: bool) {
        self.inner.info.write().await.keep_image = keep;
    }

    pub fn plan(&self) -> &StagePlan {
        &self.inner.plan
    }

    pub fn is_upload_job(&self) -> bool {
        self.inner.is_upload_job
    }

    pub fn is_same(&self, other: &Worker) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Rendered image, until it is released
    pub fn image(&self) -> Option<Bytes> {
        lock(&self.inner.image).clone()
    }

    pub fn release_image(&self) {
        lock(&self.inner.image).take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Route lifecycle events to `events`; only the first subscription counts
    pub fn subscribe(&self, events: EventSender) -> bool {
        self.inner.events.set(events).is_ok()
    }

    /// Move `InQueue -> Preparing` and spawn the pipeline
    ///
    /// Returns false when the worker was not queued (already started,
    /// stopped or a history record).
    pub fn start(&self, context: Arc<WorkerContext>) -> bool {
        if !self.transition(TaskStatus::Preparing) {
            return false;
        }

        let _ = self.inner.context.set(context.clone());
        let worker = self.clone();
        let handle = tokio::spawn(async move { worker.run(context).await });
        let _ = self.inner.abort.set(handle.abort_handle());
        true
    }

    /// Request cancellation
    ///
    /// A queued worker stops immediately. An active worker moves to
    /// `Stopping` and has the grace period to wind down before its pipeline
    /// is aborted and `Stopped` is forced. Terminal workers are untouched.
    pub async fn stop(&self) {
        #[derive(PartialEq)]
        enum Action {
            Nothing,
            Dequeued,
            Cancel,
        }

        let mut action = Action::Nothing;
        self.inner.status.send_if_modified(|status| match *status {
            TaskStatus::InQueue => {
                *status = TaskStatus::Stopped;
                self.emit(WorkerEventKind::StatusChanged(TaskStatus::Stopped));
                action = Action::Dequeued;
                true
            }
            TaskStatus::Preparing | TaskStatus::Working => {
                *status = TaskStatus::Stopping;
                self.emit(WorkerEventKind::StatusChanged(TaskStatus::Stopping));
                action = Action::Cancel;
                true
            }
            _ => false,
        });

        match action {
            Action::Dequeued => {
                if !self.inner.finished.swap(true, Ordering::SeqCst) {
                    debug!(task_id = %self.id(), "Stopped before start");
                    self.close_record("Stopped").await;
                    self.emit(WorkerEventKind::TaskCompleted);
                }
            }
            Action::Cancel => {
                debug!(task_id = %self.id(), "Stop requested");
                self.inner.cancel.cancel();
                self.spawn_watchdog();
            }
            Action::Nothing => {}
        }
    }

    fn spawn_watchdog(&self) {
        let grace = self
            .inner
            .context
            .get()
            .map(|ctx| ctx.stop_grace)
            .unwrap_or(DEFAULT_STOP_GRACE);
        let mut status = self.status_receiver();
        let worker = self.clone();

        tokio::spawn(async move {
            let stopped = matches!(
                tokio::time::timeout(grace, status.wait_for(|s| s.is_terminal())).await,
                Ok(Ok(_))
            );
            if stopped || worker.inner.finished.swap(true, Ordering::SeqCst) {
                return;
            }

            warn!(task_id = %worker.id(), ?grace, "Worker ignored stop request, aborting");
            if let Some(handle) = worker.inner.abort.get() {
                handle.abort();
            }
            worker.finish_claimed(TaskStatus::Stopped).await;
        });
    }

    pub(crate) fn emit(&self, kind: WorkerEventKind) {
        if let Some(events) = self.inner.events.get() {
            let _ = events.send(WorkerEvent {
                worker: self.clone(),
                kind,
            });
        }
    }

    /// Compare-and-set against the transition table, emitting on success
    fn transition(&self, to: TaskStatus) -> bool {
        self.inner.status.send_if_modified(|current| {
            if TaskStatus::is_valid_transition(*current, to) {
                *current = to;
                self.emit(WorkerEventKind::StatusChanged(to));
                true
            } else {
                false
            }
        })
    }

    fn mark_upload_started(&self) {
        if !self.inner.upload_started.swap(true, Ordering::SeqCst) {
            self.emit(WorkerEventKind::UploadStarted);
        }
    }

    fn mark_upload_completed(&self) {
        if self.inner.upload_started.load(Ordering::SeqCst)
            && !self.inner.upload_completed.swap(true, Ordering::SeqCst)
        {
            self.emit(WorkerEventKind::UploadCompleted);
        }
    }

    fn take_input(&self) -> TaskInput {
        std::mem::replace(&mut *lock(&self.inner.input), TaskInput::None)
    }

    fn set_image(&self, image: Bytes) {
        *lock(&self.inner.image) = Some(image);
    }

    /// Finish once; later callers are ignored
    async fn finish(&self, terminal: TaskStatus) -> bool {
        if self.inner.finished.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.finish_claimed(terminal).await;
        true
    }

    async fn finish_claimed(&self, terminal: TaskStatus) {
        if terminal == TaskStatus::Stopped {
            // Cancellation observed without a prior stop request
            self.transition(TaskStatus::Stopping);
        }
        self.mark_upload_completed();

        let note = match terminal {
            TaskStatus::Completed => "Done",
            TaskStatus::Failed => "Error",
            _ => "Stopped",
        };
        self.close_record(note).await;

        if !self.transition(terminal) {
            let from = self.status();
            warn!(task_id = %self.id(), %from, to = %terminal, "Forcing terminal status");
            self.inner.status.send_modify(|status| *status = terminal);
            self.emit(WorkerEventKind::StatusChanged(terminal));
        }
        self.emit(WorkerEventKind::TaskCompleted);
    }

    async fn close_record(&self, note: &str) {
        let keep_image = {
            let mut info = self.inner.info.write().await;
            info.task_end_time = Some(Utc::now());
            info.status = note.to_string();
            info.keep_image
        };
        if !keep_image {
            self.release_image();
        }
    }

    async fn set_data_type(&self, data_type: DataType) {
        self.inner.info.write().await.data_type = data_type;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
