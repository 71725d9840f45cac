//! Shared fixtures for pipeline integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast};

use snapx::config::{ConfigError, HttpConfig, SettingsPersister};
use snapx::history::{self, HistoryItem, HistorySink};
use snapx::manager::{HistoryPolicy, TaskManager};
use snapx::notify::{NotificationSound, Notifier};
use snapx::task::{
    TaskId, TaskInfo, TaskJob, TaskSettings, TaskStatus, TextDestination, UploadResult,
    UploaderKey,
};
use snapx::uploaders::{ProgressSink, Uploader, UploaderRegistry};
use snapx::worker::{HttpClient, TaskInput, Worker, WorkerContext, WorkerEvent, WorkerEventKind};

pub const TEXT_KEY: UploaderKey = UploaderKey::Text(TextDestination::CustomTextUploader);

/// Uploader that blocks each call until a permit is released
pub struct GatedUploader {
    gate: Semaphore,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
    fail: bool,
}

impl GatedUploader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    /// Every call returns a backend error once released
    pub fn failing() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    fn build(fail: bool) -> Self {
        Self {
            gate: Semaphore::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            fail,
        }
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Payloads in the order uploads began
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Uploader for GatedUploader {
    async fn upload(
        &self,
        data: Bytes,
        file_name: &str,
        _progress: Arc<dyn ProgressSink>,
    ) -> UploadResult {
        self.calls
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(&data).into_owned());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        match self.gate.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => return UploadResult::from_error("gate closed"),
        }

        if self.fail {
            UploadResult::from_error("HTTP 500: Internal Server Error")
        } else {
            UploadResult::with_url(format!("https://files.example.com/{file_name}"))
        }
    }
}

/// History sink that keeps items in memory
#[derive(Default)]
pub struct MemoryHistory {
    items: Mutex<Vec<HistoryItem>>,
}

impl MemoryHistory {
    pub fn items(&self) -> Vec<HistoryItem> {
        self.items.lock().unwrap().clone()
    }
}

impl HistorySink for MemoryHistory {
    fn append_history_item(&self, item: &HistoryItem) -> history::Result<()> {
        self.items.lock().unwrap().push(item.clone());
        Ok(())
    }

    fn recent_history_items(&self, limit: usize) -> history::Result<Vec<HistoryItem>> {
        Ok(self.items().into_iter().rev().take(limit).collect())
    }
}

/// Notifier that records every call
#[derive(Default)]
pub struct RecordingNotifier {
    pub sounds: Mutex<Vec<NotificationSound>>,
    pub errors: Mutex<Vec<String>>,
    pub after_upload: Mutex<Vec<TaskId>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn play_notification_sound(&self, sound: NotificationSound) {
        self.sounds.lock().unwrap().push(sound);
    }

    async fn show_error(&self, title: &str, _body: &str) {
        self.errors.lock().unwrap().push(title.to_string());
    }

    async fn show_after_upload(&self, info: &TaskInfo) {
        self.after_upload.lock().unwrap().push(info.id);
    }
}

/// Settings persister that counts saves and fails the first one
#[derive(Default)]
pub struct FlakySettings {
    calls: AtomicUsize,
}

impl FlakySettings {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsPersister for FlakySettings {
    async fn save_all_settings(&self) -> Result<(), ConfigError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(ConfigError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

pub fn context(registry: UploaderRegistry) -> Arc<WorkerContext> {
    Arc::new(
        WorkerContext::builder()
            .uploaders(Arc::new(registry))
            .http(Arc::new(HttpClient::new(&HttpConfig::default()).unwrap()))
            .stop_grace(Duration::from_secs(2))
            .progress_interval(Duration::from_millis(10))
            .build(),
    )
}

pub fn registry_with(uploader: Arc<dyn Uploader>) -> UploaderRegistry {
    let mut registry = UploaderRegistry::with_share_links(None);
    registry.register_uploader(TEXT_KEY, uploader);
    registry
}

pub struct Harness {
    pub tasks: TaskManager,
    pub history: Arc<MemoryHistory>,
    pub notifier: Arc<RecordingNotifier>,
    pub settings: Arc<FlakySettings>,
    pub events: broadcast::Receiver<WorkerEvent>,
}

pub fn harness(limit: usize, registry: UploaderRegistry) -> Harness {
    let history = Arc::new(MemoryHistory::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let settings = Arc::new(FlakySettings::default());
    let tasks = TaskManager::builder()
        .context(context(registry))
        .upload_limit(limit)
        .history(history.clone())
        .policy(HistoryPolicy::RequireUrl)
        .notifier(notifier.clone())
        .settings(settings.clone())
        .build();
    let events = tasks.subscribe();

    Harness {
        tasks,
        history,
        notifier,
        settings,
        events,
    }
}

pub fn text_worker(text: &str) -> Worker {
    let info = TaskInfo::new(TaskJob::TextUpload, Arc::new(TaskSettings::default()));
    Worker::new(info, TaskInput::Text(text.to_string()))
}

/// Poll `check` until it holds, failing the test after five seconds
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub async fn wait_idle(tasks: &TaskManager) {
    tokio::time::timeout(Duration::from_secs(5), tasks.wait_idle())
        .await
        .expect("manager did not become idle");
}

/// Everything published so far, grouped per worker in arrival order
pub fn drain_events(events: &mut broadcast::Receiver<WorkerEvent>) -> Vec<(TaskId, WorkerEventKind)> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push((event.worker.id(), event.kind));
    }
    out
}

pub fn per_worker(events: &[(TaskId, WorkerEventKind)]) -> HashMap<TaskId, Vec<WorkerEventKind>> {
    let mut map: HashMap<TaskId, Vec<WorkerEventKind>> = HashMap::new();
    for (id, kind) in events {
        map.entry(*id).or_default().push(kind.clone());
    }
    map
}

pub fn is_terminal_change(kind: &WorkerEventKind) -> bool {
    matches!(kind, WorkerEventKind::StatusChanged(status) if status.is_terminal())
}

pub fn status_changes(kinds: &[WorkerEventKind]) -> Vec<TaskStatus> {
    kinds
        .iter()
        .filter_map(|kind| match kind {
            WorkerEventKind::StatusChanged(status) => Some(*status),
            _ => None,
        })
        .collect()
}
