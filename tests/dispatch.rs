//! Dispatch through the upload manager against in-memory backends

mod common;

use async_trait::async_trait;
use bytes::Bytes;
use common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tempfile::TempDir;

use snapx::config::{Config, ManagerConfig};
use snapx::dispatch::{AlwaysConfirm, Confirm, DispatchError, UploadManager};
use snapx::humanize::ByteSize;
use snapx::manager::{HistoryPolicy, TaskManager};
use snapx::native::NativeMessage;
use snapx::notify::NotificationSound;
use snapx::task::{
    AfterCaptureTask, AfterUploadTask, DataType, FileDestination, ImageDestination, TaskId,
    TaskMetadata, TaskStatus, TextDestination, UploadResult, UploaderKey, UrlSharingServiceType,
    UrlShortenerType,
};
use snapx::uploaders::{ObjectStorageUploader, UploaderRegistry, UrlShortener};

const CDN: &str = "https://cdn.example.com";

struct FakeShortener;

#[async_trait]
impl UrlShortener for FakeShortener {
    async fn shorten(&self, url: &str) -> UploadResult {
        UploadResult {
            url: Some(url.to_string()),
            shortened_url: Some(format!("https://s.example/{}", url.len())),
            ..UploadResult::default()
        }
    }
}

struct CountingConfirm {
    answer: bool,
    asked: AtomicUsize,
}

#[async_trait]
impl Confirm for CountingConfirm {
    async fn confirm(&self, _message: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

struct Setup {
    uploads: UploadManager,
    tasks: TaskManager,
    storage: Arc<ObjectStorageUploader>,
    notifier: Arc<RecordingNotifier>,
    history: Arc<MemoryHistory>,
}

fn base_config() -> Config {
    let mut config = Config::default();
    config.manager = ManagerConfig {
        upload_limit: 2,
        multi_upload_warning: 3,
        ..ManagerConfig::default()
    };
    config.task.image_destination = ImageDestination::ObjectStorage;
    config.task.text_destination = TextDestination::ObjectStorage;
    config.task.file_destination = FileDestination::ObjectStorage;
    config.task.after_capture = [AfterCaptureTask::UploadImageToHost].into_iter().collect();
    config
}

fn setup(config: Config, confirm: Arc<dyn Confirm>) -> Setup {
    let storage = Arc::new(ObjectStorageUploader::in_memory(CDN));
    let mut registry = UploaderRegistry::with_share_links(None);
    for key in [
        UploaderKey::Image(ImageDestination::ObjectStorage),
        UploaderKey::Text(TextDestination::ObjectStorage),
        UploaderKey::File(FileDestination::ObjectStorage),
    ] {
        registry.register_uploader(key, storage.clone());
    }
    registry.register_shortener(UrlShortenerType::CustomUrlShortener, Arc::new(FakeShortener));

    let notifier = Arc::new(RecordingNotifier::default());
    let history = Arc::new(MemoryHistory::default());
    let tasks = TaskManager::builder()
        .context(context(registry))
        .upload_limit(config.manager.upload_limit)
        .history(history.clone())
        .policy(HistoryPolicy::Always)
        .notifier(notifier.clone())
        .build();
    let uploads = UploadManager::new(
        tasks.clone(),
        Arc::new(RwLock::new(config)),
        notifier.clone(),
        confirm,
    );

    Setup {
        uploads,
        tasks,
        storage,
        notifier,
        history,
    }
}

async fn finished(setup: &Setup, id: TaskId) -> snapx::task::TaskInfo {
    wait_idle(&setup.tasks).await;
    let worker = setup.tasks.get(id).await.expect("worker registered");
    worker.info().await
}

#[tokio::test]
async fn text_upload_lands_in_storage() {
    let s = setup(base_config(), Arc::new(AlwaysConfirm));

    let id = s.uploads.upload_text("hello world").await.unwrap();
    let info = finished(&s, id).await;

    assert_eq!(info.result.is_success(), true);
    let name = info.file_name().unwrap().to_string();
    assert!(name.ends_with(".txt"));
    assert_eq!(info.result.url.as_deref(), Some(format!("{CDN}/{name}").as_str()));
    assert_eq!(s.storage.fetch(&name).await.unwrap(), Bytes::from("hello world"));
    assert_eq!(s.history.items().len(), 1);
}

#[tokio::test]
async fn settings_are_snapshotted_at_dispatch() {
    let config = base_config();
    let shared = Arc::new(RwLock::new(config));
    let s = setup(base_config(), Arc::new(AlwaysConfirm));
    let uploads = UploadManager::new(
        s.tasks.clone(),
        shared.clone(),
        s.notifier.clone(),
        Arc::new(AlwaysConfirm),
    );

    let before = uploads.safe_settings();
    shared.write().unwrap().task.upload.text_extension = "md".to_string();
    let after = uploads.safe_settings();

    assert_eq!(before.upload.text_extension, "txt");
    assert_eq!(after.upload.text_extension, "md");
}

#[tokio::test]
async fn capture_plays_sound_and_tags_metadata() {
    let s = setup(base_config(), Arc::new(AlwaysConfirm));
    let metadata = TaskMetadata::builder()
        .window_title("Terminal".to_string())
        .image_width(800)
        .image_height(600)
        .build();

    let id = s
        .uploads
        .upload_image(Bytes::from_static(b"\x89PNG"), metadata)
        .await
        .unwrap();
    let info = finished(&s, id).await;

    assert!(info.result.is_success());
    assert_eq!(info.data_type, DataType::Image);
    let sounds = s.notifier.sounds.lock().unwrap().clone();
    assert_eq!(
        sounds,
        vec![NotificationSound::Capture, NotificationSound::TaskCompleted]
    );
    assert_eq!(s.history.items()[0].tags.get("WindowTitle").map(String::as_str), Some("Terminal"));
}

#[tokio::test]
async fn file_upload_with_delete_after() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("report.csv");
    std::fs::write(&path, b"a,b\n1,2\n").unwrap();

    let mut config = base_config();
    config.task.after_capture.insert(AfterCaptureTask::DeleteFile);
    let s = setup(config, Arc::new(AlwaysConfirm));

    let id = s.uploads.upload_file(&path).await.unwrap();
    let info = finished(&s, id).await;

    assert!(info.result.is_success());
    assert_eq!(info.file_name(), Some("report.csv"));
    assert_eq!(info.data_type, DataType::Text);
    assert!(!path.exists());
    assert_eq!(s.storage.fetch("report.csv").await.unwrap(), Bytes::from("a,b\n1,2\n"));
}

#[tokio::test]
async fn oversized_file_fails_in_preparing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("big.bin");
    std::fs::write(&path, vec![0u8; 2048]).unwrap();

    let mut config = base_config();
    config.task.upload.max_upload_size = Some(ByteSize(1024));
    let s = setup(config, Arc::new(AlwaysConfirm));

    let id = s.uploads.upload_file(&path).await.unwrap();
    let info = finished(&s, id).await;
    let worker = s.tasks.get(id).await.unwrap();

    assert_eq!(worker.status(), TaskStatus::Failed);
    assert!(info.result.errors[0].contains("exceeds the upload limit"));
    assert!(path.exists());
    assert!(s.history.items().is_empty());
}

#[tokio::test]
async fn missing_file_fails() {
    let s = setup(base_config(), Arc::new(AlwaysConfirm));
    let id = s
        .uploads
        .upload_file(std::path::Path::new("/definitely/not/here.png"))
        .await
        .unwrap();
    finished(&s, id).await;
    assert_eq!(s.tasks.get(id).await.unwrap().status(), TaskStatus::Failed);
}

#[tokio::test]
async fn large_batches_need_confirmation() {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..4 {
        std::fs::write(temp_dir.path().join(format!("{i}.txt")), b"x").unwrap();
    }

    let declined = Arc::new(CountingConfirm {
        answer: false,
        asked: AtomicUsize::new(0),
    });
    let s = setup(base_config(), declined.clone());
    let err = s
        .uploads
        .upload_files(&[temp_dir.path().to_path_buf()])
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Cancelled));
    assert_eq!(declined.asked.load(Ordering::SeqCst), 1);
    assert!(s.tasks.workers().await.is_empty());

    let s = setup(base_config(), Arc::new(AlwaysConfirm));
    let ids = s
        .uploads
        .upload_files(&[temp_dir.path().to_path_buf()])
        .await
        .unwrap();
    assert_eq!(ids.len(), 4);
    wait_idle(&s.tasks).await;
    assert_eq!(s.tasks.metrics().tasks_completed, 4);
}

#[tokio::test]
async fn shorten_and_share_urls() {
    let s = setup(base_config(), Arc::new(AlwaysConfirm));

    let id = s.uploads.shorten_url("https://example.com/long").await.unwrap();
    let info = finished(&s, id).await;
    assert_eq!(info.result.shortened_url.as_deref(), Some("https://s.example/24"));

    let id = s.uploads.share_url("https://example.com/long").await.unwrap();
    let info = finished(&s, id).await;
    assert!(info.result.is_success());
    assert!(info.result.share_url.as_deref().unwrap().starts_with("mailto:?body="));

    // Share jobs complete silently
    assert_eq!(
        *s.notifier.sounds.lock().unwrap(),
        vec![NotificationSound::TaskCompleted]
    );
    assert!(matches!(
        s.uploads.shorten_url("  ").await,
        Err(DispatchError::NoInput(_))
    ));
}

#[tokio::test]
async fn after_upload_shorten_and_share() {
    let mut config = base_config();
    config.task.after_upload = [AfterUploadTask::UseUrlShortener, AfterUploadTask::ShareUrl]
        .into_iter()
        .collect();
    config.task.url_sharing_service = UrlSharingServiceType::Twitter;
    let s = setup(config, Arc::new(AlwaysConfirm));

    let id = s.uploads.upload_text("shared").await.unwrap();
    let info = finished(&s, id).await;

    assert!(info.result.is_success());
    assert!(info.result.url.as_deref().unwrap().starts_with(CDN));
    let short = info.result.shortened_url.clone().unwrap();
    assert!(short.starts_with("https://s.example/"));
    let share = info.result.share_url.clone().unwrap();
    assert!(share.starts_with("https://twitter.com/intent/tweet"));
    assert!(share.contains("s.example"));
}

#[tokio::test]
async fn clipboard_detection_routes_tasks() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("a.txt"), b"aaa").unwrap();

    let mut config = base_config();
    config.task.upload.clipboard_upload_shorten_url = true;
    let s = setup(config, Arc::new(AlwaysConfirm));

    let ids = s.uploads.upload_clipboard("https://example.com/long").await.unwrap();
    let info = finished(&s, ids[0]).await;
    assert!(info.result.has_shortened_url());

    let folder = temp_dir.path().display().to_string();
    let ids = s.uploads.upload_clipboard(&folder).await.unwrap();
    let info = finished(&s, ids[0]).await;
    let name = info.file_name().unwrap().to_string();
    assert!(name.ends_with("_index.txt"));
    let index = s.storage.fetch(&name).await.unwrap();
    assert!(String::from_utf8_lossy(&index).contains("a.txt (3B)"));

    let ids = s.uploads.upload_clipboard("just some words").await.unwrap();
    let info = finished(&s, ids[0]).await;
    assert_eq!(info.data_type, DataType::Text);

    assert!(matches!(
        s.uploads.upload_clipboard("   ").await,
        Err(DispatchError::NoInput(_))
    ));
}

#[tokio::test]
async fn native_message_dispatch() {
    let s = setup(base_config(), Arc::new(AlwaysConfirm));

    let message = NativeMessage::parse(r#"{"Action":"UploadText","Text":"from browser"}"#).unwrap();
    let id = message.dispatch(&s.uploads).await.unwrap().unwrap();
    let info = finished(&s, id).await;
    assert!(info.result.is_success());

    let message = NativeMessage::parse(r#"{"Action":"None"}"#).unwrap();
    assert_eq!(message.dispatch(&s.uploads).await.unwrap(), None);

    let message = NativeMessage::parse(r#"{"Action":"ShortenURL"}"#).unwrap();
    assert!(message.dispatch(&s.uploads).await.is_err());
}

#[tokio::test]
async fn download_rejects_bad_urls_as_failed_tasks() {
    let s = setup(base_config(), Arc::new(AlwaysConfirm));

    let id = s.uploads.download("ftp://example.com/file", true).await.unwrap();
    let info = finished(&s, id).await;
    let worker = s.tasks.get(id).await.unwrap();

    assert_eq!(worker.status(), TaskStatus::Failed);
    assert!(info.result.errors[0].contains("Invalid URL"));
}
