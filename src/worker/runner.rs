//! Stage execution for a started worker

use bytes::Bytes;
use chrono::{Local, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::http::DownloadError;
use super::progress::ProgressReporter;
use super::{TaskInput, Worker, WorkerContext, WorkerEventKind};
use crate::humanize::ByteSize;
use crate::task::naming::NameParser;
use crate::task::{
    DataType, Stage, TaskInfo, TaskJob, TaskStatus, UploadResult, UrlSharingServiceType,
    UrlShortenerType,
};
use crate::uploaders::{NoProgress, UploaderError};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File size {size} exceeds the upload limit of {limit}")]
    TooLarge { size: ByteSize, limit: ByteSize },

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Uploader(#[from] UploaderError),

    /// Already recorded in the task result
    #[error("{0}")]
    Backend(String),

    #[error("Task cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, TaskError>;

/// Payload carried between stages
#[derive(Default)]
struct StageState {
    data: Option<Bytes>,
    upload_time: Duration,
}

impl Worker {
    pub(super) async fn run(self, context: Arc<WorkerContext>) {
        let job = {
            let mut info = self.inner.info.write().await;
            info.task_start_time = Some(Utc::now());
            info.status = "Preparing".to_string();
            info.job
        };
        debug!(task_id = %self.id(), ?job, "Worker started");

        let mut state = StageState::default();
        let outcome = self.execute(&context, &mut state).await;

        if !state.upload_time.is_zero() {
            self.inner.info.write().await.upload_duration = Some(state.upload_time);
        }
        self.complete(outcome).await;
    }

    async fn execute(&self, context: &WorkerContext, state: &mut StageState) -> Result<()> {
        for stage in self.inner.plan.preparing.clone() {
            self.run_stage(stage, context, state).await?;
        }

        if !self.transition(TaskStatus::Working) {
            return Err(TaskError::Cancelled);
        }
        self.inner.info.write().await.status = "Working".to_string();
        if self.is_upload_job() {
            self.mark_upload_started();
        }

        for stage in self.inner.plan.working.clone() {
            self.run_stage(stage, context, state).await?;
        }
        Ok(())
    }

    async fn run_stage(
        &self,
        stage: Stage,
        context: &WorkerContext,
        state: &mut StageState,
    ) -> Result<()> {
        debug!(task_id = %self.id(), ?stage, "Running stage");
        let started = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => Err(TaskError::Cancelled),
            outcome = self.stage(stage, context, state) => outcome,
        };

        if stage.is_network() {
            state.upload_time += started.elapsed();
        }
        outcome
    }

    async fn stage(
        &self,
        stage: Stage,
        context: &WorkerContext,
        state: &mut StageState,
    ) -> Result<()> {
        match stage {
            Stage::LoadImage => self.load_image(state).await,
            Stage::LoadData => self.load_data(state).await,
            Stage::EncodeText => self.encode_text(state).await,
            Stage::ReadFile => self.read_file(state).await,
            Stage::SaveImage => self.save_image(state).await,
            Stage::Upload => self.upload(context, state).await,
            Stage::ShortenUrl => self.shorten_url(context).await,
            Stage::ShareUrl => self.share_url(context).await,
            Stage::Download => self.download(context).await,
            Stage::DeleteLocalFile => {
                self.delete_local_file().await;
                Ok(())
            }
        }
    }

    async fn load_image(&self, state: &mut StageState) -> Result<()> {
        let TaskInput::Image(image) = self.take_input() else {
            return Err(TaskError::Input("Image is missing".to_string()));
        };
        if image.is_empty() {
            return Err(TaskError::Input("Image is empty".to_string()));
        }

        self.set_image(image.clone());
        self.emit(WorkerEventKind::ImageReady(image.clone()));

        {
            let mut info = self.inner.info.write().await;
            if info.file_name().is_none() {
                let extension = info.settings.upload.image_extension.clone();
                let name = self.generated_name(&info, &extension);
                info.set_file_name(name);
            }
        }
        state.data = Some(image);
        Ok(())
    }

    async fn load_data(&self, state: &mut StageState) -> Result<()> {
        let TaskInput::Data(data) = self.take_input() else {
            return Err(TaskError::Input("Data is missing".to_string()));
        };
        if data.is_empty() {
            return Err(TaskError::Input("Data is empty".to_string()));
        }

        let mut info = self.inner.info.write().await;
        check_size_limit(data.len() as u64, info.settings.upload.max_upload_size)?;
        if info.file_name().is_none() {
            let name = self.generated_name(&info, "");
            info.set_file_name(name);
        }
        state.data = Some(data);
        Ok(())
    }

    async fn encode_text(&self, state: &mut StageState) -> Result<()> {
        let TaskInput::Text(text) = self.take_input() else {
            return Err(TaskError::Input("Text is missing".to_string()));
        };
        if text.is_empty() {
            return Err(TaskError::Input("Text is empty".to_string()));
        }

        let mut info = self.inner.info.write().await;
        check_size_limit(text.len() as u64, info.settings.upload.max_upload_size)?;
        if info.file_name().is_none() {
            let extension = info.settings.upload.text_extension.clone();
            let name = self.generated_name(&info, &extension);
            info.set_file_name(name);
        }
        state.data = Some(Bytes::from(text));
        Ok(())
    }

    async fn read_file(&self, state: &mut StageState) -> Result<()> {
        let (path, limit) = {
            let info = self.inner.info.read().await;
            let path = info
                .file_path()
                .map(PathBuf::from)
                .ok_or_else(|| TaskError::Input("File path is missing".to_string()))?;
            (path, info.settings.upload.max_upload_size)
        };

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| TaskError::Input(format!("{}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(TaskError::Input(format!("{} is not a file", path.display())));
        }
        check_size_limit(metadata.len(), limit)?;

        let data = tokio::fs::read(&path).await?;
        self.set_data_type(DataType::from_path(&path)).await;
        state.data = Some(Bytes::from(data));
        Ok(())
    }

    async fn save_image(&self, state: &mut StageState) -> Result<()> {
        let data = state
            .data
            .clone()
            .ok_or_else(|| TaskError::Input("Image is missing".to_string()))?;

        let path = {
            let info = self.inner.info.read().await;
            let upload = &info.settings.upload;
            let mut folder = upload.screenshots_folder.clone();
            if !upload.screenshots_subfolder_pattern.is_empty() {
                let sub = NameParser::new(Local::now())
                    .with_metadata(&info.metadata)
                    .file_name(&upload.screenshots_subfolder_pattern);
                folder.push(sub);
            }
            let name = info.file_name().unwrap_or("screenshot").to_string();
            folder.join(name)
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        info!(task_id = %self.id(), path = %path.display(), "Image saved");

        self.inner.info.write().await.set_file_path(path);
        Ok(())
    }

    async fn upload(&self, context: &WorkerContext, state: &mut StageState) -> Result<()> {
        let data = state
            .data
            .take()
            .ok_or_else(|| TaskError::Input("Nothing to upload".to_string()))?;

        let (key, file_name) = {
            let info = self.inner.info.read().await;
            let key = info
                .upload_destination()
                .ok_or_else(|| TaskError::Input("Job has no upload destination".to_string()))?;
            (key, info.file_name().unwrap_or("upload").to_string())
        };
        let uploader = context.uploaders.uploader(key)?;

        debug!(task_id = %self.id(), destination = %key, size = data.len(), "Uploading");
        let reporter = Arc::new(ProgressReporter::new(self.clone(), context.progress_interval));
        let mut result = uploader.upload(data, &file_name, reporter.clone()).await;
        reporter.finish();

        if !result.is_error() && result.is_url_expected && !result.has_url() {
            result.push_error("URL is empty");
        }
        self.store_result(result).await
    }

    async fn shorten_url(&self, context: &WorkerContext) -> Result<()> {
        let (kind, standalone, url) = self.link_input().await?;
        let shortener = context.uploaders.shortener(kind.shortener)?;
        let result = shortener.shorten(&url).await;

        if standalone {
            return self.store_result(result).await;
        }

        let mut info = self.inner.info.write().await;
        if result.is_error() {
            info.result.errors.extend(result.errors);
        } else if result.has_shortened_url() {
            info.result.shortened_url = result.shortened_url;
        } else {
            info.result.push_error("Shortened URL is empty");
        }
        check_errors(&info.result)
    }

    async fn share_url(&self, context: &WorkerContext) -> Result<()> {
        let (kind, standalone, url) = self.link_input().await?;
        let sharer = context.uploaders.sharer(kind.sharing)?;
        let result = sharer.share(&url).await;

        if standalone {
            return self.store_result(result).await;
        }

        let mut info = self.inner.info.write().await;
        if result.is_error() {
            info.result.errors.extend(result.errors);
        } else {
            info.result.share_url = result.share_url;
        }
        check_errors(&info.result)
    }

    async fn download(&self, context: &WorkerContext) -> Result<()> {
        let (url, folder) = {
            let info = self.inner.info.read().await;
            let url = info
                .source_url
                .clone()
                .ok_or_else(|| TaskError::Input("URL is missing".to_string()))?;
            (url, info.settings.upload.download_folder.clone())
        };

        let path = context
            .http
            .download_to(&url, &folder, &self.inner.cancel, &NoProgress)
            .await
            .map_err(|e| match e {
                DownloadError::Cancelled => TaskError::Cancelled,
                other => TaskError::Download(other),
            })?;
        info!(task_id = %self.id(), %url, path = %path.display(), "Downloaded");

        let mut info = self.inner.info.write().await;
        info.data_type = DataType::from_path(&path);
        info.set_file_path(path);
        if info.job == TaskJob::Download {
            info.result.is_url_expected = false;
        }
        Ok(())
    }

    async fn delete_local_file(&self) {
        let path = self.inner.info.read().await.file_path().map(PathBuf::from);
        let Some(path) = path else {
            return;
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(task_id = %self.id(), path = %path.display(), "Local file deleted"),
            Err(e) => {
                warn!(task_id = %self.id(), path = %path.display(), error = %e, "Failed to delete local file")
            }
        }
    }

    /// Link to shorten or share: the source URL for standalone jobs, the
    /// uploaded URL otherwise
    async fn link_input(&self) -> Result<(LinkServices, bool, String)> {
        let info = self.inner.info.read().await;
        let services = LinkServices {
            shortener: info.settings.url_shortener,
            sharing: info.settings.url_sharing_service,
        };
        let standalone = matches!(info.job, TaskJob::ShortenUrl | TaskJob::ShareUrl);

        let url = if standalone {
            info.source_url.clone()
        } else {
            info.result.best_url().map(str::to_string)
        };
        match url.filter(|u| !u.is_empty()) {
            Some(url) => Ok((services, standalone, url)),
            None => Err(TaskError::Input("URL is missing".to_string())),
        }
    }

    async fn store_result(&self, result: UploadResult) -> Result<()> {
        let mut info = self.inner.info.write().await;
        info.result = result;
        check_errors(&info.result)
    }

    fn generated_name(&self, info: &TaskInfo, extension: &str) -> String {
        let stem = NameParser::new(Local::now())
            .with_metadata(&info.metadata)
            .file_name(&info.settings.upload.name_pattern);
        if extension.is_empty() {
            stem
        } else {
            format!("{stem}.{extension}")
        }
    }

    /// Resolve the terminal status; cancellation wins over errors
    async fn complete(&self, outcome: Result<()>) {
        let terminal = {
            let mut info = self.inner.info.write().await;
            match outcome {
                _ if self.inner.cancel.is_cancelled() => TaskStatus::Stopped,
                Err(TaskError::Cancelled) => TaskStatus::Stopped,
                Err(TaskError::Backend(_)) => TaskStatus::Failed,
                Err(e) => {
                    info.result.push_error(e.to_string());
                    TaskStatus::Failed
                }
                Ok(()) if info.result.is_error() => TaskStatus::Failed,
                Ok(()) => TaskStatus::Completed,
            }
        };

        if terminal == TaskStatus::Failed {
            let info = self.inner.info.read().await;
            warn!(
                task_id = %self.id(),
                job = ?info.job,
                error = info.result.first_error().unwrap_or_default(),
                "Task failed"
            );
        }
        self.finish(terminal).await;
    }
}

#[derive(Clone, Copy)]
struct LinkServices {
    shortener: UrlShortenerType,
    sharing: UrlSharingServiceType,
}

fn check_size_limit(size: u64, limit: Option<ByteSize>) -> Result<()> {
    match limit {
        Some(limit) if size > limit.as_u64() => Err(TaskError::TooLarge {
            size: ByteSize(size),
            limit,
        }),
        _ => Ok(()),
    }
}

fn check_errors(result: &UploadResult) -> Result<()> {
    match result.first_error() {
        Some(error) => Err(TaskError::Backend(error.to_string())),
        None => Ok(()),
    }
}
