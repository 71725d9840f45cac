use super::info::TaskJob;
use super::settings::{AfterCaptureTask, AfterUploadTask, TaskSettings};

/// One step of a worker pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    LoadImage,
    LoadData,
    ReadFile,
    EncodeText,
    SaveImage,
    Upload,
    ShortenUrl,
    ShareUrl,
    Download,
    DeleteLocalFile,
}

impl Stage {
    /// Stages counted in the upload duration
    pub fn is_network(self) -> bool {
        matches!(self, Stage::Upload | Stage::ShortenUrl | Stage::ShareUrl)
    }
}

/// Ordered stages for each phase, resolved once when the task is built
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagePlan {
    pub preparing: Vec<Stage>,
    pub working: Vec<Stage>,
}

impl StagePlan {
    pub fn resolve(job: TaskJob, settings: &TaskSettings) -> Self {
        let mut plan = StagePlan::default();

        match job {
            TaskJob::Job => {
                plan.preparing.push(Stage::LoadImage);
                let save = settings.has_after_capture(AfterCaptureTask::SaveImageToFile);
                let upload = settings.has_after_capture(AfterCaptureTask::UploadImageToHost);
                if save {
                    plan.working.push(Stage::SaveImage);
                }
                if upload {
                    plan.push_upload(settings);
                }
                if save && upload && settings.has_after_capture(AfterCaptureTask::DeleteFile) {
                    plan.working.push(Stage::DeleteLocalFile);
                }
            }
            TaskJob::DataUpload => {
                plan.preparing.push(Stage::LoadData);
                plan.push_upload(settings);
            }
            TaskJob::FileUpload => {
                plan.preparing.push(Stage::ReadFile);
                plan.push_upload(settings);
                if settings.has_after_capture(AfterCaptureTask::DeleteFile) {
                    plan.working.push(Stage::DeleteLocalFile);
                }
            }
            TaskJob::TextUpload => {
                plan.preparing.push(Stage::EncodeText);
                plan.push_upload(settings);
            }
            TaskJob::ShortenUrl => plan.working.push(Stage::ShortenUrl),
            TaskJob::ShareUrl => plan.working.push(Stage::ShareUrl),
            TaskJob::Download => plan.working.push(Stage::Download),
            TaskJob::DownloadUpload => {
                plan.working.push(Stage::Download);
                plan.working.push(Stage::ReadFile);
                plan.push_upload(settings);
            }
        }

        plan
    }

    fn push_upload(&mut self, settings: &TaskSettings) {
        self.working.push(Stage::Upload);
        if settings.has_after_upload(AfterUploadTask::UseUrlShortener) {
            self.working.push(Stage::ShortenUrl);
        }
        if settings.has_after_upload(AfterUploadTask::ShareUrl) {
            self.working.push(Stage::ShareUrl);
        }
    }

    pub fn has_stage(&self, stage: Stage) -> bool {
        self.preparing.contains(&stage) || self.working.contains(&stage)
    }
}
