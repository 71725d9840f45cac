//! Task data model
//!
//! Everything a worker needs to describe one unit of work: identity and
//! timing ([`TaskInfo`]), the formal lifecycle ([`TaskStatus`]), the backend
//! outcome ([`UploadResult`]) and the per-task settings snapshot.

mod info;
mod metadata;
pub mod naming;
mod result;
pub mod settings;
mod stage;
mod status;

pub use info::{DataType, TaskId, TaskInfo, TaskJob, UploaderKey};
pub use metadata::TaskMetadata;
pub use result::UploadResult;
pub use settings::{
    AfterCaptureTask, AfterUploadTask, FileDestination, ImageDestination, TaskSettings,
    TextDestination, UploadSettings, UrlSharingServiceType, UrlShortenerType,
};
pub use stage::{Stage, StagePlan};
pub use status::TaskStatus;
