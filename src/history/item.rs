use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::task::{DataType, TaskId, TaskInfo, TaskJob};

/// Durable record of a completed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: TaskId,
    pub file_name: String,
    pub file_path: Option<PathBuf>,
    pub date_time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub job: TaskJob,
    pub host: String,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub deletion_url: Option<String>,
    pub shortened_url: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl HistoryItem {
    pub fn from_task(info: &TaskInfo) -> Self {
        let result = &info.result;
        Self {
            id: info.id,
            file_name: info.file_name().unwrap_or_default().to_string(),
            file_path: info.file_path().map(PathBuf::from),
            date_time: info.task_end_time.unwrap_or_else(Utc::now),
            data_type: info.data_type,
            job: info.job,
            host: info.uploader_host(),
            url: result.url.clone().or_else(|| result.share_url.clone()),
            thumbnail_url: result.thumbnail_url.clone(),
            deletion_url: result.deletion_url.clone(),
            shortened_url: result.shortened_url.clone(),
            tags: info.metadata.to_tags(),
        }
    }

    /// Shortened URL when present, otherwise the plain URL
    pub fn best_url(&self) -> Option<&str> {
        self.shortened_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.url.as_deref().filter(|u| !u.is_empty()))
    }
}
