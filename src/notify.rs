//! User-facing notifications
//!
//! The pipeline only needs three things from the UI: a sound per event kind,
//! an error toast and the after-upload window. [`LogNotifier`] records them
//! through `tracing`; [`CommandNotifier`] runs configured shell commands.

use async_trait::async_trait;
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::config::NotificationConfig;
use crate::task::TaskInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationSound {
    Capture,
    TaskCompleted,
    ActionCompleted,
    Error,
}

impl fmt::Display for NotificationSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationSound::Capture => "capture",
            NotificationSound::TaskCompleted => "task_completed",
            NotificationSound::ActionCompleted => "action_completed",
            NotificationSound::Error => "error",
        })
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn play_notification_sound(&self, sound: NotificationSound);

    async fn show_error(&self, title: &str, body: &str);

    async fn show_after_upload(&self, info: &TaskInfo);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn play_notification_sound(&self, sound: NotificationSound) {
        debug!(%sound, "Notification sound");
    }

    async fn show_error(&self, title: &str, body: &str) {
        error!(title, body, "Task error");
    }

    async fn show_after_upload(&self, info: &TaskInfo) {
        info!(
            task_id = %info.id,
            url = info.result.best_url().unwrap_or_default(),
            deletion_url = info.result.deletion_url.as_deref().unwrap_or_default(),
            "Upload finished"
        );
    }
}

/// Runs a configured command per sound; errors and the after-upload window
/// fall back to logging
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    config: NotificationConfig,
}

impl CommandNotifier {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    fn command_for(&self, sound: NotificationSound) -> Option<&str> {
        let command = match sound {
            NotificationSound::Capture => &self.config.capture_command,
            NotificationSound::TaskCompleted => &self.config.task_completed_command,
            NotificationSound::ActionCompleted => &self.config.action_completed_command,
            NotificationSound::Error => &self.config.error_command,
        };
        command.as_deref().filter(|c| !c.trim().is_empty())
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn play_notification_sound(&self, sound: NotificationSound) {
        if !self.config.play_sounds {
            return;
        }
        let Some(command) = self.command_for(sound) else {
            debug!(%sound, "No command configured");
            return;
        };

        match shell(command).spawn() {
            // Fire and forget; reap the child in the background
            Ok(mut child) => {
                tokio::spawn(async move {
                    if let Err(e) = child.wait().await {
                        warn!(error = %e, "Notification command failed");
                    }
                });
            }
            Err(e) => warn!(%sound, command, error = %e, "Failed to spawn notification command"),
        }
    }

    async fn show_error(&self, title: &str, body: &str) {
        LogNotifier.show_error(title, body).await;
    }

    async fn show_after_upload(&self, info: &TaskInfo) {
        LogNotifier.show_after_upload(info).await;
    }
}

#[cfg(unix)]
fn shell(command: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
