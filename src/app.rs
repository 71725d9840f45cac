use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use snapx::config::{Config, TomlSettingsFile, config_path};
use snapx::dispatch::{AlwaysConfirm, Confirm, StdinConfirm, UploadManager};
use snapx::history::{HistorySink, HistoryStore};
use snapx::humanize::format_duration;
use snapx::manager::{HistoryPolicy, TaskManager};
use snapx::native::NativeMessage;
use snapx::notify::{CommandNotifier, Notifier};
use snapx::task::{TaskId, TaskStatus};
use snapx::uploaders::UploaderRegistry;
use snapx::worker::{HttpClient, Worker, WorkerContext};

use crate::cli::{Cli, Commands};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(cli: Cli) -> Result<(), AnyError> {
    let path = cli.config.clone().unwrap_or_else(config_path);
    let config = Config::load_with_file(path.clone())?;

    if let Commands::History(args) = &cli.command {
        let limit = args.limit.unwrap_or(config.history.load_limit);
        return print_history(&config, limit);
    }

    let http = Arc::new(HttpClient::new(&config.http)?);
    let uploaders = UploaderRegistry::from_config(&config.uploaders, http.client())?;
    let context = Arc::new(
        WorkerContext::builder()
            .uploaders(Arc::new(uploaders))
            .http(http)
            .stop_grace(config.manager.stop_grace())
            .progress_interval(config.manager.progress_interval())
            .build(),
    );

    let history: Option<Arc<dyn HistorySink>> = if config.history.enabled {
        Some(Arc::new(HistoryStore::open(&config.history.path)?))
    } else {
        None
    };
    let notifier: Arc<dyn Notifier> = Arc::new(CommandNotifier::new(config.notifications.clone()));
    let confirm: Arc<dyn Confirm> = if cli.yes {
        Arc::new(AlwaysConfirm)
    } else {
        Arc::new(StdinConfirm)
    };

    let policy = HistoryPolicy::from_config(&config.history);
    let upload_limit = config.manager.upload_limit;
    let recent_capacity = config.manager.recent_tasks_max;
    let shared = Arc::new(RwLock::new(config));

    let tasks = TaskManager::builder()
        .context(context)
        .upload_limit(upload_limit)
        .maybe_history(history)
        .policy(policy)
        .notifier(notifier.clone())
        .settings(Arc::new(TomlSettingsFile::new(path, shared.clone())))
        .recent_capacity(recent_capacity)
        .build();
    let uploads = UploadManager::new(tasks.clone(), shared, notifier, confirm);

    let ids = dispatch(&uploads, cli.command).await?;
    if ids.is_empty() {
        return Ok(());
    }

    tokio::select! {
        _ = tasks.wait_idle() => {}
        _ = shutdown_signal() => {
            tasks.stop_all_tasks().await;
            tasks.wait_idle().await;
        }
    }

    let mut failed = 0;
    for id in ids {
        if let Some(worker) = tasks.get(id).await {
            if report(&worker).await != TaskStatus::Completed {
                failed += 1;
            }
        }
    }

    let metrics = tasks.metrics();
    info!(
        completed = metrics.tasks_completed,
        failed = metrics.tasks_failed,
        stopped = metrics.tasks_stopped,
        "All tasks finished"
    );

    if failed > 0 {
        return Err(format!("{failed} task(s) did not complete").into());
    }
    Ok(())
}

async fn dispatch(uploads: &UploadManager, command: Commands) -> Result<Vec<TaskId>, AnyError> {
    let ids = match command {
        Commands::Upload(args) => uploads.upload_files(&args.paths).await?,
        Commands::Text(args) => vec![uploads.upload_text(&args.text).await?],
        Commands::ClipboardText(args) => uploads.upload_clipboard(&args.text).await?,
        Commands::Shorten(args) => vec![uploads.shorten_url(&args.url).await?],
        Commands::Share(args) => vec![uploads.share_url(&args.url).await?],
        Commands::Download(args) => vec![uploads.download(&args.url, args.upload).await?],
        Commands::Native(args) => {
            let message = NativeMessage::read_file(&args.file).await?;
            message.dispatch(uploads).await?.into_iter().collect()
        }
        Commands::History(_) => Vec::new(),
    };
    Ok(ids)
}

/// Print the outcome of one task, returning its final status
async fn report(worker: &Worker) -> TaskStatus {
    let info = worker.info().await;
    let status = worker.status();
    let duration = info.task_duration().map(format_duration).unwrap_or_default();

    match status {
        TaskStatus::Completed => {
            let link = info
                .result
                .best_url()
                .or(info.result.share_url.as_deref())
                .map(str::to_string)
                .or_else(|| info.file_path().map(|p| p.display().to_string()))
                .unwrap_or_default();
            println!("{link}");
            if let Some(deletion_url) = &info.result.deletion_url {
                println!("  deletion: {deletion_url}");
            }
            info!(task_id = %info.id, %duration, "Task completed");
        }
        _ => {
            let error = info.result.errors.join("; ");
            eprintln!("{} {}: {}", info.file_name().unwrap_or("task"), status, error);
        }
    }
    status
}

fn print_history(config: &Config, limit: usize) -> Result<(), AnyError> {
    let store = HistoryStore::open(&config.history.path)?;
    for item in store.recent(limit)? {
        println!(
            "{}  {:<8} {:<24} {}",
            item.date_time.format("%Y-%m-%d %H:%M:%S"),
            item.data_type,
            item.file_name,
            item.best_url().unwrap_or("-")
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, stopping tasks");
}
