use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "snapx")]
#[command(about = "Upload files, text and links with SnapX", long_about = None)]
pub struct Cli {
    /// Settings file (defaults to $SNAPX_CONFIG or config/snapx.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Answer yes to confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload files; directories are expanded recursively
    Upload(UploadArgs),
    /// Upload a block of text
    Text(TextArgs),
    /// Upload text the way clipboard content is handled (URL, folder and file detection)
    ClipboardText(TextArgs),
    /// Shorten a URL
    Shorten(UrlArgs),
    /// Build a share link for a URL
    Share(UrlArgs),
    /// Download a URL, optionally uploading the result
    Download(DownloadArgs),
    /// Handle a browser native messaging file
    Native(NativeArgs),
    /// List recent history
    History(HistoryArgs),
}

#[derive(clap::Args, Debug)]
pub struct UploadArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct TextArgs {
    pub text: String,
}

#[derive(clap::Args, Debug)]
pub struct UrlArgs {
    pub url: String,
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    pub url: String,

    /// Upload the downloaded file
    #[arg(long)]
    pub upload: bool,
}

#[derive(clap::Args, Debug)]
pub struct NativeArgs {
    pub file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct HistoryArgs {
    /// Number of records to show (defaults to history.load_limit)
    #[arg(long)]
    pub limit: Option<usize>,
}
