// Downloader backend trait definition

use std::path::PathBuf;

use async_trait::async_trait;

use super::errors::DownloadError;
use super::format_selector::ResolvedOptions;
use super::models::ItemProgress;

/// What a backend returns for a finished item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedMedia {
    /// Display title reported by the extractor
    pub title: String,
    /// Saved file, when the backend knows it
    pub path: Option<PathBuf>,
}

/// Trait for downloader backend implementations
#[async_trait]
pub trait DownloaderBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Download a single URL, reporting progress through `options.progress`
    async fn download(
        &self,
        url: &str,
        options: &ResolvedOptions,
    ) -> Result<DownloadedMedia, DownloadError>;
}

/// Receives incremental progress for the item currently downloading
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: ItemProgress);
}

/// Locates the transcoder at the moment of asking
pub trait ToolProbe: Send + Sync {
    /// Path of a usable ffmpeg, `None` when none can be found
    fn transcoder_location(&self) -> Option<PathBuf>;

    fn transcoder_available(&self) -> bool {
        self.transcoder_location().is_some()
    }
}

/// Sink that discards everything
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _progress: ItemProgress) {}
}
