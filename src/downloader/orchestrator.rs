// Sequential batch runner

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use super::backends::YtDlpBackend;
use super::errors::{BatchError, RelayError};
use super::format_selector::resolve_options;
use super::models::{BatchProgress, DownloadResult, FormatChoice, ItemProgress, QualityChoice};
use super::tools::{ToolManager, ToolType};
use super::traits::{DownloaderBackend, ProgressSink, ToolProbe};
use super::validator::prepare_batch;
use crate::config::AppConfig;

/// Maps backend progress of the current item onto batch progress and hands
/// it to the caller's callback. Remembers the first delivery failure.
struct ProgressRelay<F> {
    total: usize,
    current: AtomicUsize,
    title: Mutex<Option<String>>,
    callback: F,
    failure: OnceLock<RelayError>,
}

impl<F> ProgressRelay<F>
where
    F: Fn(BatchProgress) -> Result<(), RelayError> + Send + Sync,
{
    fn new(total: usize, callback: F) -> Self {
        Self {
            total,
            current: AtomicUsize::new(0),
            title: Mutex::new(None),
            callback,
            failure: OnceLock::new(),
        }
    }

    fn begin_item(&self, current: usize) -> Result<(), RelayError> {
        self.current.store(current, Ordering::SeqCst);
        if let Ok(mut title) = self.title.lock() {
            *title = None;
        }
        self.emit(None, None);
        self.check()
    }

    fn emit(&self, title: Option<String>, percent: Option<f32>) {
        if self.failure.get().is_some() {
            return;
        }

        let progress = BatchProgress {
            current: self.current.load(Ordering::SeqCst),
            total: self.total,
            title,
            percent,
        };

        if let Err(e) = (self.callback)(progress) {
            tracing::error!("[Downloader] progress relay failed: {}", e);
            let _ = self.failure.set(e);
        }
    }

    fn check(&self) -> Result<(), RelayError> {
        match self.failure.get() {
            Some(e) => Err(*e),
            None => Ok(()),
        }
    }
}

impl<F> ProgressSink for ProgressRelay<F>
where
    F: Fn(BatchProgress) -> Result<(), RelayError> + Send + Sync,
{
    fn report(&self, progress: ItemProgress) {
        // Keep the last known title so percent-only updates still carry it
        let title = match self.title.lock() {
            Ok(mut known) => {
                if progress.title.is_some() {
                    *known = progress.title.clone();
                }
                known.clone()
            }
            Err(_) => progress.title.clone(),
        };
        self.emit(title, progress.percent);
    }
}

/// Runs batches one item at a time against a single backend
pub struct Downloader {
    backend: Arc<dyn DownloaderBackend>,
    probe: Arc<dyn ToolProbe>,
    output_dir: PathBuf,
}

impl Downloader {
    /// Create a downloader writing into `output_dir`, creating it if absent
    pub fn new(
        backend: Arc<dyn DownloaderBackend>,
        probe: Arc<dyn ToolProbe>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self, BatchError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|source| BatchError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        Ok(Self {
            backend,
            probe,
            output_dir,
        })
    }

    /// yt-dlp backend and tool probe built from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, BatchError> {
        let (backend, probe) = backend_from_config(config);
        Self::new(backend, probe, &config.output_dir)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Probing runs external commands, keep it off the async executor
    async fn locate_transcoder(&self) -> Result<Option<PathBuf>, BatchError> {
        let probe = self.probe.clone();
        tokio::task::spawn_blocking(move || probe.transcoder_location())
            .await
            .map_err(|e| BatchError::Worker(format!("tool probe failed: {}", e)))
    }

    /// Download `urls` in order, one result per URL.
    ///
    /// A failing item is recorded and the loop moves on. Only a broken
    /// progress relay ends the run early.
    pub async fn run<F>(
        &self,
        urls: &[String],
        format: FormatChoice,
        quality: QualityChoice,
        on_progress: F,
    ) -> Result<Vec<DownloadResult>, BatchError>
    where
        F: Fn(BatchProgress) -> Result<(), RelayError> + Send + Sync + 'static,
    {
        let total = urls.len();
        tracing::info!(
            "[Downloader] Starting batch: {} item(s), {}, {} via {}",
            total,
            format,
            quality,
            self.backend.name()
        );

        let relay = Arc::new(ProgressRelay::new(total, on_progress));
        let ffmpeg = self.locate_transcoder().await?;
        match &ffmpeg {
            Some(path) => tracing::debug!("[Downloader] using ffmpeg at {}", path.display()),
            None => tracing::warn!("[Downloader] ffmpeg not available, using pre-merged formats"),
        }
        let options = resolve_options(
            format,
            quality,
            ffmpeg.is_some(),
            &self.output_dir,
            relay.clone(),
        )
        .with_ffmpeg_location(ffmpeg);

        let mut results = Vec::with_capacity(total);

        for (index, url) in urls.iter().enumerate() {
            let current = index + 1;
            relay.begin_item(current)?;

            let result = match self.backend.download(url, &options).await {
                Ok(media) => {
                    tracing::info!("[Downloader] ✓ {}/{} {}", current, total, media.title);
                    DownloadResult::succeeded(url, &media.title)
                }
                Err(e) => {
                    tracing::warn!("[Downloader] ✗ {}/{} {}: {}", current, total, url, e);
                    DownloadResult::failed(url, &e)
                }
            };
            results.push(result);

            relay.check()?;
        }

        tracing::info!(
            "[Downloader] Batch done: {}/{} succeeded",
            results.iter().filter(|r| r.success).count(),
            total
        );
        Ok(results)
    }
}

/// yt-dlp backend plus the ffmpeg probe described by `config`.
///
/// ffmpeg is not fixed here: each run passes on whatever the probe finds.
/// A yt-dlp binary that cannot be located is still handed to the backend by
/// name, so the failure surfaces per item as `ToolNotFound`.
pub fn backend_from_config(
    config: &AppConfig,
) -> (Arc<dyn DownloaderBackend>, Arc<dyn ToolProbe>) {
    let tools = ToolManager::with_overrides(config.ytdlp_bin.clone(), config.ffmpeg_bin.clone());
    let ytdlp = tools
        .detect_tool(ToolType::YtDlp)
        .unwrap_or_else(|| PathBuf::from(ToolType::YtDlp.as_str()));

    let backend = YtDlpBackend::new(ytdlp)
        .with_socket_timeout(config.socket_timeout_secs)
        .with_proxy(config.proxy.clone());

    (Arc::new(backend), Arc::new(tools))
}

/// Validate raw input and run it with the default configuration.
///
/// Any invalid line rejects the whole batch before anything is downloaded.
pub async fn run_batch<I, S, F>(
    urls: I,
    format: FormatChoice,
    quality: QualityChoice,
    on_progress: F,
) -> Result<Vec<DownloadResult>, BatchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: Fn(BatchProgress) -> Result<(), RelayError> + Send + Sync + 'static,
{
    let urls = prepare_batch(urls)?;
    let downloader = Downloader::from_config(&AppConfig::default())?;
    downloader.run(&urls, format, quality, on_progress).await
}
