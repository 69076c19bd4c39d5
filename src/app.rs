// Application context: owns the backend, runs one batch at a time on a
// worker thread and streams events back to the presentation layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::config::AppConfig;
use crate::downloader::orchestrator::backend_from_config;
use crate::downloader::{
    prepare_batch, BatchError, BatchProgress, DownloadResult, Downloader, DownloaderBackend,
    FormatChoice, QualityChoice, RelayError, ToolProbe,
};

/// Messages from the download worker
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Progress(BatchProgress),
    Finished(Vec<DownloadResult>),
    Failed(String),
}

/// Clears the busy flag when the worker is done with it
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, BatchError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| BatchError::AlreadyRunning)?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct AppContext {
    config: AppConfig,
    backend: Arc<dyn DownloaderBackend>,
    probe: Arc<dyn ToolProbe>,
    busy: Arc<AtomicBool>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        let (backend, probe) = backend_from_config(&config);
        Self::with_parts(config, backend, probe)
    }

    pub fn with_parts(
        config: AppConfig,
        backend: Arc<dyn DownloaderBackend>,
        probe: Arc<dyn ToolProbe>,
    ) -> Self {
        Self {
            config,
            backend,
            probe,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Whether a batch started from this context is still running
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Validate `raw_urls` and start downloading them in the background.
    ///
    /// Input errors, a running batch and an unusable output directory are
    /// reported here; everything after that arrives as [`BatchEvent`]s.
    pub fn start_batch<I, S>(
        &self,
        raw_urls: I,
        format: FormatChoice,
        quality: QualityChoice,
    ) -> Result<BatchHandle, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = prepare_batch(raw_urls)?;
        let guard = BusyGuard::acquire(&self.busy)?;
        let downloader = Downloader::new(
            self.backend.clone(),
            self.probe.clone(),
            &self.config.output_dir,
        )?;

        let (tx, rx) = mpsc::channel(self.config.event_channel_capacity.max(1));
        let progress_tx = tx.clone();

        let worker = std::thread::Builder::new()
            .name("download-worker".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        drop(guard);
                        let _ = tx.blocking_send(BatchEvent::Failed(format!(
                            "Failed to start async runtime: {}",
                            e
                        )));
                        return;
                    }
                };

                let outcome = runtime.block_on(downloader.run(&urls, format, quality, move |progress| {
                    // A full channel only means the UI is behind; drop the update
                    match progress_tx.try_send(BatchEvent::Progress(progress)) {
                        Ok(()) | Err(TrySendError::Full(_)) => Ok(()),
                        Err(TrySendError::Closed(_)) => Err(RelayError::Disconnected),
                    }
                }));

                let event = match outcome {
                    Ok(results) => BatchEvent::Finished(results),
                    Err(e) => {
                        tracing::error!("[App] batch aborted: {}", e);
                        BatchEvent::Failed(e.to_string())
                    }
                };

                // Free the context before the final event so the receiver can start the next batch
                drop(guard);
                if tx.blocking_send(event).is_err() {
                    tracing::debug!("[App] final event dropped, receiver gone");
                }
            })
            .map_err(|e| BatchError::Worker(e.to_string()))?;

        Ok(BatchHandle {
            events: rx,
            worker: Some(worker),
        })
    }
}

/// Receiving end of a running batch. Dropping it cancels the batch after
/// the item in progress.
pub struct BatchHandle {
    events: mpsc::Receiver<BatchEvent>,
    worker: Option<JoinHandle<()>>,
}

impl BatchHandle {
    /// Block until the next event; `None` once the worker has finished.
    ///
    /// Must not be called from inside an async runtime.
    pub fn next_event(&mut self) -> Option<BatchEvent> {
        self.events.blocking_recv()
    }

    pub async fn recv(&mut self) -> Option<BatchEvent> {
        self.events.recv().await
    }

    /// Drain events until the batch ends and return its results
    pub fn wait(mut self) -> Result<Vec<DownloadResult>, BatchError> {
        while let Some(event) = self.next_event() {
            match event {
                BatchEvent::Progress(_) => {}
                BatchEvent::Finished(results) => {
                    self.join()?;
                    return Ok(results);
                }
                BatchEvent::Failed(message) => {
                    self.join()?;
                    return Err(BatchError::Worker(message));
                }
            }
        }

        self.join()?;
        Err(BatchError::Worker("worker exited without a result".to_string()))
    }

    fn join(&mut self) -> Result<(), BatchError> {
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| BatchError::Worker("download worker panicked".to_string()))?;
        }
        Ok(())
    }
}
