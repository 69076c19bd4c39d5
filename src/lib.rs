pub mod app;
pub mod cli;
pub mod config;
pub mod downloader;

pub use app::{AppContext, BatchEvent, BatchHandle};
pub use config::{AppConfig, ConfigError};
pub use downloader::{
    prepare_batch, resolve_options, run_batch, sanitize_filename, validate_urls, BatchError,
    BatchProgress, BatchSummary, DownloadError, DownloadResult, FormatChoice, QualityChoice,
    ResolvedOptions, ValidationOutcome,
};

pub use cli::run;
