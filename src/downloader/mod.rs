// Downloader module - validation, options resolution and the batch runner

pub mod backends;
pub mod errors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod tools;
pub mod traits;
pub mod utils;
pub mod validator;

pub use backends::YtDlpBackend;
pub use errors::{BatchError, DownloadError, RelayError};
pub use format_selector::{
    capability_notice, resolve_options, MediaSelector, ResolvedOptions, MISSING_TRANSCODER_WARNING,
};
pub use models::{
    BatchProgress, BatchSummary, DownloadResult, FormatChoice, ItemProgress, QualityChoice,
    ValidationOutcome,
};
pub use orchestrator::{backend_from_config, run_batch, Downloader};
pub use tools::{ToolInfo, ToolManager, ToolType};
pub use traits::{DownloadedMedia, DownloaderBackend, NoopProgress, ProgressSink, ToolProbe};
pub use utils::sanitize_filename;
pub use validator::{is_youtube_url, prepare_batch, validate_urls};
