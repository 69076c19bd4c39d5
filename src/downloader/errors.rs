// Error types for the downloader and batch runner

use std::path::PathBuf;

use thiserror::Error;

/// Maximum number of invalid entries listed in an input error
const INVALID_PREVIEW_LIMIT: usize = 5;

/// Per-item failure reported by a backend. Recorded in the item's result,
/// never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Socket or connection timeout while talking to YouTube
    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    /// Video is private, deleted, region-locked or otherwise not served
    #[error("Video unavailable: {0}")]
    Unavailable(String),

    /// yt-dlp does not recognize the URL
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// yt-dlp or ffmpeg not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Conversion/merge step failed after the transfer
    #[error("Post-processing failed: {0}")]
    PostProcessing(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Unknown error with details
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Classify raw yt-dlp stderr output
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("timed out") || lower.contains("timeout") {
            return Self::NetworkTimeout(s);
        }

        if lower.contains("unsupported url") {
            return Self::UnsupportedUrl(s);
        }

        if lower.contains("video unavailable")
            || lower.contains("private video")
            || lower.contains("has been removed")
            || lower.contains("not available in your country")
            || lower.contains("members-only")
        {
            return Self::Unavailable(s);
        }

        if lower.contains("ffmpeg") || lower.contains("ffprobe") || lower.contains("postprocessing") {
            return Self::PostProcessing(s);
        }

        if lower.contains("command not found") {
            return Self::ToolNotFound(s);
        }

        if s.trim().is_empty() {
            return Self::Unknown("yt-dlp exited without error output".to_string());
        }

        Self::ExecutionError(s)
    }
}

impl From<&str> for DownloadError {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}

/// Progress could not be delivered to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("progress receiver disconnected")]
    Disconnected,
}

/// Errors that stop a whole batch invocation
#[derive(Debug, Error)]
pub enum BatchError {
    /// Input contained no non-blank lines
    #[error("No URLs provided. Please enter at least one YouTube URL.")]
    NoUrls,

    /// At least one input line is not a recognized YouTube URL
    #[error("{}", invalid_urls_message(.0))]
    InvalidUrls(Vec<String>),

    /// Another batch is still running in this context
    #[error("A download batch is already in progress")]
    AlreadyRunning,

    #[error("Failed to prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Progress relay failed: {0}")]
    ProgressRelay(#[from] RelayError),

    #[error("Download worker failed: {0}")]
    Worker(String),
}

impl BatchError {
    /// Whether the error was caused by the caller's input rather than the run
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::NoUrls | Self::InvalidUrls(_))
    }
}

fn invalid_urls_message(invalid: &[String]) -> String {
    let mut message = String::from("Invalid URLs found:\n");
    let shown: Vec<&str> = invalid
        .iter()
        .take(INVALID_PREVIEW_LIMIT)
        .map(String::as_str)
        .collect();
    message.push_str(&shown.join("\n"));
    if invalid.len() > INVALID_PREVIEW_LIMIT {
        message.push_str(&format!(
            "\n... and {} more",
            invalid.len() - INVALID_PREVIEW_LIMIT
        ));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_timeouts() {
        let err = DownloadError::from("ERROR: Read timed out.".to_string());
        assert!(matches!(err, DownloadError::NetworkTimeout(_)));
    }

    #[test]
    fn classifies_unavailable_video() {
        let err = DownloadError::from("ERROR: [youtube] abc: Private video. Sign in");
        assert!(matches!(err, DownloadError::Unavailable(_)));

        let err = DownloadError::from("ERROR: [youtube] abc: Video unavailable");
        assert!(matches!(err, DownloadError::Unavailable(_)));
    }

    #[test]
    fn classifies_unsupported_url() {
        let err = DownloadError::from("ERROR: Unsupported URL: https://example.com");
        assert!(matches!(err, DownloadError::UnsupportedUrl(_)));
    }

    #[test]
    fn classifies_missing_ffmpeg() {
        let err = DownloadError::from(
            "ERROR: Postprocessing: ffprobe and ffmpeg not found. Please install",
        );
        assert!(matches!(err, DownloadError::PostProcessing(_)));
    }

    #[test]
    fn write_errors_are_not_missing_tools() {
        let err = DownloadError::from(
            "ERROR: unable to open for writing: [Errno 2] No such file or directory: 'out/x.part'",
        );
        assert!(matches!(err, DownloadError::ExecutionError(_)));
    }

    #[test]
    fn empty_stderr_is_unknown() {
        let err = DownloadError::from("   ");
        assert!(matches!(err, DownloadError::Unknown(_)));
    }

    #[test]
    fn detail_is_kept_in_display() {
        let err = DownloadError::from("ERROR: HTTP Error 500".to_string());
        assert_eq!(err.to_string(), "Execution error: ERROR: HTTP Error 500");
    }

    #[test]
    fn invalid_urls_message_lists_first_five() {
        let invalid: Vec<String> = (1..=7).map(|i| format!("bad{}", i)).collect();
        let message = BatchError::InvalidUrls(invalid).to_string();
        assert!(message.starts_with("Invalid URLs found:\nbad1\n"));
        assert!(message.contains("bad5"));
        assert!(!message.contains("bad6"));
        assert!(message.ends_with("... and 2 more"));
    }

    #[test]
    fn invalid_urls_message_without_overflow() {
        let message = BatchError::InvalidUrls(vec!["not a url".to_string()]).to_string();
        assert_eq!(message, "Invalid URLs found:\nnot a url");
    }

    #[test]
    fn input_errors_are_flagged() {
        assert!(BatchError::NoUrls.is_input_error());
        assert!(BatchError::InvalidUrls(vec![]).is_input_error());
        assert!(!BatchError::AlreadyRunning.is_input_error());
    }
}
