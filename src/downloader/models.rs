// Common data models for downloader

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of failed URLs listed in the completion summary
const FAILED_PREVIEW_LIMIT: usize = 3;

/// Unknown value supplied for a format or quality choice
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseChoiceError {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

/// What to download: full video or audio only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatChoice {
    #[default]
    Video,
    Audio,
}

impl fmt::Display for FormatChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "Video (MP4)"),
            Self::Audio => write!(f, "Audio Only (MP3)"),
        }
    }
}

impl FromStr for FormatChoice {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "video" | "video (mp4)" => Ok(Self::Video),
            "audio" | "audio only (mp3)" => Ok(Self::Audio),
            _ => Err(ParseChoiceError {
                kind: "format",
                value: s.to_string(),
                expected: "video, audio",
            }),
        }
    }
}

/// Requested video quality ceiling. Ignored for audio downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QualityChoice {
    #[default]
    #[serde(rename = "best")]
    BestAvailable,
    #[serde(rename = "1080p")]
    Q1080p,
    #[serde(rename = "720p")]
    Q720p,
    #[serde(rename = "480p")]
    Q480p,
}

impl QualityChoice {
    /// Vertical resolution bound, `None` for best available
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Self::BestAvailable => None,
            Self::Q1080p => Some(1080),
            Self::Q720p => Some(720),
            Self::Q480p => Some(480),
        }
    }
}

impl fmt::Display for QualityChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_height() {
            Some(height) => write!(f, "{}p", height),
            None => write!(f, "Best Available"),
        }
    }
}

impl FromStr for QualityChoice {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best" | "best available" => Ok(Self::BestAvailable),
            "1080p" | "1080" => Ok(Self::Q1080p),
            "720p" | "720" => Ok(Self::Q720p),
            "480p" | "480" => Ok(Self::Q480p),
            _ => Err(ParseChoiceError {
                kind: "quality",
                value: s.to_string(),
                expected: "best, 1080p, 720p, 480p",
            }),
        }
    }
}

/// Partition of a request into recognized and rejected lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: Vec<String>,
    pub invalid: Vec<String>,
}

impl ValidationOutcome {
    /// Nothing but blank lines were supplied
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty() && self.invalid.is_empty()
    }
}

/// Outcome of a single URL in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub url: String,
    pub success: bool,
    pub message: String,
    /// Resolved title on success
    pub filename: Option<String>,
}

impl DownloadResult {
    pub fn succeeded(url: &str, title: &str) -> Self {
        Self {
            url: url.to_string(),
            success: true,
            message: format!("Successfully downloaded: {}", title),
            filename: Some(title.to_string()),
        }
    }

    pub fn failed(url: &str, detail: impl fmt::Display) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            message: format!("Failed to download {}: {}", url, detail),
            filename: None,
        }
    }
}

/// Progress of a batch, forwarded to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// 1-based index of the item being processed
    pub current: usize,
    pub total: usize,
    /// Title or file name of the current item, once known
    pub title: Option<String>,
    /// Byte progress of the current item in percent
    pub percent: Option<f32>,
}

impl BatchProgress {
    /// Fraction of the batch reached, for progress bars
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f32 / self.total as f32
        }
    }

    /// One-line status text, title cut to 50 characters
    pub fn status_line(&self) -> String {
        let title = self.title.as_deref().unwrap_or("Unknown");
        let short: String = title.chars().take(50).collect();
        match self.percent {
            Some(percent) => format!(
                "Downloading {} of {}: {}... {:.1}%",
                self.current, self.total, short, percent
            ),
            None => format!("Downloading {} of {}: {}...", self.current, self.total, short),
        }
    }
}

/// Progress reported by a backend for the item it is working on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemProgress {
    pub percent: Option<f32>,
    pub title: Option<String>,
}

/// Counts and failed URLs of a finished batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub successes: usize,
    pub failures: usize,
    pub failed_urls: Vec<String>,
}

impl BatchSummary {
    pub fn from_results(results: &[DownloadResult]) -> Self {
        let failed_urls: Vec<String> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.url.clone())
            .collect();

        Self {
            successes: results.len() - failed_urls.len(),
            failures: failed_urls.len(),
            failed_urls,
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Download complete!\n\nSuccessful: {}\nFailed: {}",
            self.successes, self.failures
        )?;

        if self.failures > 0 {
            write!(f, "\n\nFailed URLs:")?;
            for url in self.failed_urls.iter().take(FAILED_PREVIEW_LIMIT) {
                write!(f, "\n{}", url)?;
            }
            if self.failed_urls.len() > FAILED_PREVIEW_LIMIT {
                write!(
                    f,
                    "\n... and {} more",
                    self.failed_urls.len() - FAILED_PREVIEW_LIMIT
                )?;
            }
        }
        Ok(())
    }
}
