// Options resolution: format/quality choice -> yt-dlp configuration
//
// Combining separately encoded video and audio streams needs ffmpeg. Without
// it only pre-merged (single-file) formats can be requested, which usually
// caps quality, and audio stays in its native container.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::models::{FormatChoice, QualityChoice};
use super::traits::ProgressSink;

/// Output template, relative to the output directory
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Stream selection requested from the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSelector {
    /// Best audio-only stream, any single stream as fallback
    BestAudio,
    /// Best video stream merged with best audio stream
    BestMerged,
    /// Video at or below the height merged with audio, pre-merged fallback at the same bound
    MergedUpTo(u32),
    /// Best stream already containing video and audio
    BestPremerged,
    /// Pre-merged stream at or below the height, any pre-merged stream as fallback
    PremergedUpTo(u32),
}

impl MediaSelector {
    /// yt-dlp `-f` format string
    pub fn format_spec(&self) -> String {
        match self {
            Self::BestAudio => "bestaudio/best".to_string(),
            Self::BestMerged => "bestvideo+bestaudio/best".to_string(),
            Self::MergedUpTo(height) => format!(
                "bestvideo[height<={}]+bestaudio/best[height<={}]",
                height, height
            ),
            Self::BestPremerged => "best".to_string(),
            Self::PremergedUpTo(height) => format!("best[height<={}]/best", height),
        }
    }

    /// Whether the selection combines two streams (needs ffmpeg)
    pub fn requires_merge(&self) -> bool {
        matches!(self, Self::BestMerged | Self::MergedUpTo(_))
    }
}

/// Lossy codecs the audio extraction step can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Mp3,
}

impl AudioCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
        }
    }
}

/// Post-processing that converts the downloaded audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: AudioCodec,
    pub bitrate_kbps: u32,
}

impl Default for AudioExtraction {
    fn default() -> Self {
        Self {
            codec: AudioCodec::Mp3,
            bitrate_kbps: 192,
        }
    }
}

/// Typed configuration handed to a backend for every item of a batch
#[derive(Clone)]
pub struct ResolvedOptions {
    pub selector: MediaSelector,
    pub audio_extraction: Option<AudioExtraction>,
    pub output_dir: PathBuf,
    /// ffmpeg found by the probe, handed to yt-dlp so both agree on it
    pub ffmpeg_location: Option<PathBuf>,
    pub progress: Arc<dyn ProgressSink>,
}

impl ResolvedOptions {
    pub fn with_ffmpeg_location(mut self, path: Option<PathBuf>) -> Self {
        self.ffmpeg_location = path;
        self
    }

    /// Full output template: output directory, title as base name, natural extension
    pub fn output_template(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_TEMPLATE)
    }

    /// Selection and post-processing arguments for yt-dlp
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            self.selector.format_spec(),
            "-o".to_string(),
            self.output_template().to_string_lossy().to_string(),
        ];

        if let Some(extraction) = &self.audio_extraction {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                extraction.codec.as_str().to_string(),
                "--audio-quality".to_string(),
                format!("{}K", extraction.bitrate_kbps),
            ]);
        }

        if let Some(path) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(path.to_string_lossy().to_string());
        }

        args
    }
}

impl fmt::Debug for ResolvedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOptions")
            .field("selector", &self.selector)
            .field("audio_extraction", &self.audio_extraction)
            .field("output_dir", &self.output_dir)
            .field("ffmpeg_location", &self.ffmpeg_location)
            .finish_non_exhaustive()
    }
}

/// Build the download configuration for a batch.
///
/// `tool_available` is the result of a fresh ffmpeg probe; quality is
/// ignored for audio.
pub fn resolve_options(
    format: FormatChoice,
    quality: QualityChoice,
    tool_available: bool,
    output_dir: &Path,
    progress: Arc<dyn ProgressSink>,
) -> ResolvedOptions {
    let (selector, audio_extraction) = match (format, tool_available) {
        (FormatChoice::Audio, true) => (MediaSelector::BestAudio, Some(AudioExtraction::default())),
        (FormatChoice::Audio, false) => (MediaSelector::BestAudio, None),
        (FormatChoice::Video, true) => match quality.max_height() {
            Some(height) => (MediaSelector::MergedUpTo(height), None),
            None => (MediaSelector::BestMerged, None),
        },
        (FormatChoice::Video, false) => match quality.max_height() {
            Some(height) => (MediaSelector::PremergedUpTo(height), None),
            None => (MediaSelector::BestPremerged, None),
        },
    };

    ResolvedOptions {
        selector,
        audio_extraction,
        output_dir: output_dir.to_path_buf(),
        ffmpeg_location: None,
        progress,
    }
}

/// Advisory shown when ffmpeg is missing and the request will be degraded
pub fn capability_notice(
    format: FormatChoice,
    quality: QualityChoice,
    tool_available: bool,
) -> Option<&'static str> {
    if tool_available {
        return None;
    }

    match (format, quality) {
        (FormatChoice::Audio, _) => Some(
            "FFmpeg not available: audio will be downloaded in original format (not MP3).\n\
             Install FFmpeg for MP3 conversion.",
        ),
        (FormatChoice::Video, QualityChoice::BestAvailable | QualityChoice::Q1080p) => Some(
            "FFmpeg not available: video will download in lower quality (pre-merged format).\n\
             Install FFmpeg for best quality downloads.",
        ),
        _ => None,
    }
}

/// Startup warning when ffmpeg cannot be found at all
pub const MISSING_TRANSCODER_WARNING: &str = "FFmpeg is not installed or not in your system PATH.\n\n\
     Without FFmpeg:\n\
     - Videos will download in lower quality (pre-merged formats)\n\
     - Audio downloads will be in original format (not MP3)\n\
     - High quality downloads may not be available\n\n\
     To get the best quality:\n\
     1. Download FFmpeg from: https://ffmpeg.org/download.html\n\
     2. Add it to your system PATH\n\
     3. Restart this application\n\n\
     The application will continue to work with reduced quality.";
