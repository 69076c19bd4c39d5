use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};

use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::ResolvedOptions;
use crate::downloader::models::ItemProgress;
use crate::downloader::traits::{DownloadedMedia, DownloaderBackend};
use crate::downloader::utils::rename_to_title;

const PROGRESS_MARKER: &str = "[progress] ";
const TITLE_MARKER: &str = "[done-title] ";
const PATH_MARKER: &str = "[done-path] ";

/// stderr lines kept for error reporting
const STDERR_TAIL_LINES: usize = 50;

/// Title used when yt-dlp did not report one
const UNKNOWN_TITLE: &str = "Unknown";

/// A stdout line we care about
#[derive(Debug, Clone, PartialEq)]
enum OutputLine {
    Progress {
        percent: Option<f32>,
        title: Option<String>,
    },
    Title(String),
    FilePath(PathBuf),
}

/// Parse one line of yt-dlp stdout.
///
/// Understands our own progress/print templates and, as a fallback, the
/// default `[download]  12.5% of ...` and `Destination:` lines.
fn parse_output_line(line: &str) -> Option<OutputLine> {
    lazy_static::lazy_static! {
        static ref DEFAULT_PROGRESS_RE: Regex =
            Regex::new(r"^\[download\]\s+(\d+\.?\d*)%").unwrap();
        static ref DEST_RE: Regex = Regex::new(r"^\[download\]\s+Destination:\s+(.+)$").unwrap();
    }

    let line = line.trim_end();

    if let Some(rest) = line.strip_prefix(PROGRESS_MARKER) {
        let (percent_str, title) = match rest.split_once('|') {
            Some((p, t)) => (p, Some(t.trim())),
            None => (rest, None),
        };
        let percent = percent_str.trim().trim_end_matches('%').trim().parse::<f32>().ok();
        let title = title
            .filter(|t| !t.is_empty() && *t != "NA")
            .map(str::to_string);
        return Some(OutputLine::Progress { percent, title });
    }

    if let Some(title) = line.strip_prefix(TITLE_MARKER) {
        return Some(OutputLine::Title(title.to_string()));
    }

    if let Some(path) = line.strip_prefix(PATH_MARKER) {
        return Some(OutputLine::FilePath(PathBuf::from(path)));
    }

    if let Some(caps) = DEFAULT_PROGRESS_RE.captures(line) {
        let percent = caps.get(1).and_then(|m| m.as_str().parse::<f32>().ok());
        return Some(OutputLine::Progress { percent, title: None });
    }

    if let Some(caps) = DEST_RE.captures(line) {
        // Just the file name, not the full path
        let title = caps
            .get(1)
            .map(|m| PathBuf::from(m.as_str()))
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()));
        return Some(OutputLine::Progress { percent: None, title });
    }

    None
}

/// Reduce captured stderr to the lines worth showing to a user
fn summarize_stderr(stderr: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter_map(|l| l.strip_prefix("ERROR:"))
        .map(str::trim)
        .collect();

    if !errors.is_empty() {
        return errors.join(" | ");
    }

    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

async fn collect_stderr(stderr: ChildStderr) -> String {
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut lines = BufReader::new(stderr).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        tracing::debug!("[yt-dlp] {}", line);
        if tail.len() >= STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    tail.into_iter().collect::<Vec<_>>().join("\n")
}

/// Backend driving the yt-dlp executable
#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    ytdlp_bin: PathBuf,
    socket_timeout_secs: u32,
    proxy: Option<String>,
}

impl YtDlpBackend {
    pub fn new(ytdlp_bin: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp_bin: ytdlp_bin.into(),
            socket_timeout_secs: 30,
            proxy: None,
        }
    }

    pub fn with_socket_timeout(mut self, seconds: u32) -> Self {
        self.socket_timeout_secs = seconds;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Full argument list for one item
    pub fn build_args(&self, url: &str, options: &ResolvedOptions) -> Vec<String> {
        let mut args = options.to_args();

        args.extend([
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            format!(
                "download:{}%(progress._percent_str)s|%(info.title)s",
                PROGRESS_MARKER
            ),
            "--print".to_string(),
            format!("after_move:{}%(title)s", TITLE_MARKER),
            "--print".to_string(),
            format!("after_move:{}%(filepath)s", PATH_MARKER),
            "--no-simulate".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
        ]);

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl DownloaderBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn download(
        &self,
        url: &str,
        options: &ResolvedOptions,
    ) -> Result<DownloadedMedia, DownloadError> {
        let args = self.build_args(url, options);
        tracing::debug!("[yt-dlp] {} {}", self.ytdlp_bin.display(), args.join(" "));

        let mut child = Command::new(&self.ytdlp_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DownloadError::ToolNotFound(format!("{}: {}", self.ytdlp_bin.display(), e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stderr".to_string()))?;

        let stderr_task = tokio::spawn(collect_stderr(stderr));

        let mut title: Option<String> = None;
        let mut file_path: Option<PathBuf> = None;
        let mut lines = BufReader::new(stdout).lines();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("Failed to read output: {}", e)))?
        {
            match parse_output_line(&line) {
                Some(OutputLine::Progress { percent, title }) => {
                    options.progress.report(ItemProgress { percent, title });
                }
                Some(OutputLine::Title(t)) => title = Some(t),
                Some(OutputLine::FilePath(p)) => file_path = Some(p),
                None => tracing::trace!("[yt-dlp] {}", line),
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("Process error: {}", e)))?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let detail = summarize_stderr(&stderr_output);
            tracing::debug!("[yt-dlp] exited with {}: {}", status, detail);
            return Err(DownloadError::from(detail));
        }

        let title = title.unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let path = file_path.map(|p| match rename_to_title(&p, &title) {
            Ok(renamed) => renamed,
            Err(e) => {
                tracing::warn!("[yt-dlp] could not rename {}: {}", p.display(), e);
                p
            }
        });

        Ok(DownloadedMedia { title, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::format_selector::resolve_options;
    use crate::downloader::models::{FormatChoice, QualityChoice};
    use crate::downloader::traits::NoopProgress;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn parses_template_progress() {
        assert_eq!(
            parse_output_line("[progress]  42.5%|My Song"),
            Some(OutputLine::Progress {
                percent: Some(42.5),
                title: Some("My Song".to_string())
            })
        );
    }

    #[test]
    fn progress_title_may_contain_separator() {
        assert_eq!(
            parse_output_line("[progress] 10.0%|a | b"),
            Some(OutputLine::Progress {
                percent: Some(10.0),
                title: Some("a | b".to_string())
            })
        );
    }

    #[test]
    fn unknown_percent_is_none() {
        assert_eq!(
            parse_output_line("[progress]     N/A|NA"),
            Some(OutputLine::Progress { percent: None, title: None })
        );
    }

    #[test]
    fn parses_print_markers() {
        assert_eq!(
            parse_output_line("[done-title] Some: Title"),
            Some(OutputLine::Title("Some: Title".to_string()))
        );
        assert_eq!(
            parse_output_line("[done-path] /tmp/out/Some： Title.mp4"),
            Some(OutputLine::FilePath(PathBuf::from("/tmp/out/Some： Title.mp4")))
        );
    }

    #[test]
    fn parses_default_download_lines() {
        assert_eq!(
            parse_output_line("[download]  12.5% of ~ 310.04MiB at  374.36KiB/s ETA 11:59"),
            Some(OutputLine::Progress { percent: Some(12.5), title: None })
        );
        assert_eq!(
            parse_output_line("[download] Destination: /tmp/out/Clip.webm"),
            Some(OutputLine::Progress {
                percent: None,
                title: Some("Clip.webm".to_string())
            })
        );
        assert_eq!(parse_output_line("[youtube] abc: Downloading webpage"), None);
    }

    #[test]
    fn stderr_summary_prefers_error_lines() {
        let stderr = "WARNING: something\nERROR: [youtube] x: Video unavailable\nmore";
        assert_eq!(summarize_stderr(stderr), "[youtube] x: Video unavailable");
        assert_eq!(
            summarize_stderr("ERROR: first\nERROR: second"),
            "first | second"
        );
        assert_eq!(summarize_stderr("one\ntwo\n\n"), "two");
        assert_eq!(summarize_stderr(""), "");
    }

    #[test]
    fn args_end_with_url_and_carry_options() {
        let options = resolve_options(
            FormatChoice::Audio,
            QualityChoice::BestAvailable,
            true,
            Path::new("/tmp/out"),
            Arc::new(NoopProgress),
        )
        .with_ffmpeg_location(Some(PathBuf::from("/opt/ffmpeg")));
        let backend = YtDlpBackend::new("yt-dlp")
            .with_socket_timeout(15)
            .with_proxy(Some("socks5://127.0.0.1:1080".to_string()));

        let args = backend.build_args("https://youtu.be/abc", &options);
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
        assert_eq!(&args[..2], &["-f".to_string(), "bestaudio/best".to_string()]);
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"--no-simulate".to_string()));
        assert!(args.contains(&"15".to_string()));
        assert!(args.contains(&"socks5://127.0.0.1:1080".to_string()));
        assert!(args.contains(&"/opt/ffmpeg".to_string()));
        assert!(args.contains(&"mp3".to_string()));
    }
}
