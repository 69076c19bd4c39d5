use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app::{AppContext, BatchEvent};
use crate::config::AppConfig;
use crate::downloader::{
    capability_notice, BatchError, BatchSummary, DownloadResult, FormatChoice, QualityChoice,
    ToolManager, ToolType, MISSING_TRANSCODER_WARNING,
};

const EXIT_FATAL: u8 = 1;
const EXIT_PARTIAL: u8 = 2;

#[derive(Parser, Debug, Clone)]
#[command(name = "youtube-bulk-downloader")]
#[command(version)]
#[command(about = "Download many YouTube videos or their audio in one go", long_about = None)]
pub struct Args {
    /// YouTube URLs (watch, shorts or youtu.be links)
    urls: Vec<String>,

    /// Read URLs from a file, one per line ("-" for stdin)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// video or audio
    #[arg(short, long, default_value = "video")]
    format: FormatChoice,

    /// best, 1080p, 720p or 480p (ignored for audio)
    #[arg(short, long, default_value = "best")]
    quality: QualityChoice,

    /// Output directory (overrides the config file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Config file (default: <config dir>/youtube-bulk-downloader/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print results as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Show yt-dlp and ffmpeg status and exit
    #[arg(long)]
    tools: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Entry point of the binary
pub fn run() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn execute(args: Args) -> Result<ExitCode> {
    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }

    let tools = ToolManager::with_overrides(config.ytdlp_bin.clone(), config.ffmpeg_bin.clone());
    if args.tools {
        print_tools(&tools, args.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut urls = args.urls.clone();
    if let Some(path) = &args.input {
        urls.extend(read_url_lines(path)?);
    }

    let ffmpeg_available = tools.is_available(ToolType::Ffmpeg);
    if !ffmpeg_available {
        tracing::warn!("{}", MISSING_TRANSCODER_WARNING);
    }
    if let Some(notice) = capability_notice(args.format, args.quality, ffmpeg_available) {
        eprintln!("{}", notice);
    }

    let context = AppContext::new(config);
    let mut handle = match context.start_batch(&urls, args.format, args.quality) {
        Ok(handle) => handle,
        Err(e) if e.is_input_error() => {
            eprintln!("{}", e);
            return Ok(ExitCode::from(EXIT_FATAL));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!("Saving to {}", context.config().output_dir.display());

    let mut last_line = String::new();
    let results = loop {
        match handle.next_event() {
            Some(BatchEvent::Progress(progress)) => {
                let line = progress.status_line();
                if line != last_line {
                    eprintln!("{}", line);
                    last_line = line;
                }
            }
            Some(BatchEvent::Finished(results)) => break results,
            Some(BatchEvent::Failed(message)) => return Err(BatchError::Worker(message).into()),
            None => anyhow::bail!("download worker stopped without reporting results"),
        }
    };

    let summary = BatchSummary::from_results(&results);
    report(&summary, &results, args.json)?;
    Ok(ExitCode::from(exit_status(&summary)))
}

/// Non-blank lines of `path`, or of stdin for "-"
pub fn read_url_lines(path: &Path) -> Result<Vec<String>> {
    let reader: Box<dyn BufRead> = if path == Path::new("-") {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut urls = Vec::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if !line.trim().is_empty() {
            urls.push(line);
        }
    }
    Ok(urls)
}

fn exit_status(summary: &BatchSummary) -> u8 {
    if summary.failures == 0 {
        0
    } else {
        EXIT_PARTIAL
    }
}

fn report(summary: &BatchSummary, results: &[DownloadResult], json: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        let doc = serde_json::json!({
            "summary": summary,
            "results": results,
        });
        serde_json::to_writer_pretty(&mut out, &doc)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{}", summary)?;
    }
    Ok(())
}

fn print_tools(tools: &ToolManager, json: bool) -> Result<()> {
    let infos = tools.get_all_tools();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if json {
        serde_json::to_writer_pretty(&mut out, &infos)?;
        writeln!(out)?;
        return Ok(());
    }

    for info in &infos {
        match (&info.path, &info.version) {
            (Some(path), version) => writeln!(
                out,
                "{:<8} {} ({})",
                info.name,
                path.display(),
                version.as_deref().unwrap_or("unknown version")
            )?,
            (None, _) => writeln!(out, "{:<8} not found", info.name)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arguments() {
        let args = Args::try_parse_from([
            "youtube-bulk-downloader",
            "https://youtu.be/a",
            "https://youtu.be/b",
            "-f",
            "audio",
            "-q",
            "720p",
            "-o",
            "/tmp/yt",
            "--json",
        ])
        .unwrap();

        assert_eq!(args.urls.len(), 2);
        assert_eq!(args.format, FormatChoice::Audio);
        assert_eq!(args.quality, QualityChoice::Q720p);
        assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/yt")));
        assert!(args.json);
        assert!(!args.tools);
    }

    #[test]
    fn defaults_and_bad_choices() {
        let args = Args::try_parse_from(["youtube-bulk-downloader"]).unwrap();
        assert_eq!(args.format, FormatChoice::Video);
        assert_eq!(args.quality, QualityChoice::BestAvailable);
        assert!(args.urls.is_empty());

        assert!(Args::try_parse_from(["youtube-bulk-downloader", "-f", "flac"]).is_err());
        assert!(Args::try_parse_from(["youtube-bulk-downloader", "-q", "4k"]).is_err());
    }

    #[test]
    fn reads_url_file_skipping_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.txt");
        std::fs::write(
            &path,
            "https://youtu.be/a\n\n   \nhttps://www.youtube.com/watch?v=b\n",
        )
        .unwrap();

        let urls = read_url_lines(&path).unwrap();
        assert_eq!(
            urls,
            vec!["https://youtu.be/a", "https://www.youtube.com/watch?v=b"]
        );
        assert!(read_url_lines(&dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn exit_code_reflects_failures() {
        let ok = [DownloadResult::succeeded("https://youtu.be/a", "A")];
        assert_eq!(exit_status(&BatchSummary::from_results(&ok)), 0);

        let mixed = [
            DownloadResult::succeeded("https://youtu.be/a", "A"),
            DownloadResult::failed("https://youtu.be/b", "gone"),
        ];
        assert_eq!(exit_status(&BatchSummary::from_results(&mixed)), EXIT_PARTIAL);
    }
}
