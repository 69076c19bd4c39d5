use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::traits::ToolProbe;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn binary_name(&self) -> String {
        if cfg!(target_os = "windows") {
            format!("{}.exe", self.as_str())
        } else {
            self.as_str().to_string()
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version", // ffmpeg uses a single dash
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

/// Locates external tools. Nothing is cached: each call looks again.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    ytdlp_override: Option<PathBuf>,
    ffmpeg_override: Option<PathBuf>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer explicitly configured binaries over the search
    pub fn with_overrides(ytdlp: Option<PathBuf>, ffmpeg: Option<PathBuf>) -> Self {
        Self {
            ytdlp_override: ytdlp,
            ffmpeg_override: ffmpeg,
        }
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.detect_tool(tool_type);
        let version = path.as_deref().and_then(|p| self.get_version(p, tool_type));

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            version,
            is_available: path.is_some(),
            path,
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp),
            self.get_tool_info(ToolType::Ffmpeg),
        ]
    }

    pub fn is_available(&self, tool_type: ToolType) -> bool {
        self.detect_tool(tool_type).is_some()
    }

    pub fn detect_tool(&self, tool_type: ToolType) -> Option<PathBuf> {
        let configured = match tool_type {
            ToolType::YtDlp => self.ytdlp_override.as_ref(),
            ToolType::Ffmpeg => self.ffmpeg_override.as_ref(),
        };

        // 1. Explicit configuration
        if let Some(path) = configured {
            if path.is_file() {
                return Some(path.clone());
            }
            tracing::warn!(
                "[Tools] configured {} not found at {}, searching",
                tool_type.as_str(),
                path.display()
            );
        }

        let binary_name = tool_type.binary_name();

        // 2. Common install locations
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];

        for path in common_paths {
            let path = Path::new(&path);
            if path.is_file() {
                return Some(path.to_path_buf());
            }
        }

        // 3. PATH lookup
        let locator = if cfg!(target_os = "windows") { "where" } else { "which" };
        if let Ok(output) = Command::new(locator)
            .arg(&binary_name)
            .stderr(Stdio::null())
            .output()
        {
            if output.status.success() {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if let Some(first) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
                    return Some(PathBuf::from(first));
                }
            }
        }

        tracing::debug!("[Tools] {} not found", tool_type.as_str());
        None
    }

    fn get_version(&self, path: &Path, tool_type: ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_arg()).output() {
            Ok(output) if output.status.success() => {
                let out = String::from_utf8_lossy(&output.stdout);
                // ffmpeg prints a banner; the first line carries the version
                out.lines().next().map(|l| l.trim().to_string())
            }
            _ => None,
        }
    }
}

impl ToolProbe for ToolManager {
    fn transcoder_location(&self) -> Option<PathBuf> {
        self.detect_tool(ToolType::Ffmpeg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names() {
        assert_eq!(ToolType::YtDlp.as_str(), "yt-dlp");
        assert_eq!(ToolType::Ffmpeg.as_str(), "ffmpeg");
        assert_eq!(ToolType::Ffmpeg.version_arg(), "-version");
    }

    #[test]
    fn configured_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("my-ffmpeg");
        std::fs::write(&fake, b"#!/bin/sh\n").unwrap();

        let manager = ToolManager::with_overrides(None, Some(fake.clone()));
        assert_eq!(manager.detect_tool(ToolType::Ffmpeg), Some(fake.clone()));
        assert_eq!(manager.transcoder_location(), Some(fake));
        assert!(manager.transcoder_available());
    }

    #[test]
    fn missing_configured_path_is_never_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-ffmpeg");

        let manager = ToolManager::with_overrides(None, Some(missing.clone()));
        let found = manager.transcoder_location();
        assert_ne!(found.as_deref(), Some(missing.as_path()));
        assert_eq!(manager.transcoder_available(), found.is_some());
    }

    #[test]
    fn info_reports_availability_consistently() {
        let manager = ToolManager::new();
        for info in manager.get_all_tools() {
            assert_eq!(info.is_available, info.path.is_some());
            if !info.is_available {
                assert!(info.version.is_none());
            }
        }
    }
}
