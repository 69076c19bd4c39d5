// Helper functions for backend implementations

use std::path::{Path, PathBuf};

/// Characters not allowed in file names on common filesystems
const INVALID_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Name used when nothing usable is left of a title
const FALLBACK_FILENAME: &str = "download";

/// Make a title safe to use as a file name.
///
/// Every invalid character becomes `_`, surrounding spaces and dots are
/// stripped. A title made only of invalid characters, spaces and dots
/// becomes `download`. Never returns an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if INVALID_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == ' ' || c == '.');

    if trimmed.replace('_', "").trim().is_empty() {
        return FALLBACK_FILENAME.to_string();
    }

    trimmed.to_string()
}

/// Rename a downloaded file to `<sanitized title>.<ext>` in the same directory.
///
/// Returns the final path. The file is left alone when it already has that
/// name or when the target name is taken by another file.
pub fn rename_to_title(path: &Path, title: &str) -> std::io::Result<PathBuf> {
    let file_name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", sanitize_filename(title), ext),
        None => sanitize_filename(title),
    };
    let target = path
        .parent()
        .map(|dir| dir.join(&file_name))
        .unwrap_or_else(|| PathBuf::from(&file_name));

    if target == path {
        return Ok(target);
    }
    if target.exists() {
        tracing::warn!(
            "[Files] {} already exists, keeping {}",
            target.display(),
            path.display()
        );
        return Ok(path.to_path_buf());
    }

    std::fs::rename(path, &target)?;
    tracing::debug!("[Files] renamed {} -> {}", path.display(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plain_titles() {
        assert_eq!(sanitize_filename("My Video Title"), "My Video Title");
    }

    #[test]
    fn empty_becomes_fallback() {
        assert_eq!(sanitize_filename(""), "download");
    }

    #[test]
    fn only_invalid_chars_becomes_fallback() {
        assert_eq!(sanitize_filename("<>:\"/\\|?*"), "download");
        assert_eq!(sanitize_filename(" . _ . "), "download");
        assert_eq!(sanitize_filename("..."), "download");
    }

    #[test]
    fn replaces_special_chars() {
        let sanitized = sanitize_filename("Video: \"Title\" <Test> | File?");
        assert_eq!(sanitized, "Video_ _Title_ _Test_ _ File_");
        for c in INVALID_FILENAME_CHARS {
            assert!(!sanitized.contains(c));
        }
    }

    #[test]
    fn strips_surrounding_dots_and_spaces() {
        assert_eq!(sanitize_filename("  ..hidden title.. "), "hidden title");
        assert_eq!(sanitize_filename("a/b"), "a_b");
    }

    #[test]
    fn output_is_never_empty_or_unsafe() {
        let samples = [
            "", " ", "\t", "*", "a", "_", "__x__", "..", "a.b", "Ünïcödé: 日本語?",
            "\\\\server\\share", "con", " . ", "a|b|c", "\n",
        ];
        for sample in samples {
            let out = sanitize_filename(sample);
            assert!(!out.is_empty(), "empty output for {:?}", sample);
            assert!(
                !out.chars().any(|c| INVALID_FILENAME_CHARS.contains(&c)),
                "unsafe output {:?} for {:?}",
                out,
                sample
            );
        }
    }

    #[test]
    fn renames_file_to_sanitized_title() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("Clip： part 1.mp4");
        std::fs::write(&original, b"data").unwrap();

        let renamed = rename_to_title(&original, "Clip: part 1").unwrap();
        assert_eq!(renamed, dir.path().join("Clip_ part 1.mp4"));
        assert!(renamed.exists());
        assert!(!original.exists());
    }

    #[test]
    fn rename_is_noop_when_name_matches() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("Song.mp3");
        std::fs::write(&original, b"data").unwrap();

        let renamed = rename_to_title(&original, "Song").unwrap();
        assert_eq!(renamed, original);
        assert!(original.exists());
    }

    #[test]
    fn rename_does_not_overwrite_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let taken = dir.path().join("Song.mp3");
        std::fs::write(&taken, b"old").unwrap();
        let original = dir.path().join("Song (1).mp3");
        std::fs::write(&original, b"new").unwrap();

        let kept = rename_to_title(&original, "Song").unwrap();
        assert_eq!(kept, original);
        assert_eq!(std::fs::read(&taken).unwrap(), b"old");
    }
}
