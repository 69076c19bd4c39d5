// URL validation for batch input

use regex::Regex;

use super::errors::BatchError;
use super::models::ValidationOutcome;

lazy_static::lazy_static! {
    /// watch / shorts / short-link URLs, matched from the start only
    static ref YOUTUBE_URL_RE: Regex = Regex::new(
        r"^(https?://)?(www\.)?(youtube\.com/(watch\?v=|shorts/)|youtu\.be/)[a-zA-Z0-9_-]+"
    ).unwrap();
}

/// Whether a single trimmed line looks like a YouTube video URL
pub fn is_youtube_url(url: &str) -> bool {
    YOUTUBE_URL_RE.is_match(url)
}

/// Split raw input lines into valid and invalid URLs.
///
/// Lines are trimmed; blank lines are dropped. Order is preserved inside
/// each partition and duplicates are kept.
pub fn validate_urls<I, S>(urls: I) -> ValidationOutcome
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut outcome = ValidationOutcome::default();

    for url in urls {
        let url = url.as_ref().trim();
        if url.is_empty() {
            continue;
        }
        if is_youtube_url(url) {
            outcome.valid.push(url.to_string());
        } else {
            outcome.invalid.push(url.to_string());
        }
    }

    outcome
}

/// Validate a request and apply the reject-whole-batch policy.
///
/// Callers that want to skip bad lines instead should use [`validate_urls`]
/// and pass `valid` on themselves.
pub fn prepare_batch<I, S>(urls: I) -> Result<Vec<String>, BatchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let outcome = validate_urls(urls);

    if outcome.is_empty() {
        return Err(BatchError::NoUrls);
    }
    if !outcome.invalid.is_empty() {
        return Err(BatchError::InvalidUrls(outcome.invalid));
    }

    Ok(outcome.valid)
}
