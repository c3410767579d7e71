//! Thread URL validation: reject anything that is not the full URL of a
//! Reddit thread before any network call is made.
//!
//! Only `www.reddit.com` is accepted, and the path must start with
//! `/r/{subreddit}/comments/{id}/{slug}/`. Short links (`redd.it`), share
//! links, and subreddit listings all fail with the same guidance message.

use crate::error::ExportError;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use tracing::debug;

const THREAD_HOST: &str = "www.reddit.com";

static RE_THREAD_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/r/([^/\s]+)/comments/([^/\s]+)/([^/\s]+)/").unwrap()
});

static RE_FILENAME_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// A validated thread URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadUrl {
    /// The URL exactly as supplied.
    pub url: String,
    pub subreddit: String,
    /// Base-36 submission id (no `t3_` prefix).
    pub submission_id: String,
    pub slug: String,
}

impl ThreadUrl {
    /// Validate `input` and extract the thread coordinates.
    pub fn parse(input: &str) -> Result<Self, ExportError> {
        let invalid = || ExportError::InvalidThreadUrl {
            url: input.to_string(),
        };

        let parsed = Url::parse(input.trim()).map_err(|_| invalid())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid());
        }
        if parsed.host_str() != Some(THREAD_HOST) {
            return Err(invalid());
        }

        let caps = RE_THREAD_PATH.captures(parsed.path()).ok_or_else(invalid)?;
        let thread = ThreadUrl {
            url: input.to_string(),
            subreddit: caps[1].to_string(),
            submission_id: caps[2].to_string(),
            slug: caps[3].to_string(),
        };
        debug!(
            "Thread URL ok: r/{} id={} slug={}",
            thread.subreddit, thread.submission_id, thread.slug
        );
        Ok(thread)
    }

    /// `t3_` fullname of the submission.
    pub fn link_fullname(&self) -> String {
        format!("t3_{}", self.submission_id)
    }

    /// Download name for the export, e.g. `rust_abc123_thread_title.pdf`.
    pub fn suggested_filename(&self, extension: &str) -> String {
        let stem = format!("{}_{}_{}", self.subreddit, self.submission_id, self.slug);
        let stem = RE_FILENAME_UNSAFE.replace_all(&stem, "_");
        format!("{}.{}", stem.trim_matches('_'), extension)
    }
}

/// `true` if `input` is a thread URL this crate can export.
pub fn is_thread_url(input: &str) -> bool {
    ThreadUrl::parse(input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_full_thread_url() {
        let t = ThreadUrl::parse(
            "https://www.reddit.com/r/rust/comments/abc123/why_is_rust_so_fast/",
        )
        .unwrap();
        assert_eq!(t.subreddit, "rust");
        assert_eq!(t.submission_id, "abc123");
        assert_eq!(t.slug, "why_is_rust_so_fast");
        assert_eq!(t.link_fullname(), "t3_abc123");
    }

    #[test]
    fn accepts_comment_permalink_and_query() {
        assert!(is_thread_url(
            "https://www.reddit.com/r/rust/comments/abc123/title/def456/?context=3"
        ));
        assert!(is_thread_url("http://www.reddit.com/r/a/comments/b/c/"));
    }

    #[test]
    fn rejects_other_hosts() {
        assert!(!is_thread_url("https://old.reddit.com/r/rust/comments/abc123/title/"));
        assert!(!is_thread_url("https://reddit.com/r/rust/comments/abc123/title/"));
        assert!(!is_thread_url("https://redd.it/abc123"));
        assert!(!is_thread_url("https://example.com/r/rust/comments/abc123/title/"));
    }

    #[test]
    fn rejects_partial_paths() {
        assert!(!is_thread_url("https://www.reddit.com/r/rust/"));
        assert!(!is_thread_url("https://www.reddit.com/r/rust/comments/abc123/"));
        assert!(!is_thread_url("https://www.reddit.com/r/rust/comments/abc123/title"));
        assert!(!is_thread_url("https://www.reddit.com/"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!is_thread_url(""));
        assert!(!is_thread_url("not a url"));
        assert!(!is_thread_url("ftp://www.reddit.com/r/a/comments/b/c/"));
    }

    #[test]
    fn invalid_url_error_keeps_input() {
        match ThreadUrl::parse("https://example.com") {
            Err(ExportError::InvalidThreadUrl { url }) => assert_eq!(url, "https://example.com"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn suggested_filename_is_sanitised() {
        let t = ThreadUrl::parse("https://www.reddit.com/r/AskReddit/comments/x1y2/what's_up%3F/")
            .unwrap();
        let name = t.suggested_filename("pdf");
        assert!(name.ends_with(".pdf"));
        assert!(name.starts_with("AskReddit_x1y2_what"));
        assert!(name
            .trim_end_matches(".pdf")
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }
}
