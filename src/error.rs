//! Error types for the thread2pdf library.
//!
//! Every public entry point returns [`ExportError`]. The variants follow the
//! order in which an export can fail:
//!
//! * **Input**: the URL is not a thread URL; nothing touched the network.
//! * **Reddit**: authentication, fetch, or "load more" expansion failed.
//! * **Captcha**: the token was rejected or could not be checked.
//! * **Output**: pdfium could not be bound, rendering failed, or the file
//!   could not be written.
//!
//! [`ExportError::user_message`] gives the short text a front end should show
//! for each failure. `Display` carries the detail for logs.

use std::path::PathBuf;
use thiserror::Error;

/// Shown for malformed or non-thread URLs.
pub const INVALID_URL_MESSAGE: &str = "URL must be the full URL of the thread. \
For example: https://www.reddit.com/r/subreddit/comments/abc123/thread_title/";

/// All fatal errors returned by the thread2pdf library.
#[derive(Debug, Error)]
pub enum ExportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input is not the full URL of a Reddit thread.
    #[error("Invalid thread URL '{url}'\n{}", INVALID_URL_MESSAGE)]
    InvalidThreadUrl { url: String },

    // ── Reddit errors ─────────────────────────────────────────────────────
    /// Reddit answered, but the thread is missing, private, or removed.
    #[error("Thread '{thread}' is unavailable: {reason}")]
    ThreadUnavailable { thread: String, reason: String },

    /// Reddit could not be reached (connection failure, timeout, 5xx).
    #[error("Unable to reach Reddit at '{url}': {reason}\nCheck your internet connection.")]
    RedditUnreachable { url: String, reason: String },

    /// The app-only OAuth token request was refused.
    #[error("Reddit rejected the API credentials: {detail}\nCheck the client id and secret.")]
    AuthFailed { detail: String },

    /// Reddit kept answering HTTP 429 after every retry.
    #[error("Reddit rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The response body did not have the expected listing shape.
    #[error("Unexpected response from Reddit: {detail}")]
    MalformedResponse { detail: String },

    // ── Captcha errors ────────────────────────────────────────────────────
    /// The verification endpoint answered `success: false`.
    #[error("Captcha verification failed (error codes: {codes:?})")]
    CaptchaRejected { codes: Vec<String> },

    /// The verification endpoint could not be reached or answered garbage.
    #[error("Captcha verification unavailable: {reason}")]
    CaptchaUnavailable { reason: String },

    /// `export_verified` was called without a captcha secret configured.
    #[error("Captcha verification requested but no hCaptcha secret is configured")]
    CaptchaNotConfigured,

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF output needs the pdfium shared library at runtime.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (or the directory holding it).\n\
  • Or install libpdfium where the system loader can find it.\n\
  • Or export Markdown/HTML instead with --format markdown|html.\n"
    )]
    PdfiumBindingFailed(String),

    /// pdfium returned an error while building the document.
    #[error("PDF rendering failed: {0}")]
    PdfRenderFailed(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The secrets file is missing or not valid TOML.
    #[error("Failed to load secrets file '{path}': {detail}")]
    SecretsFile { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExportError {
    /// The message to show an end user for this failure.
    ///
    /// Reddit-side failures collapse into two messages: the thread itself is
    /// the problem, or Reddit is.
    pub fn user_message(&self) -> String {
        match self {
            ExportError::InvalidThreadUrl { .. } => INVALID_URL_MESSAGE.to_string(),
            ExportError::ThreadUnavailable { .. } | ExportError::MalformedResponse { .. } => {
                "Unable to collect the thread.".to_string()
            }
            ExportError::RedditUnreachable { .. }
            | ExportError::AuthFailed { .. }
            | ExportError::RateLimited { .. } => "Unable to connect to Reddit.".to_string(),
            ExportError::CaptchaRejected { .. } => "Captcha not passed.".to_string(),
            ExportError::CaptchaUnavailable { .. } | ExportError::CaptchaNotConfigured => {
                "Unable to verify the captcha. Please try again later.".to_string()
            }
            ExportError::PdfiumBindingFailed(_) | ExportError::PdfRenderFailed(_) => {
                "Unable to create the PDF.".to_string()
            }
            ExportError::OutputWriteFailed { path, .. } => {
                format!("Unable to write '{}'.", path.display())
            }
            ExportError::SecretsFile { .. } | ExportError::InvalidConfig(_) => {
                "The exporter is misconfigured.".to_string()
            }
            ExportError::Internal(_) => {
                "Something went wrong while exporting the thread.".to_string()
            }
        }
    }

    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExportError::RedditUnreachable { .. }
                | ExportError::RateLimited { .. }
                | ExportError::CaptchaUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_display_contains_guidance() {
        let e = ExportError::InvalidThreadUrl {
            url: "https://example.com".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("example.com"), "got: {msg}");
        assert!(msg.contains("full URL of the thread"), "got: {msg}");
        assert_eq!(e.user_message(), INVALID_URL_MESSAGE);
    }

    #[test]
    fn reddit_failures_map_to_original_messages() {
        let unavailable = ExportError::ThreadUnavailable {
            thread: "abc123".into(),
            reason: "HTTP 404".into(),
        };
        assert_eq!(unavailable.user_message(), "Unable to collect the thread.");

        let unreachable = ExportError::RedditUnreachable {
            url: "https://oauth.reddit.com".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(unreachable.user_message(), "Unable to connect to Reddit.");
        assert!(unreachable.is_transient());
    }

    #[test]
    fn captcha_rejected_display() {
        let e = ExportError::CaptchaRejected {
            codes: vec!["invalid-input-response".into()],
        };
        assert!(e.to_string().contains("invalid-input-response"));
        assert_eq!(e.user_message(), "Captcha not passed.");
        assert!(!e.is_transient());
    }

    #[test]
    fn internal_error_still_has_user_message() {
        let e = ExportError::Internal("task panicked".into());
        assert!(!e.user_message().is_empty());
        assert!(e.to_string().contains("task panicked"));
    }

    #[test]
    fn output_write_failed_names_path() {
        let e = ExportError::OutputWriteFailed {
            path: PathBuf::from("/tmp/out.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.user_message().contains("/tmp/out.pdf"));
        assert!(e.to_string().contains("denied"));
    }
}
