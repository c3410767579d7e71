//! Configuration types for thread exports.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. Credentials can be set directly or loaded from a
//! TOML secrets file with [`Secrets::load`].

use crate::error::ExportError;
use crate::model::OutputFormat;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Token endpoint for app-only OAuth.
pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// API host used once a bearer token is available.
pub const OAUTH_API_BASE: &str = "https://oauth.reddit.com";

/// API host used without credentials (`.json` listings).
pub const PUBLIC_API_BASE: &str = "https://www.reddit.com";

/// hCaptcha siteverify endpoint.
pub const DEFAULT_HCAPTCHA_VERIFY_URL: &str = "https://api.hcaptcha.com/siteverify";

/// Configuration for exporting one Reddit thread.
///
/// Built via [`ExportConfig::builder()`] or using [`ExportConfig::default()`].
///
/// # Example
/// ```rust
/// use thread2pdf::{ExportConfig, HiddenReplies, OutputFormat};
///
/// let config = ExportConfig::builder()
///     .credentials("client-id", "client-secret")
///     .format(OutputFormat::Markdown)
///     .hidden_replies(HiddenReplies::Prune)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Reddit app credentials. Without them the public `.json` endpoints are
    /// used, which Reddit rate-limits far more aggressively.
    pub credentials: Option<RedditCredentials>,

    /// User-Agent sent with every Reddit request. Reddit throttles generic
    /// agents, so this should identify the application.
    pub user_agent: String,

    /// Override for the API host (tests, proxies). When `None` the host is
    /// picked from whether credentials are set.
    pub api_base_url: Option<String>,

    /// OAuth token endpoint.
    pub auth_url: String,

    /// Per-request timeout in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Retries on 429, 5xx, and timeouts. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Cap on "load more" expansion requests. `None` resolves every
    /// placeholder. Default: `None`.
    pub more_comments_limit: Option<usize>,

    /// Sort order requested for the comment tree. Default: confidence ("best").
    pub comment_sort: CommentSort,

    /// Comments scoring below this are left out of the outline. Default: 0.
    pub min_score: i64,

    /// What happens to replies of a comment left out by `min_score`.
    pub hidden_replies: HiddenReplies,

    /// hCaptcha settings for [`crate::export::export_verified`].
    pub captcha: Option<CaptchaConfig>,

    /// Artefact produced by [`crate::export::export`]. Default: PDF.
    pub format: OutputFormat,

    /// Page geometry and type size for PDF output.
    pub pdf: PdfOptions,

    /// pdfium shared library, or the directory containing it. Falls back to
    /// `PDFIUM_LIB_PATH`, then the working directory, then the system loader.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            user_agent: format!("thread2pdf:v{} (thread backup)", env!("CARGO_PKG_VERSION")),
            api_base_url: None,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
            more_comments_limit: None,
            comment_sort: CommentSort::default(),
            min_score: 0,
            hidden_replies: HiddenReplies::default(),
            captcha: None,
            format: OutputFormat::default(),
            pdf: PdfOptions::default(),
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("credentials", &self.credentials)
            .field("user_agent", &self.user_agent)
            .field("api_base_url", &self.api_base_url)
            .field("auth_url", &self.auth_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("more_comments_limit", &self.more_comments_limit)
            .field("comment_sort", &self.comment_sort)
            .field("min_score", &self.min_score)
            .field("hidden_replies", &self.hidden_replies)
            .field("captcha", &self.captcha)
            .field("format", &self.format)
            .field("pdf", &self.pdf)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    /// API host for thread and expansion requests.
    pub fn api_base(&self) -> &str {
        match (&self.api_base_url, &self.credentials) {
            (Some(base), _) => base.trim_end_matches('/'),
            (None, Some(_)) => OAUTH_API_BASE,
            (None, None) => PUBLIC_API_BASE,
        }
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn credentials(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.config.credentials = Some(RedditCredentials {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        });
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = Some(url.into());
        self
    }

    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.config.auth_url = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn more_comments_limit(mut self, limit: Option<usize>) -> Self {
        self.config.more_comments_limit = limit;
        self
    }

    pub fn comment_sort(mut self, sort: CommentSort) -> Self {
        self.config.comment_sort = sort;
        self
    }

    pub fn min_score(mut self, score: i64) -> Self {
        self.config.min_score = score;
        self
    }

    pub fn hidden_replies(mut self, policy: HiddenReplies) -> Self {
        self.config.hidden_replies = policy;
        self
    }

    pub fn captcha(mut self, secret_key: impl Into<String>, verify_url: impl Into<String>) -> Self {
        self.config.captcha = Some(CaptchaConfig {
            secret_key: secret_key.into(),
            verify_url: verify_url.into(),
        });
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn paper(mut self, paper: PaperSize) -> Self {
        self.config.pdf.paper = paper;
        self
    }

    pub fn font_size(mut self, pt: f32) -> Self {
        self.config.pdf.font_size = pt.clamp(6.0, 24.0);
        self
    }

    pub fn margin(mut self, pt: f32) -> Self {
        self.config.pdf.margin = pt.max(0.0);
        self
    }

    /// TrueType font for characters outside the base-14 fonts' WinAnsi set.
    pub fn unicode_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdf.unicode_font = Some(path.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Apply every value present in a secrets file.
    pub fn secrets(mut self, secrets: Secrets) -> Self {
        if let Some(reddit) = secrets.reddit {
            self.config.credentials = Some(RedditCredentials {
                client_id: reddit.client_id,
                client_secret: reddit.secret_key,
            });
        }
        if let Some(hcaptcha) = secrets.hcaptcha {
            self.config.captcha = Some(CaptchaConfig {
                secret_key: hcaptcha.secret_key,
                verify_url: hcaptcha
                    .verify_url
                    .unwrap_or_else(|| DEFAULT_HCAPTCHA_VERIFY_URL.to_string()),
            });
        }
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, ExportError> {
        let c = &self.config;
        if let Some(creds) = &c.credentials {
            if creds.client_id.trim().is_empty() || creds.client_secret.trim().is_empty() {
                return Err(ExportError::InvalidConfig(
                    "Reddit client id and secret must both be non-empty".into(),
                ));
            }
        }
        if c.user_agent.trim().is_empty() {
            return Err(ExportError::InvalidConfig("User-Agent must not be empty".into()));
        }
        if c.request_timeout_secs == 0 {
            return Err(ExportError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(captcha) = &c.captcha {
            if captcha.secret_key.trim().is_empty() {
                return Err(ExportError::InvalidConfig(
                    "hCaptcha secret key must not be empty".into(),
                ));
            }
        }
        let (width, height) = c.pdf.paper.dimensions();
        if c.pdf.margin * 2.0 >= width.min(height) / 2.0 {
            return Err(ExportError::InvalidConfig(format!(
                "Margin {}pt leaves no room on a {:?} page",
                c.pdf.margin, c.pdf.paper
            )));
        }
        if let Some(font) = &c.pdf.unicode_font {
            if !font.is_file() {
                return Err(ExportError::InvalidConfig(format!(
                    "Font file {} does not exist",
                    font.display()
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Credentials ──────────────────────────────────────────────────────────

/// Reddit "script" or "web" app credentials for app-only OAuth.
#[derive(Clone, PartialEq, Eq)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// hCaptcha server-side settings.
#[derive(Clone, PartialEq, Eq)]
pub struct CaptchaConfig {
    pub secret_key: String,
    pub verify_url: String,
}

impl fmt::Debug for CaptchaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptchaConfig")
            .field("secret_key", &"<redacted>")
            .field("verify_url", &self.verify_url)
            .finish()
    }
}

/// Contents of a secrets file.
///
/// ```toml
/// [reddit]
/// client_id = "abc"
/// secret_key = "xyz"
///
/// [hcaptcha]
/// secret_key = "0x000"
/// verify_url = "https://api.hcaptcha.com/siteverify"   # optional
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    pub reddit: Option<RedditSecrets>,
    pub hcaptcha: Option<HCaptchaSecrets>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditSecrets {
    pub client_id: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HCaptchaSecrets {
    pub secret_key: String,
    pub verify_url: Option<String>,
}

impl Secrets {
    /// Read and parse a TOML secrets file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ExportError::SecretsFile {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::parse(&text).map_err(|detail| ExportError::SecretsFile {
            path: path.to_path_buf(),
            detail,
        })
    }

    /// Parse secrets from TOML text.
    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Comment sort order understood by Reddit's `sort` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommentSort {
    /// Reddit's "best". (default)
    #[default]
    Confidence,
    Top,
    New,
    Controversial,
    Old,
    Qa,
}

impl CommentSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentSort::Confidence => "confidence",
            CommentSort::Top => "top",
            CommentSort::New => "new",
            CommentSort::Controversial => "controversial",
            CommentSort::Old => "old",
            CommentSort::Qa => "qa",
        }
    }
}

/// Treatment of replies under a comment excluded by the score filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HiddenReplies {
    /// Replies are still visited and rendered if they pass the filter. (default)
    #[default]
    Keep,
    /// The excluded comment's whole subtree is dropped.
    Prune,
}

/// Paper sizes for PDF output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperSize {
    /// ISO 216 A4. (default)
    #[default]
    A4,
    /// US Letter, 8.5 × 11 in.
    Letter,
}

impl PaperSize {
    /// Width and height in PDF points.
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            PaperSize::A4 => (595.28, 841.89),
            PaperSize::Letter => (612.0, 792.0),
        }
    }
}

/// Page geometry and base type size for PDF output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfOptions {
    pub paper: PaperSize,
    /// Body text size in points. Headings scale from it. Default: 10.
    pub font_size: f32,
    /// Margin on every side in points. Default: 54 (¾ inch).
    pub margin: f32,
    /// TrueType font embedded for text the base-14 fonts cannot show
    /// (emoji, CJK, Cyrillic, ...). Without one such characters print as `?`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicode_font: Option<PathBuf>,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            paper: PaperSize::A4,
            font_size: 10.0,
            margin: 54.0,
            unicode_font: None,
        }
    }
}
