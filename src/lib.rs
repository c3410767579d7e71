//! # thread2pdf
//!
//! Back up a Reddit discussion thread as an indented Markdown outline, an
//! HTML page, or a PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! thread URL
//!  │
//!  ├─ 1. Validate  only full www.reddit.com thread URLs are accepted
//!  ├─ 2. Fetch     submission + comment listing (app-only OAuth or public JSON)
//!  ├─ 3. Expand    resolve every "load more" / "continue this thread" placeholder
//!  ├─ 4. Flatten   pre-order walk, score filter, depth correction → Markdown
//!  ├─ 5. HTML      pulldown-cmark, wrapped as a full document
//!  └─ 6. PDF       text layout + pdfium writer (spawn_blocking)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use thread2pdf::{export_to_file, ExportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExportConfig::builder()
//!         .credentials("client-id", "client-secret")
//!         .build()?;
//!     let stats = export_to_file(
//!         "https://www.reddit.com/r/rust/comments/abc123/some_thread/",
//!         "thread.pdf",
//!         &config,
//!     )
//!     .await?;
//!     eprintln!("{} comments, {} pages", stats.comments_rendered, stats.pdf_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `thread2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! thread2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! PDF output binds the pdfium shared library at runtime. Point
//! `PDFIUM_LIB_PATH` (or [`ExportConfigBuilder::pdfium_lib_path`]) at the
//! library or its directory. Markdown and HTML output need no native code.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod captcha;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use captcha::CaptchaVerifier;
pub use config::{
    CaptchaConfig, CommentSort, ExportConfig, ExportConfigBuilder, HiddenReplies, PaperSize,
    PdfOptions, RedditCredentials, Secrets,
};
pub use error::{ExportError, INVALID_URL_MESSAGE};
pub use export::{
    export, export_sync, export_to_file, export_verified, fetch_thread, render_thread,
    RenderedThread,
};
pub use model::{
    Comment, CommentParent, ExportOutput, ExportStats, OutputFormat, Submission, Thread,
};
pub use pipeline::fetch::FetchedThread;
pub use pipeline::flatten::{Outline, ThreadFlattener};
pub use pipeline::url::{is_thread_url, ThreadUrl};
pub use progress::{ExportProgressCallback, ExportStage, NoopProgressCallback, ProgressCallback};
