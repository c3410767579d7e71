//! Top-level export entry points.
//!
//! ```text
//! export_verified ─▶ captcha ─┐
//!                             ▼
//! export ─▶ fetch_thread ─▶ render_thread ─▶ PDF / HTML / Markdown bytes
//! ```
//!
//! [`render_thread`] does no I/O, so a thread fetched once can be rendered
//! under several configurations.

use crate::captcha::CaptchaVerifier;
use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::model::{ExportOutput, ExportStats, OutputFormat, Thread};
use crate::pipeline::fetch::{FetchedThread, RedditClient};
use crate::pipeline::flatten::ThreadFlattener;
use crate::pipeline::html::render_document;
use crate::pipeline::pdf::render_pdf;
use crate::pipeline::url::ThreadUrl;
use crate::progress::ExportStage;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Markdown and HTML for a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedThread {
    pub markdown: String,
    pub html: String,
    pub comments_rendered: usize,
    /// Excluded by the score filter, plus replies pruned with them.
    pub comments_hidden: usize,
}

/// Validate `url` and fetch the thread with every placeholder the config
/// allows resolved.
pub async fn fetch_thread(
    url: impl AsRef<str>,
    config: &ExportConfig,
) -> Result<FetchedThread, ExportError> {
    let url = ThreadUrl::parse(url.as_ref())?;
    RedditClient::new(config)?.fetch_thread(&url).await
}

/// Flatten a fetched thread and render it to Markdown and HTML.
pub fn render_thread(thread: &Thread, config: &ExportConfig) -> RenderedThread {
    if let Some(cb) = &config.progress_callback {
        cb.on_stage(ExportStage::Flattening);
    }
    let outline = ThreadFlattener::from_config(config).flatten(thread);
    let markdown = outline.to_markdown();
    debug!(
        "Outline: {} comment lines, {} hidden, {} pruned",
        outline.comments.len(),
        outline.hidden,
        outline.pruned
    );

    if let Some(cb) = &config.progress_callback {
        cb.on_stage(ExportStage::RenderingHtml);
    }
    let html = render_document(&markdown, Some(&thread.submission.title));

    RenderedThread {
        comments_rendered: outline.comments.len(),
        comments_hidden: outline.hidden + outline.pruned,
        markdown,
        html,
    }
}

/// Export a thread in the configured format.
///
/// # Errors
/// - `InvalidThreadUrl` before any network call.
/// - Reddit failures from the fetch stage.
/// - `PdfiumBindingFailed` / `PdfRenderFailed` for PDF output.
pub async fn export(url: impl AsRef<str>, config: &ExportConfig) -> Result<ExportOutput, ExportError> {
    let total_start = Instant::now();
    let thread_url = ThreadUrl::parse(url.as_ref())?;
    info!("Exporting {}", thread_url.url);
    if let Some(cb) = &config.progress_callback {
        cb.on_export_start(&thread_url.url);
    }

    // ── Step 1: Fetch ────────────────────────────────────────────────────
    let fetch_start = Instant::now();
    let fetched = RedditClient::new(config)?.fetch_thread(&thread_url).await?;
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;

    // ── Step 2: Markdown + HTML ──────────────────────────────────────────
    let render_start = Instant::now();
    let rendered = render_thread(&fetched.thread, config);

    // ── Step 3: Artefact ─────────────────────────────────────────────────
    let (bytes, pdf_pages) = match config.format {
        OutputFormat::Pdf => {
            if let Some(cb) = &config.progress_callback {
                cb.on_stage(ExportStage::RenderingPdf);
            }
            let pdf = render_pdf(
                &rendered.markdown,
                &fetched.thread.submission.title,
                &config.pdf,
                config.pdfium_lib_path.as_deref(),
            )
            .await?;
            (pdf.bytes, pdf.pages)
        }
        OutputFormat::Html => (rendered.html.clone().into_bytes(), 0),
        OutputFormat::Markdown => (rendered.markdown.clone().into_bytes(), 0),
    };
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let stats = ExportStats {
        comments_fetched: fetched.thread.comment_count(),
        comments_rendered: rendered.comments_rendered,
        comments_hidden: rendered.comments_hidden,
        expansion_requests: fetched.expansion_requests,
        unresolved_placeholders: fetched.unresolved_placeholders,
        markdown_bytes: rendered.markdown.len(),
        html_bytes: rendered.html.len(),
        pdf_pages,
        output_bytes: bytes.len(),
        fetch_duration_ms,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Export complete: {}/{} comments, {} bytes of {:?}, {}ms total",
        stats.comments_rendered,
        stats.comments_fetched,
        stats.output_bytes,
        config.format,
        stats.total_duration_ms
    );
    if let Some(cb) = &config.progress_callback {
        cb.on_export_complete(&stats);
    }

    Ok(ExportOutput {
        filename: thread_url.suggested_filename(config.format.extension()),
        submission: fetched.thread.submission,
        format: config.format,
        markdown: rendered.markdown,
        html: rendered.html,
        bytes,
        stats,
    })
}

/// Export a thread and write the artefact to `output_path`.
///
/// The file is written to a temporary sibling and renamed over the target,
/// so a failed export never leaves a partial file behind.
pub async fn export_to_file(
    url: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<ExportStats, ExportError> {
    let output = export(url, config).await?;
    let path = output_path.as_ref().to_path_buf();
    let bytes = output.bytes;

    tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
        .await
        .map_err(|e| ExportError::Internal(format!("Write task panicked: {}", e)))??;

    Ok(output.stats)
}

/// Synchronous wrapper around [`export`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_sync(url: impl AsRef<str>, config: &ExportConfig) -> Result<ExportOutput, ExportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export(url, config))
}

/// Verify a captcha token, then export.
///
/// The token is checked before the URL so a bot gets no signal about which
/// URLs are valid.
pub async fn export_verified(
    url: impl AsRef<str>,
    captcha_token: &str,
    remote_ip: Option<&str>,
    config: &ExportConfig,
) -> Result<ExportOutput, ExportError> {
    let captcha = config
        .captcha
        .clone()
        .ok_or(ExportError::CaptchaNotConfigured)?;
    if let Some(cb) = &config.progress_callback {
        cb.on_stage(ExportStage::VerifyingCaptcha);
    }
    CaptchaVerifier::new(captcha, config.request_timeout_secs)?
        .verify(captcha_token, remote_ip)
        .await?;
    export(url, config).await
}

/// Write `bytes` to `path` via a temp file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let write_err = |source: std::io::Error| ExportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}
