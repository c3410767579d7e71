//! Progress-callback trait for export events.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to hear about
//! each pipeline stage as an export runs. A thread with thousands of comments
//! can need dozens of "load more" requests, so the expansion loop reports its
//! progress separately.
//!
//! # Example
//!
//! ```rust
//! use thread2pdf::{ExportConfig, ExportProgressCallback, ExportStage};
//! use std::sync::Arc;
//!
//! struct StageLogger;
//!
//! impl ExportProgressCallback for StageLogger {
//!     fn on_stage(&self, stage: ExportStage) {
//!         eprintln!("→ {}", stage.label());
//!     }
//! }
//!
//! let config = ExportConfig::builder()
//!     .progress_callback(Arc::new(StageLogger) as Arc<dyn ExportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::model::ExportStats;
use std::sync::Arc;

/// Pipeline stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    VerifyingCaptcha,
    Authenticating,
    FetchingThread,
    ExpandingComments,
    Flattening,
    RenderingHtml,
    RenderingPdf,
}

impl ExportStage {
    pub fn label(&self) -> &'static str {
        match self {
            ExportStage::VerifyingCaptcha => "Verifying captcha",
            ExportStage::Authenticating => "Authenticating with Reddit",
            ExportStage::FetchingThread => "Fetching thread",
            ExportStage::ExpandingComments => "Loading more comments",
            ExportStage::Flattening => "Building outline",
            ExportStage::RenderingHtml => "Rendering HTML",
            ExportStage::RenderingPdf => "Rendering PDF",
        }
    }
}

/// Called by the export pipeline as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once, after the URL has been validated.
    fn on_export_start(&self, thread_url: &str) {
        let _ = thread_url;
    }

    /// Called when a stage begins.
    fn on_stage(&self, stage: ExportStage) {
        let _ = stage;
    }

    /// Called after each expansion request.
    ///
    /// # Arguments
    /// * `requests`: expansion requests issued so far
    /// * `pending` : placeholders still waiting in the tree
    fn on_comments_expanded(&self, requests: usize, pending: usize) {
        let _ = (requests, pending);
    }

    /// Called once the artefact is ready.
    fn on_export_complete(&self, stats: &ExportStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;
