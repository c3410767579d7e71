//! Pipeline stages for thread export.
//!
//! Each submodule implements one step, so each can be tested without the
//! network or pdfium.
//!
//! ## Data Flow
//!
//! ```text
//! url ──▶ fetch ──▶ flatten ──▶ html ──▶ layout ──▶ pdf
//!        (listing)   (outline)  (cmark)  (pages)   (pdfium)
//! ```
//!
//! 1. [`url`]    : validate the thread URL and pull out the submission id
//! 2. [`fetch`]  : Reddit API calls with retry/backoff; the only stage with
//!    network I/O. [`listing`] holds the wire format and the arena that
//!    placeholders are grafted into
//! 3. [`flatten`]: the comment tree as an indented Markdown outline
//! 4. [`html`]   : Markdown to a standalone HTML document
//! 5. [`layout`] : Markdown to positioned text runs on pages; pure
//! 6. [`pdf`]    : draw the layout with pdfium; runs in `spawn_blocking`

pub mod fetch;
pub mod flatten;
pub mod html;
pub mod layout;
pub mod listing;
pub mod pdf;
pub mod url;
