//! PDF writer: draw a [`Layout`] into a new document via pdfium.
//!
//! pdfium is not safe to drive from async tasks, so [`render_pdf`] moves the
//! whole job onto the blocking pool. Text is set in the PDF base-14 fonts,
//! which need no embedding but only cover WinAnsi. Runs holding anything
//! else use the configured Unicode TrueType font; without one those
//! characters are replaced with `?`.

use crate::config::PdfOptions;
use crate::error::ExportError;
use crate::pipeline::layout::{layout_markdown, FontFace, Layout};
use pdfium_render::prelude::*;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the pdfium library or its directory.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// A rendered PDF.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub pages: usize,
}

/// Bind to pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the working
/// directory, then the system loader. Each path may name the library itself
/// or the directory holding it.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, ExportError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = lib_path {
        candidates.push(path.to_path_buf());
    }
    if let Some(env) = std::env::var_os(PDFIUM_LIB_ENV) {
        if !env.is_empty() {
            candidates.push(PathBuf::from(env));
        }
    }
    candidates.push(PathBuf::from("./"));

    let mut failures = Vec::new();
    for candidate in candidates {
        let library = if candidate.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&candidate)
        } else {
            candidate
        };
        match Pdfium::bind_to_library(&library) {
            Ok(bindings) => {
                debug!("Bound pdfium at {}", library.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => failures.push(format!("{}: {e}", library.display())),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound system pdfium");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            failures.push(format!("system library: {e}"));
            Err(ExportError::PdfiumBindingFailed(failures.join("; ")))
        }
    }
}

/// Lay out `markdown` and write it as a PDF.
pub async fn render_pdf(
    markdown: &str,
    title: &str,
    options: &PdfOptions,
    lib_path: Option<&Path>,
) -> Result<RenderedPdf, ExportError> {
    let layout = layout_markdown(markdown, options);
    let title = title.to_string();
    let lib_path = lib_path.map(Path::to_path_buf);
    let unicode_font = options.unicode_font.clone();

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium(lib_path.as_deref())?;
        write_pdf(&pdfium, &layout, &title, unicode_font.as_deref())
    })
    .await
    .map_err(|e| ExportError::Internal(format!("PDF task panicked: {}", e)))?
}

/// Draw every page of `layout` into a new document and serialise it.
pub fn write_pdf(
    pdfium: &Pdfium,
    layout: &Layout,
    title: &str,
    unicode_font: Option<&Path>,
) -> Result<RenderedPdf, ExportError> {
    let mut document = pdfium.create_new_pdf().map_err(pdf_err)?;

    let unicode = match unicode_font {
        Some(path) => {
            let font = document
                .fonts_mut()
                .load_true_type_from_file(path, true)
                .map_err(|e| {
                    ExportError::PdfRenderFailed(format!("Cannot load font {}: {e}", path.display()))
                })?;
            debug!("Embedded font {}", path.display());
            Some(font)
        }
        None => None,
    };

    let regular = document.fonts_mut().helvetica();
    let bold = document.fonts_mut().helvetica_bold();
    let mono = document.fonts_mut().courier();
    let token = |face: FontFace| match face {
        FontFace::Regular => regular,
        FontFace::Bold => bold,
        FontFace::Mono => mono,
    };

    let size = PdfPagePaperSize::new_custom(
        PdfPoints::new(layout.width),
        PdfPoints::new(layout.height),
    );

    let mut replaced = 0;
    for (index, laid_out) in layout.pages.iter().enumerate() {
        let mut page = document.pages_mut().create_page_at_end(size).map_err(pdf_err)?;
        page.set_content_regeneration_strategy(PdfPageContentRegenerationStrategy::AutomaticOnDrop);

        for run in &laid_out.runs {
            if run.text.is_empty() {
                continue;
            }
            let (font, text) = if run.text.chars().all(is_win_ansi) {
                (token(run.face), Cow::Borrowed(run.text.as_str()))
            } else if let Some(font) = unicode {
                (font, Cow::Borrowed(run.text.as_str()))
            } else {
                let (text, count) = to_win_ansi(&run.text);
                replaced += count;
                (token(run.face), Cow::Owned(text))
            };
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(run.x),
                    PdfPoints::new(run.y),
                    &text,
                    font,
                    PdfPoints::new(run.size),
                )
                .map_err(pdf_err)?;
        }

        for rule in &laid_out.rules {
            page.objects_mut()
                .create_path_object_line(
                    PdfPoints::new(rule.x1),
                    PdfPoints::new(rule.y),
                    PdfPoints::new(rule.x2),
                    PdfPoints::new(rule.y),
                    PdfColor::GREY_50,
                    PdfPoints::new(rule.thickness),
                )
                .map_err(pdf_err)?;
        }

        debug!(
            "Page {}: {} runs, {} rules",
            index + 1,
            laid_out.runs.len(),
            laid_out.rules.len()
        );
    }

    if replaced > 0 {
        warn!(
            "{} character(s) have no glyph in the base-14 fonts and were replaced with '?'; \
             configure a Unicode font to keep them",
            replaced
        );
    }

    let bytes = document.save_to_bytes().map_err(pdf_err)?;
    info!(
        "Wrote PDF '{}': {} page(s), {} bytes",
        title,
        layout.pages.len(),
        bytes.len()
    );

    Ok(RenderedPdf {
        bytes,
        pages: layout.pages.len(),
    })
}

/// `true` if the WinAnsi encoding of the base-14 fonts has a glyph for `c`.
pub fn is_win_ansi(c: char) -> bool {
    matches!(c as u32, 0x20..=0x7E | 0xA0..=0xFF)
        || matches!(
            c,
            '\u{20AC}' | '\u{201A}' | '\u{0192}' | '\u{201E}' | '\u{2026}' | '\u{2020}'
                | '\u{2021}' | '\u{02C6}' | '\u{2030}' | '\u{0160}' | '\u{2039}' | '\u{0152}'
                | '\u{017D}' | '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}' | '\u{2022}'
                | '\u{2013}' | '\u{2014}' | '\u{02DC}' | '\u{2122}' | '\u{0161}' | '\u{203A}'
                | '\u{0153}' | '\u{017E}' | '\u{0178}'
        )
}

/// Replace every character outside WinAnsi with `?`. Returns the new text
/// and how many characters were replaced.
pub fn to_win_ansi(text: &str) -> (String, usize) {
    let mut replaced = 0;
    let text = text
        .chars()
        .map(|c| {
            if is_win_ansi(c) {
                c
            } else {
                replaced += 1;
                '?'
            }
        })
        .collect();
    (text, replaced)
}

fn pdf_err(e: PdfiumError) -> ExportError {
    ExportError::PdfRenderFailed(e.to_string())
}
