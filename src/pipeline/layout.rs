//! Text layout: Markdown → positioned text runs on fixed-size pages.
//!
//! The PDF writer only knows how to place a string at a point in one of the
//! PDF base-14 fonts. Everything else happens here:
//!
//! 1. **Blocks.** pulldown-cmark events are folded into headings, paragraphs,
//!    list items (with their nesting level and bullet), code blocks, and
//!    horizontal rules. Inline emphasis is dropped; the comment outline is
//!    plain text plus nesting.
//! 2. **Wrapping.** Greedy word wrap against Helvetica / Courier advance
//!    widths from the Adobe AFM files. Words wider than a whole line are
//!    broken by character.
//! 3. **Pagination.** Lines flow top to bottom, starting a new page when the
//!    next line would cross the bottom margin.
//!
//! Coordinates are PDF points with the origin at the bottom-left corner; `y`
//! on a [`TextRun`] is the baseline. Layout is pure: the same Markdown and
//! options always give the same pages.

use crate::config::PdfOptions;
use crate::pipeline::html::markdown_options;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

/// Line height as a multiple of the type size.
const LEADING: f32 = 1.3;

/// Horizontal step per nesting level, as a multiple of the body size.
const INDENT_EM: f32 = 1.6;

/// Narrowest text column indentation may leave, in ems of the body size.
/// Deeper items stop moving right and carry a `[depth N]` prefix instead.
const MIN_COLUMN_EM: f32 = 24.0;

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Width used for characters outside the table.
const FALLBACK_WIDTH: u16 = 556;

/// Full-width CJK and emoji glyphs take a whole em in most Unicode fonts.
const WIDE_WIDTH: u16 = 1000;

/// Helvetica-Bold runs roughly this much wider than the regular cut.
const BOLD_FACTOR: f32 = 1.06;

/// Courier is monospaced.
const COURIER_WIDTH: u16 = 600;

/// Font used for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFace {
    Regular,
    Bold,
    Mono,
}

impl FontFace {
    /// Advance width of `text` at `size` points.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| self.char_units(c) as u32).sum();
        let width = units as f32 * size / 1000.0;
        match self {
            FontFace::Bold => width * BOLD_FACTOR,
            _ => width,
        }
    }

    fn char_units(&self, c: char) -> u16 {
        match self {
            FontFace::Mono => COURIER_WIDTH,
            FontFace::Regular | FontFace::Bold => match c as u32 {
                code @ 32..=126 => HELVETICA_WIDTHS[(code - 32) as usize],
                _ if is_wide(c) => WIDE_WIDTH,
                _ => FALLBACK_WIDTH,
            },
        }
    }
}

fn is_wide(c: char) -> bool {
    matches!(
        c as u32,
        0x1100..=0x115F
            | 0x2E80..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x1F300..=0x1FAFF
            | 0x20000..=0x3FFFD
    )
}

/// A string placed at a baseline position.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub face: FontFace,
    pub size: f32,
}

/// A horizontal rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleLine {
    pub x1: f32,
    pub x2: f32,
    pub y: f32,
    pub thickness: f32,
}

/// Everything drawn on one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaidOutPage {
    pub runs: Vec<TextRun>,
    pub rules: Vec<RuleLine>,
}

impl LaidOutPage {
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty() && self.rules.is_empty()
    }
}

/// Laid-out document.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub width: f32,
    pub height: f32,
    /// Never empty.
    pub pages: Vec<LaidOutPage>,
}

// ── Blocks ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Heading { level: u8, text: String },
    Text { text: String, level: usize, bullet: Option<String> },
    Code { text: String, level: usize },
    Rule,
}

#[derive(Default)]
struct BlockCollector {
    blocks: Vec<Block>,
    buffer: String,
    /// Next number for each open list; `None` for bullet lists.
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    bullet: Option<String>,
    in_code: bool,
}

impl BlockCollector {
    fn level(&self) -> usize {
        self.lists.len() + self.quote_depth
    }

    fn flush(&mut self) {
        let text = std::mem::take(&mut self.buffer);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            // An empty item still shows its bullet.
            if let Some(bullet) = self.bullet.take() {
                self.blocks.push(Block::Text {
                    text: String::new(),
                    level: self.level(),
                    bullet: Some(bullet),
                });
            }
            return;
        }
        self.blocks.push(Block::Text {
            text: trimmed.to_string(),
            level: self.level(),
            bullet: self.bullet.take(),
        });
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { .. }) => self.flush(),
            Event::End(TagEnd::Heading(level)) => {
                let text = std::mem::take(&mut self.buffer).trim().to_string();
                self.blocks.push(Block::Heading {
                    level: heading_number(level),
                    text,
                });
            }
            Event::Start(Tag::Paragraph) | Event::End(TagEnd::Paragraph) => self.flush(),
            Event::Start(Tag::List(start)) => {
                self.flush();
                self.lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                self.flush();
                self.lists.pop();
            }
            Event::Start(Tag::Item) => {
                self.flush();
                let bullet = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let label = format!("{n}.");
                        *n += 1;
                        label
                    }
                    _ => "\u{2022}".to_string(),
                };
                self.bullet = Some(bullet);
            }
            Event::End(TagEnd::Item) => self.flush(),
            Event::Start(Tag::BlockQuote(_)) => {
                self.flush();
                self.quote_depth += 1;
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.flush();
                self.in_code = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                let text = std::mem::take(&mut self.buffer);
                self.in_code = false;
                self.blocks.push(Block::Code {
                    text: text.trim_end_matches('\n').to_string(),
                    level: self.level(),
                });
            }
            Event::End(TagEnd::TableCell) => self.buffer.push_str("   "),
            Event::End(TagEnd::TableRow) | Event::End(TagEnd::TableHead) => self.flush(),
            Event::Rule => {
                self.flush();
                self.blocks.push(Block::Rule);
            }
            Event::Text(text) | Event::Code(text) | Event::InlineHtml(text) | Event::Html(text) => {
                self.buffer.push_str(&text)
            }
            Event::SoftBreak => self.buffer.push(if self.in_code { '\n' } else { ' ' }),
            Event::HardBreak => self.buffer.push('\n'),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

fn heading_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn collect_blocks(markdown: &str) -> Vec<Block> {
    let mut collector = BlockCollector::default();
    for event in Parser::new_ext(markdown, markdown_options()) {
        collector.event(event);
    }
    collector.finish()
}

// ── Wrapping ─────────────────────────────────────────────────────────────

/// Greedy word wrap. Explicit `\n` always breaks.
pub fn wrap_text(text: &str, face: FontFace, size: f32, max_width: f32) -> Vec<String> {
    let space = face.text_width(" ", size);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_width = 0.0;

        for word in paragraph.split_whitespace() {
            let word_width = face.text_width(word, size);

            if word_width > max_width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                let mut pieces = break_word(word, face, size, max_width);
                let last = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
                line_width = face.text_width(&last, size);
                line = last;
                continue;
            }

            if line.is_empty() {
                line.push_str(word);
                line_width = word_width;
            } else if line_width + space + word_width <= max_width {
                line.push(' ');
                line.push_str(word);
                line_width += space + word_width;
            } else {
                lines.push(std::mem::replace(&mut line, word.to_string()));
                line_width = word_width;
            }
        }
        lines.push(line);
    }

    lines
}

fn break_word(word: &str, face: FontFace, size: f32, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for c in word.chars() {
        let mut candidate = piece.clone();
        candidate.push(c);
        if !piece.is_empty() && face.text_width(&candidate, size) > max_width {
            pieces.push(std::mem::take(&mut piece));
            piece.push(c);
        } else {
            piece = candidate;
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Code lines keep their leading spaces; only overlong lines are split.
fn wrap_code(text: &str, size: f32, max_width: f32) -> Vec<String> {
    text.split('\n')
        .flat_map(|line| {
            if FontFace::Mono.text_width(line, size) <= max_width {
                vec![line.to_string()]
            } else {
                break_word(line, FontFace::Mono, size, max_width)
            }
        })
        .collect()
}

// ── Pagination ───────────────────────────────────────────────────────────

struct Cursor {
    width: f32,
    height: f32,
    margin: f32,
    pages: Vec<LaidOutPage>,
    y: f32,
}

impl Cursor {
    fn new(width: f32, height: f32, margin: f32) -> Self {
        Self {
            width,
            height,
            margin,
            pages: vec![LaidOutPage::default()],
            y: height - margin,
        }
    }

    fn page(&mut self) -> &mut LaidOutPage {
        if self.pages.is_empty() {
            self.pages.push(LaidOutPage::default());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn new_page(&mut self) {
        self.pages.push(LaidOutPage::default());
        self.y = self.height - self.margin;
    }

    /// Reserve `height` points, breaking the page if needed. Returns the top
    /// of the reserved band.
    fn reserve(&mut self, height: f32) -> f32 {
        let at_top = self.y >= self.height - self.margin;
        if self.y - height < self.margin && !at_top {
            self.new_page();
        }
        let top = self.y;
        self.y -= height;
        top
    }

    /// Vertical gap that never carries over to a fresh page.
    fn skip(&mut self, gap: f32) {
        if self.y < self.height - self.margin {
            self.y = (self.y - gap).max(self.margin);
        }
    }

    fn line(&mut self, x: f32, text: String, face: FontFace, size: f32) {
        let line_height = size * LEADING;
        let top = self.reserve(line_height);
        let baseline = top - size;
        self.page().runs.push(TextRun {
            x,
            y: baseline,
            text,
            face,
            size,
        });
    }
}

/// Lay out `markdown` on pages described by `options`.
pub fn layout_markdown(markdown: &str, options: &PdfOptions) -> Layout {
    let (width, height) = options.paper.dimensions();
    let margin = options.margin;
    let body = options.font_size;
    let indent = body * INDENT_EM;
    let text_width = width - 2.0 * margin;
    let max_level = ((text_width - body * MIN_COLUMN_EM) / indent).floor().max(0.0) as usize;

    let mut cursor = Cursor::new(width, height, margin);

    for block in collect_blocks(markdown) {
        match block {
            Block::Heading { level, text } => {
                let size = body * heading_scale(level);
                cursor.skip(size * 0.4);
                for line in wrap_text(&text, FontFace::Bold, size, text_width) {
                    cursor.line(margin, line, FontFace::Bold, size);
                }
                cursor.skip(size * 0.3);
            }
            Block::Text { text, level, bullet } => {
                let (shown, text) = clamp_level(level, max_level, text);
                let x = margin + shown as f32 * indent;
                let available = width - margin - x;
                let lines = wrap_text(&text, FontFace::Regular, body, available);
                for (i, line) in lines.into_iter().enumerate() {
                    cursor.line(x, line, FontFace::Regular, body);
                    if i == 0 {
                        if let Some(bullet) = &bullet {
                            let bullet_x = x - FontFace::Regular.text_width(bullet, body) - body * 0.4;
                            let y = cursor.page().runs.last().map(|r| r.y).unwrap_or(cursor.y);
                            cursor.page().runs.push(TextRun {
                                x: bullet_x.max(margin),
                                y,
                                text: bullet.clone(),
                                face: FontFace::Regular,
                                size: body,
                            });
                        }
                    }
                }
                if bullet.is_none() {
                    cursor.skip(body * 0.5);
                } else {
                    cursor.skip(body * 0.15);
                }
            }
            Block::Code { text, level } => {
                let size = body * 0.9;
                let x = margin + level.min(max_level) as f32 * indent + body;
                let available = width - margin - x;
                for line in wrap_code(&text, size, available) {
                    cursor.line(x, line, FontFace::Mono, size);
                }
                cursor.skip(body * 0.5);
            }
            Block::Rule => {
                let top = cursor.reserve(body);
                let y = top - body * 0.5;
                cursor.page().rules.push(RuleLine {
                    x1: margin,
                    x2: width - margin,
                    y,
                    thickness: 0.75,
                });
            }
        }
    }

    // A trailing page break can leave an empty last page.
    if cursor.pages.len() > 1 && cursor.pages.last().is_some_and(LaidOutPage::is_empty) {
        cursor.pages.pop();
    }

    Layout {
        width: cursor.width,
        height: cursor.height,
        pages: cursor.pages,
    }
}

/// Indentation level actually drawn, and the text with a depth marker when
/// the real level had to be cut back.
fn clamp_level(level: usize, max_level: usize, text: String) -> (usize, String) {
    if level <= max_level {
        (level, text)
    } else {
        (max_level, format!("[depth {level}] {text}"))
    }
}

fn heading_scale(level: u8) -> f32 {
    match level {
        1 => 1.8,
        2 => 1.5,
        3 => 1.3,
        4 => 1.15,
        _ => 1.0,
    }
}
