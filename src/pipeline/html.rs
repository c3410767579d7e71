//! Markdown → HTML document.

use pulldown_cmark::{html, Options, Parser};

/// Markdown extensions enabled for both HTML rendering and PDF layout.
pub fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options
}

/// Render Markdown to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, markdown_options());
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Wrap a fragment as a complete document.
pub fn wrap_document(body: &str, title: Option<&str>) -> String {
    let mut doc = String::with_capacity(body.len() + 128);
    doc.push_str("<html><head><meta charset=\"utf-8\">");
    if let Some(title) = title {
        doc.push_str("<title>");
        doc.push_str(&escape_text(title));
        doc.push_str("</title>");
    }
    doc.push_str("</head><body>");
    doc.push_str(body);
    doc.push_str("</body></html>");
    doc
}

/// Markdown to a full HTML document.
pub fn render_document(markdown: &str, title: Option<&str>) -> String {
    wrap_document(&markdown_to_html(markdown), title)
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_is_wrapped() {
        let doc = render_document("# Title #", None);
        assert!(doc.starts_with("<html><head>"));
        assert!(doc.contains("<body><h1>Title</h1>"));
        assert!(doc.ends_with("</body></html>"));
    }

    #[test]
    fn title_is_escaped() {
        let doc = render_document("x", Some("A <b> & C"));
        assert!(doc.contains("<title>A &lt;b&gt; &amp; C</title>"));
    }

    #[test]
    fn nested_list_items_become_nested_lists() {
        let md = "* top [Author: a] [Upvotes: 1]\n    * reply [Author: b] [Upvotes: 2]";
        let html = markdown_to_html(md);
        assert_eq!(html.matches("<ul>").count(), 2);
        assert!(html.contains("reply [Author: b]"));
    }

    #[test]
    fn strikethrough_and_tables_enabled() {
        let html = markdown_to_html("~~gone~~\n\n| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn separator_lines_render_as_rules() {
        let html = markdown_to_html("#### URL: /r/x ####\n\n-----\nhttp://example.com");
        assert!(html.contains("<hr />"));
    }
}
