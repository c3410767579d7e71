//! Thread data and export results.
//!
//! [`Thread`] is what the fetch stage hands to the flattener: a submission
//! and its fully resolved comment forest. [`ExportOutput`] is what the
//! top-level entry points hand back to callers.

use serde::{Deserialize, Serialize};

/// The link post or self post at the root of a thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Base-36 id without the `t3_` prefix.
    pub id: String,
    pub title: String,
    /// `None` when the account was deleted.
    pub author: Option<String>,
    pub permalink: String,
    pub url: String,
    /// Empty for link posts.
    pub selftext: String,
    pub subreddit: String,
    pub score: i64,
    pub num_comments: u64,
}

/// Where a comment hangs in the thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentParent {
    /// Top-level comment.
    Submission,
    /// Reply to the comment with this id (no `t1_` prefix).
    Comment(String),
}

impl CommentParent {
    /// Parse a Reddit fullname such as `t1_abc` or `t3_xyz`.
    pub fn from_fullname(fullname: &str) -> Self {
        match fullname.strip_prefix("t1_") {
            Some(id) => CommentParent::Comment(id.to_string()),
            None => CommentParent::Submission,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, CommentParent::Comment(_))
    }
}

/// A single comment with its replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: Option<String>,
    pub body: String,
    pub score: i64,
    /// Depth as reported by Reddit. Not trustworthy after "more" expansion;
    /// the flattener corrects it against the parent.
    pub depth: u32,
    pub parent: CommentParent,
    pub replies: Vec<Comment>,
}

impl Comment {
    /// Number of comments in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(comment) = stack.pop() {
            count += 1;
            stack.extend(comment.replies.iter());
        }
        count
    }
}

/// A submission and its resolved comment forest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub submission: Submission,
    pub comments: Vec<Comment>,
}

impl Thread {
    /// Total comments in the forest.
    pub fn comment_count(&self) -> usize {
        self.comments.iter().map(Comment::subtree_len).sum()
    }
}

/// Which artefact an export produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Pdf,
    Html,
    Markdown,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "md",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Html => "text/html; charset=utf-8",
            OutputFormat::Markdown => "text/markdown; charset=utf-8",
        }
    }
}

/// Numbers collected while exporting one thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStats {
    /// Comments present in the resolved tree.
    pub comments_fetched: usize,
    /// Comment lines written to the Markdown.
    pub comments_rendered: usize,
    /// Comments excluded by the score filter.
    pub comments_hidden: usize,
    /// `morechildren` and "continue thread" requests issued.
    pub expansion_requests: usize,
    /// Placeholders dropped because the expansion limit was reached.
    pub unresolved_placeholders: usize,
    pub markdown_bytes: usize,
    pub html_bytes: usize,
    /// Zero unless the format is PDF.
    pub pdf_pages: usize,
    pub output_bytes: usize,
    pub fetch_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of a full export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOutput {
    pub submission: Submission,
    pub format: OutputFormat,
    /// Suggested download name, e.g. `rust_abc123_thread_title.pdf`.
    pub filename: String,
    pub markdown: String,
    pub html: String,
    /// The artefact for `format`. Not serialised.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub stats: ExportStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: &str) -> Comment {
        Comment {
            id: id.into(),
            author: None,
            body: String::new(),
            score: 1,
            depth: 0,
            parent: CommentParent::Submission,
            replies: vec![],
        }
    }

    #[test]
    fn parent_from_fullname() {
        assert_eq!(
            CommentParent::from_fullname("t1_abc"),
            CommentParent::Comment("abc".into())
        );
        assert_eq!(CommentParent::from_fullname("t3_xyz"), CommentParent::Submission);
        assert!(CommentParent::from_fullname("t1_q").is_comment());
    }

    #[test]
    fn comment_count_walks_whole_forest() {
        let mut a = leaf("a");
        let mut a1 = leaf("a1");
        a1.replies.push(leaf("a1a"));
        a.replies.push(a1);
        a.replies.push(leaf("a2"));
        let thread = Thread {
            submission: Submission::default(),
            comments: vec![a, leaf("b")],
        };
        assert_eq!(thread.comment_count(), 5);
    }

    #[test]
    fn output_format_metadata() {
        assert_eq!(OutputFormat::default(), OutputFormat::Pdf);
        assert_eq!(OutputFormat::Markdown.extension(), "md");
        assert_eq!(OutputFormat::Pdf.content_type(), "application/pdf");
    }

    #[test]
    fn export_output_json_skips_bytes() {
        let out = ExportOutput {
            submission: Submission::default(),
            format: OutputFormat::Pdf,
            filename: "x.pdf".into(),
            markdown: "# t #".into(),
            html: "<html></html>".into(),
            bytes: vec![1, 2, 3],
            stats: ExportStats::default(),
        };
        let json = serde_json::to_string(&out).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("bytes").is_none());
        assert_eq!(value["filename"], "x.pdf");
        assert!(value["stats"].get("output_bytes").is_some());
    }
}
