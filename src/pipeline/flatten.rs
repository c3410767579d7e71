//! Comment-tree flattening: turn the nested reply forest into an indented
//! Markdown outline.
//!
//! ## Output shape
//!
//! ```text
//! # {title} #
//! #### Author: {author} ####
//! #### URL: {permalink} ####
//!
//! -----
//! {url}
//!
//! {selftext}            (empty entry when there is no selftext)
//!
//! -----
//! * top-level comment [Author: a] [Upvotes: 12]
//!     * reply [Author: b] [Upvotes: 3]
//! ```
//!
//! ## Traversal
//!
//! Pre-order, depth-first, with an explicit stack: replies are pushed in
//! reverse so the first reply pops first, and a comment's whole subtree is
//! written before its next sibling.
//!
//! ## Depth correction
//!
//! Depths reported inside "continue this thread" responses restart at zero,
//! so a reply's depth is recomputed against its parent's *corrected* depth:
//! kept when already deeper than the parent, otherwise
//! `parent + depth + 1`. Top-level comments keep their reported depth. The
//! corrected value is carried on the stack; the tree is never mutated.

use crate::config::{ExportConfig, HiddenReplies};
use crate::model::{Comment, Submission, Thread};

/// Entries in the header block.
pub const HEADER_LINES: usize = 7;

/// One nesting level in the outline.
pub const INDENT: &str = "    ";

/// Author shown for deleted accounts.
pub const DELETED_AUTHOR: &str = "[deleted]";

/// A comment that made it into the outline, with its corrected depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatComment<'a> {
    pub comment: &'a Comment,
    pub depth: u32,
}

impl FlatComment<'_> {
    /// The Markdown list line for this comment.
    pub fn to_line(&self) -> String {
        format_comment_line(
            self.depth,
            &self.comment.body,
            self.comment.author.as_deref(),
            self.comment.score,
        )
    }
}

/// Result of walking a comment forest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Walk<'a> {
    /// Visible comments in output order.
    pub visible: Vec<FlatComment<'a>>,
    /// Comments left out by the score filter.
    pub hidden: usize,
    /// Comments skipped because an ancestor was hidden and replies are pruned.
    pub pruned: usize,
}

/// The flattened thread as Markdown lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    pub header: Vec<String>,
    pub comments: Vec<String>,
    pub hidden: usize,
    pub pruned: usize,
}

impl Outline {
    /// Header entries followed by comment lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.header
            .iter()
            .chain(self.comments.iter())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.header.len() + self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries joined with newlines.
    pub fn to_markdown(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }
}

/// Flattens a thread into an [`Outline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadFlattener {
    min_score: i64,
    hidden_replies: HiddenReplies,
}

impl Default for ThreadFlattener {
    fn default() -> Self {
        Self {
            min_score: 0,
            hidden_replies: HiddenReplies::Keep,
        }
    }
}

impl ThreadFlattener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            min_score: config.min_score,
            hidden_replies: config.hidden_replies,
        }
    }

    pub fn min_score(mut self, score: i64) -> Self {
        self.min_score = score;
        self
    }

    pub fn hidden_replies(mut self, policy: HiddenReplies) -> Self {
        self.hidden_replies = policy;
        self
    }

    /// Header block plus one line per visible comment.
    pub fn flatten(&self, thread: &Thread) -> Outline {
        let walk = self.walk(&thread.comments);
        Outline {
            header: header_lines(&thread.submission),
            comments: walk.visible.iter().map(FlatComment::to_line).collect(),
            hidden: walk.hidden,
            pruned: walk.pruned,
        }
    }

    /// Visit `comments` in pre-order, correcting depths and applying the
    /// score filter.
    pub fn walk<'a>(&self, comments: &'a [Comment]) -> Walk<'a> {
        let mut walk = Walk::default();
        // (comment, corrected depth of its structural parent)
        let mut stack: Vec<(&'a Comment, Option<u32>)> =
            comments.iter().rev().map(|c| (c, None)).collect();

        while let Some((comment, parent_depth)) = stack.pop() {
            let depth = match parent_depth {
                Some(parent) if comment.parent.is_comment() => corrected_depth(comment.depth, parent),
                _ => comment.depth,
            };

            let visible = comment.score >= self.min_score;
            if visible {
                walk.visible.push(FlatComment { comment, depth });
            } else {
                walk.hidden += 1;
                if self.hidden_replies == HiddenReplies::Prune {
                    walk.pruned += comment.subtree_len() - 1;
                    continue;
                }
            }

            stack.extend(comment.replies.iter().rev().map(|r| (r, Some(depth))));
        }

        walk
    }
}

/// Depth of a reply given its parent's corrected depth.
pub fn corrected_depth(depth: u32, parent_depth: u32) -> u32 {
    if depth > parent_depth {
        depth
    } else {
        parent_depth.saturating_add(depth).saturating_add(1)
    }
}

/// The seven header entries for a submission.
pub fn header_lines(submission: &Submission) -> Vec<String> {
    let author = submission.author.as_deref().unwrap_or(DELETED_AUTHOR);
    let selftext = if submission.selftext.is_empty() {
        String::new()
    } else {
        format!("\n{}", submission.selftext)
    };

    vec![
        format!("# {} #", submission.title),
        format!("#### Author: {author} ####"),
        format!("#### URL: {} ####", submission.permalink),
        "\n-----".to_string(),
        submission.url.clone(),
        selftext,
        "\n-----".to_string(),
    ]
}

/// Keep a comment body on one Markdown line.
pub fn clean_body(body: &str) -> String {
    body.replace('\n', "  ")
}

/// `"    " * depth + "* body [Author: a] [Upvotes: n]"`.
pub fn format_comment_line(depth: u32, body: &str, author: Option<&str>, score: i64) -> String {
    format!(
        "{}* {} [Author: {}] [Upvotes: {}]",
        INDENT.repeat(depth as usize),
        clean_body(body),
        author.unwrap_or(DELETED_AUTHOR),
        score
    )
}
