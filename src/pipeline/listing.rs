//! Reddit listing JSON and the comment arena used while expanding "more"
//! placeholders.
//!
//! Reddit returns a thread as two listings: the submission, then the comment
//! forest. Comment `replies` is either a nested listing or the empty string.
//! Wherever Reddit truncated the tree it leaves a `more` object:
//!
//! * with child ids: resolved through `/api/morechildren`, which answers
//!   with a *flat* list of comments that carry their `parent_id`;
//! * with no child ids (id `_`): "continue this thread", resolved by
//!   fetching the parent comment's own permalink. Depths in that response
//!   restart at zero.
//!
//! [`CommentArena`] holds the tree by id so both kinds of answer can be
//! grafted in place of their placeholder without walking nested vectors.

use crate::error::ExportError;
use crate::model::{Comment, CommentParent, Submission};
use serde::de::{Deserializer, IgnoredAny};
use serde::Deserialize;
use std::collections::HashMap;

// ── Wire format ──────────────────────────────────────────────────────────

/// One `{"kind": ..., "data": ...}` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Thing {
    #[serde(rename = "t1")]
    Comment(RawComment),
    #[serde(rename = "t3")]
    Link(RawLink),
    #[serde(rename = "more")]
    More(RawMore),
    #[serde(rename = "Listing")]
    Listing(ListingData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<Thing>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub depth: Option<u32>,
    pub parent_id: String,
    #[serde(default, deserialize_with = "deserialize_replies")]
    pub replies: Vec<Thing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLink {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMore {
    pub id: String,
    pub parent_id: String,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub count: u64,
}

/// `replies` is `""` on leaves and a listing otherwise.
fn deserialize_replies<'de, D>(deserializer: D) -> Result<Vec<Thing>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Replies {
        Listing(Listing),
        Empty(IgnoredAny),
    }

    Ok(match Replies::deserialize(deserializer)? {
        Replies::Listing(listing) => listing.data.children,
        Replies::Empty(_) => Vec::new(),
    })
}

/// Body of `/api/morechildren?api_type=json`.
#[derive(Debug, Deserialize)]
pub struct MoreChildrenResponse {
    pub json: MoreChildrenJson,
}

#[derive(Debug, Deserialize)]
pub struct MoreChildrenJson {
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
    #[serde(default)]
    pub data: Option<MoreChildrenData>,
}

#[derive(Debug, Deserialize)]
pub struct MoreChildrenData {
    #[serde(default)]
    pub things: Vec<Thing>,
}

// ── Parsing ──────────────────────────────────────────────────────────────

fn malformed(detail: impl Into<String>) -> ExportError {
    ExportError::MalformedResponse {
        detail: detail.into(),
    }
}

/// Parse a `/comments/{id}` response into the submission and the raw
/// top-level comment things.
pub fn parse_thread_listing(body: &str) -> Result<(Submission, Vec<Thing>), ExportError> {
    let listings: Vec<Listing> =
        serde_json::from_str(body).map_err(|e| malformed(format!("thread listing: {e}")))?;
    let mut listings = listings.into_iter();

    let link = listings
        .next()
        .and_then(|l| {
            l.data.children.into_iter().find_map(|t| match t {
                Thing::Link(link) => Some(link),
                _ => None,
            })
        })
        .ok_or_else(|| malformed("thread listing has no submission"))?;

    let comments = listings
        .next()
        .map(|l| l.data.children)
        .unwrap_or_default();

    Ok((submission_from_raw(link), comments))
}

/// Parse a "continue this thread" response and return the focal comment's
/// replies.
pub fn parse_continue_listing(body: &str, focal_id: &str) -> Result<Vec<Thing>, ExportError> {
    let (_, things) = parse_thread_listing(body)?;
    things
        .into_iter()
        .find_map(|t| match t {
            Thing::Comment(c) if c.id == focal_id => Some(c.replies),
            _ => None,
        })
        .ok_or_else(|| malformed(format!("continue-thread listing lacks comment {focal_id}")))
}

/// Parse a `/api/morechildren` response into its flat list of things.
pub fn parse_more_children(body: &str) -> Result<Vec<Thing>, ExportError> {
    let response: MoreChildrenResponse =
        serde_json::from_str(body).map_err(|e| malformed(format!("morechildren: {e}")))?;
    if !response.json.errors.is_empty() {
        return Err(malformed(format!(
            "morechildren errors: {}",
            serde_json::Value::Array(response.json.errors)
        )));
    }
    Ok(response.json.data.map(|d| d.things).unwrap_or_default())
}

fn submission_from_raw(link: RawLink) -> Submission {
    Submission {
        id: link.id,
        title: link.title,
        author: normalise_author(link.author),
        permalink: link.permalink,
        url: link.url.unwrap_or_default(),
        selftext: link.selftext,
        subreddit: link.subreddit,
        score: link.score,
        num_comments: link.num_comments,
    }
}

/// Reddit reports deleted accounts as the literal `[deleted]`.
fn normalise_author(author: Option<String>) -> Option<String> {
    author.filter(|a| !a.is_empty() && a != "[deleted]")
}

// ── Arena ────────────────────────────────────────────────────────────────

/// An unresolved "more" placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoreStub {
    pub id: String,
    /// Parent comment id, `None` for top level.
    pub parent: Option<String>,
    /// Ids to pass to `morechildren`. Empty for "continue this thread".
    pub children: Vec<String>,
    pub depth: u32,
    pub count: u64,
}

impl MoreStub {
    pub fn is_continue_thread(&self) -> bool {
        self.children.is_empty()
    }
}

/// An entry in a reply list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Comment(String),
    More(MoreStub),
}

/// Which reply list a slot lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    Root,
    Replies(String),
}

#[derive(Debug)]
struct Node {
    comment: Comment,
    slots: Vec<Slot>,
}

/// The comment forest indexed by id, with placeholders kept in position.
#[derive(Debug, Default)]
pub struct CommentArena {
    nodes: HashMap<String, Node>,
    roots: Vec<Slot>,
}

impl CommentArena {
    /// Build an arena from the top-level things of a thread listing.
    pub fn from_things(things: Vec<Thing>) -> Self {
        let mut arena = Self::default();
        let roots: Vec<Slot> = things
            .into_iter()
            .filter_map(|t| arena.insert_thing(t))
            .collect();
        arena.roots = roots;
        arena
    }

    pub fn comment_count(&self) -> usize {
        self.nodes.len()
    }

    /// Placeholders still in the tree.
    pub fn pending_count(&self) -> usize {
        self.roots
            .iter()
            .chain(self.nodes.values().flat_map(|n| n.slots.iter()))
            .filter(|s| matches!(s, Slot::More(_)))
            .count()
    }

    /// Remove the first placeholder in pre-order and report where it was.
    pub fn take_first_pending(&mut self) -> Option<(Container, usize, MoreStub)> {
        let (container, index) = self.find_first_pending()?;
        let list = self.slots_mut(&container)?;
        match list.remove(index) {
            Slot::More(stub) => Some((container, index, stub)),
            Slot::Comment(_) => None,
        }
    }

    fn find_first_pending(&self) -> Option<(Container, usize)> {
        let mut stack = vec![(Container::Root, self.roots.as_slice(), 0)];

        while let Some((container, slots, start)) = stack.pop() {
            for (index, slot) in slots.iter().enumerate().skip(start) {
                match slot {
                    Slot::More(_) => return Some((container, index)),
                    Slot::Comment(id) => match self.nodes.get(id) {
                        Some(node) if !node.slots.is_empty() => {
                            // Resume this list after the subtree.
                            stack.push((container.clone(), slots, index + 1));
                            stack.push((Container::Replies(id.clone()), node.slots.as_slice(), 0));
                            break;
                        }
                        _ => {}
                    },
                }
            }
        }
        None
    }

    /// Graft resolved things at `index` of `container`.
    ///
    /// Things whose parent is the placeholder's parent take the placeholder's
    /// position in order; things whose parent is another known comment are
    /// appended to that comment's replies.
    pub fn graft(&mut self, container: &Container, index: usize, things: Vec<Thing>) -> usize {
        let target = match container {
            Container::Root => None,
            Container::Replies(id) => Some(id.clone()),
        };
        let before = self.nodes.len();
        let mut in_place = Vec::new();

        for thing in things {
            let parent = match &thing {
                Thing::Comment(c) => parent_key(&c.parent_id),
                Thing::More(m) => parent_key(&m.parent_id),
                _ => continue,
            };
            let Some(slot) = self.insert_thing(thing) else {
                continue;
            };
            match parent {
                Some(ref pid) if Some(pid) != target.as_ref() && self.nodes.contains_key(pid) => {
                    if let Some(node) = self.nodes.get_mut(pid) {
                        node.slots.push(slot);
                    }
                }
                _ => in_place.push(slot),
            }
        }

        if let Some(list) = self.slots_mut(container) {
            let at = index.min(list.len());
            list.splice(at..at, in_place);
        }
        self.nodes.len() - before
    }

    /// Put a placeholder back, e.g. the unrequested remainder of a large
    /// `more` object.
    pub fn reinsert(&mut self, container: &Container, index: usize, stub: MoreStub) {
        if let Some(list) = self.slots_mut(container) {
            let at = index.min(list.len());
            list.insert(at, Slot::More(stub));
        }
    }

    /// Drop every remaining placeholder, returning how many were removed.
    pub fn drop_pending(&mut self) -> usize {
        let mut dropped = 0;
        let mut prune = |slots: &mut Vec<Slot>| {
            let len = slots.len();
            slots.retain(|s| !matches!(s, Slot::More(_)));
            dropped += len - slots.len();
        };
        prune(&mut self.roots);
        for node in self.nodes.values_mut() {
            prune(&mut node.slots);
        }
        dropped
    }

    /// Assemble the nested forest. Placeholders still present are skipped.
    pub fn into_comments(mut self) -> Vec<Comment> {
        let roots = std::mem::take(&mut self.roots);
        self.build(roots)
    }

    fn build(&mut self, slots: Vec<Slot>) -> Vec<Comment> {
        let mut out = Vec::with_capacity(slots.len());
        for slot in slots {
            let Slot::Comment(id) = slot else { continue };
            let Some(node) = self.nodes.remove(&id) else {
                continue;
            };
            let mut comment = node.comment;
            comment.replies = self.build(node.slots);
            out.push(comment);
        }
        out
    }

    fn slots_mut(&mut self, container: &Container) -> Option<&mut Vec<Slot>> {
        match container {
            Container::Root => Some(&mut self.roots),
            Container::Replies(id) => self.nodes.get_mut(id).map(|n| &mut n.slots),
        }
    }

    fn insert_thing(&mut self, thing: Thing) -> Option<Slot> {
        match thing {
            Thing::Comment(raw) => {
                let id = raw.id.clone();
                let slots = raw
                    .replies
                    .into_iter()
                    .filter_map(|t| self.insert_thing(t))
                    .collect();
                let comment = Comment {
                    id: raw.id,
                    author: normalise_author(raw.author),
                    body: raw.body,
                    score: raw.score,
                    depth: raw.depth.unwrap_or(0),
                    parent: CommentParent::from_fullname(&raw.parent_id),
                    replies: Vec::new(),
                };
                self.nodes.insert(id.clone(), Node { comment, slots });
                Some(Slot::Comment(id))
            }
            Thing::More(raw) => Some(Slot::More(MoreStub {
                parent: parent_key(&raw.parent_id),
                id: raw.id,
                children: raw.children,
                depth: raw.depth,
                count: raw.count,
            })),
            Thing::Link(_) | Thing::Listing(_) => None,
        }
    }
}

fn parent_key(parent_id: &str) -> Option<String> {
    match CommentParent::from_fullname(parent_id) {
        CommentParent::Comment(id) => Some(id),
        CommentParent::Submission => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREAD: &str = r#"[
      {"kind": "Listing", "data": {"children": [
        {"kind": "t3", "data": {
          "id": "abc", "title": "Test Thread", "author": "alice",
          "permalink": "/r/test/comments/abc/test_thread/",
          "url": "http://example.com", "selftext": "", "subreddit": "test",
          "score": 42, "num_comments": 5
        }}
      ]}},
      {"kind": "Listing", "data": {"children": [
        {"kind": "t1", "data": {
          "id": "c1", "author": "bob", "body": "first", "score": 5, "depth": 0,
          "parent_id": "t3_abc",
          "replies": {"kind": "Listing", "data": {"children": [
            {"kind": "t1", "data": {
              "id": "c2", "author": "[deleted]", "body": "[removed]", "score": 1,
              "depth": 1, "parent_id": "t1_c1", "replies": ""
            }},
            {"kind": "more", "data": {
              "id": "_", "parent_id": "t1_c1", "children": [], "depth": 1, "count": 0
            }}
          ]}}
        }},
        {"kind": "more", "data": {
          "id": "m1", "parent_id": "t3_abc", "children": ["c3", "c4"], "depth": 0, "count": 2
        }}
      ]}}
    ]"#;

    #[test]
    fn parses_submission_and_comments() {
        let (submission, things) = parse_thread_listing(THREAD).unwrap();
        assert_eq!(submission.title, "Test Thread");
        assert_eq!(submission.author.as_deref(), Some("alice"));
        assert_eq!(submission.url, "http://example.com");
        assert_eq!(submission.num_comments, 5);
        assert_eq!(things.len(), 2);
    }

    #[test]
    fn arena_tracks_placeholders() {
        let (_, things) = parse_thread_listing(THREAD).unwrap();
        let arena = CommentArena::from_things(things);
        assert_eq!(arena.comment_count(), 2);
        assert_eq!(arena.pending_count(), 2);
    }

    #[test]
    fn deleted_author_becomes_none() {
        let (_, things) = parse_thread_listing(THREAD).unwrap();
        let mut arena = CommentArena::from_things(things);
        arena.drop_pending();
        let comments = arena.into_comments();
        assert_eq!(comments[0].replies[0].author, None);
        assert_eq!(comments[0].replies[0].parent, CommentParent::Comment("c1".into()));
    }

    #[test]
    fn first_pending_is_in_preorder() {
        let (_, things) = parse_thread_listing(THREAD).unwrap();
        let mut arena = CommentArena::from_things(things);

        let (container, index, stub) = arena.take_first_pending().unwrap();
        assert_eq!(container, Container::Replies("c1".into()));
        assert_eq!(index, 1);
        assert!(stub.is_continue_thread());

        let (container, index, stub) = arena.take_first_pending().unwrap();
        assert_eq!(container, Container::Root);
        assert_eq!(index, 1);
        assert_eq!(stub.children, vec!["c3", "c4"]);

        assert!(arena.take_first_pending().is_none());
    }

    #[test]
    fn graft_places_flat_children_under_their_parents() {
        let (_, things) = parse_thread_listing(THREAD).unwrap();
        let mut arena = CommentArena::from_things(things);
        arena.take_first_pending().unwrap();
        let (container, index, _) = arena.take_first_pending().unwrap();

        let body = r#"{"json": {"errors": [], "data": {"things": [
          {"kind": "t1", "data": {"id": "c3", "author": "carol", "body": "third",
            "score": 2, "depth": 0, "parent_id": "t3_abc", "replies": ""}},
          {"kind": "t1", "data": {"id": "c3a", "author": "dave", "body": "reply",
            "score": 1, "depth": 1, "parent_id": "t1_c3", "replies": ""}},
          {"kind": "t1", "data": {"id": "c4", "author": "erin", "body": "fourth",
            "score": -3, "depth": 0, "parent_id": "t3_abc", "replies": ""}}
        ]}}}"#;
        let added = arena.graft(&container, index, parse_more_children(body).unwrap());
        assert_eq!(added, 3);
        assert_eq!(arena.pending_count(), 0);

        let comments = arena.into_comments();
        let ids: Vec<_> = comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3", "c4"]);
        assert_eq!(comments[1].replies[0].id, "c3a");
    }

    #[test]
    fn continue_listing_returns_focal_replies() {
        let body = r#"[
          {"kind": "Listing", "data": {"children": [
            {"kind": "t3", "data": {"id": "abc", "title": "t"}}
          ]}},
          {"kind": "Listing", "data": {"children": [
            {"kind": "t1", "data": {"id": "c1", "body": "focal", "score": 1, "depth": 0,
              "parent_id": "t3_abc",
              "replies": {"kind": "Listing", "data": {"children": [
                {"kind": "t1", "data": {"id": "deep", "body": "deep", "score": 1,
                  "depth": 1, "parent_id": "t1_c1", "replies": ""}}
              ]}}}}
          ]}}
        ]"#;
        let replies = parse_continue_listing(body, "c1").unwrap();
        assert_eq!(replies.len(), 1);
        assert!(parse_continue_listing(body, "zzz").is_err());
    }

    #[test]
    fn morechildren_errors_are_malformed() {
        let body = r#"{"json": {"errors": [["BAD", "nope", "x"]]}}"#;
        assert!(matches!(
            parse_more_children(body),
            Err(ExportError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_thread_listing("{\"error\": 404}"),
            Err(ExportError::MalformedResponse { .. })
        ));
        assert!(parse_thread_listing("[]").is_err());
    }
}
