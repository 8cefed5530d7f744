//! Hacker News items and users.
//!
//! Input is JSON Lines where each line is either a raw item as returned by
//! `item/<id>.json` or a user as returned by `user/<id>.json`. Stories become
//! conversation roots; every comment is attached to the story at the top of
//! its parent chain.

use crate::{for_each_line, open, SourceBatch};
use ahash::AHashMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map};
use std::io::BufRead;
use std::path::Path;
use std::sync::OnceLock;
use threadgraph_core::post::from_unix;
use threadgraph_core::{Author, Post, Result};
use tracing::{debug, info};

/// Story fields copied into atom userdata unless configured otherwise
pub const DEFAULT_USERDATA: &[&str] = &["descendants", "score", "title", "url"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ItemKind {
    Story,
    Comment,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    id: u64,
    #[serde(rename = "type")]
    kind: ItemKind,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    dead: bool,
    by: Option<String>,
    time: Option<i64>,
    text: Option<String>,
    parent: Option<u64>,
    url: Option<String>,
    score: Option<i64>,
    title: Option<String>,
    descendants: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    created: Option<i64>,
    #[serde(default)]
    karma: i64,
    about: Option<String>,
    #[serde(default)]
    submitted: Vec<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Record {
    Item(RawItem),
    User(RawUser),
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"))
}

/// Turn HN comment markup into plain text.
///
/// Paragraph tags become newlines, all other tags are dropped and HTML
/// entities are decoded.
pub fn html_to_text(html: &str) -> String {
    let text = html.replace("<p>", "\n").replace("</p>", "");
    let text = tag_pattern().replace_all(&text, "");
    html_escape::decode_html_entities(&text).into_owned()
}

impl RawItem {
    fn atom_text(&self) -> String {
        let body = self.text.as_deref().map(html_to_text).unwrap_or_default();

        match self.title.as_deref() {
            Some(title) if self.kind == ItemKind::Story && !title.is_empty() => {
                if body.is_empty() {
                    title.to_string()
                } else {
                    format!("{}\n\n{}", title, body)
                }
            }
            _ => body,
        }
    }

    fn into_post(self) -> Post {
        let mut post = Post::new(self.id.to_string()).with_text(self.atom_text());
        post.author_id = self.by.clone();
        post.created_at = self.time.and_then(from_unix);

        match self.kind {
            ItemKind::Story => {
                post.conversation_id = Some(self.id.to_string());
                if let Some(descendants) = self.descendants {
                    post.extra.insert("descendants".into(), json!(descendants));
                }
                if let Some(score) = self.score {
                    post.extra.insert("score".into(), json!(score));
                }
                if let Some(title) = self.title {
                    post.extra.insert("title".into(), json!(title));
                }
                if let Some(url) = self.url {
                    post.extra.insert("url".into(), json!(url));
                }
                post
            }
            _ => match self.parent {
                Some(parent) => post.replying_to(parent.to_string()),
                None => post,
            },
        }
    }
}

impl From<RawUser> for Author {
    fn from(user: RawUser) -> Self {
        let mut extra = Map::new();
        extra.insert("karma".into(), json!(user.karma));
        extra.insert("submissions".into(), json!(user.submitted.len()));

        Author {
            username: Some(user.id.clone()),
            id: user.id,
            name: None,
            url: None,
            location: None,
            description: user.about.as_deref().map(html_to_text),
            created_at: user.created.and_then(from_unix),
            extra,
        }
    }
}

/// Walk the parent chain of every comment up to its story.
///
/// Comments whose chain ends outside the dump, or loops, keep no
/// conversation id.
fn resolve_conversations(items: &[RawItem]) -> AHashMap<u64, u64> {
    let parents: AHashMap<u64, Option<u64>> = items
        .iter()
        .map(|item| (item.id, (item.kind == ItemKind::Comment).then_some(item.parent).flatten()))
        .collect();
    let kinds: AHashMap<u64, ItemKind> = items.iter().map(|item| (item.id, item.kind)).collect();

    let mut roots = AHashMap::new();
    for item in items.iter().filter(|item| item.kind == ItemKind::Comment) {
        let mut current = item.parent;
        let mut steps = 0usize;

        while let Some(id) = current {
            if steps > parents.len() {
                debug!(comment = item.id, "parent chain loops");
                break;
            }
            steps += 1;

            match kinds.get(&id) {
                Some(ItemKind::Story) => {
                    roots.insert(item.id, id);
                    break;
                }
                Some(ItemKind::Comment) => current = parents.get(&id).copied().flatten(),
                _ => break,
            }
        }
    }

    roots
}

/// Read every item and user line into `batch`.
///
/// Deleted and dead items are skipped; job, poll and pollopt items are
/// ignored.
pub fn parse_items<R: BufRead>(reader: R, batch: &mut SourceBatch) -> Result<()> {
    let mut items = Vec::new();
    let mut skipped = 0usize;

    for_each_line(reader, |line| {
        match serde_json::from_str::<Record>(line)? {
            Record::Item(item) if item.deleted || item.dead || item.kind == ItemKind::Other => {
                skipped += 1;
            }
            Record::Item(item) => items.push(item),
            Record::User(user) => batch.insert_author(user.into()),
        }
        Ok(())
    })?;

    let roots = resolve_conversations(&items);
    let total = items.len();

    for item in items {
        let id = item.id;
        let is_story = item.kind == ItemKind::Story;
        let mut post = item.into_post();

        if is_story {
            batch.add_conversation(&id.to_string());
        } else {
            post.conversation_id = roots.get(&id).map(|root| root.to_string());
        }
        batch.insert_post(post);
    }

    info!(
        items = total,
        skipped,
        users = batch.authors().len(),
        stories = batch.conversation_ids().len(),
        "Hacker News items parsed"
    );

    Ok(())
}

/// Load a JSON Lines file of items and users
pub fn load(path: &Path) -> Result<SourceBatch> {
    let mut batch = SourceBatch::new();
    parse_items(open(path)?, &mut batch)?;
    Ok(batch)
}
