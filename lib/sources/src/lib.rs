//! # threadgraph Sources
//!
//! Parsers for conversation dumps. Each parser reads JSON Lines and fills a
//! [`SourceBatch`] with posts, authors and the ids of the conversations found
//! in the dump.
//!
//! - [`twitter`] - Twitter API v2 search/lookup responses
//! - [`hn`] - Hacker News items and users

pub mod hn;
pub mod twitter;

use ahash::{AHashMap, AHashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use threadgraph_core::{Author, Conversation, Error, Post, Result};
use tracing::debug;

/// Flat collection of posts and authors read from one dump
#[derive(Debug, Default)]
pub struct SourceBatch {
    posts: Vec<Post>,
    post_index: AHashMap<String, usize>,
    authors: Vec<Author>,
    author_index: AHashMap<String, usize>,
    conversation_ids: Vec<String>,
    known_conversations: AHashSet<String>,
}

impl SourceBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a post; a later record with the same id replaces the earlier one
    pub fn insert_post(&mut self, post: Post) {
        match self.post_index.get(&post.id) {
            Some(&slot) => self.posts[slot] = post,
            None => {
                self.post_index.insert(post.id.clone(), self.posts.len());
                self.posts.push(post);
            }
        }
    }

    /// Insert an author; a later record with the same id replaces the earlier one
    pub fn insert_author(&mut self, author: Author) {
        match self.author_index.get(&author.id) {
            Some(&slot) => self.authors[slot] = author,
            None => {
                self.author_index.insert(author.id.clone(), self.authors.len());
                self.authors.push(author);
            }
        }
    }

    /// Remember a conversation id, keeping first-seen order
    pub fn add_conversation(&mut self, id: &str) {
        if self.known_conversations.insert(id.to_string()) {
            self.conversation_ids.push(id.to_string());
        }
    }

    #[inline]
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn posts_mut(&mut self) -> impl Iterator<Item = &mut Post> {
        self.posts.iter_mut()
    }

    #[inline]
    pub fn authors(&self) -> &[Author] {
        &self.authors
    }

    #[inline]
    pub fn conversation_ids(&self) -> &[String] {
        &self.conversation_ids
    }

    pub fn post(&self, id: &str) -> Option<&Post> {
        self.post_index.get(id).map(|&slot| &self.posts[slot])
    }

    pub fn author(&self, id: &str) -> Option<&Author> {
        self.author_index.get(id).map(|&slot| &self.authors[slot])
    }

    /// Split the batch into one view per conversation.
    ///
    /// Each view holds the posts carrying that conversation id and the
    /// authors of those posts. A conversation whose root post is not part of
    /// the dump still yields a view; the pipeline reports it as missing.
    pub fn conversations(&self) -> Vec<Conversation<'_>> {
        let mut grouped: AHashMap<&str, Vec<&Post>> = AHashMap::new();
        let mut orphans = 0usize;

        for post in &self.posts {
            match post.conversation_id.as_deref() {
                Some(conversation) => grouped.entry(conversation).or_default().push(post),
                None => orphans += 1,
            }
        }

        if orphans > 0 {
            debug!(orphans, "posts without conversation id ignored");
        }

        self.conversation_ids
            .iter()
            .map(|root_id| {
                let posts = grouped.remove(root_id.as_str()).unwrap_or_default();
                let mut seen = AHashSet::new();
                let authors = posts
                    .iter()
                    .filter_map(|post| post.author_id.as_deref())
                    .filter(|author| seen.insert(*author))
                    .filter_map(|author| self.author(author))
                    .collect();

                Conversation {
                    root_id: root_id.as_str(),
                    posts,
                    authors,
                }
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Feed every non-empty line of a JSON Lines reader to `handle`.
///
/// Parse errors carry the 1-based line number.
pub(crate) fn for_each_line<R, F>(reader: R, mut handle: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&str) -> std::result::Result<(), serde_json::Error>,
{
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        handle(&line).map_err(|e| Error::Parse(format!("line {}: {}", number + 1, e)))?;
    }
    Ok(())
}

pub(crate) fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}
