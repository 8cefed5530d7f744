//! Source records consumed by the graph builder.
//!
//! Posts and authors are produced by the source parsers and are read-only
//! from here on. Optional wire fields are normalized on construction: a
//! missing engagement counter is simply `0`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a post links to another post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    RepliedTo,
    Quoted,
    Retweeted,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
    pub id: String,
}

impl Reference {
    #[inline]
    #[must_use]
    pub fn replied_to(id: impl Into<String>) -> Self {
        Self {
            kind: ReferenceKind::RepliedTo,
            id: id.into(),
        }
    }
}

/// Engagement counters of a post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub replies: u64,
    #[serde(default)]
    pub quotes: u64,
    #[serde(default)]
    pub retweets: u64,
}

impl Metrics {
    #[inline]
    #[must_use]
    pub fn new(likes: u64, replies: u64, quotes: u64, retweets: u64) -> Self {
        Self {
            likes,
            replies,
            quotes,
            retweets,
        }
    }

    /// Sum of likes, replies, quotes and retweets
    #[inline]
    pub fn engagement(&self) -> u64 {
        self.likes
            .saturating_add(self.replies)
            .saturating_add(self.quotes)
            .saturating_add(self.retweets)
    }
}

/// A single message of a conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub conversation_id: Option<String>,
    pub author_id: Option<String>,
    pub text: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub metrics: Metrics,
    pub language: Option<String>,
    /// Raw fields of the source record, available to the userdata allow-list
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl Post {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn replying_to(mut self, parent_id: impl Into<String>) -> Self {
        self.references.push(Reference::replied_to(parent_id));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Ids of the posts this one replies to
    pub fn replied_to(&self) -> impl Iterator<Item = &str> {
        self.references
            .iter()
            .filter(|r| r.kind == ReferenceKind::RepliedTo && !r.id.is_empty())
            .map(|r| r.id.as_str())
    }

    /// Copy the allow-listed raw fields, in allow-list order
    pub fn userdata(&self, allow_list: &[String]) -> Map<String, Value> {
        allow_list
            .iter()
            .filter_map(|key| self.extra.get(key).map(|v| (key.clone(), v.clone())))
            .collect()
    }
}

/// Author record as delivered by a source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub url: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl Author {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Parse an ISO-8601 timestamp as used by the Twitter API.
///
/// Accepts RFC 3339 and naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Convert a unix timestamp in seconds, as used by Hacker News
pub fn from_unix(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
}
