//! Twitter API v2 responses.
//!
//! Every line of the input is one API response as written by a search or
//! lookup client: `{"data": tweet | [tweet], "includes": {"tweets": [...],
//! "users": [...]}}`. Lines without `data` (rate-limit or error payloads)
//! are skipped.

use crate::{for_each_line, open, SourceBatch};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::BufRead;
use std::path::Path;
use threadgraph_core::post::parse_timestamp;
use threadgraph_core::{Author, Metrics, Post, Reference, Result};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    data: Option<OneOrMany<Map<String, Value>>>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    tweets: Vec<Map<String, Value>>,
    #[serde(default)]
    users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct TweetRecord {
    id: String,
    conversation_id: Option<String>,
    author_id: Option<String>,
    text: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    referenced_tweets: Vec<Reference>,
    public_metrics: Option<PublicMetrics>,
    lang: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    quote_count: u64,
    #[serde(default)]
    retweet_count: u64,
}

impl From<PublicMetrics> for Metrics {
    fn from(m: PublicMetrics) -> Self {
        Metrics::new(m.like_count, m.reply_count, m.quote_count, m.retweet_count)
    }
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    name: Option<String>,
    username: Option<String>,
    url: Option<String>,
    location: Option<String>,
    description: Option<String>,
    created_at: Option<String>,
}

impl From<UserRecord> for Author {
    fn from(user: UserRecord) -> Self {
        Author {
            created_at: user.created_at.as_deref().and_then(parse_timestamp),
            id: user.id,
            name: user.name,
            username: user.username,
            url: user.url.filter(|url| !url.is_empty()),
            location: user.location,
            description: user.description,
            extra: Map::new(),
        }
    }
}

fn tweet_to_post(raw: Map<String, Value>) -> std::result::Result<Post, serde_json::Error> {
    let record: TweetRecord = serde_json::from_value(Value::Object(raw.clone()))?;

    Ok(Post {
        id: record.id,
        conversation_id: record.conversation_id,
        author_id: record.author_id,
        text: record.text,
        created_at: record.created_at.as_deref().and_then(parse_timestamp),
        references: record.referenced_tweets,
        metrics: record.public_metrics.map(Metrics::from).unwrap_or_default(),
        language: record.lang,
        extra: raw,
    })
}

/// Read every response line into `batch`.
///
/// Tweets from `data` and `includes.tweets` are collected by id, their
/// conversation ids are registered in first-seen order, users are collected
/// by id. Later records replace earlier ones.
pub fn parse_response<R: BufRead>(reader: R, batch: &mut SourceBatch) -> Result<()> {
    let mut responses = 0usize;

    for_each_line(reader, |line| {
        let response: Response = serde_json::from_str(line)?;
        responses += 1;

        let Some(data) = response.data else {
            debug!("response without data skipped");
            return Ok(());
        };

        let tweets = data.into_vec().into_iter().chain(response.includes.tweets);
        for raw in tweets {
            let post = tweet_to_post(raw)?;
            if let Some(conversation) = post.conversation_id.as_deref() {
                batch.add_conversation(conversation);
            }
            batch.insert_post(post);
        }

        for user in response.includes.users {
            batch.insert_author(user.into());
        }

        Ok(())
    })?;

    info!(
        responses,
        tweets = batch.posts().len(),
        users = batch.authors().len(),
        conversations = batch.conversation_ids().len(),
        "Twitter responses parsed"
    );

    Ok(())
}

/// Load a JSON Lines file of API responses
pub fn load(path: &Path) -> Result<SourceBatch> {
    let mut batch = SourceBatch::new();
    parse_response(open(path)?, &mut batch)?;
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use threadgraph_core::ReferenceKind;

    const RESPONSES: &str = r#"{"data": {"id": "1", "conversation_id": "1", "author_id": "u1", "text": "Root claim", "lang": "en", "created_at": "2022-03-01T12:30:00.000Z", "public_metrics": {"like_count": 3, "reply_count": 1, "retweet_count": 0, "quote_count": 0}, "source": "web"}, "includes": {"users": [{"id": "u1", "username": "alice", "name": "Alice", "url": ""}]}}
{"data": [{"id": "2", "conversation_id": "1", "author_id": "u2", "text": "@alice nope", "referenced_tweets": [{"type": "replied_to", "id": "1"}, {"type": "quoted", "id": "7"}]}], "includes": {"tweets": [{"id": "7", "conversation_id": "7", "text": "quoted"}], "users": [{"id": "u2", "username": "bob"}]}}
{"errors": [{"title": "Not Found Error"}]}
"#;

    #[test]
    fn test_parse_response_collects_tweets_users_conversations() {
        let mut batch = SourceBatch::new();
        parse_response(RESPONSES.as_bytes(), &mut batch).unwrap();

        assert_eq!(batch.posts().len(), 3);
        assert_eq!(batch.authors().len(), 2);
        assert_eq!(batch.conversation_ids(), &["1".to_string(), "7".to_string()]);

        let root = batch.post("1").unwrap();
        assert_eq!(root.metrics.engagement(), 4);
        assert_eq!(root.language.as_deref(), Some("en"));
        assert_eq!(root.created_at.unwrap().timestamp(), 1_646_137_800);
        assert_eq!(root.extra["source"], "web");

        let reply = batch.post("2").unwrap();
        assert_eq!(reply.replied_to().collect::<Vec<_>>(), vec!["1"]);
        assert_eq!(reply.references[1].kind, ReferenceKind::Quoted);
        assert_eq!(reply.metrics, Metrics::default());

        let alice = batch.author("u1").unwrap();
        assert_eq!(alice.username.as_deref(), Some("alice"));
        assert!(alice.url.is_none());
    }

    #[test]
    fn test_userdata_uses_raw_fields() {
        let mut batch = SourceBatch::new();
        parse_response(RESPONSES.as_bytes(), &mut batch).unwrap();

        let allow = threadgraph_core::config::default_userdata();
        let data = batch.post("1").unwrap().userdata(&allow);
        assert_eq!(data["public_metrics"]["like_count"], 3);
        assert_eq!(data["source"], "web");
        assert!(!data.contains_key("text"));
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let mut batch = SourceBatch::new();
        let err = parse_response("{\"data\": {\"text\": \"no id\"}}\n".as_bytes(), &mut batch);
        assert!(err.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RESPONSES.as_bytes()).unwrap();

        let batch = load(file.path()).unwrap();
        let conversations = batch.conversations();
        assert_eq!(conversations[0].root_id, "1");
        assert_eq!(conversations[0].posts.len(), 2);
        assert_eq!(conversations[0].authors.len(), 2);
    }
}
