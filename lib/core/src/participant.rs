use crate::post::Author;
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Author of one or more atom nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub url: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub userdata: Map<String, Value>,
}

impl Participant {
    /// Build a participant from an author record.
    ///
    /// Records without a creation time are stamped with the current time.
    pub fn from_author(author: &Author) -> Self {
        let now = Utc::now();
        Self {
            id: author.id.clone(),
            name: author.name.clone(),
            username: author.username.clone(),
            url: author.url.clone(),
            location: author.location.clone(),
            description: author.description.clone(),
            created: author.created_at.unwrap_or(now),
            updated: now,
            userdata: author.extra.clone(),
        }
    }
}

/// Participants keyed by author id, shared by every node they author
pub type Participants = AHashMap<String, Arc<Participant>>;

/// Deduplicate author records; a later record for the same id replaces an earlier one
pub fn build_participants<'a, I>(authors: I) -> Participants
where
    I: IntoIterator<Item = &'a Author>,
{
    let mut participants = Participants::new();

    for author in authors {
        participants.insert(author.id.clone(), Arc::new(Participant::from_author(author)));
    }

    participants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_participant_per_author() {
        let authors = vec![
            Author::new("u1").with_username("alice"),
            Author::new("u2").with_username("bob"),
            Author::new("u1").with_username("alice_renamed"),
        ];

        let participants = build_participants(&authors);
        assert_eq!(participants.len(), 2);
        assert_eq!(
            participants["u1"].username.as_deref(),
            Some("alice_renamed")
        );
    }

    #[test]
    fn test_missing_created_falls_back_to_now() {
        let before = Utc::now();
        let participant = Participant::from_author(&Author::new("u1"));
        assert!(participant.created >= before);
        assert_eq!(participant.id, "u1");
    }
}
