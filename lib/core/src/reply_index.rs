use crate::post::Post;
use ahash::{AHashMap, AHashSet};

/// Direct replies of every post, keyed by parent id.
///
/// Only `replied_to` references whose target is part of the same collection
/// are followed; quotes and retweets never create structure. Replies keep the
/// order in which they appear in the input.
#[derive(Debug, Default)]
pub struct ReplyIndex<'a> {
    replies: AHashMap<&'a str, Vec<&'a Post>>,
}

impl<'a> ReplyIndex<'a> {
    pub fn build<I>(posts: I) -> Self
    where
        I: IntoIterator<Item = &'a Post>,
        I::IntoIter: Clone,
    {
        let posts = posts.into_iter();
        let known: AHashSet<&str> = posts.clone().map(|p| p.id.as_str()).collect();
        let mut replies: AHashMap<&'a str, Vec<&'a Post>> = AHashMap::new();

        for post in posts {
            for parent in post.replied_to() {
                if let Some(parent) = known.get(parent) {
                    replies.entry(*parent).or_default().push(post);
                }
            }
        }

        Self { replies }
    }

    /// Direct replies of `parent_id`, empty for leaves
    #[inline]
    pub fn replies(&self, parent_id: &str) -> &[&'a Post] {
        self.replies.get(parent_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of posts that have at least one reply
    #[inline]
    pub fn len(&self) -> usize {
        self.replies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::{Reference, ReferenceKind};

    fn ids(posts: &[&Post]) -> Vec<String> {
        posts.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn test_groups_replies_in_input_order() {
        let posts = vec![
            Post::new("1"),
            Post::new("3").replying_to("1"),
            Post::new("2").replying_to("1"),
            Post::new("4").replying_to("2"),
        ];

        let index = ReplyIndex::build(&posts);
        assert_eq!(ids(index.replies("1")), vec!["3", "2"]);
        assert_eq!(ids(index.replies("2")), vec!["4"]);
        assert!(index.replies("4").is_empty());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_drops_unknown_parents() {
        let posts = vec![Post::new("1"), Post::new("2").replying_to("999")];

        let index = ReplyIndex::build(&posts);
        assert!(index.is_empty());
        assert!(index.replies("999").is_empty());
    }

    #[test]
    fn test_ignores_quotes_and_retweets() {
        let mut quote = Post::new("2");
        quote.references.push(Reference {
            kind: ReferenceKind::Quoted,
            id: "1".to_string(),
        });
        let mut retweet = Post::new("3");
        retweet.references.push(Reference {
            kind: ReferenceKind::Retweeted,
            id: "1".to_string(),
        });
        let posts = vec![Post::new("1"), quote, retweet];

        assert!(ReplyIndex::build(&posts).replies("1").is_empty());
    }
}
