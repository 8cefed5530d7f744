// Admission checks applied to every reply during expansion
use crate::config::TextConfig;
use crate::post::Post;
use crate::text::char_len;
use serde::Serialize;
use std::fmt;

/// Why a reply (and with it, its whole subtree) was left out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    EmptyText,
    TooShort,
    TooLong,
    Language,
    Engagement,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::EmptyText => "empty_text",
            Rejection::TooShort => "too_short",
            Rejection::TooLong => "too_long",
            Rejection::Language => "language",
            Rejection::Engagement => "engagement",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ReplyFilter<'a> {
    config: &'a TextConfig,
}

impl<'a> ReplyFilter<'a> {
    pub fn new(config: &'a TextConfig) -> Self {
        Self { config }
    }

    /// Content checks on the normalized text and declared language.
    ///
    /// Posts without a language tag are not rejected for their language.
    pub fn check_text(&self, post: &Post, text: &str) -> Result<(), Rejection> {
        if text.is_empty() {
            return Err(Rejection::EmptyText);
        }

        let len = char_len(text) as u64;
        if len < self.config.chars.min {
            return Err(Rejection::TooShort);
        }
        if self.config.chars.max.is_some_and(|max| len > max) {
            return Err(Rejection::TooLong);
        }

        match post.language.as_deref() {
            Some(lang) if lang != self.config.language => Err(Rejection::Language),
            _ => Ok(()),
        }
    }

    /// Engagement bounds on the summed metrics
    pub fn check_engagement(&self, post: &Post) -> Result<(), Rejection> {
        if self.config.interactions.contains(post.metrics.engagement()) {
            Ok(())
        } else {
            Err(Rejection::Engagement)
        }
    }
}
