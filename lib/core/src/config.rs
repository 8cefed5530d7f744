use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Inclusive `[min, max]` range, `max == None` meaning unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: u64,
    pub max: Option<u64>,
}

impl Bounds {
    #[inline]
    #[must_use]
    pub fn new(min: u64, max: Option<u64>) -> Self {
        Self { min, max }
    }

    #[inline]
    #[must_use]
    pub fn at_least(min: u64) -> Self {
        Self { min, max: None }
    }

    #[inline]
    pub fn contains(&self, value: u64) -> bool {
        value >= self.min && self.max.map_or(true, |max| value <= max)
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        match self.max {
            Some(max) if self.min > max => Err(Error::InvalidConfig(format!(
                "{}: minimum {} exceeds maximum {}",
                name, self.min, max
            ))),
            _ => Ok(()),
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::at_least(0)
    }
}

/// Default userdata allow-list for Twitter records
pub fn default_userdata() -> Vec<String> {
    [
        "public_metrics",
        "context_annotations",
        "entities",
        "possibly_sensitive",
        "attachments",
        "geo",
        "source",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Which replies become nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextConfig {
    /// Strip mentions and short links before filtering
    pub clean: bool,
    /// Character length of the normalized text
    pub chars: Bounds,
    /// Likes + replies + quotes + retweets
    pub interactions: Bounds,
    /// Posts declaring another language are skipped
    pub language: String,
    /// Raw record fields copied onto atom nodes
    pub userdata: Vec<String>,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            clean: true,
            chars: Bounds::default(),
            interactions: Bounds::default(),
            language: "en".to_string(),
            userdata: default_userdata(),
        }
    }
}

/// Shape constraints applied after expansion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Atom distance between the major claim and every surviving leaf
    pub depth: Bounds,
    /// Number of atom nodes, major claim included
    pub nodes: Bounds,
    /// Render a PDF next to each stored graph
    pub render: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            depth: Bounds::default(),
            nodes: Bounds::at_least(2),
            render: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub text: TextConfig,
    pub graph: GraphConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entailment_address: Option<String>,
}

impl PipelineConfig {
    /// Reject inconsistent bound pairs before any conversation is processed
    pub fn validate(&self) -> Result<()> {
        self.text.chars.validate("chars")?;
        self.text.interactions.validate("interactions")?;
        self.graph.depth.validate("depth")?;
        self.graph.nodes.validate("nodes")?;

        if self.text.language.trim().is_empty() {
            return Err(Error::InvalidConfig("language must not be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_contains() {
        let bounds = Bounds::new(2, Some(4));
        assert!(!bounds.contains(1));
        assert!(bounds.contains(2));
        assert!(bounds.contains(4));
        assert!(!bounds.contains(5));
        assert!(Bounds::at_least(0).contains(u64::MAX));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = PipelineConfig::default();
        config.graph.depth = Bounds::new(3, Some(1));

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(err.to_string().contains("depth"));
    }

    #[test]
    fn test_equal_bounds_allowed() {
        let mut config = PipelineConfig::default();
        config.text.chars = Bounds::new(10, Some(10));
        assert!(config.validate().is_ok());
    }
}
