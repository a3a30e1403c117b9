//! Engine configuration

use serde::{Deserialize, Serialize};
use url::Url;

use crate::transform::DEFAULT_SLUG_MAX_LENGTH;

/// How a failing item inside a collection is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionFailurePolicy {
    /// The first failing item fails the whole collection
    #[default]
    FailFast,
    /// Failing items are logged and left out
    SkipItem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Base for the `absolute-url` transformer
    pub base_url: Option<Url>,
    pub collection_failure: CollectionFailurePolicy,
    /// Default cap for the `slug` transformer
    pub slug_max_length: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            collection_failure: CollectionFailurePolicy::FailFast,
            slug_max_length: DEFAULT_SLUG_MAX_LENGTH,
        }
    }
}

impl ScraperConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
