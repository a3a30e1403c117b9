//! Value transformation pipeline
//!
//! A field carries an ordered list of [`TransformStep`]s. Each step names a
//! [`Transformer`] in the pipeline's registry and passes it a parameter map.
//! Built-in transformers live in one module per family.

mod absolute_url;
mod casing;
mod pattern;
mod slug;
mod text;

pub use absolute_url::*;
pub use casing::*;
pub use pattern::*;
pub use slug::*;
pub use text::*;

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::config::ScraperConfig;

const PAIR_SEPARATOR: char = ';';
const KEY_VALUE_SEPARATOR: char = '=';

/// Failure inside a single transformation step
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("malformed parameters `{parameters}`: {reason}")]
    InvalidParameters { parameters: String, reason: String },

    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("invalid value `{value}` for parameter `{name}`")]
    InvalidParameter { name: &'static str, value: String },

    #[error("invalid pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{0}")]
    Rejected(String),
}

/// A step of a pipeline failed; names the transformer that did
#[derive(Debug, Error)]
#[error("transformer `{transformer}` failed")]
pub struct PipelineError {
    pub transformer: String,
    #[source]
    pub source: TransformError,
}

/// A named, stateless value transformation
pub trait Transformer: Send + Sync {
    /// Registry name, matched case-insensitively
    fn name(&self) -> &str;

    /// Null input skips this transformer when true
    fn propagates_null(&self) -> bool {
        true
    }

    fn transform(&self, input: Value, parameters: &Parameters) -> Result<Value, TransformError>;
}

/// Parameters of one step, keyed case-insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    values: HashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `key=value;key=value` string.
    ///
    /// Keys and values are trimmed and empty pairs ignored. A pair without
    /// `=`, an empty key, or a repeated key is an error.
    pub fn parse(raw: &str) -> Result<Self, TransformError> {
        let mut parameters = Self::new();
        for pair in raw.split(PAIR_SEPARATOR).filter(|p| !p.trim().is_empty()) {
            let invalid = |reason: String| TransformError::InvalidParameters {
                parameters: raw.to_string(),
                reason,
            };

            let (key, value) = pair
                .split_once(KEY_VALUE_SEPARATOR)
                .ok_or_else(|| invalid(format!("expected `key=value`, got `{}`", pair.trim())))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(invalid(format!("empty key in `{}`", pair.trim())));
            }
            if parameters.get(key).is_some() {
                return Err(invalid(format!("duplicate key `{}`", key)));
            }
            parameters.insert(key, value.trim());
        }
        Ok(parameters)
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    /// Value of a parameter that must be present and non-blank
    pub fn require(&self, key: &'static str) -> Result<&str, TransformError> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or(TransformError::MissingParameter(key))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parameters as declared on a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepParameters {
    /// `key=value;key=value`, parsed when the schema is built or the step runs
    Raw(String),
    Parsed(Parameters),
}

/// One declared transformation on a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformStep {
    pub name: String,
    pub order: i32,
    pub parameters: StepParameters,
}

impl TransformStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: 0,
            parameters: StepParameters::Parsed(Parameters::new()),
        }
    }

    pub fn with_raw(name: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self {
            parameters: StepParameters::Raw(parameters.into()),
            ..Self::new(name)
        }
    }

    pub fn with_parameters(name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            parameters: StepParameters::Parsed(parameters),
            ..Self::new(name)
        }
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    fn parameters(&self) -> Result<Cow<'_, Parameters>, TransformError> {
        match &self.parameters {
            StepParameters::Parsed(parameters) => Ok(Cow::Borrowed(parameters)),
            StepParameters::Raw(raw) => Parameters::parse(raw).map(Cow::Owned),
        }
    }
}

/// Registry of transformers and the step runner
#[derive(Clone, Default)]
pub struct TransformPipeline {
    transformers: HashMap<String, Arc<dyn Transformer>>,
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.transformers.keys().collect();
        names.sort();
        f.debug_struct("TransformPipeline")
            .field("transformers", &names)
            .finish()
    }
}

impl TransformPipeline {
    /// A pipeline with no transformers registered
    pub fn empty() -> Self {
        Self::default()
    }

    /// A pipeline with every built-in transformer
    pub fn with_builtins(config: &ScraperConfig) -> Self {
        let mut pipeline = Self::empty();
        pipeline.register(Trim);
        pipeline.register(NormalizeWhitespace);
        pipeline.register(NullIfEmpty);
        pipeline.register(RegexMatch::default());
        pipeline.register(RegexReplace::default());
        pipeline.register(Slug::new(config.slug_max_length));
        pipeline.register(TitleCase);
        pipeline.register(TextCasingTransformer);
        pipeline.register(AbsoluteUrl::new(config.base_url.clone()));
        pipeline
    }

    /// Add a transformer, replacing and returning any with the same name
    pub fn register<T: Transformer + 'static>(&mut self, transformer: T) -> Option<Arc<dyn Transformer>> {
        self.register_shared(Arc::new(transformer))
    }

    pub fn register_shared(&mut self, transformer: Arc<dyn Transformer>) -> Option<Arc<dyn Transformer>> {
        self.transformers
            .insert(transformer.name().to_lowercase(), transformer)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Transformer>> {
        self.transformers.get(&name.to_lowercase())
    }

    /// Run `steps` over `value` in ascending order, ties in declaration order.
    ///
    /// Unknown transformer names are logged and skipped.
    pub fn apply(&self, value: Value, steps: &[TransformStep]) -> Result<Value, PipelineError> {
        let mut ordered: Vec<&TransformStep> = steps.iter().collect();
        ordered.sort_by_key(|step| step.order);

        let mut current = value;
        for step in ordered {
            let Some(transformer) = self.get(&step.name) else {
                tracing::warn!(transformer = %step.name, "No transformer registered, skipping");
                continue;
            };

            let fail = |source| PipelineError {
                transformer: step.name.clone(),
                source,
            };
            let parameters = step.parameters().map_err(fail)?;

            if current.is_null() && transformer.propagates_null() {
                tracing::trace!(transformer = %step.name, "Null input, skipping");
                continue;
            }
            tracing::trace!(transformer = %step.name, parameters = ?parameters, "Applying transformer");
            current = transformer.transform(current, &parameters).map_err(fail)?;
        }

        Ok(current)
    }
}
