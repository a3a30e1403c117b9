//! Relative URL resolution

use serde_json::Value;
use url::Url;

use super::{Parameters, TransformError, Transformer};

pub const BASE_PARAMETER: &str = "base";

/// `absolute-url`: resolve the input against `base`, or against the base URL
/// the pipeline was configured with. Blank input becomes null.
#[derive(Debug, Clone, Default)]
pub struct AbsoluteUrl {
    base: Option<Url>,
}

impl AbsoluteUrl {
    pub fn new(base: Option<Url>) -> Self {
        Self { base }
    }
}

impl Transformer for AbsoluteUrl {
    fn name(&self) -> &str {
        "absolute-url"
    }

    fn transform(&self, input: Value, parameters: &Parameters) -> Result<Value, TransformError> {
        let relative = match &input {
            Value::String(s) if !s.trim().is_empty() => s.trim(),
            _ => return Ok(Value::Null),
        };

        let base = match parameters.get(BASE_PARAMETER) {
            Some(raw) => Url::parse(raw).map_err(|_| TransformError::InvalidParameter {
                name: BASE_PARAMETER,
                value: raw.to_string(),
            })?,
            None => self
                .base
                .clone()
                .ok_or_else(|| TransformError::Rejected("no base URL configured".to_string()))?,
        };

        base.join(relative)
            .map(|url| Value::String(url.to_string()))
            .map_err(|e| TransformError::Rejected(format!("cannot resolve `{}`: {}", relative, e)))
    }
}
