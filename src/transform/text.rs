//! Whitespace and emptiness transformers

use serde_json::Value;

use super::{Parameters, TransformError, Transformer};

/// `trim`: strip leading and trailing whitespace
#[derive(Debug, Clone, Copy, Default)]
pub struct Trim;

impl Transformer for Trim {
    fn name(&self) -> &str {
        "trim"
    }

    fn transform(&self, input: Value, _parameters: &Parameters) -> Result<Value, TransformError> {
        Ok(match input {
            Value::String(s) => Value::String(s.trim().to_string()),
            other => other,
        })
    }
}

/// `normalize-whitespace`: collapse whitespace runs to a single space and trim
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeWhitespace;

impl Transformer for NormalizeWhitespace {
    fn name(&self) -> &str {
        "normalize-whitespace"
    }

    fn transform(&self, input: Value, _parameters: &Parameters) -> Result<Value, TransformError> {
        Ok(match input {
            Value::String(s) => Value::String(s.split_whitespace().collect::<Vec<_>>().join(" ")),
            other => other,
        })
    }
}

/// `null-if-empty`: blank strings become null
#[derive(Debug, Clone, Copy, Default)]
pub struct NullIfEmpty;

impl Transformer for NullIfEmpty {
    fn name(&self) -> &str {
        "null-if-empty"
    }

    fn transform(&self, input: Value, _parameters: &Parameters) -> Result<Value, TransformError> {
        Ok(match input {
            Value::String(s) if s.trim().is_empty() => Value::Null,
            other => other,
        })
    }
}
