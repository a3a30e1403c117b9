//! Error types for schema resolution and extraction

use thiserror::Error;

use crate::convert::ConversionError;
use crate::transform::TransformError;

/// A selector string the document backend could not compile
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector `{selector}`: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// Failure while binding a schema against a document.
///
/// Every variant names the schema and, where one applies, the field, so a
/// markup mismatch can be diagnosed from the error alone.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A field declaration is structurally invalid. Raised while resolving
    /// metadata, before any document is touched.
    #[error("invalid schema `{schema}`, field `{field}`: {reason}")]
    SchemaConfiguration {
        schema: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("schema `{schema}` has no collection selector and cannot be scraped as a sequence")]
    MissingCollectionSelector { schema: &'static str },

    #[error("required element `{selector}` not found for `{schema}.{field}`")]
    ElementNotFound {
        schema: &'static str,
        field: &'static str,
        selector: String,
    },

    #[error("invalid selector `{selector}` on `{schema}.{field}`: {reason}")]
    InvalidSelector {
        schema: &'static str,
        field: &'static str,
        selector: String,
        reason: String,
    },

    #[error("transformer `{transformer}` failed on `{schema}.{field}`")]
    Transformation {
        schema: &'static str,
        field: &'static str,
        transformer: String,
        #[source]
        source: TransformError,
    },

    #[error("cannot convert value for `{schema}.{field}`: {source}")]
    Conversion {
        schema: &'static str,
        field: &'static str,
        #[source]
        source: ConversionError,
    },
}

impl ScrapeError {
    /// Whether the error comes from the schema declaration rather than the document
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ScrapeError::SchemaConfiguration { .. }
                | ScrapeError::MissingCollectionSelector { .. }
                | ScrapeError::InvalidSelector { .. }
        )
    }

    /// Field the error is attributed to, if any
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ScrapeError::SchemaConfiguration { field, .. }
            | ScrapeError::ElementNotFound { field, .. }
            | ScrapeError::InvalidSelector { field, .. }
            | ScrapeError::Transformation { field, .. }
            | ScrapeError::Conversion { field, .. } => Some(field),
            ScrapeError::MissingCollectionSelector { .. } => None,
        }
    }

    pub(crate) fn selector(
        schema: &'static str,
        field: &'static str,
        error: SelectorError,
    ) -> Self {
        ScrapeError::InvalidSelector {
            schema,
            field,
            selector: error.selector,
            reason: error.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_not_found_message() {
        let err = ScrapeError::ElementNotFound {
            schema: "Person",
            field: "name",
            selector: "span.n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "required element `span.n` not found for `Person.name`"
        );
        assert_eq!(err.field(), Some("name"));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_configuration_kinds() {
        let err = ScrapeError::MissingCollectionSelector { schema: "Row" };
        assert!(err.is_configuration());
        assert_eq!(err.field(), None);
    }
}
