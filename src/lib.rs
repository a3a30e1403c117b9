//! Declarative HTML binding
//!
//! Typed structs describe where their fields live in a page:
//! - Scalar values from element text or attributes
//! - Nested objects and collections of objects
//! - Attribute dictionaries and existence flags
//! - Named transformation steps between extraction and conversion
//!
//! A [`Scraper`] resolves each [`Schema`] once, then binds it against any
//! number of parsed documents.

pub mod config;
pub mod convert;
pub mod document;
pub mod engine;
pub mod error;
pub mod schema;
mod strategy;
pub mod transform;

pub use config::{CollectionFailurePolicy, ScraperConfig};
pub use convert::{convert, ConversionError, FromValue};
pub use document::{Document, HtmlNode, Node, SELF_SELECTOR};
pub use engine::{Scraper, ScraperBuilder};
pub use error::{ScrapeError, SelectorError};
pub use schema::{FieldBinding, FieldBuilder, MetadataRegistry, Schema, SchemaBuilder, StrategyKind, TypeMetadata};
pub use serde_json::Value;
pub use transform::{
    Parameters, PipelineError, TextCasing, TransformError, TransformPipeline, TransformStep, Transformer,
};
