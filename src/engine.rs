//! Binding engine
//!
//! [`Scraper`] ties the metadata registry, the transformation pipeline and
//! the configuration together. Binding an object resolves its schema once,
//! constructs a default instance and runs every field's strategy against the
//! given node.

use std::sync::Arc;

use url::Url;

use crate::config::{CollectionFailurePolicy, ScraperConfig};
use crate::document::{Document, Node};
use crate::error::ScrapeError;
use crate::schema::{MetadataRegistry, Schema, TypeMetadata};
use crate::strategy;
use crate::transform::{TransformPipeline, Transformer};

/// Field name reported for errors in a schema's collection selector
const COLLECTION_SELECTOR_FIELD: &str = "<collection>";

/// Binds [`Schema`] types from document nodes.
///
/// A `Scraper` is `Send + Sync` and can be shared across threads; the only
/// shared state is the metadata cache.
#[derive(Debug)]
pub struct Scraper {
    registry: Arc<MetadataRegistry>,
    pipeline: TransformPipeline,
    config: ScraperConfig,
}

impl Default for Scraper {
    fn default() -> Self {
        Self::new()
    }
}

impl Scraper {
    /// A scraper with the default configuration and a fresh registry
    pub fn new() -> Self {
        ScraperBuilder::new().build()
    }

    pub fn with_config(config: ScraperConfig) -> Self {
        ScraperBuilder::new().config(config).build()
    }

    pub fn builder() -> ScraperBuilder {
        ScraperBuilder::new()
    }

    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Bind one `T` from `root`
    pub fn scrape_one<T: Schema>(&self, root: &dyn Node) -> Result<T, ScrapeError> {
        let metadata = self.registry.resolve::<T>()?;
        self.bind(&metadata, root)
    }

    /// Bind one `T` per node matching `T::COLLECTION_SELECTOR` under `root`,
    /// in document order
    pub fn scrape_many<T: Schema>(&self, root: &dyn Node) -> Result<Vec<T>, ScrapeError> {
        let metadata = self.registry.resolve::<T>()?;
        let schema = metadata.schema_name();
        let selector = metadata
            .collection_selector()
            .ok_or(ScrapeError::MissingCollectionSelector { schema })?;

        let nodes = root
            .query_all(selector)
            .map_err(|e| ScrapeError::selector(schema, COLLECTION_SELECTOR_FIELD, e))?;
        let items: Vec<&dyn Node> = nodes.iter().map(|node| &**node as &dyn Node).collect();
        self.bind_items(&metadata, &items)
    }

    /// Parse `html` as a document and bind one `T` from its root
    pub fn scrape_html<T: Schema>(&self, html: &str) -> Result<T, ScrapeError> {
        let document = Document::parse(html);
        self.scrape_one(&document.root())
    }

    /// Parse `html` as a document and bind every `T` in it
    pub fn scrape_many_html<T: Schema>(&self, html: &str) -> Result<Vec<T>, ScrapeError> {
        let document = Document::parse(html);
        self.scrape_many(&document.root())
    }

    /// Bind one `T` per node, for schema collections
    pub(crate) fn scrape_items<T: Schema>(&self, nodes: &[&dyn Node]) -> Result<Vec<T>, ScrapeError> {
        let metadata = self.registry.resolve::<T>()?;
        self.bind_items(&metadata, nodes)
    }

    fn bind<T>(&self, metadata: &TypeMetadata<T>, node: &dyn Node) -> Result<T, ScrapeError> {
        let schema = metadata.schema_name();
        let mut instance = metadata.construct();
        for binding in metadata.fields() {
            strategy::execute(self, schema, &mut instance, binding, node)?;
        }
        tracing::debug!(schema, fields = metadata.fields().len(), "Bound object");
        Ok(instance)
    }

    fn bind_items<T>(&self, metadata: &TypeMetadata<T>, nodes: &[&dyn Node]) -> Result<Vec<T>, ScrapeError> {
        let policy = self.config.collection_failure;
        let mut items = Vec::with_capacity(nodes.len());

        for (index, node) in nodes.iter().enumerate() {
            match self.bind(metadata, *node) {
                Ok(item) => items.push(item),
                Err(err) if policy == CollectionFailurePolicy::SkipItem && !err.is_configuration() => {
                    tracing::warn!(
                        schema = metadata.schema_name(),
                        index,
                        error = %err,
                        "Skipping collection item"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok(items)
    }
}

/// Builder for [`Scraper`]
#[derive(Default)]
pub struct ScraperBuilder {
    config: ScraperConfig,
    registry: Option<Arc<MetadataRegistry>>,
    transformers: Vec<Arc<dyn Transformer>>,
}

impl ScraperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ScraperConfig) -> Self {
        self.config = config;
        self
    }

    /// Base URL for the `absolute-url` transformer
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.config.base_url = Some(base_url);
        self
    }

    pub fn collection_failure(mut self, policy: CollectionFailurePolicy) -> Self {
        self.config.collection_failure = policy;
        self
    }

    pub fn slug_max_length(mut self, max_length: usize) -> Self {
        self.config.slug_max_length = max_length;
        self
    }

    /// Register a transformer, replacing any built-in with the same name
    pub fn transformer<T: Transformer + 'static>(mut self, transformer: T) -> Self {
        self.transformers.push(Arc::new(transformer));
        self
    }

    /// Share a metadata registry with other scrapers
    pub fn registry(mut self, registry: Arc<MetadataRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Scraper {
        let mut pipeline = TransformPipeline::with_builtins(&self.config);
        for transformer in self.transformers {
            pipeline.register_shared(transformer);
        }

        Scraper {
            registry: self.registry.unwrap_or_default(),
            pipeline,
            config: self.config,
        }
    }
}
