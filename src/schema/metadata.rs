//! Resolved schema metadata and its cache

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use super::{FieldBinding, Schema, SchemaBuilder};
use crate::error::ScrapeError;

/// Binding plan of one schema
pub struct TypeMetadata<T> {
    schema: &'static str,
    construct: fn() -> T,
    fields: Vec<FieldBinding<T>>,
    collection_selector: Option<&'static str>,
}

impl<T: Schema> TypeMetadata<T> {
    /// Run the schema's declaration and validate it
    pub fn build() -> Result<Self, ScrapeError> {
        let mut builder = SchemaBuilder::new();
        T::describe(&mut builder);
        let fields = builder.finish()?;

        Ok(Self {
            schema: std::any::type_name::<T>(),
            construct: T::default,
            fields,
            collection_selector: T::COLLECTION_SELECTOR.filter(|s| !s.trim().is_empty()),
        })
    }
}

impl<T> TypeMetadata<T> {
    pub fn schema_name(&self) -> &'static str {
        self.schema
    }

    /// A fresh instance with every field at its default
    pub fn construct(&self) -> T {
        (self.construct)()
    }

    /// Field bindings in declaration order
    pub fn fields(&self) -> &[FieldBinding<T>] {
        &self.fields
    }

    pub fn collection_selector(&self) -> Option<&'static str> {
        self.collection_selector
    }
}

impl<T> fmt::Debug for TypeMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("schema", &self.schema)
            .field("fields", &self.fields)
            .field("collection_selector", &self.collection_selector)
            .finish()
    }
}

/// Cache of [`TypeMetadata`] keyed by schema type.
///
/// Each schema is resolved once and shared for the registry's lifetime.
/// Concurrent first use may build the plan twice; the first stored plan
/// wins. A schema that fails validation is never stored and fails again on
/// every call.
#[derive(Default)]
pub struct MetadataRegistry {
    cache: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve<T: Schema>(&self) -> Result<Arc<TypeMetadata<T>>, ScrapeError> {
        let key = TypeId::of::<T>();

        if let Ok(cache) = self.cache.read() {
            if let Some(cached) = cache.get(&key).and_then(|m| m.downcast_ref::<Arc<TypeMetadata<T>>>()) {
                return Ok(Arc::clone(cached));
            }
        }

        let metadata = Arc::new(TypeMetadata::<T>::build()?);
        tracing::debug!(
            schema = metadata.schema_name(),
            fields = metadata.fields().len(),
            "Resolved schema metadata"
        );

        // Store in cache
        let mut cache = match self.cache.write() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        };
        let stored = cache
            .entry(key)
            .or_insert_with(|| Box::new(Arc::clone(&metadata)) as Box<dyn Any + Send + Sync>);
        Ok(stored
            .downcast_ref::<Arc<TypeMetadata<T>>>()
            .map(Arc::clone)
            .unwrap_or(metadata))
    }

    /// Whether `T` has been resolved successfully
    pub fn contains<T: Schema>(&self) -> bool {
        self.cache
            .read()
            .map(|cache| cache.contains_key(&TypeId::of::<T>()))
            .unwrap_or(false)
    }

    /// Number of cached schemas
    pub fn len(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("schemas", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StrategyKind;
    use crate::transform::StepParameters;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    struct Link {
        text: String,
        href: Option<String>,
        visible: bool,
    }

    impl Schema for Link {
        const COLLECTION_SELECTOR: Option<&'static str> = Some("a");

        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .value("text", ":scope", |l| &mut l.text)
                .normalize_whitespace()
                .transform_with("regex-replace", "pattern=x;value=y");
            schema.value("href", ":scope", |l| &mut l.href).attr("href").optional();
            schema.exists("visible", ".icon", |l| &mut l.visible);
        }
    }

    #[derive(Debug, Default)]
    struct Page {
        links: Vec<Link>,
        tags: Vec<String>,
        meta: HashMap<String, String>,
        first: Link,
    }

    impl Schema for Page {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.collection("links", |p| &mut p.links);
            schema.values("tags", ".tag", |p| &mut p.tags).trim();
            schema.attributes("meta", "meta", "name", "content", |p| &mut p.meta);
            schema.nested("first", "a", |p| &mut p.first);
        }
    }

    #[derive(Debug, Default)]
    struct Duplicated {
        a: String,
    }

    impl Schema for Duplicated {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.value("a", "p", |d| &mut d.a);
            schema.value("a", "span", |d| &mut d.a);
        }
    }

    #[derive(Debug, Default)]
    struct NoItemSelector {
        items: Vec<Duplicated>,
    }

    impl Schema for NoItemSelector {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.collection("items", |s| &mut s.items);
        }
    }

    #[derive(Debug, Default)]
    struct MisplacedRefinement {
        present: bool,
    }

    impl Schema for MisplacedRefinement {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.exists("present", "p", |s| &mut s.present).slug();
        }
    }

    #[derive(Debug, Default)]
    struct ScopedDictionary {
        meta: Vec<(String, String)>,
    }

    impl Schema for ScopedDictionary {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.attributes("meta", ":scope", "name", "", |s| &mut s.meta);
        }
    }

    #[derive(Debug, Default)]
    struct BrokenChild {
        inner: Option<Duplicated>,
    }

    impl Schema for BrokenChild {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.nested_option("inner", "div", |b| &mut b.inner);
        }
    }

    #[derive(Debug, Default)]
    struct Tree {
        label: String,
        children: Vec<Tree>,
    }

    impl Schema for Tree {
        const COLLECTION_SELECTOR: Option<&'static str> = Some(":scope > ul > li");

        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.value("label", ":scope > span", |t| &mut t.label);
            schema.collection("children", |t| &mut t.children);
        }
    }

    #[derive(Debug, Default)]
    struct BadParameters {
        title: String,
    }

    impl Schema for BadParameters {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .value("title", "h1", |b| &mut b.title)
                .transform_with("regex-match", "pattern");
        }
    }

    #[test]
    fn test_build_plan() {
        let metadata = TypeMetadata::<Page>::build().unwrap();
        let kinds: Vec<_> = metadata.fields().iter().map(|f| (f.name(), f.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                ("links", StrategyKind::Collection),
                ("tags", StrategyKind::Collection),
                ("meta", StrategyKind::AttributeDictionary),
                ("first", StrategyKind::NestedObject),
            ]
        );
        assert_eq!(metadata.fields()[0].selector(), "a");
        assert!(metadata.fields()[3].is_required());
        assert!(!metadata.fields()[0].is_required());
        assert_eq!(metadata.collection_selector(), None);
    }

    #[test]
    fn test_field_refinements() {
        let metadata = TypeMetadata::<Link>::build().unwrap();
        let text = &metadata.fields()[0];
        assert_eq!(text.target_type(), "String");
        assert_eq!(text.steps().len(), 2);
        assert_eq!(text.steps()[0].name, "normalize-whitespace");

        let href = &metadata.fields()[1];
        assert_eq!(href.attribute(), Some("href"));
        assert!(!href.is_required());
        assert_eq!(metadata.fields()[2].kind(), StrategyKind::ExistenceCheck);
        assert_eq!(metadata.collection_selector(), Some("a"));
    }

    #[test]
    fn test_configuration_errors() {
        let err = TypeMetadata::<Duplicated>::build().unwrap_err();
        assert!(matches!(err, ScrapeError::SchemaConfiguration { field: "a", .. }));

        let err = TypeMetadata::<NoItemSelector>::build().unwrap_err();
        assert!(matches!(err, ScrapeError::SchemaConfiguration { field: "items", .. }));

        let err = TypeMetadata::<MisplacedRefinement>::build().unwrap_err();
        assert!(err.to_string().contains("existence-check"));

        let err = TypeMetadata::<ScopedDictionary>::build().unwrap_err();
        assert!(err.is_configuration());

        let err = TypeMetadata::<BadParameters>::build().unwrap_err();
        assert!(matches!(err, ScrapeError::SchemaConfiguration { field: "title", .. }));
        assert!(err.to_string().contains("regex-match"));
    }

    #[test]
    fn test_raw_parameters_parsed_at_build() {
        let metadata = TypeMetadata::<Link>::build().unwrap();
        let replace = &metadata.fields()[0].steps()[1];
        assert_eq!(replace.name, "regex-replace");
        assert!(matches!(replace.parameters, StepParameters::Parsed(_)));
    }

    #[test]
    fn test_child_schemas_validated_with_parent() {
        let err = TypeMetadata::<BrokenChild>::build().unwrap_err();
        assert!(matches!(err, ScrapeError::SchemaConfiguration { field: "a", .. }));

        let registry = MetadataRegistry::new();
        assert!(registry.resolve::<BrokenChild>().is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_recursive_schema_builds() {
        let metadata = TypeMetadata::<Tree>::build().unwrap();
        assert_eq!(metadata.fields()[1].kind(), StrategyKind::Collection);
        assert_eq!(metadata.fields()[1].selector(), ":scope > ul > li");
    }

    #[test]
    fn test_registry_caches_success_only() {
        let registry = MetadataRegistry::new();
        assert!(registry.is_empty());

        let first = registry.resolve::<Link>().unwrap();
        let second = registry.resolve::<Link>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.contains::<Link>());

        assert!(registry.resolve::<Duplicated>().is_err());
        assert!(registry.resolve::<Duplicated>().is_err());
        assert!(!registry.contains::<Duplicated>());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_resolution() {
        let registry = Arc::new(MetadataRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.resolve::<Page>().unwrap())
            })
            .collect();

        let plans: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for plan in &plans {
            assert!(Arc::ptr_eq(plan, &plans[0]));
        }
        assert_eq!(registry.len(), 1);
    }
}
