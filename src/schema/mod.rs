//! Schema declaration
//!
//! A [`Schema`] lists its fields once through a [`SchemaBuilder`]. Each
//! builder call picks the extraction strategy for one field and ties it to a
//! plain accessor function, so field types are checked by the compiler. The
//! resulting [`FieldBinding`]s are validated and cached by the
//! [`MetadataRegistry`].

mod metadata;

pub use metadata::*;

use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use crate::config::CollectionFailurePolicy;
use crate::convert::{convert, ConversionError, FromValue};
use crate::document::{Node, SELF_SELECTOR};
use crate::engine::Scraper;
use crate::error::ScrapeError;
use crate::strategy::collect_values;
use crate::transform::{
    Parameters, StepParameters, TextCasing, TransformStep, BASE_PARAMETER, CASING_PARAMETER, GROUP_PARAMETER,
    PATTERN_PARAMETER, VALUE_PARAMETER,
};

/// A type that can be bound from a document
///
/// ```
/// use html_binder::{Schema, SchemaBuilder, Scraper};
///
/// #[derive(Debug, Default)]
/// struct Person {
///     name: String,
/// }
///
/// impl Schema for Person {
///     fn describe(schema: &mut SchemaBuilder<Self>) {
///         schema.value("name", "span.n", |p| &mut p.name);
///     }
/// }
///
/// let person: Person = Scraper::new()
///     .scrape_html(r#"<div><span class="n">John Doe</span></div>"#)
///     .unwrap();
/// assert_eq!(person.name, "John Doe");
/// ```
pub trait Schema: Default + 'static {
    /// Selector for the nodes holding one instance each, used when the type
    /// is scraped as a sequence
    const COLLECTION_SELECTOR: Option<&'static str> = None;

    fn describe(schema: &mut SchemaBuilder<Self>);
}

/// Extraction strategy of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    NestedObject,
    Collection,
    AttributeDictionary,
    ExistenceCheck,
    Scalar,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::NestedObject => write!(f, "nested-object"),
            StrategyKind::Collection => write!(f, "collection"),
            StrategyKind::AttributeDictionary => write!(f, "attribute-dictionary"),
            StrategyKind::ExistenceCheck => write!(f, "existence-check"),
            StrategyKind::Scalar => write!(f, "scalar"),
        }
    }
}

pub(crate) type AssignValue<T> =
    Box<dyn Fn(&mut T, Value) -> Result<(), ConversionError> + Send + Sync>;
pub(crate) type AssignValues<T> =
    Box<dyn Fn(&mut T, Vec<Value>, CollectionFailurePolicy) -> Result<(), ConversionError> + Send + Sync>;
pub(crate) type AssignPairs<T> = Box<dyn Fn(&mut T, Vec<(String, String)>) + Send + Sync>;
pub(crate) type BindNode<T> =
    Box<dyn Fn(&Scraper, &mut T, &dyn Node) -> Result<(), ScrapeError> + Send + Sync>;
pub(crate) type BindNodes<T> =
    Box<dyn Fn(&Scraper, &mut T, &[&dyn Node]) -> Result<(), ScrapeError> + Send + Sync>;

/// Validates a child schema; the set holds schemas already being checked
type ValidateChild = fn(&mut HashSet<TypeId>) -> Result<(), ScrapeError>;

fn validate_child<N: Schema>(visiting: &mut HashSet<TypeId>) -> Result<(), ScrapeError> {
    if !visiting.insert(TypeId::of::<N>()) {
        return Ok(());
    }
    let mut builder = SchemaBuilder::<N>::new();
    N::describe(&mut builder);
    builder.finish_within(visiting).map(|_| ())
}

pub(crate) enum ItemSource<T> {
    /// Items are schemas bound from each node
    Schema(BindNodes<T>),
    /// Items are values read from each node
    Values(AssignValues<T>),
}

pub(crate) enum Strategy<T> {
    Nested(BindNode<T>),
    Collection(ItemSource<T>),
    Dictionary {
        key: String,
        value: String,
        assign: AssignPairs<T>,
    },
    Exists(fn(&mut T) -> &mut bool),
    Scalar(AssignValue<T>),
}

/// Resolved extraction plan for one field
pub struct FieldBinding<T> {
    name: &'static str,
    kind: StrategyKind,
    selector: String,
    attribute: Option<String>,
    required: bool,
    steps: Vec<TransformStep>,
    target: &'static str,
    pub(crate) strategy: Strategy<T>,
}

impl<T> FieldBinding<T> {
    fn new(name: &'static str, selector: &str, target: &'static str, strategy: Strategy<T>) -> Self {
        let kind = match &strategy {
            Strategy::Nested(_) => StrategyKind::NestedObject,
            Strategy::Collection(_) => StrategyKind::Collection,
            Strategy::Dictionary { .. } => StrategyKind::AttributeDictionary,
            Strategy::Exists(_) => StrategyKind::ExistenceCheck,
            Strategy::Scalar(_) => StrategyKind::Scalar,
        };
        Self {
            name,
            kind,
            selector: selector.to_string(),
            attribute: None,
            required: matches!(kind, StrategyKind::Scalar | StrategyKind::NestedObject),
            steps: Vec::new(),
            target,
            strategy,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Attribute the raw value is read from instead of the node text
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Transformation steps, sorted by order
    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    /// Declared type of the field, or of its items for collections
    pub fn target_type(&self) -> &'static str {
        self.target
    }

    /// Whether the field reads raw values through the pipeline
    fn extracts_values(&self) -> bool {
        matches!(
            self.strategy,
            Strategy::Scalar(_) | Strategy::Collection(ItemSource::Values(_))
        )
    }
}

impl<T> fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("selector", &self.selector)
            .field("attribute", &self.attribute)
            .field("required", &self.required)
            .field("steps", &self.steps)
            .field("target", &self.target)
            .finish()
    }
}

/// Collects the field declarations of one schema
pub struct SchemaBuilder<T> {
    schema: &'static str,
    fields: Vec<FieldBinding<T>>,
    problems: Vec<(&'static str, String)>,
    children: Vec<ValidateChild>,
}

impl<T: Schema> SchemaBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            schema: std::any::type_name::<T>(),
            fields: Vec::new(),
            problems: Vec::new(),
            children: Vec::new(),
        }
    }

    fn push(&mut self, binding: FieldBinding<T>) -> FieldBuilder<'_, T> {
        self.fields.push(binding);
        let index = self.fields.len() - 1;
        FieldBuilder {
            builder: self,
            index,
        }
    }

    /// Field read from the text (or an attribute) of the first node matching
    /// `selector`. Required unless marked optional.
    pub fn value<F: FromValue + 'static>(
        &mut self,
        name: &'static str,
        selector: &str,
        accessor: fn(&mut T) -> &mut F,
    ) -> FieldBuilder<'_, T> {
        let assign: AssignValue<T> = Box::new(move |target: &mut T, value: Value| {
            *accessor(target) = convert::<F>(value)?;
            Ok(())
        });
        self.push(FieldBinding::new(name, selector, F::type_name(), Strategy::Scalar(assign)))
    }

    /// Field bound as a nested schema from the first node matching `selector`
    pub fn nested<N: Schema>(
        &mut self,
        name: &'static str,
        selector: &str,
        accessor: fn(&mut T) -> &mut N,
    ) -> FieldBuilder<'_, T> {
        let bind: BindNode<T> = Box::new(move |scraper: &Scraper, target: &mut T, node: &dyn Node| {
            *accessor(target) = scraper.scrape_one::<N>(node)?;
            Ok(())
        });
        self.children.push(validate_child::<N>);
        self.push(FieldBinding::new(
            name,
            selector,
            std::any::type_name::<N>(),
            Strategy::Nested(bind),
        ))
    }

    /// Like [`SchemaBuilder::nested`] for an `Option` field, set to `Some` when
    /// the node exists. Optional unless marked required.
    pub fn nested_option<N: Schema>(
        &mut self,
        name: &'static str,
        selector: &str,
        accessor: fn(&mut T) -> &mut Option<N>,
    ) -> FieldBuilder<'_, T> {
        let bind: BindNode<T> = Box::new(move |scraper: &Scraper, target: &mut T, node: &dyn Node| {
            *accessor(target) = Some(scraper.scrape_one::<N>(node)?);
            Ok(())
        });
        self.children.push(validate_child::<N>);
        let mut binding = FieldBinding::new(name, selector, std::any::type_name::<N>(), Strategy::Nested(bind));
        binding.required = false;
        self.push(binding)
    }

    /// Sequence of nested schemas, one per node matching the item schema's
    /// collection selector (or the field's own, see [`FieldBuilder::selector`])
    pub fn collection<C>(&mut self, name: &'static str, accessor: fn(&mut T) -> &mut C) -> FieldBuilder<'_, T>
    where
        C: IntoIterator + FromIterator<<C as IntoIterator>::Item> + 'static,
        C::Item: Schema,
    {
        let bind: BindNodes<T> = Box::new(move |scraper: &Scraper, target: &mut T, nodes: &[&dyn Node]| {
            let items = scraper.scrape_items::<C::Item>(nodes)?;
            *accessor(target) = items.into_iter().collect();
            Ok(())
        });
        self.children.push(validate_child::<C::Item>);
        self.push(FieldBinding::new(
            name,
            <C::Item as Schema>::COLLECTION_SELECTOR.unwrap_or_default(),
            std::any::type_name::<C::Item>(),
            Strategy::Collection(ItemSource::Schema(bind)),
        ))
    }

    /// Sequence of values, one per node matching `selector`
    pub fn values<C>(
        &mut self,
        name: &'static str,
        selector: &str,
        accessor: fn(&mut T) -> &mut C,
    ) -> FieldBuilder<'_, T>
    where
        C: IntoIterator + FromIterator<<C as IntoIterator>::Item> + 'static,
        C::Item: FromValue,
    {
        let assign: AssignValues<T> = Box::new(
            move |target: &mut T, values: Vec<Value>, policy: CollectionFailurePolicy| {
                *accessor(target) = collect_values::<C::Item, C>(values, policy)?;
                Ok(())
            },
        );
        self.push(FieldBinding::new(
            name,
            selector,
            <C::Item as FromValue>::type_name(),
            Strategy::Collection(ItemSource::Values(assign)),
        ))
    }

    /// Map built from two attributes of every node matching `selector`
    pub fn attributes<M>(
        &mut self,
        name: &'static str,
        selector: &str,
        key_attribute: &str,
        value_attribute: &str,
        accessor: fn(&mut T) -> &mut M,
    ) -> FieldBuilder<'_, T>
    where
        M: Default + Extend<(String, String)> + 'static,
    {
        let assign: AssignPairs<T> = Box::new(move |target: &mut T, pairs: Vec<(String, String)>| {
            let slot = accessor(target);
            *slot = M::default();
            slot.extend(pairs);
        });
        self.push(FieldBinding::new(
            name,
            selector,
            std::any::type_name::<M>(),
            Strategy::Dictionary {
                key: key_attribute.to_string(),
                value: value_attribute.to_string(),
                assign,
            },
        ))
    }

    /// `true` when a node matches `selector`
    pub fn exists(
        &mut self,
        name: &'static str,
        selector: &str,
        accessor: fn(&mut T) -> &mut bool,
    ) -> FieldBuilder<'_, T> {
        self.push(FieldBinding::new(name, selector, "bool", Strategy::Exists(accessor)))
    }

    /// Validate the declarations, then every nested and item schema
    pub(crate) fn finish(self) -> Result<Vec<FieldBinding<T>>, ScrapeError> {
        let mut visiting = HashSet::from([TypeId::of::<T>()]);
        self.finish_within(&mut visiting)
    }

    fn finish_within(mut self, visiting: &mut HashSet<TypeId>) -> Result<Vec<FieldBinding<T>>, ScrapeError> {
        let children = std::mem::take(&mut self.children);
        let fields = self.validate()?;
        for child in children {
            child(visiting)?;
        }
        Ok(fields)
    }

    fn validate(self) -> Result<Vec<FieldBinding<T>>, ScrapeError> {
        let schema = self.schema;
        let invalid = |field: &'static str, reason: String| ScrapeError::SchemaConfiguration {
            schema,
            field,
            reason,
        };

        if let Some((field, reason)) = self.problems.into_iter().next() {
            return Err(invalid(field, reason));
        }

        let mut fields = self.fields;
        let mut seen = HashSet::new();
        for field in &mut fields {
            if field.name.trim().is_empty() {
                return Err(invalid(field.name, "field identifier is empty".to_string()));
            }
            if !seen.insert(field.name) {
                return Err(invalid(field.name, "field is declared more than once".to_string()));
            }
            if field.selector.trim().is_empty() {
                let reason = match field.kind {
                    StrategyKind::Collection => {
                        "no selector: declare one on the field or a collection selector on the item schema"
                    }
                    _ => "selector is empty",
                };
                return Err(invalid(field.name, reason.to_string()));
            }
            if field.selector.trim() == SELF_SELECTOR
                && matches!(field.kind, StrategyKind::Collection | StrategyKind::AttributeDictionary)
            {
                return Err(invalid(
                    field.name,
                    format!("`{}` selects a single node and cannot feed a {} field", SELF_SELECTOR, field.kind),
                ));
            }
            if let Strategy::Dictionary { key, value, .. } = &field.strategy {
                if key.trim().is_empty() || value.trim().is_empty() {
                    return Err(invalid(
                        field.name,
                        "key and value attribute names must not be empty".to_string(),
                    ));
                }
            }
            for step in &mut field.steps {
                if let StepParameters::Raw(raw) = &step.parameters {
                    let parsed = Parameters::parse(raw).map_err(|e| {
                        invalid(field.name, format!("transformation `{}`: {}", step.name, e))
                    })?;
                    step.parameters = StepParameters::Parsed(parsed);
                }
            }
            field.steps.sort_by_key(|step| step.order);
        }

        Ok(fields)
    }
}

/// Refines the field declared last
pub struct FieldBuilder<'a, T> {
    builder: &'a mut SchemaBuilder<T>,
    index: usize,
}

impl<'a, T> FieldBuilder<'a, T> {
    fn field(&mut self) -> &mut FieldBinding<T> {
        &mut self.builder.fields[self.index]
    }

    fn reject(&mut self, reason: String) {
        let name = self.field().name;
        self.builder.problems.push((name, reason));
    }

    /// Replace the selector given at declaration
    pub fn selector(mut self, selector: &str) -> Self {
        self.field().selector = selector.to_string();
        self
    }

    /// Read the raw value from this attribute instead of the node text
    pub fn attr(mut self, attribute: &str) -> Self {
        if self.field().extracts_values() {
            self.field().attribute = Some(attribute.to_string());
        } else {
            let kind = self.field().kind;
            self.reject(format!("a source attribute does not apply to {} fields", kind));
        }
        self
    }

    pub fn optional(self) -> Self {
        self.required(false)
    }

    pub fn required(mut self, required: bool) -> Self {
        let kind = self.field().kind;
        if matches!(kind, StrategyKind::Scalar | StrategyKind::NestedObject) {
            self.field().required = required;
        } else {
            self.reject(format!("required-ness does not apply to {} fields", kind));
        }
        self
    }

    /// Append a transformation step
    pub fn step(mut self, step: TransformStep) -> Self {
        if self.field().extracts_values() {
            self.field().steps.push(step);
        } else {
            let kind = self.field().kind;
            self.reject(format!(
                "transformation `{}` does not apply to {} fields",
                step.name, kind
            ));
        }
        self
    }

    pub fn transform(self, name: &str) -> Self {
        self.step(TransformStep::new(name))
    }

    /// Append a step with `key=value;key=value` parameters
    pub fn transform_with(self, name: &str, parameters: &str) -> Self {
        self.step(TransformStep::with_raw(name, parameters))
    }

    pub fn trim(self) -> Self {
        self.transform("trim")
    }

    pub fn normalize_whitespace(self) -> Self {
        self.transform("normalize-whitespace")
    }

    pub fn null_if_empty(self) -> Self {
        self.transform("null-if-empty")
    }

    /// Keep the first capture group of `pattern`, or the whole match
    pub fn regex(self, pattern: &str) -> Self {
        self.step(TransformStep::with_parameters(
            "regex-match",
            Parameters::new().with(PATTERN_PARAMETER, pattern),
        ))
    }

    /// Keep the capture group named or numbered `group`
    pub fn regex_group(self, pattern: &str, group: &str) -> Self {
        self.step(TransformStep::with_parameters(
            "regex-match",
            Parameters::new()
                .with(PATTERN_PARAMETER, pattern)
                .with(GROUP_PARAMETER, group),
        ))
    }

    pub fn regex_replace(self, pattern: &str, value: &str) -> Self {
        self.step(TransformStep::with_parameters(
            "regex-replace",
            Parameters::new()
                .with(PATTERN_PARAMETER, pattern)
                .with(VALUE_PARAMETER, value),
        ))
    }

    pub fn slug(self) -> Self {
        self.transform("slug")
    }

    pub fn title_case(self) -> Self {
        self.transform("title-case")
    }

    pub fn casing(self, casing: TextCasing) -> Self {
        self.step(TransformStep::with_parameters(
            "text-casing",
            Parameters::new().with(CASING_PARAMETER, casing.as_str()),
        ))
    }

    pub fn absolute_url(self) -> Self {
        self.transform("absolute-url")
    }

    pub fn absolute_url_from(self, base: &str) -> Self {
        self.step(TransformStep::with_parameters(
            "absolute-url",
            Parameters::new().with(BASE_PARAMETER, base),
        ))
    }
}
