//! Field extraction strategies
//!
//! One function per strategy kind. Each reads from the parent node and
//! writes the field of the instance being bound.

use serde_json::Value;

use crate::config::CollectionFailurePolicy;
use crate::convert::{convert, ConversionError, FromValue};
use crate::document::{Node, SELF_SELECTOR};
use crate::engine::Scraper;
use crate::error::ScrapeError;
use crate::schema::{AssignPairs, AssignValue, BindNode, FieldBinding, ItemSource, Strategy};

/// Node picked by a single-node selector
enum Selected<'n> {
    Scope(&'n dyn Node),
    Descendant(Box<dyn Node + 'n>),
}

impl<'n> Selected<'n> {
    fn node(&self) -> &dyn Node {
        match self {
            Selected::Scope(node) => *node,
            Selected::Descendant(node) => &**node,
        }
    }
}

/// Field currently being extracted, for error attribution
struct FieldContext<'b, T> {
    schema: &'static str,
    binding: &'b FieldBinding<T>,
}

impl<'b, T> FieldContext<'b, T> {
    fn field(&self) -> &'static str {
        self.binding.name()
    }

    fn select_first<'n>(&self, parent: &'n dyn Node) -> Result<Option<Selected<'n>>, ScrapeError> {
        let selector = self.binding.selector().trim();
        if selector == SELF_SELECTOR {
            return Ok(Some(Selected::Scope(parent)));
        }
        parent
            .query_first(selector)
            .map(|found| found.map(Selected::Descendant))
            .map_err(|e| ScrapeError::selector(self.schema, self.field(), e))
    }

    fn select_all<'n>(&self, parent: &'n dyn Node) -> Result<Vec<Box<dyn Node + 'n>>, ScrapeError> {
        parent
            .query_all(self.binding.selector())
            .map_err(|e| ScrapeError::selector(self.schema, self.field(), e))
    }

    fn not_found(&self) -> ScrapeError {
        ScrapeError::ElementNotFound {
            schema: self.schema,
            field: self.field(),
            selector: self.binding.selector().to_string(),
        }
    }

    fn conversion(&self, source: ConversionError) -> ScrapeError {
        ScrapeError::Conversion {
            schema: self.schema,
            field: self.field(),
            source,
        }
    }

    /// Raw text or attribute value, run through the field's steps
    fn extract_value(&self, scraper: &Scraper, node: &dyn Node) -> Result<Value, ScrapeError> {
        let raw = match self.binding.attribute() {
            Some(attribute) => node.attr(attribute),
            None => node.text(),
        }
        .map_or(Value::Null, Value::String);

        scraper
            .pipeline()
            .apply(raw, self.binding.steps())
            .map_err(|e| ScrapeError::Transformation {
                schema: self.schema,
                field: self.field(),
                transformer: e.transformer,
                source: e.source,
            })
    }
}

/// Populate one field of `target` from `parent`
pub(crate) fn execute<T>(
    scraper: &Scraper,
    schema: &'static str,
    target: &mut T,
    binding: &FieldBinding<T>,
    parent: &dyn Node,
) -> Result<(), ScrapeError> {
    let ctx = FieldContext { schema, binding };

    match &binding.strategy {
        Strategy::Nested(bind) => nested(scraper, &ctx, target, bind, parent),
        Strategy::Collection(source) => collection(scraper, &ctx, target, source, parent),
        Strategy::Dictionary { key, value, assign } => dictionary(&ctx, target, key, value, assign, parent),
        Strategy::Exists(accessor) => {
            *accessor(target) = ctx.select_first(parent)?.is_some();
            Ok(())
        }
        Strategy::Scalar(assign) => scalar(scraper, &ctx, target, assign, parent),
    }
}

fn scalar<T>(
    scraper: &Scraper,
    ctx: &FieldContext<'_, T>,
    target: &mut T,
    assign: &AssignValue<T>,
    parent: &dyn Node,
) -> Result<(), ScrapeError> {
    let Some(selected) = ctx.select_first(parent)? else {
        if ctx.binding.is_required() {
            return Err(ctx.not_found());
        }
        tracing::trace!(field = ctx.field(), "Optional element missing, keeping default");
        return Ok(());
    };

    let value = ctx.extract_value(scraper, selected.node())?;
    if value.is_null() && !ctx.binding.is_required() {
        tracing::trace!(field = ctx.field(), "Null value, keeping default");
        return Ok(());
    }

    assign(target, value).map_err(|e| ctx.conversion(e))
}

fn nested<T>(
    scraper: &Scraper,
    ctx: &FieldContext<'_, T>,
    target: &mut T,
    bind: &BindNode<T>,
    parent: &dyn Node,
) -> Result<(), ScrapeError> {
    match ctx.select_first(parent)? {
        Some(selected) => bind(scraper, target, selected.node()),
        None if ctx.binding.is_required() => Err(ctx.not_found()),
        None => {
            tracing::trace!(field = ctx.field(), "Optional nested element missing, keeping default");
            Ok(())
        }
    }
}

fn collection<T>(
    scraper: &Scraper,
    ctx: &FieldContext<'_, T>,
    target: &mut T,
    source: &ItemSource<T>,
    parent: &dyn Node,
) -> Result<(), ScrapeError> {
    let nodes = ctx.select_all(parent)?;
    if nodes.is_empty() {
        tracing::trace!(field = ctx.field(), "No item nodes, leaving collection empty");
        return Ok(());
    }

    match source {
        ItemSource::Schema(bind) => {
            let items: Vec<&dyn Node> = nodes.iter().map(|node| &**node as &dyn Node).collect();
            bind(scraper, target, &items)
        }
        ItemSource::Values(assign) => {
            let policy = scraper.config().collection_failure;
            let mut values = Vec::with_capacity(nodes.len());
            for (index, node) in nodes.iter().enumerate() {
                match ctx.extract_value(scraper, &**node) {
                    Ok(Value::Null) => {}
                    Ok(value) => values.push(value),
                    Err(err) if policy == CollectionFailurePolicy::SkipItem => {
                        tracing::warn!(field = ctx.field(), index, error = %err, "Skipping collection item");
                    }
                    Err(err) => return Err(err),
                }
            }
            assign(target, values, policy).map_err(|e| ctx.conversion(e))
        }
    }
}

fn dictionary<T>(
    ctx: &FieldContext<'_, T>,
    target: &mut T,
    key_attribute: &str,
    value_attribute: &str,
    assign: &AssignPairs<T>,
    parent: &dyn Node,
) -> Result<(), ScrapeError> {
    let nodes = ctx.select_all(parent)?;
    if nodes.is_empty() {
        return Ok(());
    }

    let mut pairs = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let Some(key) = node.attr(key_attribute).filter(|k| !k.trim().is_empty()) else {
            tracing::debug!(
                field = ctx.field(),
                attribute = key_attribute,
                "Node has no key attribute, skipping"
            );
            continue;
        };
        pairs.push((key, node.attr(value_attribute).unwrap_or_default()));
    }

    assign(target, pairs);
    Ok(())
}

/// Convert item values, applying the collection failure policy
pub(crate) fn collect_values<I, C>(values: Vec<Value>, policy: CollectionFailurePolicy) -> Result<C, ConversionError>
where
    I: FromValue,
    C: FromIterator<I>,
{
    let mut items = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match convert::<I>(value) {
            Ok(item) => items.push(item),
            Err(err) if policy == CollectionFailurePolicy::SkipItem => {
                tracing::warn!(index, error = %err, "Skipping collection item");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(items.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collect_values_fail_fast() {
        let values = vec![json!("1"), json!("x"), json!("3")];
        let err = collect_values::<i32, Vec<i32>>(values, CollectionFailurePolicy::FailFast).unwrap_err();
        assert_eq!(err.raw, "x");
        assert_eq!(err.target, "i32");
    }

    #[test]
    fn test_collect_values_skip_item() {
        let values = vec![json!("1"), json!("x"), json!(3)];
        let items: Vec<i32> = collect_values(values, CollectionFailurePolicy::SkipItem).unwrap();
        assert_eq!(items, vec![1, 3]);
    }

    #[test]
    fn test_collect_values_into_set() {
        let values = vec![json!("b"), json!("a"), json!("b")];
        let items: std::collections::BTreeSet<String> =
            collect_values(values, CollectionFailurePolicy::FailFast).unwrap();
        assert_eq!(items.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
