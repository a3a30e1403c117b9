//! Document tree access
//!
//! The binding engine only sees the [`Node`] trait. [`Document`] and
//! [`HtmlNode`] back it with the scraper crate.

use scraper::{ElementRef, Html, Selector};

use crate::error::SelectorError;

/// Selector addressing the current node itself instead of a descendant
pub const SELF_SELECTOR: &str = ":scope";

/// One element of a parsed document
pub trait Node {
    /// Text content of the element, `None` when blank
    fn text(&self) -> Option<String>;

    fn attr(&self, name: &str) -> Option<String>;

    /// First descendant matching `selector`
    fn query_first(&self, selector: &str) -> Result<Option<Box<dyn Node + '_>>, SelectorError>;

    /// All descendants matching `selector`, in document order
    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Node + '_>>, SelectorError>;
}

/// A parsed HTML document
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    pub fn parse_fragment(html: &str) -> Self {
        Self {
            html: Html::parse_fragment(html),
        }
    }

    /// Root element of the document
    pub fn root(&self) -> HtmlNode<'_> {
        HtmlNode::new(self.html.root_element())
    }
}

/// [`Node`] over a scraper element
#[derive(Debug, Clone, Copy)]
pub struct HtmlNode<'a> {
    element: ElementRef<'a>,
}

impl<'a> HtmlNode<'a> {
    pub fn new(element: ElementRef<'a>) -> Self {
        Self { element }
    }

    pub fn element(&self) -> ElementRef<'a> {
        self.element
    }

    /// First descendant matching `selector`, borrowing the document rather than this handle
    pub fn query_first(&self, selector: &str) -> Result<Option<HtmlNode<'a>>, SelectorError> {
        let selector = parse_selector(selector)?;
        Ok(self.element.select(&selector).next().map(HtmlNode::new))
    }

    /// All descendants matching `selector`, in document order
    pub fn query_all(&self, selector: &str) -> Result<Vec<HtmlNode<'a>>, SelectorError> {
        let selector = parse_selector(selector)?;
        Ok(self.element.select(&selector).map(HtmlNode::new).collect())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError {
        selector: selector.to_string(),
        reason: format!("{:?}", e),
    })
}

impl<'a> Node for HtmlNode<'a> {
    fn text(&self) -> Option<String> {
        let text = self.element.text().collect::<String>();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.element.value().attr(name).map(String::from)
    }

    fn query_first(&self, selector: &str) -> Result<Option<Box<dyn Node + '_>>, SelectorError> {
        Ok(HtmlNode::query_first(self, selector)?.map(|node| Box::new(node) as Box<dyn Node + '_>))
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Node + '_>>, SelectorError> {
        Ok(HtmlNode::query_all(self, selector)?
            .into_iter()
            .map(|node| Box::new(node) as Box<dyn Node + '_>)
            .collect())
    }
}
