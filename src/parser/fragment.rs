use scraper::ElementRef;

/// Structural lookups the extractor needs from a listing's markup.
///
/// Lookups search descendants only, never the node itself, and return the
/// first match in document order.
pub trait MarkupNode: Sized {
    /// First descendant `<tag>`, optionally required to carry `class`.
    fn find(&self, tag: &str, class: Option<&str>) -> Option<Self>;
    /// First descendant `<tag>` whose `attr` equals `value` exactly.
    fn find_by_attr(&self, tag: &str, attr: &str, value: &str) -> Option<Self>;
    fn find_all(&self, tag: &str) -> Vec<Self>;
    fn attr(&self, name: &str) -> Option<&str>;
    /// All text under the node, concatenated as-is.
    fn text(&self) -> String;
}

/// `scraper` element behind the [`MarkupNode`] interface.
#[derive(Debug, Clone, Copy)]
pub struct ElementNode<'a>(pub ElementRef<'a>);

impl<'a> ElementNode<'a> {
    fn descendants(&self) -> impl Iterator<Item = ElementRef<'a>> {
        self.0.descendants().skip(1).filter_map(ElementRef::wrap)
    }
}

impl<'a> MarkupNode for ElementNode<'a> {
    fn find(&self, tag: &str, class: Option<&str>) -> Option<Self> {
        self.descendants()
            .find(|el| {
                el.value().name() == tag
                    && class.map_or(true, |c| el.value().classes().any(|have| have == c))
            })
            .map(ElementNode)
    }

    fn find_by_attr(&self, tag: &str, attr: &str, value: &str) -> Option<Self> {
        self.descendants()
            .find(|el| el.value().name() == tag && el.value().attr(attr) == Some(value))
            .map(ElementNode)
    }

    fn find_all(&self, tag: &str) -> Vec<Self> {
        self.descendants()
            .filter(|el| el.value().name() == tag)
            .map(ElementNode)
            .collect()
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.0.value().attr(name)
    }

    fn text(&self) -> String {
        self.0.text().collect()
    }
}
