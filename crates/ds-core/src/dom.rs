//! DOM abstraction
//!
//! The engine never touches browser types directly: all DOM access goes
//! through the [`Dom`] trait with opaque [`NodeId`] handles. Queries take a
//! structured [`Selector`] rather than raw CSS, so the bindings crate can
//! lower them to `querySelectorAll` strings while the test fixture matches
//! them structurally.

/// Opaque handle to a DOM node. Handles are only valid for the lifetime of
/// the DOM they came from; item records holding one are rebuilt every pass.
pub type NodeId = usize;

/// Marker attribute set on item leaves that have been hidden. Doubles as the
/// already-processed marker: extraction skips any container carrying it.
pub const HIDDEN_ATTR: &str = "data-dirsweep-hidden";

// =============================================================================
// Selectors
// =============================================================================

/// A structural selector: optional tag, class and attribute constraints,
/// all of which must hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selector {
    pub tag: Option<&'static str>,
    pub class: Option<&'static str>,
    /// Attribute presence, or presence with an exact value.
    pub attr: Option<(&'static str, Option<&'static str>)>,
}

impl Selector {
    pub const fn tag(name: &'static str) -> Self {
        Selector {
            tag: Some(name),
            class: None,
            attr: None,
        }
    }

    pub const fn class(name: &'static str) -> Self {
        Selector {
            tag: None,
            class: Some(name),
            attr: None,
        }
    }

    pub const fn attr(name: &'static str) -> Self {
        Selector {
            tag: None,
            class: None,
            attr: Some((name, None)),
        }
    }

    pub const fn attr_value(name: &'static str, value: &'static str) -> Self {
        Selector {
            tag: None,
            class: None,
            attr: Some((name, Some(value))),
        }
    }

    pub const fn with_class(mut self, name: &'static str) -> Self {
        self.class = Some(name);
        self
    }

    /// Lower to a CSS selector string for `querySelectorAll`.
    pub fn to_css(&self) -> String {
        let mut css = String::new();
        if let Some(tag) = self.tag {
            css.push_str(tag);
        }
        if let Some(class) = self.class {
            css.push('.');
            css.push_str(class);
        }
        if let Some((name, value)) = self.attr {
            match value {
                Some(value) => {
                    css.push('[');
                    css.push_str(name);
                    css.push_str("=\"");
                    css.push_str(value);
                    css.push_str("\"]");
                }
                None => {
                    css.push('[');
                    css.push_str(name);
                    css.push(']');
                }
            }
        }
        if css.is_empty() {
            css.push('*');
        }
        css
    }
}

// =============================================================================
// Dom Trait
// =============================================================================

/// The DOM surface the engine consumes and mutates.
///
/// Side effects are limited to the [`HIDDEN_ATTR`] marker, inline-style
/// hiding, and synthetic scroll dispatch.
pub trait Dom {
    /// The document root.
    fn root(&self) -> NodeId;

    /// First descendant of `scope` matching `selector`, in document order.
    fn query(&self, scope: NodeId, selector: &Selector) -> Option<NodeId>;

    /// All descendants of `scope` matching `selector`, in document order.
    fn query_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId>;

    /// Does `node` itself match `selector`?
    fn matches(&self, node: NodeId, selector: &Selector) -> bool;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn attr(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str);

    /// Concatenated text content, whitespace-trimmed.
    fn text(&self, node: NodeId) -> String;

    /// Does the node carry any class or `data-*` attribute? Used as the
    /// stopping probe for the sidebar's expanded-card removal walk.
    fn has_structural_marks(&self, node: NodeId) -> bool;

    /// Hide the node via inline style.
    fn hide(&mut self, node: NodeId);

    /// Dispatch a synthetic scroll event on the node, asking the host page's
    /// own infinite-scroll logic to load more items.
    fn dispatch_scroll(&mut self, node: NodeId);
}

// =============================================================================
// Ancestor Walk
// =============================================================================

/// Walk upward from `leaf` (inclusive) until `stop` accepts a node.
///
/// Returns `None` when the document root is passed without a match; callers
/// treat that as a structural failure and fail open.
pub fn walk_to_ancestor<D, F>(dom: &D, leaf: NodeId, stop: F) -> Option<NodeId>
where
    D: Dom + ?Sized,
    F: Fn(&D, NodeId) -> bool,
{
    let mut current = leaf;
    loop {
        if stop(dom, current) {
            return Some(current);
        }
        current = dom.parent(current)?;
    }
}

/// Walk upward to the first ancestor matching any selector in `stops`.
pub fn walk_to_selector<D: Dom + ?Sized>(
    dom: &D,
    leaf: NodeId,
    stops: &[Selector],
) -> Option<NodeId> {
    walk_to_ancestor(dom, leaf, |dom, node| {
        stops.iter().any(|stop| dom.matches(node, stop))
    })
}
