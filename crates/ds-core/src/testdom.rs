//! In-memory DOM fixture for unit tests.

use std::collections::BTreeMap;

use crate::dom::{Dom, NodeId, Selector};

#[derive(Debug, Default)]
struct TestNode {
    tag: String,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    hidden: bool,
}

/// A minimal document tree implementing [`Dom`]. Node 0 is the root.
#[derive(Debug)]
pub struct TestDom {
    nodes: Vec<TestNode>,
    /// Nodes that received a synthetic scroll event, in dispatch order.
    pub scrolled: Vec<NodeId>,
}

impl TestDom {
    pub fn new() -> Self {
        TestDom {
            nodes: vec![TestNode {
                tag: "html".to_string(),
                ..TestNode::default()
            }],
            scrolled: Vec::new(),
        }
    }

    pub fn add(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(TestNode {
            tag: tag.to_string(),
            parent: Some(parent),
            ..TestNode::default()
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        self.nodes[node].classes.push(class.to_string());
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.nodes[node].text = text.to_string();
    }

    pub fn is_hidden(&self, node: NodeId) -> bool {
        self.nodes[node].hidden
    }

    fn matches_node(&self, node: NodeId, selector: &Selector) -> bool {
        let n = &self.nodes[node];
        if let Some(tag) = selector.tag {
            if n.tag != tag {
                return false;
            }
        }
        if let Some(class) = selector.class {
            if !n.classes.iter().any(|c| c == class) {
                return false;
            }
        }
        if let Some((name, value)) = selector.attr {
            match n.attrs.get(name) {
                None => return false,
                Some(actual) => {
                    if let Some(expected) = value {
                        if actual != expected {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    fn collect(&self, scope: NodeId, selector: &Selector, out: &mut Vec<NodeId>) {
        for &child in &self.nodes[scope].children {
            if self.matches_node(child, selector) {
                out.push(child);
            }
            self.collect(child, selector, out);
        }
    }
}

impl Dom for TestDom {
    fn root(&self) -> NodeId {
        0
    }

    fn query(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.query_all(scope, selector).into_iter().next()
    }

    fn query_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect(scope, selector, &mut out);
        out
    }

    fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        self.matches_node(node, selector)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes[node].attrs.get(name).cloned()
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        self.nodes[node]
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    fn text(&self, node: NodeId) -> String {
        let mut text = self.nodes[node].text.clone();
        for &child in &self.nodes[node].children {
            let child_text = self.text(child);
            if !child_text.is_empty() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&child_text);
            }
        }
        text.trim().to_string()
    }

    fn has_structural_marks(&self, node: NodeId) -> bool {
        let n = &self.nodes[node];
        !n.classes.is_empty() || n.attrs.keys().any(|k| k.starts_with("data-"))
    }

    fn hide(&mut self, node: NodeId) {
        self.nodes[node].hidden = true;
    }

    fn dispatch_scroll(&mut self, node: NodeId) {
        self.scrolled.push(node);
    }
}
