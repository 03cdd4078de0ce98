//! Document: a tree plus its base URL.

use crate::{ElementData, NodeData, NodeId, Tree};

/// A parsed document.
#[derive(Debug)]
pub struct Document {
    tree: Tree,
    base_url: String,
}

impl Document {
    /// Create an empty document with the given base URL.
    pub fn empty(base_url: impl Into<String>) -> Self {
        Self {
            tree: Tree::new(),
            base_url: base_url.into(),
        }
    }

    /// The document's base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The document root node.
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Borrow the underlying tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Mutably borrow the underlying tree.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    /// Create a detached element node.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.tree
            .alloc(NodeData::Element(ElementData::new(tag.to_lowercase())))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.tree.alloc(NodeData::Text(text.to_string()))
    }

    /// Get element data for a node, if it is an element.
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.tree.get(id)?.as_element()
    }

    /// Get mutable element data for a node.
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.tree.get_mut(id)?.as_element_mut()
    }

    /// Get an attribute of an element node.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    /// The tag name of an element node.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.tree.descendants(id) {
            if let Some(text) = self.tree.get(node).and_then(|n| n.as_text()) {
                out.push_str(text);
            }
        }
        out
    }

    /// The content of the first `<title>` element, if any.
    pub fn title(&self) -> Option<String> {
        let id = self
            .tree
            .descendants(NodeId::ROOT)
            .find(|&id| self.tag(id) == Some("title"))?;
        Some(self.text_content(id))
    }

    /// Find the first element (in pre-order) for which `pred` holds.
    pub fn find_element(&self, mut pred: impl FnMut(&ElementData) -> bool) -> Option<NodeId> {
        self.tree
            .descendants(NodeId::ROOT)
            .find(|&id| self.element(id).is_some_and(|e| pred(e)))
    }
}
