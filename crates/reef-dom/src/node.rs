//! DOM node and element data.

use crate::NodeId;

/// DOM node.
///
/// Sibling/child links are `NodeId`s into the owning arena, `NodeId::NONE`
/// when absent.
#[derive(Debug, Clone)]
pub struct Node {
    /// Parent node (NONE if detached or root).
    pub parent: NodeId,
    /// First child.
    pub first_child: NodeId,
    /// Last child (for O(1) append).
    pub last_child: NodeId,
    /// Previous sibling.
    pub prev_sibling: NodeId,
    /// Next sibling.
    pub next_sibling: NodeId,
    /// Node-specific data.
    pub data: NodeData,
}

impl Node {
    /// Create a detached node.
    pub fn new(data: NodeData) -> Self {
        Self {
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
            data,
        }
    }

    /// Check if this is an element.
    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    /// Check if this is a text node.
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    /// Get element data if this is an element.
    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get mutable element data.
    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get text content if this is a text node.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// Node-specific data.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root.
    Document,
    /// Element.
    Element(ElementData),
    /// Text content.
    Text(String),
    /// CDATA section. The translator normalizes these into text nodes.
    CData(String),
    /// Comment.
    Comment(String),
    /// Processing instruction.
    ProcessingInstruction { target: String, data: String },
}

/// Attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Element-specific data.
///
/// Attributes (markup) and IDL properties are kept separate: the `bind`
/// directive writes some names through direct property assignment and
/// others through attribute get/set, and that distinction must stay
/// observable.
#[derive(Debug, Clone)]
pub struct ElementData {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes in document order.
    pub attrs: Vec<Attribute>,
    /// IDL-style properties set by direct assignment.
    pub props: Vec<(String, serde_json::Value)>,
}

impl ElementData {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            props: Vec::new(),
        }
    }

    /// Get an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Check whether an attribute is present.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        for attr in &mut self.attrs {
            if attr.name == name {
                attr.value = value;
                return;
            }
        }
        self.attrs.push(Attribute {
            name: name.to_string(),
            value,
        });
    }

    /// Remove an attribute. Returns true if it was present.
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| a.name != name);
        self.attrs.len() != before
    }

    /// Get an IDL property value.
    pub fn prop(&self, name: &str) -> Option<&serde_json::Value> {
        self.props.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Set an IDL property by direct assignment.
    pub fn set_prop(&mut self, name: &str, value: serde_json::Value) {
        for (n, v) in &mut self.props {
            if n == name {
                *v = value;
                return;
            }
        }
        self.props.push((name.to_string(), value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_roundtrip() {
        let mut el = ElementData::new("div");
        el.set_attr("id", "main");
        el.set_attr("id", "other");
        assert_eq!(el.attr("id"), Some("other"));
        assert_eq!(el.attrs.len(), 1);
        assert!(el.remove_attr("id"));
        assert!(!el.has_attr("id"));
    }

    #[test]
    fn test_props_are_separate_from_attrs() {
        let mut el = ElementData::new("input");
        el.set_prop("value", serde_json::json!("hello"));
        assert!(el.attr("value").is_none());
        assert_eq!(el.prop("value"), Some(&serde_json::json!("hello")));
    }
}
