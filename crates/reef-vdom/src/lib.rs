//! Reef VDOM - DOM to virtual-tree translation
//!
//! Walks a DOM subtree and produces an immutable lightweight tree,
//! tagging directive attributes and reactive island boundaries. The
//! resulting `VNode`s are shared (`Rc`) and reused across walks through an
//! identity-keyed `NodeCache`.

mod schema;
mod translate;

pub use schema::DirectiveSchema;
pub use translate::{TranslateOutcome, translate};

use indexmap::IndexMap;
use reef_dom::NodeId;
use std::collections::HashMap;
use std::rc::Rc;

/// A directive attribute value, resolved once at parse time.
///
/// Only JSON objects are kept as parsed JSON; everything else keeps the
/// raw expression string.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveValue {
    Json(serde_json::Value),
    Str(String),
}

impl DirectiveValue {
    /// Parse a raw attribute value.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value @ serde_json::Value::Object(_)) => DirectiveValue::Json(value),
            _ => DirectiveValue::Str(raw.to_string()),
        }
    }

    /// The parsed JSON object, if this value is one.
    pub fn as_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match self {
            DirectiveValue::Json(serde_json::Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// The raw expression string, if this value is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DirectiveValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// One parsed directive occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveEntry {
    /// Reactive state namespace, inherited from the nearest enclosing
    /// island unless the value carried an explicit `namespace::` prefix.
    pub namespace: Option<String>,
    /// Optional `--suffix` distinguishing multiple directives of the same
    /// prefix on one node.
    pub suffix: Option<String>,
    /// Expression or parsed JSON object.
    pub value: DirectiveValue,
}

/// Directives attached to a node, grouped by directive name.
pub type DirectiveMap = IndexMap<String, Vec<DirectiveEntry>>;

/// A child of a virtual node: a text run or a nested node.
#[derive(Debug, Clone)]
pub enum Child {
    Text(String),
    Node(Rc<VNode>),
}

/// The children of a virtual node.
#[derive(Debug, Clone)]
pub enum Children {
    Nodes(Vec<Child>),
    /// Raw markup of an ignored subtree, preserved verbatim.
    RawHtml(String),
}

/// One virtual element.
#[derive(Debug)]
pub struct VNode {
    /// Lowercase tag name.
    pub tag: String,
    /// Attributes as written, in document order.
    pub props: IndexMap<String, String>,
    /// Child nodes, or frozen markup for ignored subtrees.
    pub children: Children,
    /// Template content, mapped per content child (templates only).
    pub content: Option<Vec<Child>>,
    /// Parsed directives grouped by name, if any.
    pub directives: Option<DirectiveMap>,
    /// The source DOM node this was translated from.
    pub dom: NodeId,
}

impl VNode {
    /// Directive entries for a given directive name.
    pub fn directive(&self, name: &str) -> &[DirectiveEntry] {
        self.directives
            .as_ref()
            .and_then(|map| map.get(name))
            .map(|entries| entries.as_slice())
            .unwrap_or(&[])
    }
}

/// Identity-keyed cache of translated nodes.
///
/// Keys are source DOM node ids, so reuse only ever happens for walks
/// over the same document.
#[derive(Debug, Default)]
pub struct NodeCache {
    map: HashMap<NodeId, Rc<VNode>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> Option<Rc<VNode>> {
        self.map.get(&id).cloned()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.map.contains_key(&id)
    }

    pub fn insert(&mut self, id: NodeId, node: Rc<VNode>) {
        self.map.insert(id, node);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
