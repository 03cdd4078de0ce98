//! Reef DOM - Document Object Model
//!
//! Arena-based DOM tree used as the source of truth for hydration.
//! Nodes are addressed by `NodeId` indices into a flat arena, which keeps
//! the tree cheap to walk and lets the translator key its reuse cache on
//! node identity.

mod attributes;
mod document;
mod node;
mod selector;
mod serialize;
mod tree;

pub use document::Document;
pub use node::{Attribute, ElementData, Node, NodeData};
pub use tree::Tree;

/// Node identifier (index into the arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Sentinel for "no node".
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Root node ID (the document node).
    pub const ROOT: NodeId = NodeId(0);

    /// Check whether this ID refers to a node.
    #[inline]
    pub fn is_some(self) -> bool {
        self != Self::NONE
    }

    /// Check whether this is the "no node" sentinel.
    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}
