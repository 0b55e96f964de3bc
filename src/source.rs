use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use async_trait::async_trait;

use crate::error::Result;

/// Shape of a node as far as list layout is concerned.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Node that may own children; renders an opening and a closing row when expanded.
    Container,
    /// Single-row node (text, comment, leaf step).
    Leaf,
    /// Occupies a tree slot but never a list slot (e.g. blank text).
    Hidden,
}

impl NodeKind {
    /// Returns `true` unless the node is hidden.
    #[inline]
    pub const fn is_displayable(self) -> bool {
        !matches!(self, Self::Hidden)
    }

    /// Returns `true` if the node can render a closing row.
    #[inline]
    pub const fn supports_tail(self) -> bool {
        matches!(self, Self::Container)
    }
}

/// Node as known by the source.
///
/// `children` holds the ids known at fetch time; each child's own data may
/// still be missing until a deeper fetch reveals it.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeData<Id, P> {
    pub id: Id,
    pub parent: Option<Id>,
    pub children: Vec<Id>,
    pub kind: NodeKind,
    pub payload: P,
}

impl<Id, P> NodeData<Id, P> {
    pub const fn new(id: Id, parent: Option<Id>, kind: NodeKind, payload: P) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            kind,
            payload,
        }
    }

    pub fn with_children(mut self, children: Vec<Id>) -> Self {
        self.children = children;
        self
    }
}

/// Lazily populated tree the list is built over.
///
/// Expectations on implementors:
/// - a proper tree (single parent, no cycles, stable ids across fetches);
/// - once `fetch_subtree(root, _)` resolves, `node(root)` and `node(id)` for
///   every returned id succeed;
/// - nodes are never removed, children lists only grow.
#[async_trait(?Send)]
pub trait NodeSource {
    /// Node identifier type.
    type Id: Copy + Eq + Hash + Debug;
    /// Row payload handed to label renderers.
    type Payload;

    /// Returns cached node data, or `None` if the node was never fetched.
    fn node(&self, id: Self::Id) -> Option<Rc<NodeData<Self::Id, Self::Payload>>>;

    /// Fetches `depth` additional levels below `root` (0 = immediate children)
    /// and returns the ids of every descendant now known within that range.
    async fn fetch_subtree(&self, root: Self::Id, depth: u32) -> Result<Vec<Self::Id>>;

    /// Returns the ancestor chain of `leaf`, root first, ending with `leaf`.
    async fn fetch_ancestor_path(&self, leaf: Self::Id) -> Result<Vec<Self::Id>>;

    /// Display filter; hidden nodes never occupy a list row.
    fn should_display(&self, node: &NodeData<Self::Id, Self::Payload>) -> bool {
        node.kind.is_displayable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_predicates() {
        assert!(NodeKind::Container.is_displayable());
        assert!(NodeKind::Container.supports_tail());
        assert!(NodeKind::Leaf.is_displayable());
        assert!(!NodeKind::Leaf.supports_tail());
        assert!(!NodeKind::Hidden.is_displayable());
    }

    #[test]
    fn node_data_builder_keeps_child_order() {
        let node = NodeData::new(1_u32, None, NodeKind::Container, "div").with_children(vec![4, 2, 3]);
        assert_eq!(node.children, vec![4, 2, 3]);
        assert_eq!(node.parent, None);
    }
}
