use std::rc::Rc;

use crate::source::NodeData;

/// What a list row shows.
#[derive(Debug)]
pub enum ItemContent<Id, P> {
    /// A known node (open or closing row).
    Node(Rc<NodeData<Id, P>>),
    /// Stand-in for children that are still being fetched.
    LoadingPlaceholder,
}

impl<Id, P> Clone for ItemContent<Id, P> {
    fn clone(&self) -> Self {
        match self {
            Self::Node(node) => Self::Node(Rc::clone(node)),
            Self::LoadingPlaceholder => Self::LoadingPlaceholder,
        }
    }
}

/// One row of the flattened list, produced on demand.
///
/// For a placeholder, `id` is the node whose children are loading.
#[derive(Debug)]
pub struct Item<Id, P> {
    pub id: Id,
    pub depth: i32,
    pub is_expanded: bool,
    pub is_tail: bool,
    pub content: ItemContent<Id, P>,
}

impl<Id: Copy, P> Clone for Item<Id, P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            depth: self.depth,
            is_expanded: self.is_expanded,
            is_tail: self.is_tail,
            content: self.content.clone(),
        }
    }
}

impl<Id, P> Item<Id, P> {
    #[inline]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self.content, ItemContent::LoadingPlaceholder)
    }

    /// Returns the node for open and closing rows.
    pub fn node(&self) -> Option<&NodeData<Id, P>> {
        match &self.content {
            ItemContent::Node(node) => Some(node),
            ItemContent::LoadingPlaceholder => None,
        }
    }

    /// Returns `true` for the opening row of a known node.
    #[inline]
    pub const fn is_open_row(&self) -> bool {
        !self.is_tail && !self.is_placeholder()
    }
}
