use std::hash::Hash;

use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::error::{Result, TreeError};
use crate::source::NodeSource;

/// Per-node bookkeeping owned by the list.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Metadata {
    /// Nesting level; the registered root sits at `-1`.
    pub depth: i32,
    pub is_expanded: bool,
    /// All immediate children have been fetched.
    pub children_can_be_rendered: bool,
    /// Renders a closing row after its children when expanded.
    pub has_tail: bool,
    pub sub_tree_is_fully_loaded: bool,
    /// Rows occupied by expanded descendants (own row excluded).
    pub sub_tree_weight: usize,
}

impl Metadata {
    pub(crate) const fn root() -> Self {
        Self {
            depth: -1,
            is_expanded: true,
            children_can_be_rendered: false,
            has_tail: false,
            sub_tree_is_fully_loaded: false,
            sub_tree_weight: 0,
        }
    }

    /// Number of list rows this node occupies, own row included.
    #[inline]
    pub const fn weight(&self) -> usize {
        if self.is_expanded {
            1 + self.sub_tree_weight
        } else {
            1
        }
    }

    #[inline]
    pub(crate) const fn is_root(&self) -> bool {
        self.depth < 0
    }
}

/// Id → metadata map for one list instance.
#[derive(Clone, Debug)]
pub struct MetadataStore<Id> {
    entries: FxHashMap<Id, Metadata>,
}

impl<Id: Copy + Eq + Hash> Default for MetadataStore<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: Copy + Eq + Hash> MetadataStore<Id> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::with_capacity_and_hasher(capacity, FxBuildHasher),
        }
    }

    #[inline]
    pub fn contains(&self, id: Id) -> bool {
        self.entries.contains_key(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Id, &Metadata)> {
        self.entries.iter()
    }

    pub(crate) fn lookup(&self, id: Id) -> Option<&Metadata> {
        self.entries.get(&id)
    }

    pub(crate) fn reserve(&mut self, additional: usize) {
        self.entries.reserve(additional);
    }
}

impl<Id: Copy + Eq + Hash + std::fmt::Debug> MetadataStore<Id> {
    /// Returns the metadata of an observed node.
    pub fn get(&self, id: Id) -> Result<&Metadata> {
        self.entries.get(&id).ok_or_else(|| {
            debug_assert!(false, "metadata missing for {id:?}");
            TreeError::not_found(id)
        })
    }

    pub(crate) fn get_mut(&mut self, id: Id) -> Result<&mut Metadata> {
        self.entries.get_mut(&id).ok_or_else(|| {
            debug_assert!(false, "metadata missing for {id:?}");
            TreeError::not_found(id)
        })
    }

    pub fn set(&mut self, id: Id, metadata: Metadata) {
        self.entries.insert(id, metadata);
    }

    /// Row count of the node, own row included.
    #[inline]
    pub fn weight(&self, id: Id) -> Result<usize> {
        self.get(id).map(Metadata::weight)
    }

    /// Recomputes the derived flags and the subtree weight of `id` from its
    /// children's current metadata.
    ///
    /// Children must already be up to date: callers refresh bottom-up.
    pub(crate) fn refresh<S>(&mut self, source: &S, id: Id) -> Result<()>
    where
        S: NodeSource<Id = Id>,
    {
        let node = source.node(id).ok_or_else(|| TreeError::not_found(id))?;

        let mut can_render = true;
        let mut fully_loaded = true;
        let mut any_displayable = false;
        let mut children_weight = 0;
        for child_id in node.children.iter().copied() {
            let Some(child_meta) = self.entries.get(&child_id) else {
                can_render = false;
                fully_loaded = false;
                continue;
            };
            fully_loaded &= child_meta.sub_tree_is_fully_loaded;
            let child_weight = child_meta.weight();
            let Some(child) = source.node(child_id) else {
                continue;
            };
            if source.should_display(&child) {
                any_displayable = true;
                children_weight += child_weight;
            }
        }

        let expandable = if can_render {
            any_displayable
        } else {
            !node.children.is_empty()
        };
        let meta = self.get_mut(id)?;
        let has_tail = !meta.is_root() && node.kind.supports_tail() && expandable;
        // Nothing to show below: the node cannot stay expanded.
        if !expandable && !meta.is_root() {
            meta.is_expanded = false;
        }
        meta.children_can_be_rendered = can_render;
        meta.sub_tree_is_fully_loaded = can_render && fully_loaded;
        meta.has_tail = has_tail;
        // A node with unknown children shows a single loading placeholder.
        meta.sub_tree_weight = if can_render {
            children_weight + usize::from(has_tail)
        } else {
            1
        };
        Ok(())
    }

    /// Adds `delta` rows to every ancestor of `id`, stopping after the first
    /// collapsed one (its own row count towards its parent stays 1).
    ///
    /// Hidden nodes contribute nothing to their parent, so the walk ends at the
    /// first hidden node on the chain, `id` included.
    pub(crate) fn propagate_delta<S>(&mut self, source: &S, id: Id, delta: isize) -> Result<()>
    where
        S: NodeSource<Id = Id>,
    {
        if delta == 0 {
            return Ok(());
        }
        let Some(node) = source.node(id) else {
            return Err(TreeError::not_found(id));
        };
        if !source.should_display(&node) {
            return Ok(());
        }
        let mut parent = node.parent;
        while let Some(parent_id) = parent {
            let meta = self.get_mut(parent_id)?;
            if !meta.children_can_be_rendered {
                // Placeholder weight does not depend on descendants.
                break;
            }
            meta.sub_tree_weight = meta.sub_tree_weight.saturating_add_signed(delta);
            if !meta.is_expanded || meta.is_root() {
                break;
            }
            let Some(parent_node) = source.node(parent_id) else {
                break;
            };
            if !source.should_display(&parent_node) {
                break;
            }
            parent = parent_node.parent;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;
    use crate::source::NodeKind;

    fn leaf_meta(depth: i32) -> Metadata {
        Metadata {
            depth,
            is_expanded: false,
            children_can_be_rendered: true,
            has_tail: false,
            sub_tree_is_fully_loaded: true,
            sub_tree_weight: 0,
        }
    }

    #[test]
    fn weight_counts_own_row_only_when_collapsed() {
        let mut meta = leaf_meta(0);
        meta.sub_tree_weight = 4;
        assert_eq!(meta.weight(), 1);
        meta.is_expanded = true;
        assert_eq!(meta.weight(), 5);
    }

    #[test]
    fn refresh_counts_displayable_children_and_tail() {
        let source = MemorySource::<&str>::new(0, NodeKind::Container, "root");
        source.add_child(0, 1, NodeKind::Container, "div");
        source.add_child(1, 2, NodeKind::Leaf, "text");
        source.add_child(1, 3, NodeKind::Hidden, "blank");
        source.reveal_all();

        let mut store = MetadataStore::new();
        store.set(0, Metadata::root());
        store.set(1, Metadata { depth: 0, is_expanded: true, ..leaf_meta(0) });
        store.set(2, leaf_meta(1));
        store.set(3, leaf_meta(1));

        store.refresh(&source, 1).unwrap();
        let div = store.get(1).unwrap();
        assert!(div.children_can_be_rendered);
        assert!(div.has_tail);
        assert_eq!(div.sub_tree_weight, 2);

        store.refresh(&source, 0).unwrap();
        let root = store.get(0).unwrap();
        assert!(!root.has_tail);
        assert_eq!(root.sub_tree_weight, 3);
    }

    #[test]
    fn refresh_uses_placeholder_until_children_are_known() {
        let source = MemorySource::<&str>::new(0, NodeKind::Container, "root");
        source.add_child(0, 1, NodeKind::Container, "div");
        source.add_child(1, 2, NodeKind::Leaf, "text");
        source.reveal_all();

        let mut store = MetadataStore::new();
        store.set(0, Metadata::root());
        store.set(1, Metadata { depth: 0, is_expanded: true, ..leaf_meta(0) });

        store.refresh(&source, 1).unwrap();
        let div = store.get(1).unwrap();
        assert!(!div.children_can_be_rendered);
        assert!(!div.sub_tree_is_fully_loaded);
        assert_eq!(div.sub_tree_weight, 1);
        assert_eq!(div.weight(), 2);
    }

    #[test]
    fn refresh_collapses_nodes_without_displayable_children() {
        let source = MemorySource::<&str>::new(0, NodeKind::Container, "root");
        source.add_child(0, 1, NodeKind::Container, "template");
        source.add_child(1, 2, NodeKind::Hidden, "blank");
        source.add_child(0, 3, NodeKind::Leaf, "text");
        source.reveal_all();

        let mut store = MetadataStore::new();
        store.set(0, Metadata::root());
        store.set(1, Metadata { depth: 0, is_expanded: true, ..leaf_meta(0) });
        store.set(2, leaf_meta(1));
        store.set(3, Metadata { depth: 0, is_expanded: true, ..leaf_meta(0) });

        store.refresh(&source, 1).unwrap();
        store.refresh(&source, 3).unwrap();
        store.refresh(&source, 0).unwrap();

        assert!(!store.get(1).unwrap().is_expanded);
        assert!(!store.get(1).unwrap().has_tail);
        assert!(!store.get(3).unwrap().is_expanded);
        assert_eq!(store.get(0).unwrap().sub_tree_weight, 2);
    }

    #[test]
    fn delta_stops_at_hidden_nodes() {
        let source = MemorySource::<&str>::new(0, NodeKind::Container, "root");
        source.add_child(0, 1, NodeKind::Hidden, "template");
        source.add_child(1, 2, NodeKind::Container, "div");
        source.add_child(2, 3, NodeKind::Leaf, "text");
        source.reveal_all();

        let mut store = MetadataStore::new();
        store.set(0, Metadata { children_can_be_rendered: true, ..Metadata::root() });
        store.set(1, Metadata { is_expanded: true, sub_tree_weight: 1, ..leaf_meta(0) });
        store.set(2, Metadata { sub_tree_weight: 2, has_tail: true, ..leaf_meta(1) });

        store.propagate_delta(&source, 2, 2).unwrap();
        assert_eq!(store.get(1).unwrap().sub_tree_weight, 3);
        assert_eq!(store.get(0).unwrap().sub_tree_weight, 0);

        store.propagate_delta(&source, 1, -3).unwrap();
        assert_eq!(store.get(0).unwrap().sub_tree_weight, 0);
    }

    #[test]
    fn missing_metadata_is_not_found() {
        let store = MetadataStore::<u32>::new();
        let result = std::panic::catch_unwind(|| store.get(9).map(|meta| *meta));
        if cfg!(debug_assertions) {
            assert!(result.is_err());
        } else {
            assert_eq!(result.ok(), Some(Err(TreeError::NotFound("9".into()))));
        }
    }
}
