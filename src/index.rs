//! Flat index ↔ node resolution over a partially loaded tree.
//!
//! Both directions walk sibling lists and sum child weights; no per-row cache
//! is kept, so a lookup costs O(depth × siblings) regardless of list length.

use std::rc::Rc;

use crate::error::{Result, TreeError};
use crate::item::{Item, ItemContent};
use crate::metadata::MetadataStore;
use crate::source::NodeSource;

type SourceItem<S> = Item<<S as NodeSource>::Id, <S as NodeSource>::Payload>;

/// Public row count: the root's row is never listed.
pub(crate) fn item_count<Id>(store: &MetadataStore<Id>, root: Id) -> usize
where
    Id: Copy + Eq + std::hash::Hash,
{
    store.lookup(root).map_or(0, |meta| meta.sub_tree_weight)
}

fn out_of_range(index: usize, count: usize) -> TreeError {
    debug_assert!(false, "index {index} out of range (item count {count})");
    TreeError::IndexOutOfRange { index, count }
}

/// Resolves a flat row index into the item shown there.
pub(crate) fn item_at_index<S: NodeSource>(
    store: &MetadataStore<S::Id>,
    source: &S,
    root: S::Id,
    index: usize,
) -> Result<SourceItem<S>> {
    let count = item_count(store, root);
    if index >= count {
        return Err(out_of_range(index, count));
    }

    let root_meta = store.get(root)?;
    if !root_meta.children_can_be_rendered {
        return Ok(Item {
            id: root,
            depth: root_meta.depth + 1,
            is_expanded: false,
            is_tail: false,
            content: ItemContent::LoadingPlaceholder,
        });
    }

    let mut parent = source.node(root).ok_or_else(|| TreeError::not_found(root))?;
    let mut current_index = 0;
    'descend: loop {
        let siblings = Rc::clone(&parent);
        for child_id in siblings.children.iter().copied() {
            let Some(meta) = store.lookup(child_id) else {
                continue;
            };
            let Some(child) = source.node(child_id) else {
                continue;
            };
            if !source.should_display(&child) {
                continue;
            }

            let weight = meta.weight();
            if current_index == index {
                return Ok(Item {
                    id: child_id,
                    depth: meta.depth,
                    is_expanded: meta.is_expanded,
                    is_tail: false,
                    content: ItemContent::Node(child),
                });
            }
            if meta.is_expanded && !meta.children_can_be_rendered && index == current_index + 1 {
                return Ok(Item {
                    id: child_id,
                    depth: meta.depth + 1,
                    is_expanded: false,
                    is_tail: false,
                    content: ItemContent::LoadingPlaceholder,
                });
            }
            if meta.has_tail && index == current_index + weight - 1 {
                return Ok(Item {
                    id: child_id,
                    depth: meta.depth,
                    is_expanded: meta.is_expanded,
                    is_tail: true,
                    content: ItemContent::Node(child),
                });
            }
            if index < current_index + weight {
                current_index += 1;
                parent = child;
                continue 'descend;
            }
            current_index += weight;
        }
        break;
    }

    Err(out_of_range(index, count))
}

/// Returns the row index of the node's opening row.
///
/// Walks upward to `root`, summing the weights of displayable preceding
/// siblings and one row per entered ancestor.
pub(crate) fn index_for_node<S: NodeSource>(
    store: &MetadataStore<S::Id>,
    source: &S,
    root: S::Id,
    id: S::Id,
) -> Result<usize> {
    if id == root {
        return Err(TreeError::not_found(id));
    }

    let mut index = 0;
    let mut current = id;
    while current != root {
        let node = source.node(current).ok_or_else(|| TreeError::not_found(current))?;
        // Hidden nodes and their descendants have no row.
        if !source.should_display(&node) {
            return Err(TreeError::not_found(current));
        }
        let parent_id = node.parent.ok_or_else(|| TreeError::not_found(current))?;
        let parent = source.node(parent_id).ok_or_else(|| TreeError::not_found(parent_id))?;

        for sibling_id in parent.children.iter().copied() {
            if sibling_id == current {
                break;
            }
            let Some(meta) = store.lookup(sibling_id) else {
                continue;
            };
            if source
                .node(sibling_id)
                .is_some_and(|sibling| source.should_display(&sibling))
            {
                index += meta.weight();
            }
        }
        // The parent's own opening row, unless the parent is the unlisted root.
        if parent_id != root {
            index += 1;
        }
        current = parent_id;
    }
    Ok(index)
}

/// Inverse of [`item_at_index`] that also resolves closing and placeholder rows.
pub(crate) fn index_for_item<S: NodeSource>(
    store: &MetadataStore<S::Id>,
    source: &S,
    root: S::Id,
    item: &SourceItem<S>,
) -> Result<usize> {
    if item.is_placeholder() {
        if item.id == root {
            return Ok(0);
        }
        return Ok(index_for_node(store, source, root, item.id)? + 1);
    }
    let open = index_for_node(store, source, root, item.id)?;
    if item.is_tail {
        Ok(open + store.weight(item.id)? - 1)
    } else {
        Ok(open)
    }
}
