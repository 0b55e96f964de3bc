use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::error::{Result, TreeError};
use crate::metadata::{Metadata, MetadataStore};
use crate::source::NodeSource;

/// Initial expansion policy for freshly observed nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExpansionHint<Id> {
    Collapsed,
    /// Expand nodes at most `depth` hops below `root` (their children came in the same fetch).
    WithinDepth { root: Id, depth: u32 },
}

/// Merges newly fetched ids into the store and returns how many were added.
///
/// Ids may arrive in any order (e.g. the union of several concurrent fetches):
/// the batch is sorted by depth so every parent is inserted before its
/// children, then derived flags and weights are refreshed bottom-up for the
/// new nodes and all of their ancestors.
pub(crate) fn merge_ids<S, I>(
    store: &mut MetadataStore<S::Id>,
    source: &S,
    ids: I,
    hint: ExpansionHint<S::Id>,
) -> Result<usize>
where
    S: NodeSource,
    I: IntoIterator<Item = S::Id>,
{
    let mut seen = FxHashSet::default();
    let batch: Vec<S::Id> = ids
        .into_iter()
        .filter(|id| !store.contains(*id) && seen.insert(*id))
        .collect();
    if batch.is_empty() {
        return Ok(0);
    }

    let depths = resolve_depths(store, source, &batch, &seen)?;
    let mut ordered = batch;
    ordered.sort_by_key(|id| depths.get(id).copied().unwrap_or(i32::MAX));

    store.reserve(ordered.len());
    for id in ordered.iter().copied() {
        let node = source.node(id).ok_or_else(|| TreeError::not_found(id))?;
        let parent_id = node.parent.ok_or_else(|| TreeError::not_found(id))?;
        let depth = store.get(parent_id)?.depth + 1;
        let is_expanded = match hint {
            ExpansionHint::Collapsed => false,
            ExpansionHint::WithinDepth { root, depth: max_distance } => store
                .lookup(root)
                .is_some_and(|root_meta| {
                    depth - root_meta.depth <= i32::try_from(max_distance).unwrap_or(i32::MAX)
                }),
        };
        store.set(
            id,
            Metadata {
                depth,
                is_expanded,
                children_can_be_rendered: false,
                has_tail: false,
                sub_tree_is_fully_loaded: false,
                sub_tree_weight: 0,
            },
        );
    }

    // New nodes plus every ancestor up to the root, deepest first. Ancestors
    // are refreshed regardless of their expansion state.
    let mut dirty: FxHashSet<S::Id> =
        FxHashSet::with_capacity_and_hasher(ordered.len() * 2, FxBuildHasher);
    let mut refresh_order: Vec<(i32, S::Id)> = Vec::with_capacity(ordered.len() * 2);
    for id in ordered.iter().copied() {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if !dirty.insert(node_id) {
                break;
            }
            let meta = store.get(node_id)?;
            refresh_order.push((meta.depth, node_id));
            if meta.depth < 0 {
                break;
            }
            current = source.node(node_id).and_then(|node| node.parent);
        }
    }
    refresh_order.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, node_id) in refresh_order {
        store.refresh(source, node_id)?;
    }

    log::debug!(
        "merged {} nodes ({} refreshed)",
        ordered.len(),
        dirty.len()
    );
    Ok(ordered.len())
}

/// Depth of every batch id, computed from the nearest ancestor that is already
/// stored. Fails if an ancestor is neither stored nor part of the batch.
fn resolve_depths<S: NodeSource>(
    store: &MetadataStore<S::Id>,
    source: &S,
    batch: &[S::Id],
    in_batch: &FxHashSet<S::Id>,
) -> Result<FxHashMap<S::Id, i32>> {
    let mut depths: FxHashMap<S::Id, i32> =
        FxHashMap::with_capacity_and_hasher(batch.len(), FxBuildHasher);
    let mut chain: SmallVec<[S::Id; 16]> = SmallVec::new();

    for id in batch.iter().copied() {
        if depths.contains_key(&id) {
            continue;
        }
        chain.clear();
        chain.push(id);
        let mut current = id;
        let base = loop {
            let node = source.node(current).ok_or_else(|| TreeError::not_found(current))?;
            let Some(parent) = node.parent else {
                debug_assert!(false, "{current:?} has no stored ancestor");
                return Err(TreeError::not_found(current));
            };
            if let Some(depth) = depths.get(&parent) {
                break *depth;
            }
            if let Some(meta) = store.lookup(parent) {
                break meta.depth;
            }
            if !in_batch.contains(&parent) {
                debug_assert!(false, "parent {parent:?} of {current:?} missing from merge");
                return Err(TreeError::not_found(parent));
            }
            chain.push(parent);
            current = parent;
        };

        // chain runs child → ancestor; assign from the top down.
        let mut depth = base;
        for node_id in chain.iter().rev().copied() {
            depth += 1;
            depths.insert(node_id, depth);
        }
    }
    Ok(depths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySource;
    use crate::source::NodeKind;

    // 0 -> 1 -> 2 -> 3, plus 0 -> 4
    fn chain_source() -> MemorySource<&'static str> {
        let source = MemorySource::new(0, NodeKind::Container, "root");
        source.add_child(0, 1, NodeKind::Container, "html");
        source.add_child(1, 2, NodeKind::Container, "body");
        source.add_child(2, 3, NodeKind::Leaf, "text");
        source.add_child(0, 4, NodeKind::Leaf, "comment");
        source.reveal_all();
        source
    }

    fn rooted_store() -> MetadataStore<u32> {
        let mut store = MetadataStore::new();
        store.set(0, Metadata::root());
        store
    }

    #[test]
    fn children_before_parents_still_get_correct_depths() {
        let source = chain_source();
        let mut store = rooted_store();

        let added = merge_ids(&mut store, &source, [3, 2, 4, 1], ExpansionHint::Collapsed).unwrap();

        assert_eq!(added, 4);
        assert_eq!(store.get(1).unwrap().depth, 0);
        assert_eq!(store.get(2).unwrap().depth, 1);
        assert_eq!(store.get(3).unwrap().depth, 2);
        assert_eq!(store.get(4).unwrap().depth, 0);
        assert!(store.get(0).unwrap().sub_tree_is_fully_loaded);
        assert_eq!(store.get(0).unwrap().sub_tree_weight, 2);
    }

    #[test]
    fn remerging_known_ids_is_a_no_op() {
        let source = chain_source();
        let mut store = rooted_store();
        merge_ids(&mut store, &source, [1, 4], ExpansionHint::Collapsed).unwrap();
        let before = *store.get(0).unwrap();

        let added = merge_ids(&mut store, &source, [4, 1, 1], ExpansionHint::Collapsed).unwrap();

        assert_eq!(added, 0);
        assert_eq!(*store.get(0).unwrap(), before);
    }

    #[test]
    fn within_depth_hint_expands_nodes_whose_children_arrived() {
        let source = chain_source();
        let mut store = rooted_store();

        merge_ids(
            &mut store,
            &source,
            [1, 2, 4],
            ExpansionHint::WithinDepth { root: 0, depth: 1 },
        )
        .unwrap();

        assert!(store.get(1).unwrap().is_expanded);
        assert!(!store.get(2).unwrap().is_expanded);
        // Within range, but a leaf has nothing to expand.
        assert!(!store.get(4).unwrap().is_expanded);
        // html(open) + body + html(tail) + comment
        assert_eq!(store.get(0).unwrap().sub_tree_weight, 4);
    }

    #[test]
    fn within_depth_hint_leaves_childless_containers_collapsed() {
        let source = MemorySource::new(0, NodeKind::Container, "root");
        source.add_child(0, 1, NodeKind::Container, "div");
        source.add_child(0, 2, NodeKind::Container, "empty");
        source.add_child(1, 3, NodeKind::Leaf, "text");
        source.reveal_all();
        let mut store = rooted_store();

        merge_ids(
            &mut store,
            &source,
            [1, 2, 3],
            ExpansionHint::WithinDepth { root: 0, depth: 2 },
        )
        .unwrap();

        assert!(store.get(1).unwrap().is_expanded);
        assert!(!store.get(2).unwrap().is_expanded);
        assert!(!store.get(3).unwrap().is_expanded);
        // div(open) + text + div(tail) + empty
        assert_eq!(store.get(0).unwrap().sub_tree_weight, 4);
    }

    #[test]
    fn ancestors_refresh_even_when_collapsed() {
        let source = chain_source();
        let mut store = rooted_store();
        merge_ids(&mut store, &source, [1, 4], ExpansionHint::Collapsed).unwrap();
        assert!(!store.get(1).unwrap().children_can_be_rendered);

        merge_ids(&mut store, &source, [2], ExpansionHint::Collapsed).unwrap();

        let html = store.get(1).unwrap();
        assert!(html.children_can_be_rendered);
        assert!(!html.sub_tree_is_fully_loaded);
        assert_eq!(html.sub_tree_weight, 2);
        assert_eq!(store.get(0).unwrap().sub_tree_weight, 2);
    }

    #[test]
    fn gap_in_ancestry_is_reported() {
        let source = chain_source();
        let mut store = rooted_store();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            merge_ids(&mut store, &source, [3], ExpansionHint::Collapsed)
        }));
        if cfg!(debug_assertions) {
            assert!(result.is_err());
        } else {
            assert!(matches!(result, Ok(Err(TreeError::NotFound(_)))));
        }
    }
}
