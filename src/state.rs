use ratatui::widgets::TableState;

use crate::action::{TreeAction, TreeEvent};
use crate::item::Item;
use crate::list::LazyTreeList;
use crate::source::NodeSource;
use crate::style::TreeScrollPolicy;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "keymap")]
use crate::keymap::TreeKeyBindings;
#[cfg(feature = "keymap")]
use crossterm::event::KeyEvent;

/// Widget state: scroll offset and the last rendered viewport.
///
/// The selected row itself lives in the [`LazyTreeList`]; the table state
/// mirrors it on every render.
pub struct LazyTreeListState {
    table_state: TableState,
    viewport_height: usize,
    #[cfg(feature = "keymap")]
    keymap: TreeKeyBindings,
}

/// Selection and scroll position that survive a reload.
///
/// The selection is stored by node id, not by row, since rows shift as
/// nodes load. With the `serde` feature enabled, this type derives
/// `Serialize`/`Deserialize`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LazyTreeListSnapshot<Id> {
    /// Node whose opening row was selected.
    pub selected: Option<Id>,
    /// Scroll offset within the flattened list.
    pub offset: usize,
}

impl Default for LazyTreeListState {
    fn default() -> Self {
        Self::new()
    }
}

impl LazyTreeListState {
    pub fn new() -> Self {
        Self {
            table_state: TableState::default(),
            viewport_height: 1,
            #[cfg(feature = "keymap")]
            keymap: TreeKeyBindings::new(),
        }
    }

    #[cfg(feature = "keymap")]
    /// Returns a mutable reference to the key binding set.
    pub const fn keymap_mut(&mut self) -> &mut TreeKeyBindings {
        &mut self.keymap
    }

    pub(crate) const fn table_state(&self) -> &TableState {
        &self.table_state
    }

    /// First row shown in the viewport.
    pub fn offset(&self) -> usize {
        self.table_state.offset()
    }

    pub fn set_offset(&mut self, offset: usize) {
        *self.table_state.offset_mut() = offset;
    }

    /// Height of the viewport at the last render.
    pub const fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    pub(crate) const fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = if height == 0 { 1 } else { height };
    }

    /// Copies the list's selection into the table state.
    pub fn sync_selection<S: NodeSource>(&mut self, list: &LazyTreeList<S>) {
        self.table_state.select(list.selected_index());
    }

    /// Returns the item on the selected row, if any.
    pub fn selected_item<S: NodeSource>(
        &self,
        list: &LazyTreeList<S>,
    ) -> Option<Item<S::Id, S::Payload>> {
        list.selected_index()
            .filter(|index| *index < list.item_count())
            .and_then(|index| list.item_at_index(index).ok())
    }

    /// Captures the selected node and scroll offset.
    pub fn snapshot<S: NodeSource>(&self, list: &LazyTreeList<S>) -> LazyTreeListSnapshot<S::Id> {
        LazyTreeListSnapshot {
            selected: self.selected_item(list).map(|item| item.id),
            offset: self.offset(),
        }
    }

    /// Restores a snapshot; returns `false` if the selected node has no row yet.
    pub fn restore<S: NodeSource>(
        &mut self,
        list: &LazyTreeList<S>,
        snapshot: &LazyTreeListSnapshot<S::Id>,
    ) -> bool {
        self.set_offset(snapshot.offset);
        let Some(id) = snapshot.selected else {
            list.select_index(None);
            self.sync_selection(list);
            return true;
        };
        let restored = match list.index_for_node(id) {
            Ok(index) => {
                list.select_index(Some(index));
                true
            }
            Err(err) => {
                log::debug!("cannot restore selection of {id:?}: {err}");
                false
            }
        };
        self.sync_selection(list);
        restored
    }

    pub fn select_first<S: NodeSource>(&mut self, list: &LazyTreeList<S>) {
        list.select_index((list.item_count() > 0).then_some(0));
        self.sync_selection(list);
    }

    pub fn select_last<S: NodeSource>(&mut self, list: &LazyTreeList<S>) {
        list.select_index(list.item_count().checked_sub(1));
        self.sync_selection(list);
    }

    /// Moves selection to the previous row.
    pub fn select_prev<S: NodeSource>(&mut self, list: &LazyTreeList<S>) {
        self.select_by(list, |selected, _| selected.saturating_sub(1));
    }

    /// Moves selection to the next row.
    pub fn select_next<S: NodeSource>(&mut self, list: &LazyTreeList<S>) {
        self.select_by(list, |selected, _| selected + 1);
    }

    pub fn page_up<S: NodeSource>(&mut self, list: &LazyTreeList<S>) {
        self.select_by(list, |selected, page| selected.saturating_sub(page));
    }

    pub fn page_down<S: NodeSource>(&mut self, list: &LazyTreeList<S>) {
        self.select_by(list, |selected, page| selected + page);
    }

    fn select_by<S, F>(&mut self, list: &LazyTreeList<S>, step: F)
    where
        S: NodeSource,
        F: FnOnce(usize, usize) -> usize,
    {
        if list.item_count() == 0 {
            list.select_index(None);
        } else {
            let selected = list.selected_index().unwrap_or(0);
            // select_index clamps to the last row.
            list.select_index(Some(step(selected, self.viewport_height)));
        }
        self.sync_selection(list);
    }

    /// Adjusts scroll offset so the selection is within the viewport.
    pub fn ensure_selection_visible(&mut self, item_count: usize, viewport_height: usize) {
        let viewport_height = viewport_height.max(1);
        self.clamp_offset(item_count, viewport_height);
        let Some(selected) = self.table_state.selected() else {
            return;
        };
        let offset = self.table_state.offset();
        if selected < offset {
            *self.table_state.offset_mut() = selected;
        } else if selected >= offset + viewport_height {
            *self.table_state.offset_mut() = selected + 1 - viewport_height;
        }
    }

    /// Adjusts selection visibility according to the provided scroll policy.
    pub fn ensure_selection_visible_with_policy(
        &mut self,
        item_count: usize,
        viewport_height: usize,
        policy: TreeScrollPolicy,
    ) {
        match policy {
            TreeScrollPolicy::KeepInView => {
                self.ensure_selection_visible(item_count, viewport_height);
            }
            TreeScrollPolicy::CenterOnSelect => {
                self.ensure_selection_visible_centered(item_count, viewport_height);
            }
        }
    }

    fn ensure_selection_visible_centered(&mut self, item_count: usize, viewport_height: usize) {
        let viewport_height = viewport_height.max(1);
        let Some(selected) = self.table_state.selected() else {
            self.clamp_offset(item_count, viewport_height);
            return;
        };
        if item_count <= viewport_height {
            *self.table_state.offset_mut() = 0;
            return;
        }

        // Center selection, then clamp to valid scroll range.
        let half = viewport_height / 2;
        let max_offset = item_count.saturating_sub(viewport_height);
        *self.table_state.offset_mut() = selected.saturating_sub(half).min(max_offset);
    }

    // Collapsing can shrink the list below the current scroll position.
    fn clamp_offset(&mut self, item_count: usize, viewport_height: usize) {
        let max_offset = item_count.saturating_sub(viewport_height);
        if self.table_state.offset() > max_offset {
            *self.table_state.offset_mut() = max_offset;
        }
    }

    /// Handles an action against the list, awaiting any fetch it triggers.
    pub async fn handle_action<S: NodeSource, C>(
        &mut self,
        list: &LazyTreeList<S>,
        action: TreeAction<C>,
    ) -> TreeEvent<C> {
        if matches!(&action, TreeAction::Custom(_)) {
            return TreeEvent::Action(action);
        }

        if list.item_count() == 0 {
            return TreeEvent::Unhandled;
        }

        let handled = match action {
            TreeAction::SelectPrev => {
                self.select_prev(list);
                true
            }
            TreeAction::SelectNext => {
                self.select_next(list);
                true
            }
            TreeAction::SelectFirst => {
                self.select_first(list);
                true
            }
            TreeAction::SelectLast => {
                self.select_last(list);
                true
            }
            TreeAction::PageUp => {
                self.page_up(list);
                true
            }
            TreeAction::PageDown => {
                self.page_down(list);
                true
            }
            TreeAction::SelectParent => self.select_parent(list).await,
            TreeAction::SelectChild => self.select_child(list).await,
            TreeAction::ToggleNode => self.toggle_selected(list).await,
            TreeAction::CollapseAll => self.collapse_all(list),
            TreeAction::Custom(_) => return TreeEvent::Action(action),
        };
        self.sync_selection(list);
        if handled {
            TreeEvent::Handled
        } else {
            TreeEvent::Unhandled
        }
    }

    #[cfg(feature = "keymap")]
    /// Resolves a key event into an action and handles it.
    pub async fn handle_key<S: NodeSource>(
        &mut self,
        list: &LazyTreeList<S>,
        key: KeyEvent,
    ) -> TreeEvent<()> {
        let Some(action) = self.keymap.resolve(key) else {
            return TreeEvent::Unhandled;
        };
        self.handle_action(list, action).await
    }

    #[cfg(feature = "keymap")]
    /// Resolves a key event with a custom mapping and handles it.
    pub async fn handle_key_with<S, C, F>(
        &mut self,
        list: &LazyTreeList<S>,
        key: KeyEvent,
        custom: F,
    ) -> TreeEvent<C>
    where
        S: NodeSource,
        F: Fn(KeyEvent) -> Option<C>,
    {
        let Some(action) = self.keymap.resolve_with(key, custom) else {
            return TreeEvent::Unhandled;
        };
        self.handle_action(list, action).await
    }

    async fn select_parent<S: NodeSource>(&mut self, list: &LazyTreeList<S>) -> bool {
        let Some(item) = self.selected_item(list) else {
            return false;
        };
        if item.is_open_row()
            && item.is_expanded
            && Self::set_expanded(list, item.id, false).await
        {
            return true;
        }

        // Closing rows and placeholders belong to `item.id`; open rows go up one level.
        let target = if item.is_open_row() {
            item.node().and_then(|node| node.parent)
        } else {
            Some(item.id)
        };
        let Some(target) = target.filter(|id| Some(*id) != list.root()) else {
            return false;
        };
        match list.index_for_node(target) {
            Ok(index) => {
                list.select_index(Some(index));
                true
            }
            Err(_) => false,
        }
    }

    async fn select_child<S: NodeSource>(&mut self, list: &LazyTreeList<S>) -> bool {
        let Some(item) = self.selected_item(list) else {
            return false;
        };
        if !item.is_open_row() {
            return false;
        }
        if !item.is_expanded {
            return Self::set_expanded(list, item.id, true).await;
        }
        match list.index_for_node(item.id) {
            Ok(index) if index + 1 < list.item_count() => {
                list.select_index(Some(index + 1));
                true
            }
            _ => false,
        }
    }

    async fn toggle_selected<S: NodeSource>(&mut self, list: &LazyTreeList<S>) -> bool {
        let Some(item) = self.selected_item(list) else {
            return false;
        };
        if item.is_placeholder() {
            return false;
        }
        let toggled = Self::set_expanded(list, item.id, !item.is_expanded).await;
        if toggled
            && item.is_tail
            && let Ok(index) = list.index_for_node(item.id)
        {
            // The closing row is gone; keep the selection on the node.
            list.select_index(Some(index));
        }
        toggled
    }

    fn collapse_all<S: NodeSource>(&mut self, list: &LazyTreeList<S>) -> bool {
        let selected = self.selected_item(list).map(|item| item.id);
        if let Err(err) = list.collapse_all() {
            log::error!("collapse all failed: {err}");
            return false;
        }
        // Follow the selection to its top-level ancestor, which stays listed.
        if let Some(top) = selected.and_then(|id| Self::top_level_ancestor(list, id))
            && let Ok(index) = list.index_for_node(top)
        {
            list.select_index(Some(index));
        }
        self.set_offset(0);
        true
    }

    fn top_level_ancestor<S: NodeSource>(list: &LazyTreeList<S>, id: S::Id) -> Option<S::Id> {
        let root = list.root()?;
        let mut current = id;
        loop {
            let parent = list.source().node(current)?.parent?;
            if parent == root {
                return Some(current);
            }
            current = parent;
        }
    }

    async fn set_expanded<S: NodeSource>(list: &LazyTreeList<S>, id: S::Id, expand: bool) -> bool {
        let before = list.is_expanded(id);
        match list.toggle_node_expanded(id, expand).await {
            Ok(()) => list.is_expanded(id) != before,
            Err(err) => {
                log::warn!("cannot toggle {id:?}: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::config::LazyTreeConfig;
    use crate::memory::MemorySource;
    use crate::source::NodeKind;

    type List = LazyTreeList<MemorySource<&'static str>>;

    // root(0) -> a(1) -> {b(2), c(3) -> d(4)}; root -> e(5)
    fn loaded_list() -> List {
        let source = MemorySource::new(0, NodeKind::Container, "root");
        source.add_child(0, 1, NodeKind::Container, "a");
        source.add_child(1, 2, NodeKind::Leaf, "b");
        source.add_child(1, 3, NodeKind::Container, "c");
        source.add_child(3, 4, NodeKind::Leaf, "d");
        source.add_child(0, 5, NodeKind::Leaf, "e");
        let list = LazyTreeList::new(source, LazyTreeConfig::new().auto_expand_on_register(false));
        block_on(list.register_root_node_id(0, 0));
        list
    }

    fn act(state: &mut LazyTreeListState, list: &List, action: TreeAction) -> TreeEvent {
        block_on(state.handle_action(list, action))
    }

    fn selected_id(state: &LazyTreeListState, list: &List) -> Option<u32> {
        state.selected_item(list).map(|item| item.id)
    }

    #[test]
    fn select_prev_clears_selection_when_empty() {
        let source = MemorySource::new(0, NodeKind::Container, "root");
        let list = LazyTreeList::new(source, LazyTreeConfig::new());
        let mut state = LazyTreeListState::new();

        state.select_prev(&list);

        assert_eq!(list.selected_index(), None);
        assert_eq!(state.table_state().selected(), None);
    }

    #[test]
    fn select_child_expands_then_descends() {
        let list = loaded_list();
        let mut state = LazyTreeListState::new();
        state.select_first(&list);
        assert_eq!(selected_id(&state, &list), Some(1));

        assert_eq!(act(&mut state, &list, TreeAction::SelectChild), TreeEvent::Handled);
        assert!(list.is_expanded(1));
        assert_eq!(selected_id(&state, &list), Some(1));

        act(&mut state, &list, TreeAction::SelectChild);
        assert_eq!(selected_id(&state, &list), Some(2));
    }

    #[test]
    fn select_parent_collapses_or_moves_up() {
        let list = loaded_list();
        let mut state = LazyTreeListState::new();
        state.select_first(&list);
        act(&mut state, &list, TreeAction::SelectChild);
        act(&mut state, &list, TreeAction::SelectChild);
        assert_eq!(selected_id(&state, &list), Some(2));

        act(&mut state, &list, TreeAction::SelectParent);
        assert_eq!(list.selected_index(), Some(0));

        act(&mut state, &list, TreeAction::SelectParent);
        assert!(!list.is_expanded(1));
        // Top-level row has no listed parent.
        assert_eq!(act(&mut state, &list, TreeAction::SelectParent), TreeEvent::Unhandled);
    }

    #[test]
    fn select_parent_moves_up_from_leaf_loaded_within_depth() {
        let source = MemorySource::new(0, NodeKind::Container, "root");
        source.add_child(0, 1, NodeKind::Container, "a");
        source.add_child(1, 2, NodeKind::Leaf, "b");
        let list = LazyTreeList::new(source, LazyTreeConfig::new());
        block_on(list.register_root_node_id(0, 2));
        let mut state = LazyTreeListState::new();
        list.select_index(Some(1));
        assert_eq!(selected_id(&state, &list), Some(2));
        assert!(!list.is_expanded(2));

        assert_eq!(act(&mut state, &list, TreeAction::SelectParent), TreeEvent::Handled);
        assert_eq!(list.selected_index(), Some(0));
        assert!(list.is_expanded(1));
    }

    #[test]
    fn toggling_from_tail_row_keeps_node_selected() {
        let list = loaded_list();
        let mut state = LazyTreeListState::new();
        state.select_first(&list);
        act(&mut state, &list, TreeAction::ToggleNode);
        // a, b, c, a/, e
        assert_eq!(list.item_count(), 5);

        list.select_index(Some(3));
        assert!(state.selected_item(&list).is_some_and(|item| item.is_tail));
        act(&mut state, &list, TreeAction::ToggleNode);

        assert!(!list.is_expanded(1));
        assert_eq!(list.selected_index(), Some(0));
    }

    #[test]
    fn collapse_all_selects_top_level_ancestor() {
        let list = loaded_list();
        let mut state = LazyTreeListState::new();
        block_on(list.toggle_node_expanded(1, true)).unwrap();
        block_on(list.toggle_node_expanded(3, true)).unwrap();
        let leaf = list.index_for_node(4).unwrap();
        list.select_index(Some(leaf));

        act(&mut state, &list, TreeAction::CollapseAll);

        assert_eq!(list.item_count(), 2);
        assert_eq!(selected_id(&state, &list), Some(1));
        assert_eq!(state.offset(), 0);
    }

    #[test]
    fn snapshot_restores_selection_by_id_after_reload() {
        let list = loaded_list();
        let mut state = LazyTreeListState::new();
        list.select_index(Some(1));
        let snapshot = state.snapshot(&list);
        assert_eq!(snapshot.selected, Some(5));

        block_on(list.register_root_node_id(0, 0));
        block_on(list.toggle_node_expanded(1, true)).unwrap();

        assert!(state.restore(&list, &snapshot));
        assert_eq!(selected_id(&state, &list), Some(5));
        assert_eq!(list.selected_index(), Some(4));
    }

    #[test]
    fn keep_in_view_scrolls_minimally() {
        let mut state = LazyTreeListState::new();
        state.table_state.select(Some(9));

        state.ensure_selection_visible(20, 4);
        assert_eq!(state.offset(), 6);

        state.table_state.select(Some(2));
        state.ensure_selection_visible(20, 4);
        assert_eq!(state.offset(), 2);

        state.ensure_selection_visible_with_policy(20, 4, TreeScrollPolicy::CenterOnSelect);
        assert_eq!(state.offset(), 0);
    }

    #[test]
    fn custom_actions_are_forwarded() {
        let list = loaded_list();
        let mut state = LazyTreeListState::new();
        let event = block_on(state.handle_action(&list, TreeAction::Custom('x')));
        assert_eq!(event, TreeEvent::Action(TreeAction::Custom('x')));
    }
}
