use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use futures::future::try_join_all;
use smallvec::SmallVec;

use crate::config::LazyTreeConfig;
use crate::error::{Result, TreeError};
use crate::index;
use crate::item::Item;
use crate::merge::{ExpansionHint, merge_ids};
use crate::metadata::{Metadata, MetadataStore};
use crate::source::{NodeData, NodeSource};

/// Notification delivered to subscribers of a [`LazyTreeList`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListEvent {
    /// Row count or row contents changed; re-render.
    Invalidated,
    /// A fetch started while idle (`true`) or the last fetch finished (`false`).
    LoadingChanged(bool),
    /// A fetch failed; the list is now in its error state.
    Errored,
    SelectionChanged(Option<usize>),
}

/// Handle returned by [`LazyTreeList::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Rc<dyn Fn(&ListEvent)>;

struct ListInner<Id> {
    store: MetadataStore<Id>,
    root: Option<Id>,
    // Bumped by root registration and destroy; fetches started under an
    // older generation are discarded.
    generation: u64,
    // Bumped by every reveal; only the newest reveal expands its path.
    reveal_ticket: u64,
    active: bool,
    errored: bool,
    in_flight: usize,
    selected: Option<usize>,
    version: u64,
}

/// Flattened, virtualized view over a lazily loaded tree.
///
/// All methods take `&self`: state lives in a `RefCell` that is never held
/// across an `.await`, so several loads may be in flight at once on a single
/// thread. Fetch results are merged synchronously between suspension points.
pub struct LazyTreeList<S: NodeSource> {
    source: S,
    config: LazyTreeConfig,
    inner: RefCell<ListInner<S::Id>>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_subscription: Cell<u64>,
}

/// Keeps the in-flight counter balanced even if a fetch future is dropped.
struct LoadingGuard<'a, S: NodeSource> {
    list: &'a LazyTreeList<S>,
}

impl<S: NodeSource> Drop for LoadingGuard<'_, S> {
    fn drop(&mut self) {
        let now_idle = {
            let mut inner = self.list.inner.borrow_mut();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            inner.in_flight == 0
        };
        if now_idle {
            self.list.emit(ListEvent::LoadingChanged(false));
        }
    }
}

impl<S: NodeSource> LazyTreeList<S> {
    pub fn new(source: S, config: LazyTreeConfig) -> Self {
        Self {
            source,
            config,
            inner: RefCell::new(ListInner {
                store: MetadataStore::new(),
                root: None,
                generation: 0,
                reveal_ticket: 0,
                active: true,
                errored: false,
                in_flight: 0,
                selected: None,
                version: 0,
            }),
            listeners: RefCell::new(Vec::new()),
            next_subscription: Cell::new(0),
        }
    }

    pub const fn source(&self) -> &S {
        &self.source
    }

    pub const fn config(&self) -> &LazyTreeConfig {
        &self.config
    }

    /// Read access to the metadata store.
    pub fn store(&self) -> Ref<'_, MetadataStore<S::Id>> {
        Ref::map(self.inner.borrow(), |inner| &inner.store)
    }

    pub fn root(&self) -> Option<S::Id> {
        self.inner.borrow().root
    }

    pub fn is_loading(&self) -> bool {
        self.inner.borrow().in_flight > 0
    }

    pub fn did_error(&self) -> bool {
        self.inner.borrow().errored
    }

    /// `false` once [`destroy`](Self::destroy) was called.
    pub fn is_active(&self) -> bool {
        self.inner.borrow().active
    }

    /// Monotonic counter bumped on every invalidation.
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of rows; 0 without a root or in the error state.
    pub fn item_count(&self) -> usize {
        let inner = self.inner.borrow();
        match inner.root {
            Some(root) if !inner.errored => index::item_count(&inner.store, root),
            _ => 0,
        }
    }

    pub fn item_at_index(&self, index: usize) -> Result<Item<S::Id, S::Payload>> {
        let inner = self.inner.borrow();
        let root = match inner.root {
            Some(root) if !inner.errored => root,
            _ => return Err(TreeError::IndexOutOfRange { index, count: 0 }),
        };
        index::item_at_index(&inner.store, &self.source, root, index)
    }

    /// Row index of the node's opening row.
    pub fn index_for_node(&self, id: S::Id) -> Result<usize> {
        let inner = self.inner.borrow();
        let root = inner.root.ok_or_else(|| TreeError::not_found(id))?;
        index::index_for_node(&inner.store, &self.source, root, id)
    }

    /// Row index of any item, closing rows and placeholders included.
    pub fn index_for_item(&self, item: &Item<S::Id, S::Payload>) -> Result<usize> {
        let inner = self.inner.borrow();
        let root = inner.root.ok_or_else(|| TreeError::not_found(item.id))?;
        index::index_for_item(&inner.store, &self.source, root, item)
    }

    pub fn metadata(&self, id: S::Id) -> Result<Metadata> {
        self.inner.borrow().store.get(id).copied()
    }

    /// Returns `false` for unknown nodes.
    pub fn is_expanded(&self, id: S::Id) -> bool {
        self.inner
            .borrow()
            .store
            .lookup(id)
            .is_some_and(|meta| meta.is_expanded)
    }

    /// Whether expanding `id` would show anything: a displayable known child,
    /// or children that are not fetched yet.
    pub fn is_expandable(&self, id: S::Id) -> bool {
        let inner = self.inner.borrow();
        let (Some(meta), Some(node)) = (inner.store.lookup(id), self.source.node(id)) else {
            return false;
        };
        self.has_displayable_children(&inner.store, &node, meta)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.inner.borrow().selected
    }

    /// Selects a row (clamped to the item count) or clears the selection.
    pub fn select_index(&self, index: Option<usize>) {
        let count = self.item_count();
        let index = match index {
            Some(_) if count == 0 => None,
            Some(index) => Some(index.min(count - 1)),
            None => None,
        };
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let changed = inner.selected != index;
            inner.selected = index;
            changed
        };
        if changed {
            self.emit(ListEvent::SelectionChanged(index));
        }
    }

    /// Registers a listener for [`ListEvent`]s.
    pub fn subscribe(&self, listener: impl Fn(&ListEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.borrow_mut().retain(|(sub, _)| *sub != id);
    }

    /// Bumps the version and notifies subscribers.
    pub fn invalidate(&self) {
        self.inner.borrow_mut().version += 1;
        self.emit(ListEvent::Invalidated);
    }

    /// Deactivates the list: results of fetches still in flight are dropped
    /// when they resolve. Already merged state stays readable.
    pub fn destroy(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.active = false;
        inner.generation += 1;
        log::debug!("list destroyed at generation {}", inner.generation);
    }

    /// Sets a new root, discarding all previous state, and loads `depth`
    /// levels below it. Clears the error state.
    pub async fn register_root_node_id(&self, id: S::Id, depth: u32) {
        let had_selection = {
            let mut inner = self.inner.borrow_mut();
            inner.generation += 1;
            inner.active = true;
            inner.errored = false;
            inner.root = Some(id);
            inner.store.clear();
            inner.store.set(id, Metadata::root());
            inner.selected.take().is_some()
        };
        self.invalidate();
        if had_selection {
            self.emit(ListEvent::SelectionChanged(None));
        }

        let hint = if self.config.auto_expand_on_register {
            ExpansionHint::WithinDepth { root: id, depth }
        } else {
            ExpansionHint::Collapsed
        };
        if !self.load_and_process_node_sub_tree(id, depth, hint).await {
            return;
        }

        if self.config.select_first_on_load
            && self.selected_index().is_none()
            && self.item_count() > 0
        {
            self.select_index(Some(0));
        }
    }

    /// Expands or collapses a known node.
    ///
    /// Expanding a node whose subtree is not fully loaded fetches
    /// `expand_load_depth` more levels; a failing fetch puts the list into its
    /// error state rather than returning an error.
    pub async fn toggle_node_expanded(&self, id: S::Id, expand: bool) -> Result<()> {
        if !self.set_expanded_local(id, expand)? {
            return Ok(());
        }
        if !expand {
            return Ok(());
        }
        let fully_loaded = self.metadata(id)?.sub_tree_is_fully_loaded;
        if !fully_loaded {
            self.load_and_process_node_sub_tree(
                id,
                self.config.expand_load_depth,
                ExpansionHint::Collapsed,
            )
            .await;
        }
        Ok(())
    }

    /// Collapses every expanded node below the root.
    pub fn collapse_all(&self) -> Result<()> {
        {
            let mut inner = self.inner.borrow_mut();
            let Some(root) = inner.root else {
                return Ok(());
            };
            let mut nodes: Vec<(i32, S::Id)> = inner
                .store
                .iter()
                .filter(|(id, _)| **id != root)
                .map(|(id, meta)| (meta.depth, *id))
                .collect();
            nodes.sort_by(|a, b| b.0.cmp(&a.0));
            for (_, id) in &nodes {
                inner.store.get_mut(*id)?.is_expanded = false;
            }
            for (_, id) in nodes {
                inner.store.refresh(&self.source, id)?;
            }
            inner.store.refresh(&self.source, root)?;
        }
        self.invalidate();
        self.select_index(self.selected_index());
        Ok(())
    }

    /// Loads and expands the ancestor chain of `leaf`, then returns its row.
    ///
    /// Ancestor fetches run concurrently and their union is merged in one
    /// pass. Returns `None` on failure (the list enters its error state),
    /// when the list is already in its error state, when the list was reset
    /// or destroyed meanwhile, when a newer reveal superseded this one, or
    /// when `leaf` or one of its ancestors is hidden.
    pub async fn load_path_to_node(&self, leaf: S::Id) -> Option<usize> {
        let (root, generation, ticket) = {
            let mut inner = self.inner.borrow_mut();
            if inner.errored {
                log::debug!("not revealing {leaf:?}: list is in its error state");
                return None;
            }
            let root = inner.root?;
            inner.reveal_ticket += 1;
            (root, inner.generation, inner.reveal_ticket)
        };

        let path = {
            let _loading = self.begin_fetch();
            self.source.fetch_ancestor_path(leaf).await
        };
        if !self.is_current(generation) {
            log::debug!("discarding ancestor path of {leaf:?}: list was reset");
            return None;
        }
        let path = match path {
            Ok(path) => path,
            Err(err) => {
                self.fail(&err);
                return None;
            }
        };
        let Some(start) = path.iter().position(|id| *id == root) else {
            log::warn!("{leaf:?} is not below the registered root {root:?}");
            return None;
        };
        let path = &path[start..];
        let ancestors = &path[..path.len().saturating_sub(1)];

        // Expand the already known, displayable prefix right away.
        for id in ancestors.iter().skip(1).copied() {
            let inner = self.inner.borrow();
            if inner.reveal_ticket != ticket
                || !inner.store.contains(id)
                || !self.is_displayable(id)
            {
                break;
            }
            drop(inner);
            if self.set_expanded_local(id, true).is_err() {
                break;
            }
        }

        let pending: SmallVec<[S::Id; 16]> = ancestors
            .iter()
            .copied()
            .filter(|id| {
                self.inner
                    .borrow()
                    .store
                    .lookup(*id)
                    .is_none_or(|meta| !meta.children_can_be_rendered)
            })
            .collect();
        // The first failure drops the remaining fetches; nothing is merged.
        let results = try_join_all(pending.iter().map(|id| async move {
            let _loading = self.begin_fetch();
            self.source.fetch_subtree(*id, 0).await
        }))
        .await;

        if !self.is_current(generation) {
            log::debug!("discarding reveal of {leaf:?}: list was reset");
            return None;
        }
        let ids: Vec<S::Id> = match results {
            Ok(fetched) => fetched.into_iter().flatten().collect(),
            Err(err) => {
                self.fail(&err);
                return None;
            }
        };
        if let Err(err) = self.merge(ids, ExpansionHint::Collapsed) {
            self.fail(&err);
            return None;
        }

        {
            let inner = self.inner.borrow();
            if inner.reveal_ticket != ticket {
                log::debug!("reveal of {leaf:?} superseded");
                return None;
            }
            if inner.errored {
                return None;
            }
        }
        if let Some(hidden) = path.iter().skip(1).find(|id| !self.is_displayable(**id)) {
            log::debug!("not revealing {leaf:?}: {hidden:?} is hidden");
            return None;
        }
        for id in ancestors.iter().skip(1).copied() {
            if let Err(err) = self.set_expanded_local(id, true) {
                self.fail(&err);
                return None;
            }
        }

        match self.index_for_node(leaf) {
            Ok(index) => Some(index),
            Err(err) => {
                log::error!("revealed {leaf:?} but could not resolve its row: {err}");
                None
            }
        }
    }

    /// Fetches `depth` levels below `id` and merges the result.
    ///
    /// Returns `false` if the fetch failed (error state set) or its result
    /// was discarded as stale.
    pub(crate) async fn load_and_process_node_sub_tree(
        &self,
        id: S::Id,
        depth: u32,
        hint: ExpansionHint<S::Id>,
    ) -> bool {
        let generation = self.inner.borrow().generation;
        let result = {
            let _loading = self.begin_fetch();
            self.source.fetch_subtree(id, depth).await
        };
        if !self.is_current(generation) {
            log::debug!("discarding subtree of {id:?}: list was reset");
            return false;
        }
        let merged = result.and_then(|ids| self.merge(ids, hint));
        match merged {
            Ok(_) => true,
            Err(err) => {
                self.fail(&err);
                false
            }
        }
    }

    /// Flips expansion without fetching; returns whether anything changed.
    fn set_expanded_local(&self, id: S::Id, expand: bool) -> Result<bool> {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.root == Some(id) {
                return Ok(false);
            }
            let node = self.source.node(id).ok_or_else(|| TreeError::not_found(id))?;
            let meta = *inner.store.get(id)?;
            if meta.is_expanded == expand || !self.has_displayable_children(&inner.store, &node, &meta) {
                return Ok(false);
            }

            let before = meta.weight();
            let meta = inner.store.get_mut(id)?;
            meta.is_expanded = expand;
            let after = meta.weight();
            let delta = isize::try_from(after).unwrap_or(isize::MAX)
                - isize::try_from(before).unwrap_or(isize::MAX);
            inner.store.propagate_delta(&self.source, id, delta)?;
        }
        self.invalidate();
        Ok(true)
    }

    fn is_displayable(&self, id: S::Id) -> bool {
        self.source
            .node(id)
            .is_some_and(|node| self.source.should_display(&node))
    }

    fn has_displayable_children(
        &self,
        store: &MetadataStore<S::Id>,
        node: &NodeData<S::Id, S::Payload>,
        meta: &Metadata,
    ) -> bool {
        if !meta.children_can_be_rendered {
            return !node.children.is_empty();
        }
        node.children.iter().copied().any(|child_id| {
            store.contains(child_id)
                && self
                    .source
                    .node(child_id)
                    .is_some_and(|child| self.source.should_display(&child))
        })
    }

    fn merge(&self, ids: Vec<S::Id>, hint: ExpansionHint<S::Id>) -> Result<usize> {
        let added = {
            let mut inner = self.inner.borrow_mut();
            merge_ids(&mut inner.store, &self.source, ids, hint)?
        };
        if added > 0 {
            self.invalidate();
        }
        Ok(added)
    }

    fn begin_fetch(&self) -> LoadingGuard<'_, S> {
        let started = {
            let mut inner = self.inner.borrow_mut();
            inner.in_flight += 1;
            inner.in_flight == 1
        };
        if started {
            self.emit(ListEvent::LoadingChanged(true));
        }
        LoadingGuard { list: self }
    }

    fn is_current(&self, generation: u64) -> bool {
        let inner = self.inner.borrow();
        inner.active && inner.generation == generation
    }

    fn fail(&self, err: &TreeError) {
        log::error!("lazy tree load failed: {err}");
        {
            let mut inner = self.inner.borrow_mut();
            inner.errored = true;
            inner.selected = None;
        }
        self.emit(ListEvent::Errored);
        self.invalidate();
    }

    fn emit(&self, event: ListEvent) {
        let listeners: SmallVec<[Listener; 4]> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}
