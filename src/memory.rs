//! In-memory [`NodeSource`] that reveals a fixed tree level by level.
//!
//! The full tree is known up front (as a server would know it); `node` only
//! answers for nodes that a fetch has revealed. Fetch latency is simulated by
//! yielding to the executor a configurable number of times, which lets tests
//! force out-of-order completion of concurrent fetches on a single thread.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::poll_fn;
use std::rc::Rc;
use std::task::Poll;

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Result, TreeError};
use crate::source::{NodeData, NodeKind, NodeSource};

/// Fetch recorded by [`MemorySource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchCall {
    Subtree { root: u32, depth: u32 },
    AncestorPath { leaf: u32 },
}

pub struct MemorySource<P> {
    root: u32,
    nodes: RefCell<FxHashMap<u32, Rc<NodeData<u32, P>>>>,
    revealed: RefCell<FxHashSet<u32>>,
    latency: RefCell<FxHashMap<u32, u32>>,
    default_latency: Cell<u32>,
    failing: RefCell<FxHashSet<u32>>,
    fail_ancestor_paths: Cell<bool>,
    calls: RefCell<Vec<FetchCall>>,
}

impl<P: Clone> MemorySource<P> {
    /// Creates a source holding only `root`, which is revealed from the start.
    pub fn new(root: u32, kind: NodeKind, payload: P) -> Self {
        let mut nodes = FxHashMap::default();
        nodes.insert(root, Rc::new(NodeData::new(root, None, kind, payload)));
        let mut revealed = FxHashSet::default();
        revealed.insert(root);
        Self {
            root,
            nodes: RefCell::new(nodes),
            revealed: RefCell::new(revealed),
            latency: RefCell::default(),
            default_latency: Cell::new(0),
            failing: RefCell::default(),
            fail_ancestor_paths: Cell::new(false),
            calls: RefCell::default(),
        }
    }

    pub const fn root(&self) -> u32 {
        self.root
    }

    /// Appends a node to `parent`'s children.
    ///
    /// # Panics
    ///
    /// Panics if `parent` was never added.
    pub fn add_child(&self, parent: u32, id: u32, kind: NodeKind, payload: P) {
        let mut nodes = self.nodes.borrow_mut();
        let parent_node = nodes
            .get_mut(&parent)
            .unwrap_or_else(|| panic!("unknown parent {parent}"));
        Rc::make_mut(parent_node).children.push(id);
        nodes.insert(id, Rc::new(NodeData::new(id, Some(parent), kind, payload)));
    }

    /// Number of nodes in the full tree.
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Marks `id`'s children as fetched.
    pub fn reveal(&self, id: u32) {
        let nodes = self.nodes.borrow();
        let mut revealed = self.revealed.borrow_mut();
        revealed.insert(id);
        if let Some(node) = nodes.get(&id) {
            revealed.extend(node.children.iter().copied());
        }
    }

    /// Marks every node as fetched.
    pub fn reveal_all(&self) {
        let nodes = self.nodes.borrow();
        self.revealed.borrow_mut().extend(nodes.keys().copied());
    }

    /// Forgets every fetch except the root's own data.
    pub fn reset_revealed(&self) {
        let mut revealed = self.revealed.borrow_mut();
        revealed.clear();
        revealed.insert(self.root);
    }

    pub fn is_revealed(&self, id: u32) -> bool {
        self.revealed.borrow().contains(&id)
    }

    /// Number of executor yields before a fetch rooted at `id` completes.
    pub fn set_latency(&self, id: u32, yields: u32) {
        self.latency.borrow_mut().insert(id, yields);
    }

    pub fn set_default_latency(&self, yields: u32) {
        self.default_latency.set(yields);
    }

    /// Makes subtree fetches rooted at `id` fail (or succeed again).
    pub fn set_failing(&self, id: u32, failing: bool) {
        let mut failing_ids = self.failing.borrow_mut();
        if failing {
            failing_ids.insert(id);
        } else {
            failing_ids.remove(&id);
        }
    }

    pub fn set_fail_ancestor_paths(&self, failing: bool) {
        self.fail_ancestor_paths.set(failing);
    }

    /// Fetches issued so far, in call order.
    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.borrow().clone()
    }

    async fn simulate_latency(&self, id: u32) {
        let yields = self
            .latency
            .borrow()
            .get(&id)
            .copied()
            .unwrap_or_else(|| self.default_latency.get());
        for _ in 0..yields {
            yield_now().await;
        }
    }

    fn descendants_within(&self, root: u32, depth: u32) -> Vec<u32> {
        let nodes = self.nodes.borrow();
        let mut found = Vec::new();
        let mut queue = VecDeque::from([(root, 0_u32)]);
        while let Some((id, level)) = queue.pop_front() {
            let Some(node) = nodes.get(&id) else {
                continue;
            };
            for child in node.children.iter().copied() {
                found.push(child);
                if level < depth {
                    queue.push_back((child, level + 1));
                }
            }
        }
        found
    }
}

async fn yield_now() {
    let mut yielded = false;
    poll_fn(|cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await;
}

#[async_trait(?Send)]
impl<P: Clone> NodeSource for MemorySource<P> {
    type Id = u32;
    type Payload = P;

    fn node(&self, id: u32) -> Option<Rc<NodeData<u32, P>>> {
        if !self.revealed.borrow().contains(&id) {
            return None;
        }
        self.nodes.borrow().get(&id).cloned()
    }

    async fn fetch_subtree(&self, root: u32, depth: u32) -> Result<Vec<u32>> {
        self.calls.borrow_mut().push(FetchCall::Subtree { root, depth });
        self.simulate_latency(root).await;
        if self.failing.borrow().contains(&root) {
            return Err(TreeError::FetchFailed(format!("subtree of {root} unavailable")));
        }
        if !self.nodes.borrow().contains_key(&root) {
            return Err(TreeError::FetchFailed(format!("unknown node {root}")));
        }

        let ids = self.descendants_within(root, depth);
        let mut revealed = self.revealed.borrow_mut();
        revealed.insert(root);
        revealed.extend(ids.iter().copied());
        Ok(ids)
    }

    async fn fetch_ancestor_path(&self, leaf: u32) -> Result<Vec<u32>> {
        self.calls.borrow_mut().push(FetchCall::AncestorPath { leaf });
        self.simulate_latency(leaf).await;
        if self.fail_ancestor_paths.get() {
            return Err(TreeError::FetchFailed(format!("path to {leaf} unavailable")));
        }

        let nodes = self.nodes.borrow();
        let mut path = Vec::new();
        let mut current = Some(leaf);
        while let Some(id) = current {
            let node = nodes
                .get(&id)
                .ok_or_else(|| TreeError::FetchFailed(format!("unknown node {id}")))?;
            path.push(id);
            current = node.parent;
        }
        path.reverse();
        Ok(path)
    }
}
