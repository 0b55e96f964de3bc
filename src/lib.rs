//! Lazily loaded tree flattened into a virtualized list, with a ratatui widget.
//!
//! A [`LazyTreeList`] pulls nodes from a [`NodeSource`] on demand and keeps a
//! per-node weight (rows occupied by the expanded subtree) so that row index
//! and node can be resolved in both directions without materializing the
//! flattened list. [`LazyTreeListView`] renders the rows inside the viewport.
//!
//! Feature flags:
//! - `keymap`: crossterm-based key bindings and `LazyTreeListState::handle_key*` helpers.
//! - `serde`: serde support for `LazyTreeConfig`, `Metadata` and `LazyTreeListSnapshot`.

mod action;
mod config;
mod context;
mod error;
mod glyphs;
mod index;
mod item;
#[cfg(feature = "keymap")]
mod keymap;
mod list;
mod memory;
mod merge;
mod metadata;
pub mod prelude;
mod source;
mod state;
mod style;
mod widget;

pub use action::{TreeAction, TreeEvent};
pub use config::LazyTreeConfig;
pub use context::TreeRowContext;
pub use error::{Result, TreeError};
pub use glyphs::{
    TreeGlyphs, TreeLabelPrefix, TreeLabelProvider, TreeLabelRenderer, tree_label_line,
    tree_name_cell,
};
pub use item::{Item, ItemContent};
#[cfg(feature = "keymap")]
pub use keymap::{KeymapProfile, TreeKeyBindings};
pub use list::{LazyTreeList, ListEvent, SubscriptionId};
pub use memory::{FetchCall, MemorySource};
pub use metadata::{Metadata, MetadataStore};
pub use source::{NodeData, NodeKind, NodeSource};
pub use state::{LazyTreeListSnapshot, LazyTreeListState};
pub use style::{LazyTreeListStyle, TreeScrollPolicy};
pub use widget::LazyTreeListView;
