pub use crate::{
    Item, ItemContent, LazyTreeConfig, LazyTreeList, LazyTreeListSnapshot, LazyTreeListState,
    LazyTreeListStyle, LazyTreeListView, ListEvent, NodeData, NodeKind, NodeSource, TreeAction,
    TreeError, TreeEvent, TreeGlyphs, TreeLabelPrefix, TreeLabelProvider, TreeLabelRenderer,
    TreeRowContext, TreeScrollPolicy, tree_label_line, tree_name_cell,
};

#[cfg(feature = "keymap")]
pub use crate::{KeymapProfile, TreeKeyBindings};
