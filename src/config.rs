/// Loading behaviour of a [`LazyTreeList`](crate::LazyTreeList).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LazyTreeConfig {
    /// Levels fetched below a node that is expanded before its subtree is
    /// fully loaded (0 = immediate children only).
    pub expand_load_depth: u32,
    /// Selects the first row once the initial root load produces rows.
    pub select_first_on_load: bool,
    /// Expands nodes within the requested depth on root registration.
    pub auto_expand_on_register: bool,
}

impl LazyTreeConfig {
    /// Default configuration: one extra level per expansion, auto-select and auto-expand.
    pub const fn new() -> Self {
        Self {
            expand_load_depth: 1,
            select_first_on_load: true,
            auto_expand_on_register: true,
        }
    }

    pub const fn expand_load_depth(mut self, depth: u32) -> Self {
        self.expand_load_depth = depth;
        self
    }

    pub const fn select_first_on_load(mut self, select: bool) -> Self {
        self.select_first_on_load = select;
        self
    }

    pub const fn auto_expand_on_register(mut self, expand: bool) -> Self {
        self.auto_expand_on_register = expand;
        self
    }
}

impl Default for LazyTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}
