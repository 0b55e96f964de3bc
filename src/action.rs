/// Actions that a user or application can initiate on the list view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeAction<Custom = ()> {
    /// Move selection to the previous row.
    SelectPrev,
    /// Move selection to the next row.
    SelectNext,
    /// Collapse the selected node, or move to its parent's opening row.
    SelectParent,
    /// Expand the selected node, or move to its first child row.
    SelectChild,
    /// Toggle expansion of the selected node (closing rows toggle their node too).
    ToggleNode,
    /// Collapse every node below the root.
    CollapseAll,
    /// Select the first row.
    SelectFirst,
    /// Select the last row.
    SelectLast,
    /// Move selection one viewport up.
    PageUp,
    /// Move selection one viewport down.
    PageDown,
    /// Custom action forwarded to the caller without internal handling.
    Custom(Custom),
}

/// Result of handling an action or key event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeEvent<Custom = ()> {
    /// The action was handled internally and state was updated.
    Handled,
    /// The action was ignored (e.g., nothing selected / nothing to do).
    Unhandled,
    /// The action is forwarded to the caller for handling.
    Action(TreeAction<Custom>),
}
