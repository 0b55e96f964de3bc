use ratatui::style::Style;

/// Per-row layout facts handed to label renderers.
#[derive(Clone, Copy, Debug)]
pub struct TreeRowContext {
    pub level: u16,
    pub is_expanded: bool,
    pub has_children: bool,
    /// Closing row of an expanded container.
    pub is_tail: bool,
    /// Stand-in row for children that are still loading.
    pub is_placeholder: bool,
    pub line_style: Style,
}
