use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::Borders;

/// Scroll behaviour when the selected row changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeScrollPolicy {
    KeepInView,
    CenterOnSelect,
}

/// Visual settings of [`LazyTreeListView`](crate::LazyTreeListView).
#[derive(Clone)]
pub struct LazyTreeListStyle<'a> {
    pub title: Option<Line<'a>>,
    pub block_style: Style,
    pub border_style: Style,
    pub highlight_style: Style,
    pub line_style: Style,
    pub tail_style: Style,
    pub placeholder_style: Style,
    pub error_style: Style,
    pub highlight_symbol: &'a str,
    /// Text of a row whose children are still being fetched.
    pub placeholder_text: &'a str,
    /// Shown instead of rows while the list is empty and loading.
    pub loading_text: &'a str,
    /// Shown instead of rows once a fetch failed.
    pub error_text: &'a str,
    pub borders: Borders,
    pub scroll_policy: TreeScrollPolicy,
}

impl Default for LazyTreeListStyle<'_> {
    fn default() -> Self {
        Self {
            title: None,
            block_style: Style::default(),
            border_style: Style::default(),
            highlight_style: Style::default().add_modifier(Modifier::REVERSED),
            line_style: Style::default(),
            tail_style: Style::default().add_modifier(Modifier::DIM),
            placeholder_style: Style::default().add_modifier(Modifier::ITALIC),
            error_style: Style::default(),
            highlight_symbol: ">> ",
            placeholder_text: "loading",
            loading_text: "Loading…",
            error_text: "Failed to load tree",
            borders: Borders::ALL,
            scroll_policy: TreeScrollPolicy::KeepInView,
        }
    }
}
