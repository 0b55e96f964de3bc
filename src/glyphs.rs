use std::borrow::Cow;

use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Cell;

use crate::context::TreeRowContext;
use crate::item::Item;
use crate::source::{NodeData, NodeSource};

#[derive(Clone, Copy, Debug)]
pub struct TreeGlyphs<'a> {
    pub indent: &'a str,
    pub leaf: &'a str,
    pub expanded: &'a str,
    pub collapsed: &'a str,
    /// Marker in front of a closing row.
    pub tail: &'a str,
    /// Marker in front of a loading placeholder.
    pub loading: &'a str,
}

impl TreeGlyphs<'static> {
    pub const fn unicode() -> Self {
        Self {
            indent: "  ",
            leaf: "•",
            expanded: "▼",
            collapsed: "▶",
            tail: "└",
            loading: "…",
        }
    }

    pub const fn ascii() -> Self {
        Self {
            indent: "  ",
            leaf: "*",
            expanded: "v",
            collapsed: ">",
            tail: "`",
            loading: "~",
        }
    }
}

#[derive(Clone, Debug)]
pub struct TreeLabelPrefix<'a> {
    pub name: Cow<'a, str>,
    pub prefix: Option<Cow<'a, str>>,
}

impl<'a> TreeLabelPrefix<'a> {
    pub fn new(name: impl Into<Cow<'a, str>>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
        }
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<Cow<'a, str>>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
}

/// Supplies the text of a node row; indentation and glyphs are added for you.
///
/// `ctx.is_tail` tells opening and closing rows apart.
pub trait TreeLabelProvider<S: NodeSource> {
    fn label_parts<'a>(
        &'a self,
        node: &'a NodeData<S::Id, S::Payload>,
        ctx: &TreeRowContext,
    ) -> TreeLabelPrefix<'a>;
}

pub trait TreeLabelRenderer<S: NodeSource> {
    fn cell<'a>(
        &'a self,
        item: &'a Item<S::Id, S::Payload>,
        ctx: &TreeRowContext,
        glyphs: &TreeGlyphs<'a>,
    ) -> Cell<'a>;
}

impl<S, P> TreeLabelRenderer<S> for P
where
    S: NodeSource,
    P: TreeLabelProvider<S>,
{
    fn cell<'a>(
        &'a self,
        item: &'a Item<S::Id, S::Payload>,
        ctx: &TreeRowContext,
        glyphs: &TreeGlyphs<'a>,
    ) -> Cell<'a> {
        let parts = item.node().map_or_else(
            || TreeLabelPrefix::new(""),
            |node| self.label_parts(node, ctx),
        );
        tree_name_cell(ctx, parts, glyphs)
    }
}

pub fn tree_label_line<'a>(
    ctx: &TreeRowContext,
    parts: TreeLabelPrefix<'a>,
    glyphs: &TreeGlyphs<'a>,
) -> Line<'a> {
    let TreeLabelPrefix { name, prefix } = parts;
    let prefix = prefix.filter(|value| !value.is_empty());

    let mut spans = Vec::with_capacity(usize::from(ctx.level) + 5);
    for _ in 0..ctx.level {
        spans.push(Span::styled(glyphs.indent, ctx.line_style));
    }

    let marker = if ctx.is_placeholder {
        glyphs.loading
    } else if ctx.is_tail {
        glyphs.tail
    } else if ctx.has_children {
        if ctx.is_expanded {
            glyphs.expanded
        } else {
            glyphs.collapsed
        }
    } else {
        glyphs.leaf
    };
    if !marker.is_empty() {
        let marker_style = if ctx.is_tail || ctx.is_placeholder {
            ctx.line_style
        } else {
            Style::default()
        };
        spans.push(Span::styled(marker, marker_style));
        spans.push(Span::raw(" "));
    }

    if let Some(prefix) = prefix {
        spans.push(Span::raw(prefix));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::raw(name));
    Line::from(spans)
}

pub fn tree_name_cell<'a>(
    ctx: &TreeRowContext,
    parts: TreeLabelPrefix<'a>,
    glyphs: &TreeGlyphs<'a>,
) -> Cell<'a> {
    Cell::from(tree_label_line(ctx, parts, glyphs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(level: u16) -> TreeRowContext {
        TreeRowContext {
            level,
            is_expanded: false,
            has_children: false,
            is_tail: false,
            is_placeholder: false,
            line_style: Style::default(),
        }
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn collapsed_container_shows_expander_and_prefix() {
        let row = TreeRowContext {
            has_children: true,
            ..ctx(1)
        };
        let parts = TreeLabelPrefix::new("div").prefix("<");
        let line = tree_label_line(&row, parts, &TreeGlyphs::ascii());
        assert_eq!(text(&line), "  > < div");
    }

    #[test]
    fn tail_and_placeholder_rows_use_their_markers() {
        let tail = TreeRowContext {
            is_tail: true,
            has_children: true,
            is_expanded: true,
            ..ctx(0)
        };
        let line = tree_label_line(&tail, TreeLabelPrefix::new("/div"), &TreeGlyphs::ascii());
        assert_eq!(text(&line), "` /div");

        let placeholder = TreeRowContext {
            is_placeholder: true,
            ..ctx(2)
        };
        let line = tree_label_line(&placeholder, TreeLabelPrefix::new("loading"), &TreeGlyphs::ascii());
        assert_eq!(text(&line), "    ~ loading");
    }
}
