use ratatui::layout::{Constraint, Rect};
use ratatui::prelude::Buffer;
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::{
    Block, Borders, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
    StatefulWidget, Table, Widget,
};

use crate::context::TreeRowContext;
use crate::glyphs::{TreeGlyphs, TreeLabelPrefix, TreeLabelRenderer, tree_name_cell};
use crate::item::Item;
use crate::list::LazyTreeList;
use crate::source::NodeSource;
use crate::state::LazyTreeListState;
use crate::style::LazyTreeListStyle;

/// Virtualized tree list widget: only rows inside the viewport are resolved.
pub struct LazyTreeListView<'a, S, L>
where
    S: NodeSource,
    L: TreeLabelRenderer<S>,
{
    list: &'a LazyTreeList<S>,
    label: &'a L,
    style: LazyTreeListStyle<'a>,
    glyphs: TreeGlyphs<'a>,
}

impl<'a, S, L> LazyTreeListView<'a, S, L>
where
    S: NodeSource,
    L: TreeLabelRenderer<S>,
{
    pub const fn new(list: &'a LazyTreeList<S>, label: &'a L, style: LazyTreeListStyle<'a>) -> Self {
        Self {
            list,
            label,
            style,
            glyphs: TreeGlyphs::unicode(),
        }
    }

    pub const fn glyphs(mut self, glyphs: TreeGlyphs<'a>) -> Self {
        self.glyphs = glyphs;
        self
    }

    #[inline]
    fn build_rows<'r>(&'r self, items: &'r [Item<S::Id, S::Payload>]) -> Vec<Row<'r>> {
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let ctx = TreeRowContext {
                level: u16::try_from(item.depth.max(0)).unwrap_or(u16::MAX),
                is_expanded: item.is_expanded,
                has_children: !item.is_placeholder() && self.list.is_expandable(item.id),
                is_tail: item.is_tail,
                is_placeholder: item.is_placeholder(),
                line_style: self.style.line_style,
            };
            let row = if ctx.is_placeholder {
                let parts = TreeLabelPrefix::new(self.style.placeholder_text);
                Row::new([tree_name_cell(&ctx, parts, &self.glyphs)])
                    .style(self.style.placeholder_style)
            } else if ctx.is_tail {
                Row::new([self.label.cell(item, &ctx, &self.glyphs)]).style(self.style.tail_style)
            } else {
                Row::new([self.label.cell(item, &ctx, &self.glyphs)])
            };
            rows.push(row);
        }
        rows
    }

    fn block(&self) -> Block<'a> {
        let mut block = Block::default().borders(self.style.borders);
        if let Some(title) = self.style.title.clone() {
            block = block.title(title);
        }
        block
            .style(self.style.block_style)
            .border_style(self.style.border_style)
    }

    #[inline]
    fn render_scrollbar(
        area: Rect,
        buf: &mut Buffer,
        state: &LazyTreeListState,
        inner_height: usize,
        scroll_rows: usize,
    ) {
        let scroll_len = scroll_rows.saturating_add(1);
        let position = state.offset().min(scroll_len.saturating_sub(1));
        let mut scrollbar_state = ScrollbarState::new(scroll_len)
            .position(position)
            .viewport_content_length(inner_height);
        Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .render(area, buf, &mut scrollbar_state);
    }

    fn render_message(&self, area: Rect, buf: &mut Buffer, text: &'a str, style: Style) {
        Paragraph::new(Line::styled(text, style))
            .block(self.block())
            .render(area, buf);
    }
}

impl<S, L> StatefulWidget for LazyTreeListView<'_, S, L>
where
    S: NodeSource,
    L: TreeLabelRenderer<S>,
{
    type State = LazyTreeListState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let block = self.block();
        let inner_height = block.inner(area).height as usize;
        state.set_viewport_height(inner_height);
        state.sync_selection(self.list);

        if self.list.did_error() {
            self.render_message(area, buf, self.style.error_text, self.style.error_style);
            return;
        }
        let total_rows = self.list.item_count();
        if total_rows == 0 {
            let text = if self.list.is_loading() {
                self.style.loading_text
            } else {
                ""
            };
            self.render_message(area, buf, text, self.style.placeholder_style);
            return;
        }

        state.ensure_selection_visible_with_policy(total_rows, inner_height, self.style.scroll_policy);
        let range_start = state.offset().min(total_rows);
        let range_end = (range_start + inner_height).min(total_rows);
        let items: Vec<_> = (range_start..range_end)
            .filter_map(|index| self.list.item_at_index(index).ok())
            .collect();
        let rows = self.build_rows(&items);

        // Rows are pre-sliced, so the table sees a window starting at 0.
        let mut table_state = *state.table_state();
        *table_state.offset_mut() = 0;
        if let Some(selected) = table_state.selected() {
            if selected < range_start || selected >= range_end {
                table_state.select(None);
            } else {
                table_state.select(Some(selected - range_start));
            }
        }

        let scroll_rows = total_rows.saturating_sub(inner_height);
        let (table_area, table_block, scrollbar_area) = if scroll_rows > 0 {
            let table_area = Rect {
                width: area.width.saturating_sub(1),
                ..area
            };
            let scrollbar_area = Rect {
                x: area.x + area.width.saturating_sub(1),
                y: area.y,
                width: 1,
                height: area.height,
            };
            let mut table_borders = self.style.borders;
            table_borders.remove(Borders::RIGHT);
            (table_area, block.borders(table_borders), Some(scrollbar_area))
        } else {
            (area, block, None)
        };

        let table = Table::new(rows, [Constraint::Fill(1)])
            .style(self.style.block_style)
            .block(table_block)
            .row_highlight_style(self.style.highlight_style)
            .highlight_symbol(self.style.highlight_symbol);
        StatefulWidget::render(table, table_area, buf, &mut table_state);

        if let Some(scrollbar_area) = scrollbar_area {
            Self::render_scrollbar(scrollbar_area, buf, state, inner_height, scroll_rows);
        }
    }
}
