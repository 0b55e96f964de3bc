use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use futures::executor::block_on;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::{DefaultTerminal, Frame};

use tui_lazytreelist::{
    LazyTreeConfig, LazyTreeList, LazyTreeListState, LazyTreeListStyle, LazyTreeListView,
    MemorySource, NodeData, NodeKind, TreeLabelPrefix, TreeLabelProvider, TreeRowContext,
};

#[derive(Clone)]
struct Tag {
    name: String,
}

impl Tag {
    fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

type DomSource = MemorySource<Tag>;

// A synthetic document: a few sections with nested lists and text leaves.
fn build_document(sections: u32, items: u32) -> (DomSource, u32) {
    let source = MemorySource::new(0, NodeKind::Container, Tag::new("#document"));
    let mut next_id = 1;
    let mut alloc = || {
        let id = next_id;
        next_id += 1;
        id
    };

    let html = alloc();
    source.add_child(0, html, NodeKind::Container, Tag::new("html"));
    let body = alloc();
    source.add_child(html, body, NodeKind::Container, Tag::new("body"));

    let mut deepest = body;
    for section in 0..sections {
        let sec = alloc();
        source.add_child(body, sec, NodeKind::Container, Tag::new(format!("section#s{section}")));
        let list = alloc();
        source.add_child(sec, list, NodeKind::Container, Tag::new("ul"));
        for item in 0..items {
            let li = alloc();
            source.add_child(list, li, NodeKind::Container, Tag::new("li"));
            let blank = alloc();
            source.add_child(li, blank, NodeKind::Hidden, Tag::new(""));
            let text = alloc();
            source.add_child(li, text, NodeKind::Leaf, Tag::new(format!("\"item {section}.{item}\"")));
            deepest = text;
        }
    }
    (source, deepest)
}

struct Label;

impl TreeLabelProvider<DomSource> for Label {
    fn label_parts<'a>(&'a self, node: &'a NodeData<u32, Tag>, ctx: &TreeRowContext) -> TreeLabelPrefix<'a> {
        match node.kind {
            NodeKind::Container if ctx.is_tail => TreeLabelPrefix::new(format!("</{}>", node.payload.name)),
            NodeKind::Container => TreeLabelPrefix::new(format!("<{}>", node.payload.name)),
            NodeKind::Leaf | NodeKind::Hidden => TreeLabelPrefix::new(node.payload.name.as_str()),
        }
    }
}

fn render(
    frame: &mut Frame,
    list: &LazyTreeList<DomSource>,
    state: &mut LazyTreeListState,
    style: &LazyTreeListStyle<'_>,
) {
    let widget = LazyTreeListView::new(list, &Label, style.clone());
    frame.render_stateful_widget(widget, frame.area(), state);
}

fn run_app(
    mut terminal: DefaultTerminal,
    list: &LazyTreeList<DomSource>,
    deepest: u32,
    style: &LazyTreeListStyle<'_>,
) -> io::Result<()> {
    let mut state = LazyTreeListState::new();
    block_on(list.register_root_node_id(0, 1));

    loop {
        terminal.draw(|frame| render(frame, list, &mut state, style))?;

        if event::poll(Duration::from_millis(200))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('/') => {
                        if let Some(index) = block_on(list.load_path_to_node(deepest)) {
                            list.select_index(Some(index));
                        }
                    }
                    KeyCode::Char('r') => {
                        let snapshot = state.snapshot(list);
                        block_on(list.register_root_node_id(0, 1));
                        state.restore(list, &snapshot);
                    }
                    _ => {
                        block_on(state.handle_key(list, key));
                    }
                },
                _ => {}
            }
        }
    }

    Ok(())
}

fn main() -> io::Result<()> {
    env_logger::init();

    let (source, deepest) = build_document(40, 25);
    source.set_default_latency(3);
    let list = LazyTreeList::new(source, LazyTreeConfig::new());
    let subscription = list.subscribe(|event| log::debug!("list event: {event:?}"));

    let mut style = LazyTreeListStyle::default();
    style.block_style = Style::default()
        .fg(Color::Rgb(221, 227, 235))
        .bg(Color::Rgb(24, 28, 36));
    style.border_style = Style::default().fg(Color::Rgb(92, 110, 140));
    style.line_style = Style::default().fg(Color::Rgb(86, 98, 120));
    style.tail_style = Style::default().fg(Color::Rgb(136, 150, 170));
    style.highlight_style = Style::default()
        .fg(Color::Rgb(255, 255, 255))
        .bg(Color::Rgb(52, 66, 96))
        .add_modifier(Modifier::BOLD);
    style.title = Some(Line::from(
        "lazy DOM  [/] reveal last item  [r] reload  [c] collapse all  [q] quit",
    ));

    let terminal = ratatui::init();
    let result = run_app(terminal, &list, deepest, &style);
    ratatui::restore();
    list.unsubscribe(subscription);
    list.destroy();
    result
}
