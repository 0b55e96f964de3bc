use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use futures::executor::block_on;
use tui_lazytreelist::{LazyTreeConfig, LazyTreeList, MemorySource, NodeKind};

const SECTIONS: u32 = 200;
const ITEMS_PER_SECTION: u32 = 200;

// root -> SECTIONS containers -> ITEMS_PER_SECTION leaves each
fn loaded_list() -> LazyTreeList<MemorySource<u32>> {
    let source = MemorySource::new(0, NodeKind::Container, 0);
    let mut next_id = 1;
    for _ in 0..SECTIONS {
        let section = next_id;
        next_id += 1;
        source.add_child(0, section, NodeKind::Container, section);
        for _ in 0..ITEMS_PER_SECTION {
            source.add_child(section, next_id, NodeKind::Leaf, next_id);
            next_id += 1;
        }
    }
    let list = LazyTreeList::new(source, LazyTreeConfig::new());
    block_on(list.register_root_node_id(0, 1));
    list
}

fn bench_item_at_index(c: &mut Criterion) {
    let list = loaded_list();
    let count = list.item_count();

    c.bench_function("item_at_index_middle", |b| {
        b.iter(|| list.item_at_index(black_box(count / 2)));
    });
    c.bench_function("item_at_index_viewport_60", |b| {
        b.iter(|| {
            for index in count - 60..count {
                let _ = black_box(list.item_at_index(index));
            }
        });
    });
}

fn bench_index_for_node(c: &mut Criterion) {
    let list = loaded_list();
    let last_leaf = SECTIONS * (ITEMS_PER_SECTION + 1);

    c.bench_function("index_for_node_last_leaf", |b| {
        b.iter(|| list.index_for_node(black_box(last_leaf)));
    });
}

fn bench_toggle(c: &mut Criterion) {
    let list = loaded_list();
    let section = 1 + (SECTIONS / 2) * (ITEMS_PER_SECTION + 1);

    c.bench_function("toggle_loaded_section", |b| {
        b.iter(|| {
            block_on(list.toggle_node_expanded(section, false)).ok();
            block_on(list.toggle_node_expanded(section, true)).ok();
        });
    });
}

criterion_group!(
    benches,
    bench_item_at_index,
    bench_index_for_node,
    bench_toggle
);
criterion_main!(benches);
