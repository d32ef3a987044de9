// Example: a window-scrolled list with rows of varying height.
use std::sync::Arc;

use vlist::{Completion, ListViewOptions, RedrawEvent, RedrawStats, ScrollPosition, SkeletonModel};
use vlist_host::{Driver, Page, PageLayout, Row, WindowViewport};

fn main() {
    // Heights between 20 and 79px; the list only sees them once a row is laid out.
    let items: Vec<(usize, f64)> = (0..10_000)
        .map(|i| (i, 20.0 + ((i * 37) % 60) as f64))
        .collect();

    let page = Page::new(
        PageLayout::default()
            .with_header_height(64.0)
            .with_footer_height(32.0),
    );
    let viewport = WindowViewport::attach(&page);
    let options = ListViewOptions::new(
        items,
        |&(id, height): &(usize, f64)| Row::new(format!("row {id}"), height),
        |model: &SkeletonModel| Row::new(format!("{} rows", model.item_count), 0.0),
    )
    .with_default_item_height(30.0)
    .with_overscan(5);

    let mut d = Driver::new(&page, viewport, options);
    d.list_mut().set_on_redraw(Some(Arc::new(|event: &RedrawEvent| {
        if let RedrawEvent::DidRedraw(stats) = event {
            println!(
                "  redraw batch={} passes={} converged={} window={:?}",
                stats.batch.0, stats.passes, stats.converged, stats.window
            );
        }
    })));

    d.list_mut().render(None);
    d.settle();
    println!(
        "initial: window={:?} padding={:?} estimate={:.2} doc_height={}",
        d.list().window(),
        page.padding(),
        d.list().item_height(),
        page.document_rect().height
    );

    // A user scroll: rows around the new position are measured and the estimate refined.
    page.scroll_window_to(50_000.0);
    d.settle();
    println!(
        "after scroll: scroll={} window={:?} estimate={:.2}",
        page.window_scroll(),
        d.list().window(),
        d.list().item_height()
    );

    // Programmatic positioning; the completion runs after the redraw that placed the item.
    for (index, position) in [
        (9_999, ScrollPosition::Top),
        (2_500, ScrollPosition::Middle),
        (4_000, ScrollPosition::Offset(100.0)),
    ] {
        let on_done: Completion = Box::new(move |stats: &RedrawStats| {
            println!("  placed item {index} at {position}: scroll_top={}", stats.scroll_top);
        });
        if let Err(err) = d.list_mut().scroll_to_item(index, position, Some(on_done)) {
            println!("scroll_to_item({index}) failed: {err}");
            continue;
        }
        d.settle();
        let first = d.list().window().index_first;
        let rect = index.checked_sub(first).and_then(|row| page.row_rect(row));
        println!("scroll_to_item({index}, {position}): row={rect:?}");
    }

    let page = d.remove();
    println!(
        "removed: rows={} listeners={}",
        page.row_count(),
        page.listener_count()
    );
}
