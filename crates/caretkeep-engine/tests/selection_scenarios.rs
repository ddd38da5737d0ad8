use std::cell::RefCell;
use std::rc::Rc;

use caretkeep_engine::selection::normalize::normalize;
use caretkeep_engine::{
    Bookmark, BookmarkKind, ContentFormat, Document, Fragment, MemoryRangeProvider, NodeId,
    Position, Range, Schema, Selection,
};
use insta::assert_snapshot;
use pretty_assertions::assert_eq;

fn find_text(doc: &Document, content: &str) -> NodeId {
    doc.descendants(doc.body())
        .into_iter()
        .find(|&n| doc.text(n) == Some(content))
        .unwrap()
}

fn find_tag(doc: &Document, tag: &str) -> NodeId {
    doc.elements_by_tag(tag)[0]
}

fn editor() -> Selection {
    Selection::new(Box::new(MemoryRangeProvider::new()))
}

#[test]
fn normalize_keeps_ranges_valid() {
    let doc = Document::from_fragments(&[
        Fragment::element("p").with_children([
            Fragment::text("ab"),
            Fragment::element("b").with_child(Fragment::text("cd")),
            Fragment::element("br"),
        ]),
        Fragment::element("div").with_child(Fragment::element("img")),
        Fragment::element("ul").with_child(
            Fragment::element("li")
                .with_child(Fragment::element("em").with_child(Fragment::text("x"))),
        ),
        Fragment::element("p").with_child(Fragment::element("br")),
    ]);
    let schema = Schema::default();
    let points: Vec<Position> = std::iter::once(doc.body())
        .chain(doc.descendants(doc.body()))
        .flat_map(|node| (0..=doc.len(node)).map(move |offset| Position::new(node, offset)))
        .collect();

    let mut checked = 0;
    for &start in &points {
        for &end in &points {
            let range = Range::new(start, end);
            if doc.validate_range(&range).is_err() {
                continue;
            }
            let normalized = normalize(&doc, &schema, range);
            assert!(doc.validate_range(&normalized).is_ok(), "{range:?} -> {normalized:?}");
            assert_eq!(normalized.is_collapsed(), range.is_collapsed(), "{range:?}");
            checked += 1;
        }
    }
    assert!(checked > 100);
}

#[test]
fn boundary_queries_at_root_start() {
    let doc = Document::from_fragments(&[
        Fragment::element("p").with_child(Fragment::text("first")),
        Fragment::element("p").with_child(Fragment::text("second")),
    ]);
    let first = doc.child(doc.body(), 0).unwrap();
    let mut selection = editor();
    selection.set_range(&doc, Range::collapsed_at(Position::new(doc.body(), 0)), None);

    assert_eq!(selection.get_start(&doc, false), first);
    assert_eq!(selection.get_end(&doc, false), first);
    assert_eq!(selection.get_start(&doc, true), doc.body());
}

#[test]
fn selected_image_round_trips_as_element_reference() {
    let mut doc = Document::from_fragments(&[
        Fragment::element("p").with_child(Fragment::element("img").with_attr("src", "a.png")),
        Fragment::element("p").with_children([
            Fragment::text("see "),
            Fragment::element("img").with_attr("src", "b.png"),
        ]),
    ]);
    let second = doc.elements_by_tag("img")[1];
    let p = doc.parent(second).unwrap();
    let image = Range::new(Position::new(p, 1), Position::new(p, 2));
    let mut selection = editor();
    selection.set_range(&doc, image, None);

    assert_eq!(selection.get_node(&doc), second);
    let bookmark = selection.get_bookmark(&mut doc, BookmarkKind::Marker).unwrap();
    assert_eq!(
        bookmark,
        Bookmark::Element {
            tag: "img".to_string(),
            index: 1
        }
    );

    selection.collapse(&doc, true);
    assert!(selection.move_to_bookmark(&mut doc, &bookmark));
    assert_eq!(selection.get_range(&doc), Some(image));
}

#[test]
fn marker_restore_merges_split_text() {
    let mut doc =
        Document::from_fragments(&[Fragment::element("p").with_child(Fragment::text("ab"))]);
    let ab = find_text(&doc, "ab");
    let mut selection = editor();
    selection.set_range(&doc, Range::collapsed_at(Position::new(ab, 1)), None);

    let bookmark = selection.get_bookmark(&mut doc, BookmarkKind::Marker).unwrap();
    let p = find_tag(&doc, "p");
    assert_eq!(doc.children(p).len(), 3);

    assert!(selection.move_to_bookmark(&mut doc, &bookmark));
    assert_eq!(doc.children(p), &[ab]);
    assert_eq!(selection.get_range(&doc), Some(Range::collapsed_at(Position::new(ab, 1))));
    assert_snapshot!(doc.inner_markup(doc.body()), @"<p>ab</p>");
}

#[test]
fn contextual_content_of_selected_cells() {
    let doc = Document::from_fragments(&[Fragment::element("table").with_child(
        Fragment::element("tr").with_children([
            Fragment::element("td")
                .with_attr("class", "cell-selected")
                .with_child(Fragment::text("a")),
            Fragment::element("td")
                .with_attr("class", "cell-selected")
                .with_child(Fragment::text("b")),
            Fragment::element("td").with_child(Fragment::text("c")),
        ]),
    )]);
    let a = find_text(&doc, "a");
    let b = find_text(&doc, "b");
    let mut selection = editor();
    selection.set_range(&doc, Range::new(Position::new(a, 0), Position::new(b, 1)), None);

    assert_snapshot!(
        selection.get_content(&doc, ContentFormat::Markup, true),
        @r#"<table><tr><td class="cell-selected">a</td><td class="cell-selected">b</td></tr></table>"#
    );
    assert_eq!(selection.get_content(&doc, ContentFormat::Text, false), "ab");
}

#[test]
fn explicit_range_survives_provider_adjustment() {
    let doc =
        Document::from_fragments(&[Fragment::element("p").with_child(Fragment::text("hello"))]);
    let hello = find_text(&doc, "hello");
    let p = find_tag(&doc, "p");
    let provider = MemoryRangeProvider::new().with_adjustment(move |_, _| {
        Range::new(Position::new(p, 0), Position::new(p, 1))
    });
    let mut selection = Selection::new(Box::new(provider));
    let wanted = Range::new(Position::new(hello, 1), Position::new(hello, 4));

    assert!(selection.set_range(&doc, wanted, None));

    assert_eq!(selection.get_range(&doc), Some(wanted));
    assert_eq!(selection.get_content(&doc, ContentFormat::Text, false), "ell");
}

#[test]
fn caret_entering_and_leaving_a_link() {
    let doc = Document::from_fragments(&[Fragment::element("p").with_children([
        Fragment::text("before "),
        Fragment::element("a")
            .with_attr("href", "/x")
            .with_child(Fragment::text("link")),
    ])]);
    let before = find_text(&doc, "before ");
    let link = find_text(&doc, "link");
    let a = find_tag(&doc, "a");
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut selection = editor();
    let log = Rc::clone(&events);
    selection
        .selector_changed("a[href]", move |state, ctx| log.borrow_mut().push((state, ctx.node)))
        .unwrap();

    selection.set_range(&doc, Range::collapsed_at(Position::new(link, 2)), None);
    selection.node_changed(&doc);
    selection.set_range(&doc, Range::collapsed_at(Position::new(link, 3)), None);
    selection.node_changed(&doc);
    selection.set_range(&doc, Range::collapsed_at(Position::new(before, 1)), None);
    selection.node_changed(&doc);

    let p = find_tag(&doc, "p");
    assert_eq!(*events.borrow(), vec![(true, a), (false, p)]);
}

#[test]
fn replacing_content_moves_the_caret_after_it() {
    let mut doc =
        Document::from_fragments(&[Fragment::element("p").with_child(Fragment::text("one two"))]);
    let text = find_text(&doc, "one two");
    let mut selection = editor();
    selection.set_range(&doc, Range::new(Position::new(text, 0), Position::new(text, 3)), None);

    assert!(selection.set_content(
        &mut doc,
        vec![Fragment::element("b").with_child(Fragment::text("1"))]
    ));

    assert_snapshot!(doc.inner_markup(doc.body()), @"<p><b>1</b> two</p>");
    let p = find_tag(&doc, "p");
    assert_eq!(
        selection.get_range(&doc),
        Some(Range::collapsed_at(Position::new(p, 1)))
    );
}

#[test]
fn no_environment_degrades_quietly() {
    let mut doc =
        Document::from_fragments(&[Fragment::element("p").with_child(Fragment::text("x"))]);
    let x = find_text(&doc, "x");
    let mut selection = Selection::new(Box::new(MemoryRangeProvider::unavailable()));

    assert!(!selection.set_range(&doc, Range::collapsed_at(Position::new(x, 0)), None));
    assert_eq!(selection.get_range(&doc), None);
    assert_eq!(selection.get_node(&doc), doc.body());
    assert!(selection.get_bookmark(&mut doc, BookmarkKind::Marker).is_none());
    assert_eq!(selection.get_content(&doc, ContentFormat::Markup, false), "");
    assert!(!selection.set_content(&mut doc, vec![Fragment::text("y")]));
    assert_snapshot!(doc.inner_markup(doc.body()), @"<p>x</p>");
}
