// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
use caretkeep_engine::{Document, Fragment, NodeId};

/// `sections` paragraphs of mixed inline formatting, each followed by a
/// short list.
#[allow(dead_code)]
pub fn generate_document(sections: usize) -> Document {
    let mut content = Vec::new();
    for section in 0..sections {
        content.push(Fragment::element("p").with_children([
            Fragment::text(format!("Section {section} starts ")),
            Fragment::element("b").with_child(Fragment::text("bold")),
            Fragment::text(" then "),
            Fragment::element("a")
                .with_attr("href", "#")
                .with_child(Fragment::element("i").with_child(Fragment::text("a link"))),
            Fragment::element("br"),
        ]));
        content.push(Fragment::element("ul").with_children((0..3).map(|item| {
            Fragment::element("li").with_child(Fragment::text(format!("item {item}")))
        })));
    }
    Document::from_fragments(&content)
}

/// All non-empty text nodes in document order.
#[allow(dead_code)]
pub fn text_nodes(doc: &Document) -> Vec<NodeId> {
    doc.descendants(doc.body())
        .into_iter()
        .filter(|&n| doc.text_len(n) > 0)
        .collect()
}
