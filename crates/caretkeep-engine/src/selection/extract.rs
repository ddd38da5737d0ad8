use crate::dom::{Document, Fragment, NodeId, Range};
use crate::schema::Schema;
use crate::selector::Selector;

/// Settings for [`extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Class marking table cells that are part of a block selection.
    pub selected_cell_class: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            selected_cell_class: "cell-selected".to_string(),
        }
    }
}

/// Copy the selected content together with the context it needs to keep
/// its formatting when inserted elsewhere.
///
/// Content directly under the editing root is returned as is. A block
/// selection of table cells becomes a one-row table holding copies of the
/// selected cells. Otherwise the copy is wrapped in shallow copies of the
/// inline (and heading) elements enclosing the selection.
pub fn extract(
    doc: &Document,
    schema: &Schema,
    range: &Range,
    options: &ExtractOptions,
) -> Vec<Fragment> {
    let contents = doc.clone_contents(range);
    let ancestor = doc.common_ancestor(range);
    if ancestor == doc.body() {
        return contents;
    }

    let cells = selected_cells(doc, ancestor, &options.selected_cell_class);
    if let Some(&first) = cells.first() {
        return vec![cell_table(doc, schema, ancestor, first, &cells)];
    }

    if range.is_collapsed() {
        return contents;
    }

    doc.ancestors_until(ancestor, doc.body())
        .into_iter()
        .filter(|&n| doc.is_element(n) && (!schema.is_block(doc, n) || schema.is_heading(doc, n)))
        .fold(contents, |inner, wrapper| {
            vec![doc.to_fragment(wrapper, false).with_children(inner)]
        })
}

fn selected_cells(doc: &Document, scope: NodeId, class: &str) -> Vec<NodeId> {
    match Selector::parse(&format!("td.{class}, th.{class}")) {
        Ok(selector) => selector.select_all(doc, scope),
        Err(err) => {
            log::debug!("ignoring selected cell class {class:?}: {err}");
            Vec::new()
        }
    }
}

fn cell_table(
    doc: &Document,
    schema: &Schema,
    ancestor: NodeId,
    first: NodeId,
    cells: &[NodeId],
) -> Fragment {
    let table = doc
        .closest(ancestor, |n| schema.is_table(doc, n))
        .or_else(|| doc.closest(first, |n| schema.is_table(doc, n)));
    let table = match table {
        Some(table) => doc.to_fragment(table, false),
        None => Fragment::element("table"),
    };
    let row =
        Fragment::element("tr").with_children(cells.iter().map(|&c| doc.to_fragment(c, true)));
    table.with_child(row)
}
