//! Resolving the elements a range starts in, ends in, or spans.

use crate::dom::{Document, NodeId, Range, TreeWalker};
use crate::schema::Schema;

fn element_or_parent(doc: &Document, node: NodeId) -> NodeId {
    if doc.is_text(node) {
        doc.parent(node).unwrap_or(node)
    } else {
        node
    }
}

/// Element the range starts in.
///
/// An element container with children is resolved to the child at the start
/// offset. With `real` set and a collapsed range the container itself is
/// kept, which tells "caret before child N" apart from "inside child N".
pub fn start_element(doc: &Document, range: &Range, real: bool) -> NodeId {
    let mut node = range.start.container;
    if doc.is_element(node) && doc.has_children(node) && (!real || !range.is_collapsed()) {
        let index = range.start.offset.min(doc.len(node) - 1);
        node = doc.child(node, index).unwrap_or(node);
    }
    element_or_parent(doc, node)
}

/// Element the range ends in. The end offset points after the child it
/// refers to, so drilling down picks `offset - 1`.
pub fn end_element(doc: &Document, range: &Range, real: bool) -> NodeId {
    let mut node = range.end.container;
    if doc.is_element(node) && doc.has_children(node) && (!real || !range.is_collapsed()) {
        let offset = range.end.offset;
        let index = if offset > 0 { offset - 1 } else { offset };
        node = doc.child(node, index).unwrap_or(node);
    }
    element_or_parent(doc, node)
}

fn skip_empty_text(doc: &Document, node: Option<NodeId>, forwards: bool) -> Option<NodeId> {
    let original = node;
    let mut current = node;
    while let Some(n) = current {
        if !(doc.is_text(n) && doc.text_len(n) == 0) {
            return Some(n);
        }
        current = if forwards {
            doc.next_sibling(n)
        } else {
            doc.previous_sibling(n)
        };
    }
    original
}

/// The selected element, or the common ancestor of the range.
pub fn selected_node(doc: &Document, range: &Range) -> NodeId {
    let mut node = doc.common_ancestor(range);

    if !range.is_collapsed() {
        let (start, end) = (range.start, range.end);

        // exactly one child slot spanned: that child is the selection
        if start.container == end.container
            && end.offset.saturating_sub(start.offset) < 2
            && doc.has_children(start.container)
        {
            if let Some(child) = doc.child(start.container, start.offset) {
                node = child;
            }
        }

        // text boundaries sitting right at the edges of one inline element
        if doc.is_text(start.container) && doc.is_text(end.container) {
            let after_start = if doc.text_len(start.container) == start.offset {
                skip_empty_text(doc, doc.next_sibling(start.container), true)
            } else {
                doc.parent(start.container)
            };
            let before_end = if end.offset == 0 {
                skip_empty_text(doc, doc.previous_sibling(end.container), false)
            } else {
                doc.parent(end.container)
            };
            if let Some(bracketed) = after_start.filter(|&n| Some(n) == before_end) {
                node = bracketed;
            }
        }
    }

    element_or_parent(doc, node)
}

/// Block elements touched between the blocks containing `start` and `end`,
/// both boundary blocks included.
pub fn selected_blocks(doc: &Document, schema: &Schema, start: NodeId, end: NodeId) -> Vec<NodeId> {
    let start_block = schema.block_ancestor(doc, start);
    let end_block = schema.block_ancestor(doc, end);
    let mut blocks = Vec::new();

    if let Some(sb) = start_block {
        blocks.push(sb);
    }

    if let (Some(sb), Some(eb)) = (start_block, end_block) {
        if sb != eb {
            let mut walker = TreeWalker::new(doc, sb, doc.body());
            while let Some(node) = walker.next() {
                if node == eb {
                    break;
                }
                if schema.is_block(doc, node) {
                    blocks.push(node);
                }
            }
        }
    }

    if let Some(eb) = end_block {
        if start_block != Some(eb) {
            blocks.push(eb);
        }
    }
    blocks
}

/// `start`, `end`, and every direct child of the editing root met walking
/// from one to the other.
pub fn selected_nodes(doc: &Document, start: NodeId, end: NodeId) -> Vec<NodeId> {
    let mut nodes = vec![start];
    if start != end {
        let mut walker = TreeWalker::new(doc, start, doc.body());
        while let Some(node) = walker.next() {
            if node == end {
                break;
            }
            if doc.parent(node) == Some(doc.body()) {
                nodes.push(node);
            }
        }
        nodes.push(end);
    }
    nodes
}
