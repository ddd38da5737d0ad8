//! Canonical caret positions.
//!
//! Selection APIs report the same visual position in several ways: before a
//! `<b>` or at the end of the text inside it, on the editing root or inside
//! its first paragraph. [`normalize`] picks one of them so that commands
//! operating on the range see consistent input.

use std::cmp::Ordering;

use crate::dom::{Document, NodeId, Position, Range, TreeWalker};
use crate::schema::Schema;

/// Rewrite ambiguous endpoints of `range`.
///
/// Collapsed input yields collapsed output, and the result is a fixed point:
/// normalizing it again changes nothing. A selection is never inverted or
/// collapsed by the rewrite; such a rewrite is dropped as a whole.
pub fn normalize(doc: &Document, schema: &Schema, range: Range) -> Range {
    let collapsed = range.is_collapsed();
    let mut out = range;

    if let Some(start) = EndPoint::new(doc, schema, range.start, collapsed).resolve(true) {
        out.start = start;
    }
    if !collapsed {
        if let Some(end) = EndPoint::new(doc, schema, range.end, collapsed).resolve(false) {
            out.end = end;
        }
    }

    if out == range {
        return range;
    }
    if collapsed {
        out.collapse(true);
    } else if doc.compare_points(out.start, out.end) != Some(Ordering::Less) {
        // a rewrite may not invert or collapse a selection
        return range;
    }
    log::trace!("normalized range {range:?} to {out:?}");
    out
}

struct EndPoint<'a> {
    doc: &'a Document,
    schema: &'a Schema,
    container: NodeId,
    offset: usize,
    collapsed: bool,
    normalized: bool,
}

impl<'a> EndPoint<'a> {
    fn new(doc: &'a Document, schema: &'a Schema, position: Position, collapsed: bool) -> Self {
        Self {
            doc,
            schema,
            container: position.container,
            offset: position.offset,
            collapsed,
            normalized: false,
        }
    }

    /// The rewritten position, or `None` when the endpoint is already
    /// canonical.
    fn resolve(mut self, start: bool) -> Option<Position> {
        let doc = self.doc;

        if self.container == doc.root() {
            self.container = doc.body();
            self.offset = 0;
            self.normalized = true;
        }

        if self.container != doc.body() || self.descend_from_root(start) {
            if self.collapsed {
                self.lean_caret_left();
            }
            if start
                && !self.collapsed
                && doc.is_text(self.container)
                && self.offset == doc.text_len(self.container)
            {
                self.find_relative(false, self.container);
            }
        }

        self.normalized
            .then(|| Position::new(self.container, self.offset))
    }

    /// Move a position on the editing root into its content. Returns `false`
    /// if the endpoint must stay where it is.
    fn descend_from_root(&mut self, start: bool) -> bool {
        let (doc, schema) = (self.doc, self.schema);
        let body = doc.body();

        if start {
            let before = doc.child(body, self.offset.saturating_sub(1));
            if before.is_some_and(|n| schema.is_void(doc, n) || schema.is_table(doc, n)) {
                return false;
            }
        }

        let len = doc.len(body);
        if len == 0 {
            return true;
        }
        let index = if !start && self.offset > 0 {
            self.offset - 1
        } else {
            self.offset
        };
        let Some(child) = doc.child(body, index.min(len - 1)) else {
            return true;
        };
        self.container = child;
        self.offset = 0;

        if !doc.has_children(child) || schema.is_table(doc, child) {
            return true;
        }

        let first = if start {
            child
        } else {
            let mut deepest = child;
            while let Some(last) = doc.last_child(deepest) {
                deepest = last;
            }
            deepest
        };

        let mut walker = TreeWalker::new(doc, first, body);
        let mut node = Some(first);
        while let Some(n) = node {
            if doc.is_text(n) && doc.text_len(n) > 0 {
                self.container = n;
                self.offset = if start { 0 } else { doc.text_len(n) };
                self.normalized = true;
                break;
            }
            if schema.is_void(doc, n) {
                if let (Some(parent), Some(index)) = (doc.parent(n), doc.index(n)) {
                    self.container = parent;
                    self.offset = index;
                    if !start && doc.is_tag(n, "img") {
                        self.offset += 1;
                    }
                    self.normalized = true;
                }
                break;
            }
            node = if start { walker.next() } else { walker.prev() };
        }
        true
    }

    /// `<b>x</b><i>|y</i>` becomes `<b>x|</b><i>y</i>`, and a caret in front
    /// of a lone line break moves into the inline content before it.
    fn lean_caret_left(&mut self) {
        let doc = self.doc;

        if doc.is_text(self.container) && self.offset == 0 {
            self.find_relative(true, self.container);
        }

        if doc.is_element(self.container) {
            let br = doc
                .child(self.container, self.offset)
                .filter(|&n| doc.is_tag(n, "br"));
            if let Some(br) = br.filter(|&br| self.is_lone_break(br)) {
                self.find_relative(true, br);
            }
        }
    }

    fn block_of(&self, node: NodeId) -> NodeId {
        self.doc
            .parent(node)
            .and_then(|p| self.schema.block_ancestor(self.doc, p))
            .unwrap_or(self.doc.body())
    }

    fn is_lone_break(&self, br: NodeId) -> bool {
        let block = self.block_of(br);
        self.doc
            .descendants(block)
            .into_iter()
            .filter(|&n| self.doc.is_tag(n, "br"))
            .count()
            == 1
    }

    /// Walk left (or right) from `from` to the nearest non-empty text node
    /// within the enclosing block and anchor at its near edge.
    fn find_relative(&mut self, left: bool, from: NodeId) {
        let (doc, schema) = (self.doc, self.schema);
        let block = self.block_of(from);
        let mut walker = TreeWalker::new(doc, from, block);
        let mut last_inline = None;

        while let Some(node) = if left { walker.prev() } else { walker.next() } {
            // stepping back lands on the deepest descendant, skipping its ancestors
            if doc
                .ancestors_until(node, block)
                .into_iter()
                .any(|a| schema.is_block(doc, a) && !doc.contains(a, from))
            {
                return;
            }
            if doc.is_text(node) && doc.text_len(node) > 0 {
                self.container = node;
                self.offset = if left { doc.text_len(node) } else { 0 };
                self.normalized = true;
                return;
            }
            if schema.is_block(doc, node) || schema.is_void(doc, node) {
                return;
            }
            last_inline = Some(node);
        }

        // only empty inline elements: a caret inside text stays in that text
        if self.collapsed {
            if let Some(inline) =
                last_inline.filter(|&n| doc.is_element(n) && doc.text_content(n).is_empty())
            {
                self.container = inline;
                self.offset = 0;
                self.normalized = true;
            }
        }
    }
}
