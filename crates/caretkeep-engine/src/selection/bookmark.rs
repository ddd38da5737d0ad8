//! Selections that survive document mutation.
//!
//! A [`Bookmark`] is captured before a command rewrites the tree and resolved
//! back into a [`Range`] afterwards. The variants trade robustness for
//! intrusiveness:
//!
//! * [`Bookmark::Simple`] keeps the raw positions. Only valid if nothing
//!   changes in between.
//! * [`Bookmark::Path`] records child indices from the editing root. It
//!   survives re-serialization as long as the tree shape up to the selection
//!   is rebuilt identically.
//! * [`Bookmark::Marker`] physically inserts sentinel `<span>`s at the
//!   boundaries. They travel with the content through arbitrary edits and
//!   are removed again on restore, merging the text they split.
//! * [`Bookmark::Element`] re-finds a selected image by tag and ordinal.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Capabilities;
use super::locator;
use crate::dom::{Attributes, Document, NodeId, Position, Range, TreeError};
use crate::schema::Schema;

/// Zero-width character kept inside marker sentinels so they are never empty.
pub const PLACEHOLDER: char = '\u{FEFF}';

/// Attribute identifying marker sentinels.
pub const MARKER_ATTR: &str = "data-bookmark";

const MARKER_STYLE: &str = "overflow:hidden;line-height:0px";

/// A durable encoding of a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Bookmark {
    Simple {
        start: Position,
        end: Position,
    },
    Marker {
        id: String,
        /// Anchor inside the sentinels and leave them in the tree.
        keep_contents: bool,
    },
    /// `[offset, index in parent, index of parent, ...]` up to the editing
    /// root. `end` is absent for collapsed selections.
    ///
    /// A `normalized` path counts each run of adjacent text siblings as one
    /// node and its offset runs across the whole run, so it resolves against
    /// the tree as captured and against a re-serialized copy alike. The
    /// boundary between two text nodes of a run resolves to the end of the
    /// earlier one.
    Path {
        start: Vec<usize>,
        end: Option<Vec<usize>>,
        #[serde(default)]
        normalized: bool,
    },
    Element {
        tag: String,
        index: usize,
    },
}

/// Which kind of bookmark to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkKind {
    Simple,
    Marker,
    /// With `normalized`, offsets and indices are computed as if adjacent
    /// text runs were merged and empty text nodes dropped.
    Path { normalized: bool },
}

/// Captures and resolves bookmarks against a document.
pub struct BookmarkCodec<'a> {
    schema: &'a Schema,
    capabilities: Capabilities,
    marker_prefix: &'a str,
}

impl<'a> BookmarkCodec<'a> {
    pub fn new(schema: &'a Schema, capabilities: Capabilities, marker_prefix: &'a str) -> Self {
        Self {
            schema,
            capabilities,
            marker_prefix,
        }
    }

    /// Encode `range`. Marker bookmarks insert their sentinels into `doc`.
    pub fn capture(
        &self,
        doc: &mut Document,
        range: Range,
        kind: BookmarkKind,
    ) -> Result<Bookmark, TreeError> {
        match kind {
            BookmarkKind::Simple => Ok(Bookmark::Simple {
                start: range.start,
                end: range.end,
            }),
            BookmarkKind::Path { normalized } => Ok(Bookmark::Path {
                start: path_point(doc, range.start, normalized),
                end: (!range.is_collapsed()).then(|| path_point(doc, range.end, normalized)),
                normalized,
            }),
            BookmarkKind::Marker => {
                let node = locator::selected_node(doc, &range);
                if doc.is_tag(node, "img") {
                    let index = doc
                        .elements_by_tag("img")
                        .iter()
                        .position(|&n| n == node)
                        .unwrap_or(0);
                    return Ok(Bookmark::Element {
                        tag: "img".to_string(),
                        index,
                    });
                }

                let id = format!("{}{}", self.marker_prefix, Uuid::new_v4().simple());
                self.insert_markers(doc, range, &id)?;
                Ok(Bookmark::Marker {
                    id,
                    keep_contents: false,
                })
            }
        }
    }

    fn insert_markers(&self, doc: &mut Document, range: Range, id: &str) -> Result<(), TreeError> {
        let range = retarget_table_rows(doc, range);
        if !range.is_collapsed() {
            let end = create_marker(doc, &format!("{id}_end"))?;
            doc.insert_node_at(range.end, end)?;
        }
        let start = create_marker(doc, &format!("{id}_start"))?;
        doc.insert_node_at(range.start, start)
    }

    /// Turn a bookmark back into a range. Marker restoration removes the
    /// sentinels from `doc` unless `keep_contents` is set.
    pub fn resolve(&self, doc: &mut Document, bookmark: &Bookmark) -> Option<Range> {
        match bookmark {
            Bookmark::Simple { start, end } => {
                let range = Range::new(*start, *end);
                doc.validate_range(&range).ok().map(|_| range)
            }
            Bookmark::Path {
                start,
                end,
                normalized,
            } => {
                let start = resolve_path(doc, start, *normalized)?;
                let end = match end {
                    Some(end) => resolve_path(doc, end, *normalized)?,
                    None => start,
                };
                Some(Range::new(start, end))
            }
            Bookmark::Element { tag, index } => {
                let node = *doc.elements_by_tag(tag).get(*index)?;
                let parent = doc.parent(node)?;
                let index = doc.index(node)?;
                Some(Range::new(
                    Position::new(parent, index),
                    Position::new(parent, index + 1),
                ))
            }
            Bookmark::Marker { id, keep_contents } => {
                match self.restore_markers(doc, id, *keep_contents) {
                    Ok(range) => range,
                    Err(err) => {
                        log::debug!("restoring marker bookmark {id} failed: {err}");
                        None
                    }
                }
            }
        }
    }

    fn restore_markers(
        &self,
        doc: &mut Document,
        id: &str,
        keep: bool,
    ) -> Result<Option<Range>, TreeError> {
        let Some(start) = self.restore_marker_point(doc, &format!("{id}_start"), keep)? else {
            return Ok(None);
        };
        let end = self
            .restore_marker_point(doc, &format!("{id}_end"), keep)?
            .unwrap_or(start);
        // after merging, adjacent markers can resolve to an end before start
        let start = match doc.compare_points(start, end) {
            Some(std::cmp::Ordering::Greater) => end,
            _ => start,
        };

        self.add_bogus(doc, start.container)?;
        self.add_bogus(doc, end.container)?;
        Ok(Some(Range::new(start, end)))
    }

    fn restore_marker_point(
        &self,
        doc: &mut Document,
        marker_id: &str,
        keep: bool,
    ) -> Result<Option<Position>, TreeError> {
        let markers = doc.elements_by_id(marker_id);
        let Some(&marker) = markers.first() else {
            return Ok(None);
        };

        if keep {
            return Ok(Some(match doc.first_child(marker) {
                Some(first) => Position::new(first, doc.len(first).min(1)),
                None => Position::new(marker, 0),
            }));
        }

        for &m in &markers {
            strip_placeholder(doc, m)?;
        }
        // splits and pastes can leave copies behind
        for &duplicate in &markers[1..] {
            doc.remove(duplicate, true)?;
        }

        let parent = doc.parent(marker).ok_or(TreeError::Detached(marker))?;
        let index = doc.index(marker).ok_or(TreeError::Detached(marker))?;
        let prev = doc.previous_sibling(marker);
        let next = doc.next_sibling(marker);
        doc.remove(marker, true)?;

        let mut position = Position::new(parent, index);
        if self.capabilities.supports_text_merge {
            if let (Some(prev), Some(next)) = (prev, next) {
                if doc.is_text(prev) && doc.is_text(next) && doc.next_sibling(prev) == Some(next) {
                    let offset = doc.text_len(prev);
                    let tail = doc.text(next).unwrap_or_default().to_string();
                    doc.append_text(prev, &tail)?;
                    doc.remove(next, false)?;
                    position = Position::new(prev, offset);
                }
            }
        }
        Ok(Some(position))
    }

    /// Keep an emptied block focusable.
    fn add_bogus(&self, doc: &mut Document, node: NodeId) -> Result<(), TreeError> {
        if self.schema.is_block(doc, node) && !doc.has_children(node) {
            let mut attrs = Attributes::new();
            attrs.insert("data-bogus".to_string(), "1".to_string());
            let br = doc.create_element_with("br", attrs);
            doc.append_child(node, br)?;
        }
        Ok(())
    }
}

fn create_marker(doc: &mut Document, id: &str) -> Result<NodeId, TreeError> {
    let mut attrs = Attributes::new();
    attrs.insert(MARKER_ATTR.to_string(), "marker".to_string());
    attrs.insert("id".to_string(), id.to_string());
    attrs.insert("style".to_string(), MARKER_STYLE.to_string());
    let span = doc.create_element_with("span", attrs);
    let placeholder = doc.create_text(&PLACEHOLDER.to_string());
    doc.append_child(span, placeholder)?;
    Ok(span)
}

fn strip_placeholder(doc: &mut Document, marker: NodeId) -> Result<(), TreeError> {
    for node in doc.descendants(marker) {
        let Some(text) = doc.text(node) else {
            continue;
        };
        if !text.contains(PLACEHOLDER) {
            continue;
        }
        let stripped = text.replace(PLACEHOLDER, "");
        if stripped.is_empty() {
            doc.remove(node, false)?;
        } else {
            doc.set_text(node, &stripped)?;
        }
    }
    Ok(())
}

/// A boundary on a `<tr>` cannot hold a marker; move it into the cell.
fn retarget_table_rows(doc: &Document, mut range: Range) -> Range {
    for start in [true, false] {
        let position = if start { range.start } else { range.end };
        if !doc.is_tag(position.container, "tr") {
            continue;
        }
        let len = doc.len(position.container);
        let index = if start {
            Some(position.offset)
        } else {
            position.offset.checked_sub(1)
        };
        let cell = index
            .zip(len.checked_sub(1))
            .and_then(|(i, last)| doc.child(position.container, i.min(last)));
        if let Some(cell) = cell {
            let offset = if start { 0 } else { doc.len(cell) };
            let retargeted = Position::new(cell, offset);
            if start {
                range.start = retargeted;
            } else {
                range.end = retargeted;
            }
        }
    }
    range
}

fn path_point(doc: &Document, position: Position, normalized: bool) -> Vec<usize> {
    let Position {
        container,
        mut offset,
    } = position;
    let mut point = Vec::new();

    if doc.is_text(container) {
        if normalized {
            let mut sibling = doc.previous_sibling(container);
            while let Some(prev) = sibling.filter(|&n| doc.is_text(n)) {
                offset += doc.text_len(prev);
                sibling = doc.previous_sibling(prev);
            }
        }
        point.push(offset);
    } else {
        let len = doc.len(container);
        let after = usize::from(offset >= len && len > 0);
        let index = if after == 1 { len - 1 } else { offset };
        point.push(
            doc.child(container, index)
                .map_or(0, |child| doc.node_index(child, normalized) + after),
        );
    }

    let mut node = container;
    while node != doc.body() {
        point.push(doc.node_index(node, normalized));
        match doc.parent(node) {
            Some(parent) => node = parent,
            None => break,
        }
    }
    point
}

fn resolve_path(doc: &Document, point: &[usize], normalized: bool) -> Option<Position> {
    let (&offset, indices) = point.split_first()?;
    let mut node = doc.body();
    for &index in indices.iter().rev() {
        let child = if normalized {
            normalized_child(doc, node, index)
        } else {
            doc.child(node, index)
        };
        node = match child {
            Some(child) => child,
            None => {
                log::debug!("path bookmark {point:?} no longer matches the tree");
                return None;
            }
        };
    }

    if !doc.is_text(node) {
        let offset = if normalized {
            normalized_child(doc, node, offset)
                .and_then(|child| doc.index(child))
                .unwrap_or(doc.len(node))
        } else {
            offset
        };
        return Some(Position::new(node, offset.min(doc.len(node))));
    }

    let mut offset = offset;
    if normalized {
        while offset > doc.text_len(node) {
            let Some(next) = doc.next_sibling(node).filter(|&n| doc.is_text(n)) else {
                break;
            };
            offset -= doc.text_len(node);
            node = next;
        }
    }
    Some(Position::new(node, offset.min(doc.len(node))))
}

/// First child with the given normalized index. An empty text shares its
/// index with a neighbour, which is preferred.
fn normalized_child(doc: &Document, parent: NodeId, index: usize) -> Option<NodeId> {
    let is_empty_text = |n: NodeId| doc.is_text(n) && doc.text_len(n) == 0;
    let mut matches = doc
        .children(parent)
        .iter()
        .copied()
        .filter(|&c| doc.node_index(c, true) == index);
    let first = matches.next()?;
    if !is_empty_text(first) {
        return Some(first);
    }
    matches.find(|&c| !is_empty_text(c)).or(Some(first))
}
