use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{Document, Fragment, NodeId, NodeKind, TreeError, char_slice, char_to_byte};

/// A boundary point: a container plus an offset into it.
///
/// For text containers the offset counts characters, for elements it counts
/// children.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub container: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(container: NodeId, offset: usize) -> Self {
        Self { container, offset }
    }
}

/// A pair of boundary points, start never after end.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn collapsed_at(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Collapse onto the start (or end) boundary.
    pub fn collapse(&mut self, to_start: bool) {
        if to_start {
            self.end = self.start;
        } else {
            self.start = self.end;
        }
    }
}

enum ChildSpan {
    Outside,
    Partial,
    Contained,
}

impl Document {
    /// Child indices from the document root down to `node`, or `None` when
    /// the node is detached from the document.
    fn path_from_root(&self, node: NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = node;
        while current != self.root {
            path.push(self.index(current)?);
            current = self.parent(current)?;
        }
        path.reverse();
        Some(path)
    }

    /// Order two boundary points in document order.
    ///
    /// Returns `None` if either container is detached.
    pub fn compare_points(&self, a: Position, b: Position) -> Option<Ordering> {
        if a.container == b.container {
            return Some(a.offset.cmp(&b.offset));
        }
        let path_a = self.path_from_root(a.container)?;
        let path_b = self.path_from_root(b.container)?;

        let shared = path_a
            .iter()
            .zip(&path_b)
            .take_while(|(x, y)| x == y)
            .count();

        let ordering = if shared == path_a.len() {
            // a's container is an ancestor of b's container
            let child_index = path_b[shared];
            if a.offset <= child_index {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        } else if shared == path_b.len() {
            let child_index = path_a[shared];
            if b.offset <= child_index {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        } else {
            path_a[shared].cmp(&path_b[shared])
        };
        Some(ordering)
    }

    /// Check that a position is inside the editing root and its offset fits.
    pub fn validate_position(&self, position: Position) -> Result<(), TreeError> {
        if !self.is_attached(position.container) {
            return Err(TreeError::Detached(position.container));
        }
        let len = self.len(position.container);
        if position.offset > len {
            return Err(TreeError::OffsetOutOfBounds {
                node: position.container,
                offset: position.offset,
                len,
            });
        }
        Ok(())
    }

    /// Check both boundaries and their order.
    pub fn validate_range(&self, range: &Range) -> Result<(), TreeError> {
        self.validate_position(range.start)?;
        self.validate_position(range.end)?;
        match self.compare_points(range.start, range.end) {
            Some(Ordering::Greater) => Err(TreeError::InvertedRange),
            Some(_) => Ok(()),
            None => Err(TreeError::Detached(range.start.container)),
        }
    }

    /// Deepest node containing both boundary containers.
    pub fn common_ancestor(&self, range: &Range) -> NodeId {
        let start_chain = self.ancestors_until(range.start.container, self.root);
        let mut current = Some(range.end.container);
        while let Some(node) = current {
            if start_chain.contains(&node) {
                return node;
            }
            current = self.parent(node);
        }
        self.body
    }

    fn child_span(&self, parent: NodeId, index: usize, child: NodeId, range: &Range) -> ChildSpan {
        let before = Position::new(parent, index);
        let after = Position::new(parent, index + 1);
        let ends_before_start = self
            .compare_points(after, range.start)
            .is_none_or(|o| o != Ordering::Greater);
        let starts_after_end = self
            .compare_points(before, range.end)
            .is_none_or(|o| o != Ordering::Less);
        if ends_before_start || starts_after_end {
            return ChildSpan::Outside;
        }
        if self.contains(child, range.start.container) || self.contains(child, range.end.container)
        {
            ChildSpan::Partial
        } else {
            ChildSpan::Contained
        }
    }

    /// Text of a text node limited to the part inside `range`.
    fn text_within(&self, node: NodeId, range: &Range) -> (usize, usize) {
        let from = if node == range.start.container {
            range.start.offset
        } else {
            0
        };
        let to = if node == range.end.container {
            range.end.offset
        } else {
            self.text_len(node)
        };
        (from, to.max(from))
    }

    /// Copy the content covered by `range`.
    ///
    /// Partially covered elements are cloned shallowly and filled with the
    /// covered part of their subtree, so the result keeps its nesting.
    pub fn clone_contents(&self, range: &Range) -> Vec<Fragment> {
        if range.is_collapsed() {
            return Vec::new();
        }
        let ancestor = self.common_ancestor(range);
        self.clone_within(ancestor, range)
    }

    fn clone_within(&self, node: NodeId, range: &Range) -> Vec<Fragment> {
        if let Some(text) = self.text(node) {
            let (from, to) = self.text_within(node, range);
            return vec![Fragment::Text(char_slice(text, from, to).to_string())];
        }

        let mut out = Vec::new();
        for (index, &child) in self.children(node).iter().enumerate() {
            match self.child_span(node, index, child, range) {
                ChildSpan::Outside => {}
                ChildSpan::Contained => out.push(self.to_fragment(child, true)),
                ChildSpan::Partial => {
                    if self.is_text(child) {
                        out.extend(self.clone_within(child, range));
                    } else {
                        let inner = self.clone_within(child, range);
                        out.push(self.to_fragment(child, false).with_children(inner));
                    }
                }
            }
        }
        out
    }

    /// Remove the content covered by `range` and return the collapsed
    /// position where it used to start.
    pub fn delete_contents(&mut self, range: &Range) -> Result<Position, TreeError> {
        self.validate_range(range)?;
        if !range.is_collapsed() {
            let ancestor = self.common_ancestor(range);
            self.delete_within(ancestor, range)?;
        }
        Ok(range.start)
    }

    fn delete_within(&mut self, node: NodeId, range: &Range) -> Result<(), TreeError> {
        if self.is_text(node) {
            let (from, to) = self.text_within(node, range);
            if let NodeKind::Text(text) = &mut self.nodes[node.0].kind {
                let start = char_to_byte(text, from);
                let end = char_to_byte(text, to);
                text.replace_range(start..end, "");
            }
            return Ok(());
        }

        let plan: Vec<(NodeId, ChildSpan)> = self
            .children(node)
            .iter()
            .enumerate()
            .map(|(index, &child)| (child, self.child_span(node, index, child, range)))
            .collect();

        for (child, span) in plan {
            match span {
                ChildSpan::Outside => {}
                ChildSpan::Contained => self.remove(child, false)?,
                ChildSpan::Partial => self.delete_within(child, range)?,
            }
        }
        Ok(())
    }

    /// Insert a detached node at a boundary point, splitting a text
    /// container when the point falls inside it.
    pub fn insert_node_at(&mut self, position: Position, node: NodeId) -> Result<(), TreeError> {
        self.validate_position(position)?;
        let container = position.container;

        if self.is_text(container) {
            let parent = self
                .parent(container)
                .ok_or(TreeError::Detached(container))?;
            let len = self.text_len(container);
            let reference = if position.offset == 0 {
                Some(container)
            } else if position.offset >= len {
                self.next_sibling(container)
            } else {
                Some(self.split_text(container, position.offset)?)
            };
            return self.insert_before(parent, node, reference);
        }

        let reference = self.child(container, position.offset);
        self.insert_before(container, node, reference)
    }

    /// Build `fragment` into the tree at `position` and return the position
    /// right after the inserted node.
    pub fn insert_fragment_at(
        &mut self,
        position: Position,
        fragment: &Fragment,
    ) -> Result<Position, TreeError> {
        let node = self.build_fragment(fragment);
        self.insert_node_at(position, node)?;
        let parent = self.parent(node).ok_or(TreeError::Detached(node))?;
        let index = self.index(node).ok_or(TreeError::Detached(node))?;
        Ok(Position::new(parent, index + 1))
    }
}
