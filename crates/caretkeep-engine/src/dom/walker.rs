use super::{Document, NodeId};

/// Depth-first cursor over a document, bounded by a root node.
///
/// `next` moves in document order (into children first, then to following
/// siblings of the node or its ancestors). `prev` moves to the previous
/// sibling's deepest last descendant, or up to the parent. Neither ever
/// yields a node outside `root`, and `prev` never yields `root` itself.
pub struct TreeWalker<'a> {
    doc: &'a Document,
    root: NodeId,
    current: Option<NodeId>,
}

impl<'a> TreeWalker<'a> {
    pub fn new(doc: &'a Document, start: NodeId, root: NodeId) -> Self {
        Self {
            doc,
            root,
            current: Some(start),
        }
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn next(&mut self) -> Option<NodeId> {
        let node = self.current?;

        if let Some(first) = self.doc.first_child(node) {
            self.current = Some(first);
            return self.current;
        }

        let mut ancestor = Some(node);
        while let Some(n) = ancestor {
            if n == self.root {
                break;
            }
            if let Some(sibling) = self.doc.next_sibling(n) {
                self.current = Some(sibling);
                return self.current;
            }
            ancestor = self.doc.parent(n);
        }
        None
    }

    pub fn prev(&mut self) -> Option<NodeId> {
        let node = self.current?;
        if node == self.root {
            return None;
        }

        if let Some(sibling) = self.doc.previous_sibling(node) {
            let mut deepest = sibling;
            while let Some(last) = self.doc.last_child(deepest) {
                deepest = last;
            }
            self.current = Some(deepest);
            return self.current;
        }

        match self.doc.parent(node) {
            Some(parent) if parent != self.root => {
                self.current = Some(parent);
                self.current
            }
            _ => None,
        }
    }
}
