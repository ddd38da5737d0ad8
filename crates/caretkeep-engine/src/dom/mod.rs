//! Arena-backed document tree.
//!
//! All nodes live in a single `Vec` owned by [`Document`] and are referenced by
//! [`NodeId`]. Removing a node only detaches it: the slot stays in the arena, so a
//! stale id keeps pointing at the same (now unreachable) node instead of aliasing
//! a newer one. Reachability from the editing root is what makes a node "live".

pub mod fragment;
pub mod range;
pub mod walker;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fragment::Fragment;
pub use range::{Position, Range};
pub use walker::TreeWalker;

/// Handle to a node in a [`Document`] arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

/// Attribute name/value pairs of an element, kept sorted for stable output.
pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Lower-case tag name
    pub tag: String,
    pub attrs: Attributes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

static UNKNOWN: NodeData = NodeData {
    kind: NodeKind::Document,
    parent: None,
    children: Vec::new(),
};

/// Failures of the low-level tree primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0:?} is not reachable from the editing root")]
    Detached(NodeId),

    #[error("offset {offset} is out of bounds for node {node:?} of length {len}")]
    OffsetOutOfBounds {
        node: NodeId,
        offset: usize,
        len: usize,
    },

    #[error("node {0:?} is not a text node")]
    NotText(NodeId),

    #[error("node {0:?} cannot hold children")]
    NotContainer(NodeId),

    #[error("node {reference:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, reference: NodeId },

    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("range start lies after its end")]
    InvertedRange,

    #[error("node {0:?} does not belong to this document")]
    Unknown(NodeId),
}

/// The document tree a selection operates on.
///
/// A document always has a document root and a single editing root (`body`)
/// beneath it. Every selection and bookmark operation is scoped to the editing
/// root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with a `body` editing root.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
        };
        doc.root = doc.alloc(NodeKind::Document);
        doc.body = doc.create_element("body");
        doc.nodes[doc.body.0].parent = Some(doc.root);
        doc.nodes[doc.root.0].children.push(doc.body);
        doc
    }

    /// Create a document whose editing root holds the given content.
    pub fn from_fragments(content: &[Fragment]) -> Self {
        let mut doc = Self::new();
        let body = doc.body;
        for fragment in content {
            let node = doc.build_fragment(fragment);
            doc.nodes[node.0].parent = Some(body);
            doc.nodes[body.0].children.push(node);
        }
        doc
    }

    /// The document root (parent of the editing root).
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The editing root.
    pub fn body(&self) -> NodeId {
        self.body
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Ids from another document read as an empty detached node.
    fn data(&self, id: NodeId) -> &NodeData {
        self.nodes.get(id.0).unwrap_or(&UNKNOWN)
    }

    fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData, TreeError> {
        self.nodes.get_mut(id.0).ok_or(TreeError::Unknown(id))
    }

    /// True if `id` was allocated by this document.
    pub fn has_node(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    // ---- creation -------------------------------------------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create_element_with(tag, Attributes::new())
    }

    pub fn create_element_with(&mut self, tag: &str, attrs: Attributes) -> NodeId {
        self.alloc(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs,
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    /// Materialize a detached copy of `fragment` in the arena.
    pub fn build_fragment(&mut self, fragment: &Fragment) -> NodeId {
        match fragment {
            Fragment::Text(text) => self.create_text(text),
            Fragment::Element {
                tag,
                attrs,
                children,
            } => {
                let id = self.create_element_with(tag, attrs.clone());
                for child in children {
                    let child_id = self.build_fragment(child);
                    self.nodes[child_id.0].parent = Some(id);
                    self.nodes[id.0].children.push(child_id);
                }
                id
            }
        }
    }

    /// Copy a node (and with `deep`, its subtree) out of the arena.
    pub fn to_fragment(&self, id: NodeId, deep: bool) -> Fragment {
        match &self.data(id).kind {
            NodeKind::Text(text) => Fragment::Text(text.clone()),
            NodeKind::Element(el) => Fragment::Element {
                tag: el.tag.clone(),
                attrs: el.attrs.clone(),
                children: if deep {
                    self.children(id)
                        .iter()
                        .map(|&c| self.to_fragment(c, true))
                        .collect()
                } else {
                    Vec::new()
                },
            },
            NodeKind::Document => Fragment::Element {
                tag: "#document".to_string(),
                attrs: Attributes::new(),
                children: if deep {
                    self.children(id)
                        .iter()
                        .map(|&c| self.to_fragment(c, true))
                        .collect()
                } else {
                    Vec::new()
                },
            },
        }
    }

    /// Serialize the children of a node, mostly useful in tests and logs.
    pub fn inner_markup(&self, id: NodeId) -> String {
        self.children(id)
            .iter()
            .map(|&c| self.to_fragment(c, true).to_markup())
            .collect()
    }

    // ---- inspection -----------------------------------------------------

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.data(id).kind
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.data(id).kind, NodeKind::Text(_))
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.data(id).kind, NodeKind::Element(_))
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.data(id).kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    /// True when `id` is an element with the given (case-insensitive) tag.
    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id).is_some_and(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .and_then(|el| el.attrs.get(name))
            .map(String::as_str)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Ok(NodeData {
            kind: NodeKind::Element(el),
            ..
        }) = self.data_mut(id)
        {
            el.attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Length of a text node in characters.
    pub fn text_len(&self, id: NodeId) -> usize {
        self.text(id).map_or(0, |t| t.chars().count())
    }

    /// Boundary-point length: characters for text, child count otherwise.
    pub fn len(&self, id: NodeId) -> usize {
        match &self.data(id).kind {
            NodeKind::Text(text) => text.chars().count(),
            _ => self.data(id).children.len(),
        }
    }

    /// Concatenated text of a subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.data(id).kind {
            NodeKind::Text(text) => text.clone(),
            _ => self
                .children(id)
                .iter()
                .map(|&c| self.text_content(c))
                .collect(),
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), TreeError> {
        match &mut self.data_mut(id)?.kind {
            NodeKind::Text(existing) => {
                *existing = text.to_string();
                Ok(())
            }
            _ => Err(TreeError::NotText(id)),
        }
    }

    pub fn append_text(&mut self, id: NodeId, text: &str) -> Result<(), TreeError> {
        match &mut self.data_mut(id)?.kind {
            NodeKind::Text(existing) => {
                existing.push_str(text);
                Ok(())
            }
            _ => Err(TreeError::NotText(id)),
        }
    }

    // ---- navigation -----------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.data(id).children
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        !self.data(id).children.is_empty()
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.data(id).children.get(index).copied()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).children.first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).children.last().copied()
    }

    /// Position of `id` among its parent's children.
    pub fn index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index(id)?;
        index
            .checked_sub(1)
            .and_then(|i| self.child(parent, i))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index(id)?;
        self.child(parent, index + 1)
    }

    /// Index of `id` among its siblings.
    ///
    /// With `normalized` set, runs of adjacent text siblings count as one node
    /// and empty text nodes are not counted, i.e. the index the node would
    /// have once the tree is re-serialized and parsed again.
    pub fn node_index(&self, id: NodeId, normalized: bool) -> usize {
        let Some(parent) = self.parent(id) else {
            return 0;
        };
        let siblings = self.children(parent);
        let Some(position) = siblings.iter().position(|&c| c == id) else {
            return 0;
        };

        let mut index = 0;
        let mut last_was_text = self.is_text(id);
        for &sibling in siblings[..position].iter().rev() {
            let is_text = self.is_text(sibling);
            if normalized && is_text && (last_was_text || self.text_len(sibling) == 0) {
                continue;
            }
            index += 1;
            last_was_text = is_text;
        }
        index
    }

    /// True if `ancestor` is `node` or one of its ancestors.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    /// True if the node is the editing root or lives beneath it.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(self.body, id)
    }

    /// `node` and its ancestors, innermost first, stopping before `stop`.
    pub fn ancestors_until(&self, node: NodeId, stop: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = Some(node);
        while let Some(n) = current {
            if n == stop {
                break;
            }
            out.push(n);
            current = self.parent(n);
        }
        out
    }

    /// Closest ancestor-or-self of `node` matching `predicate`, never
    /// returning the editing root or anything above it.
    pub fn closest(&self, node: NodeId, predicate: impl Fn(NodeId) -> bool) -> Option<NodeId> {
        self.ancestors_until(node, self.body)
            .into_iter()
            .find(|&n| predicate(n))
    }

    /// Descendants of `scope` (excluding `scope`) in document order.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        out
    }

    /// Elements under the editing root with the given tag, in document order.
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(self.body)
            .into_iter()
            .filter(|&n| self.is_tag(n, tag))
            .collect()
    }

    /// Elements under the editing root whose `id` attribute equals `id`.
    pub fn elements_by_id(&self, id: &str) -> Vec<NodeId> {
        self.descendants(self.body)
            .into_iter()
            .filter(|&n| self.attr(n, "id") == Some(id))
            .collect()
    }

    // ---- mutation -------------------------------------------------------

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` under `parent` before `reference` (or at the end).
    ///
    /// A child that is already attached elsewhere is moved.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), TreeError> {
        if let Some(unknown) = [parent, child].into_iter().find(|&n| !self.has_node(n)) {
            return Err(TreeError::Unknown(unknown));
        }
        if self.is_text(parent) {
            return Err(TreeError::NotContainer(parent));
        }
        if self.contains(child, parent) {
            return Err(TreeError::Cycle { parent, child });
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(TreeError::NotAChild { parent, reference });
            }
        }

        self.detach(child);
        let index = match reference {
            Some(reference) => self
                .index(reference)
                .ok_or(TreeError::NotAChild { parent, reference })?,
            None => self.children(parent).len(),
        };
        self.nodes[parent.0].children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Remove a node from the tree. With `keep_children`, its children take
    /// its place in the parent.
    pub fn remove(&mut self, id: NodeId, keep_children: bool) -> Result<(), TreeError> {
        let parent = self.parent(id).ok_or(TreeError::Detached(id))?;
        if keep_children {
            let index = self.index(id).ok_or(TreeError::Detached(id))?;
            let children = std::mem::take(&mut self.nodes[id.0].children);
            for &child in &children {
                self.nodes[child.0].parent = Some(parent);
            }
            self.nodes[parent.0]
                .children
                .splice(index..index, children);
        }
        self.detach(id);
        Ok(())
    }

    /// Split a text node at a character offset; the tail becomes a new
    /// sibling inserted right after it and is returned.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId, TreeError> {
        let text = self.text(id).ok_or(TreeError::NotText(id))?;
        let len = text.chars().count();
        if offset > len {
            return Err(TreeError::OffsetOutOfBounds {
                node: id,
                offset,
                len,
            });
        }
        let split_at = char_to_byte(text, offset);
        let tail = text[split_at..].to_string();
        let head = text[..split_at].to_string();
        self.set_text(id, &head)?;

        let tail_id = self.create_text(&tail);
        if let Some(parent) = self.parent(id) {
            let next = self.next_sibling(id);
            self.insert_before(parent, tail_id, next)?;
        }
        Ok(tail_id)
    }

    /// Merge adjacent text runs and drop empty text nodes below `id`.
    pub fn normalize_text(&mut self, id: NodeId) {
        let children = self.children(id).to_vec();
        let mut previous_text: Option<NodeId> = None;
        for child in children {
            if let Some(text) = self.text(child).map(str::to_string) {
                if text.is_empty() {
                    self.detach(child);
                    continue;
                }
                if let Some(prev) = previous_text {
                    if let NodeKind::Text(existing) = &mut self.nodes[prev.0].kind {
                        existing.push_str(&text);
                    }
                    self.detach(child);
                    continue;
                }
                previous_text = Some(child);
            } else {
                previous_text = None;
                self.normalize_text(child);
            }
        }
    }
}

/// Byte index of the `offset`-th character (clamped to the end).
pub(crate) fn char_to_byte(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map_or(text.len(), |(byte, _)| byte)
}

/// Substring by character offsets, clamped to the text.
pub(crate) fn char_slice(text: &str, from: usize, to: usize) -> &str {
    let start = char_to_byte(text, from);
    let end = char_to_byte(text, to.max(from));
    &text[start..end]
}
