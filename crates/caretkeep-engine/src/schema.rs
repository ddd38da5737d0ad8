use std::collections::HashSet;

use caretkeep_config::SchemaConfig;

use crate::dom::{Document, NodeId};

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "caption", "center", "dd", "details", "dir",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hgroup", "hr", "li", "main", "menu", "nav", "ol", "p", "pre",
    "section", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "audio", "base", "br", "col", "embed", "hr", "iframe", "img", "input", "link", "meta",
    "object", "param", "source", "track", "video", "wbr",
];

/// Element classification consulted by normalization, block collection and
/// extraction.
///
/// *Block* elements bound caret searches. *Void* elements cannot hold a caret
/// themselves (line breaks, embedded objects) and are stepped around.
#[derive(Debug, Clone)]
pub struct Schema {
    block: HashSet<String>,
    void: HashSet<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            block: BLOCK_ELEMENTS.iter().map(|s| s.to_string()).collect(),
            void: VOID_ELEMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Schema {
    /// Built-in HTML table extended with the configured extra elements.
    pub fn from_config(config: &SchemaConfig) -> Self {
        let mut schema = Self::default();
        schema.block.extend(
            config
                .extra_block_elements
                .iter()
                .map(|t| t.to_ascii_lowercase()),
        );
        schema.void.extend(
            config
                .extra_void_elements
                .iter()
                .map(|t| t.to_ascii_lowercase()),
        );
        schema
    }

    pub fn is_block_tag(&self, tag: &str) -> bool {
        self.block.contains(tag)
    }

    pub fn is_void_tag(&self, tag: &str) -> bool {
        self.void.contains(tag)
    }

    pub fn is_block(&self, doc: &Document, node: NodeId) -> bool {
        doc.tag(node).is_some_and(|t| self.is_block_tag(t))
    }

    pub fn is_void(&self, doc: &Document, node: NodeId) -> bool {
        doc.tag(node).is_some_and(|t| self.is_void_tag(t))
    }

    /// Headings are blocks, but extraction treats them like inline context.
    pub fn is_heading(&self, doc: &Document, node: NodeId) -> bool {
        matches!(doc.tag(node), Some("h1" | "h2" | "h3" | "h4" | "h5" | "h6"))
    }

    pub fn is_table(&self, doc: &Document, node: NodeId) -> bool {
        doc.is_tag(node, "table")
    }

    /// Nearest block ancestor-or-self below the editing root.
    pub fn block_ancestor(&self, doc: &Document, node: NodeId) -> Option<NodeId> {
        doc.closest(node, |n| self.is_block(doc, n))
    }
}
