//! Enter/exit notifications for selectors around the caret.

use crate::dom::{Document, NodeId};
use crate::selector::{Selector, SelectorError};

/// What a selector callback is told about the transition.
#[derive(Debug, Clone, Copy)]
pub struct SelectorContext<'a> {
    /// The innermost matching ancestor on enter, the caret node on exit.
    pub node: NodeId,
    pub selector: &'a str,
    /// The caret node and its ancestors below the editing root, innermost
    /// first.
    pub parents: &'a [NodeId],
}

pub type SelectorCallback = Box<dyn FnMut(bool, &SelectorContext<'_>)>;

struct Entry {
    selector: Selector,
    callbacks: Vec<SelectorCallback>,
    matched: bool,
}

/// Per-selector match state, fired in registration order.
#[derive(Default)]
pub struct SelectorTracker {
    entries: Vec<Entry>,
}

impl SelectorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `selector`. Registering a selector again adds
    /// another callback to the existing entry.
    pub fn register(
        &mut self,
        selector: &str,
        callback: impl FnMut(bool, &SelectorContext<'_>) + 'static,
    ) -> Result<(), SelectorError> {
        let selector = Selector::parse(selector)?;
        match self
            .entries
            .iter_mut()
            .find(|e| e.selector.as_str() == selector.as_str())
        {
            Some(entry) => entry.callbacks.push(Box::new(callback)),
            None => self.entries.push(Entry {
                selector,
                callbacks: vec![Box::new(callback)],
                matched: false,
            }),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `selector` matched at the last caret change.
    pub fn is_matched(&self, selector: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.matched && e.selector.as_str() == selector.trim())
    }

    /// Re-evaluate every selector against the ancestors of `node`.
    pub fn node_changed(&mut self, doc: &Document, node: NodeId) {
        let parents = doc.ancestors_until(node, doc.body());

        let mut exits = Vec::new();
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let found = parents
                .iter()
                .copied()
                .find(|&p| entry.selector.matches(doc, p));
            match found {
                Some(matched) if !entry.matched => {
                    entry.matched = true;
                    let context = SelectorContext {
                        node: matched,
                        selector: entry.selector.as_str(),
                        parents: &parents,
                    };
                    for callback in &mut entry.callbacks {
                        callback(true, &context);
                    }
                }
                None if entry.matched => exits.push(index),
                _ => {}
            }
        }

        for index in exits {
            let entry = &mut self.entries[index];
            entry.matched = false;
            let context = SelectorContext {
                node,
                selector: entry.selector.as_str(),
                parents: &parents,
            };
            for callback in &mut entry.callbacks {
                callback(false, &context);
            }
        }
    }
}
