pub mod dom;
pub mod schema;
pub mod selection;
pub mod selector;

// Re-export key types for easier usage
pub use dom::{Document, Fragment, NodeId, Position, Range, TreeError, TreeWalker};
pub use schema::Schema;
pub use selection::{
    Bookmark, BookmarkKind, Capabilities, ContentFormat, ContentRequest, MemoryRangeProvider,
    RangeProvider, Selection, SelectionOptions,
};
pub use selector::{Selector, SelectorError};
