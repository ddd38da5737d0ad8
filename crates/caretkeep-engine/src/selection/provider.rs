use crate::dom::{Document, Range};

/// The environment's native selection, reduced to one range.
///
/// Each host environment supplies one implementation. The engine never talks
/// to the environment any other way.
pub trait RangeProvider {
    /// `false` when there is no window/document to select in.
    fn is_available(&self) -> bool {
        true
    }

    /// The environment's current range, if it has one.
    fn current_range(&self, doc: &Document) -> Option<Range>;

    /// Replace the environment's range. Returns the range the environment
    /// reports back afterwards, which may differ from `range` if it adjusts
    /// selections on its own, or `None` if it dropped the selection.
    fn apply_range(&mut self, doc: &Document, range: Range) -> Option<Range>;

    /// Flip the active range so that the focus sits at its start. Returns
    /// `false` if the environment cannot express backwards selections.
    fn reverse(&mut self, _doc: &Document) -> bool {
        false
    }

    /// Whether the anchor precedes the focus.
    fn is_forward(&self) -> bool {
        true
    }
}

type AdjustFn = Box<dyn Fn(&Document, Range) -> Range>;

/// Headless provider keeping the range in memory.
///
/// An optional adjustment hook mimics environments that rewrite ranges as
/// they are applied.
#[derive(Default)]
pub struct MemoryRangeProvider {
    unavailable: bool,
    range: Option<Range>,
    backward: bool,
    adjust: Option<AdjustFn>,
}

impl MemoryRangeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider with no environment behind it.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_range(range: Range) -> Self {
        Self {
            range: Some(range),
            ..Self::default()
        }
    }

    /// Rewrite every applied range with `adjust` before storing it.
    pub fn with_adjustment(mut self, adjust: impl Fn(&Document, Range) -> Range + 'static) -> Self {
        self.adjust = Some(Box::new(adjust));
        self
    }
}

impl RangeProvider for MemoryRangeProvider {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn current_range(&self, _doc: &Document) -> Option<Range> {
        if self.unavailable {
            return None;
        }
        self.range
    }

    fn apply_range(&mut self, doc: &Document, range: Range) -> Option<Range> {
        if self.unavailable {
            return None;
        }
        let range = match &self.adjust {
            Some(adjust) => adjust(doc, range),
            None => range,
        };
        self.range = Some(range);
        self.backward = false;
        self.range
    }

    fn reverse(&mut self, _doc: &Document) -> bool {
        if self.range.is_some() {
            self.backward = true;
        }
        self.backward
    }

    fn is_forward(&self) -> bool {
        !self.backward
    }
}
