//! Aggregation of streamed text fragments between step boundaries.

use crate::event::TextDelta;

/// Appends `next` to `buffer` and renders the whole buffer.
pub fn accumulate(mut buffer: Vec<TextDelta>, next: TextDelta) -> (Vec<TextDelta>, String) {
    buffer.push(next);
    let rendered = render_deltas(&buffer);
    (buffer, rendered)
}

/// Renders buffered fragments as one markdown text blob.
pub fn render_deltas(buffer: &[TextDelta]) -> String {
    let mut out = String::with_capacity(buffer.iter().map(|d| d.fragment.len()).sum());
    for delta in buffer {
        out.push_str(&delta.fragment);
    }
    out
}

/// Caller-held delta buffer for one step window.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeltaBuffer {
    fragments: Vec<TextDelta>,
}

impl DeltaBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fragment and returns the rendered text of the current window.
    pub fn push(&mut self, next: TextDelta) -> String {
        let (fragments, rendered) = accumulate(std::mem::take(&mut self.fragments), next);
        self.fragments = fragments;
        rendered
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[TextDelta] {
        &self.fragments
    }
}
