//! Peekable wrapper over a query's capture stream.
//!
//! The raw [`tree_sitter::QueryCaptures`] iterator is a streaming iterator:
//! each yielded match is only valid until the cursor advances. The highlight
//! engine needs one capture of lookahead, so [`CaptureStream`] snapshots the
//! peeked match's capture list before handing it out.

use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, QueryCapture, QueryCaptures};

/// A capture snapshot taken from the underlying stream.
///
/// Holds its own copy of the whole capture list of the originating match,
/// since the engine inspects sibling captures (injection content and
/// language, definition values) after the cursor may have moved on.
#[derive(Debug, Clone)]
pub(crate) struct Capture<'tree> {
    /// Pattern that produced the match.
    pub pattern_index: usize,
    /// Which entry of `captures` this step of the stream refers to.
    pub capture_index: usize,
    /// All captures of the originating match.
    pub captures: Vec<QueryCapture<'tree>>,
}

impl<'tree> Capture<'tree> {
    /// The capture this stream step refers to.
    #[inline]
    pub fn capture(&self) -> &QueryCapture<'tree> {
        &self.captures[self.capture_index]
    }

    /// The captured node.
    #[inline]
    pub fn node(&self) -> Node<'tree> {
        self.capture().node
    }
}

/// One-step-lookahead iterator over query captures.
pub(crate) struct CaptureStream<'a> {
    inner: QueryCaptures<'a, 'a, &'a [u8], &'a [u8]>,
    peeked: Option<Capture<'a>>,
}

impl<'a> CaptureStream<'a> {
    pub fn new(inner: QueryCaptures<'a, 'a, &'a [u8], &'a [u8]>) -> Self {
        Self {
            inner,
            peeked: None,
        }
    }

    /// Returns the next capture without consuming it.
    pub fn peek(&mut self) -> Option<&Capture<'a>> {
        if self.peeked.is_none() {
            self.peeked = self.inner.next().map(|(mat, capture_index)| Capture {
                pattern_index: mat.pattern_index,
                capture_index: *capture_index,
                captures: mat.captures.to_vec(),
            });
        }
        self.peeked.as_ref()
    }

    /// Consumes and returns the next capture.
    pub fn advance(&mut self) -> Option<Capture<'a>> {
        self.peek();
        self.peeked.take()
    }

    /// Drops the remaining captures of the match that produced the most
    /// recently consumed capture.
    ///
    /// Must be called before the stream is peeked again; the underlying
    /// cursor still points at that match until the next advance.
    pub fn remove_current_match(&mut self) {
        debug_assert!(
            self.peeked.is_none(),
            "remove_current_match called after a peek"
        );
        if let Some((mat, _)) = self.inner.get() {
            mat.remove();
        }
    }
}
