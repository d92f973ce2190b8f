//! Event types produced by the highlight iterator.
//!
//! Highlighting a document yields a flat stream of [`Event`]s. `Source`
//! events carry the literal byte ranges to render; the start/end pairs
//! bracket them with highlight and language information. Brackets are
//! balanced and properly nested, so a renderer can drive a simple stack.

/// The index of a recognized capture name within the caller's theme.
///
/// Produced by [`HighlightConfiguration::configure`], which maps the
/// query's capture names onto the caller's recognized names.
///
/// [`HighlightConfiguration::configure`]: crate::HighlightConfiguration::configure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaptureIndex(pub usize);

impl CaptureIndex {
    /// Sentinel meaning "no highlight / default style".
    ///
    /// Renderers use this to represent layer boundaries on their highlight
    /// stack without attaching a theme entry.
    pub const DEFAULT: Self = Self(usize::MAX);

    /// Returns the underlying index.
    #[inline]
    pub fn idx(self) -> usize {
        self.0
    }
}

/// A single event in the highlight stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    /// A language layer begins. Emitted once for the root document and once
    /// each time an injected language becomes active.
    LayerStart {
        /// Name of the language being entered.
        language: &'a str,
    },
    /// The most recently started layer ends.
    LayerEnd,
    /// A highlighted region begins.
    CaptureStart {
        /// Theme index assigned to the region.
        highlight: CaptureIndex,
    },
    /// The most recently started highlight region ends.
    CaptureEnd,
    /// A run of source bytes. Half-open; `source[start..end]` is the text
    /// to render under the currently open highlights.
    Source {
        /// Start byte offset, inclusive.
        start: usize,
        /// End byte offset, exclusive.
        end: usize,
    },
}
