//! The highlighter and its event iterator.
//!
//! [`Highlighter`] owns the parser and a pool of reusable query cursors.
//! [`Highlighter::highlight`] parses the source, seeds one layer per active
//! language, and returns a [`HighlightIter`]: a lazy, pull-based stream of
//! [`Event`]s. New layers are parsed and spliced into the stream as
//! injections are discovered.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use tree_sitter::{Parser, QueryCursor};

use crate::captures::Capture;
use crate::config::{HighlightConfiguration, PROPERTY_LOCAL_SCOPE_INHERITS};
use crate::error::{HighlightError, Result};
use crate::event::{CaptureIndex, Event};
use crate::layer::{build_layers, injection_for_match, HighlightIterLayer, LocalDef, LocalScope};
use crate::ranges::{full_range, intersect_ranges};

/// Synthetic id used when the root layer was discarded before iteration.
const SYNTHETIC_ROOT_ID: usize = usize::MAX;

/// A syntax highlighter.
///
/// Holds the parser and a pool of query cursors that layers borrow while
/// active. Not safe for concurrent use; create one per thread.
pub struct Highlighter {
    pub(crate) parser: Parser,
    cursors: Vec<QueryCursor>,
    layer_ids: usize,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter {
    /// Creates a new highlighter.
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            cursors: Vec::new(),
            layer_ids: 0,
        }
    }

    pub(crate) fn pop_cursor(&mut self) -> QueryCursor {
        self.cursors.pop().unwrap_or_default()
    }

    pub(crate) fn push_cursor(&mut self, cursor: QueryCursor) {
        self.cursors.push(cursor);
    }

    pub(crate) fn next_layer_id(&mut self) -> usize {
        let id = self.layer_ids;
        self.layer_ids += 1;
        id
    }

    /// Highlights `source` with the given configuration.
    ///
    /// `injection_callback` resolves an injected language name to its
    /// configuration; returning `None` skips the injection. The optional
    /// `cancellation_flag` is checked once per iteration step; raising it
    /// terminates the stream with [`HighlightError::Cancelled`].
    ///
    /// The returned iterator borrows the highlighter, the configuration and
    /// the source; the source must outlive every event drawn from it.
    pub fn highlight<'a, F>(
        &'a mut self,
        config: &'a HighlightConfiguration,
        source: &'a [u8],
        cancellation_flag: Option<&'a AtomicBool>,
        mut injection_callback: F,
    ) -> Result<HighlightIter<'a, F>>
    where
        F: FnMut(&str) -> Option<&'a HighlightConfiguration>,
    {
        let layers = build_layers(
            source,
            &config.language_name,
            self,
            &mut injection_callback,
            config,
            0,
            vec![full_range()],
        )?;

        let mut iter = HighlightIter {
            source,
            language_name: &config.language_name,
            byte_offset: 0,
            highlighter: self,
            injection_callback,
            cancellation_flag,
            layers,
            next_events: VecDeque::new(),
            last_highlight_range: None,
            last_layer: None,
            open_layers: Vec::new(),
            done: false,
        };

        // Even a document with no captures gets a root layer bracket.
        if iter.layers.is_empty() {
            iter.open_layers.push((SYNTHETIC_ROOT_ID, 0));
            iter.next_events.push_back(Event::LayerStart {
                language: iter.language_name,
            });
        }

        iter.sort_layers();
        Ok(iter)
    }
}

/// Lazy event stream over one highlighted document.
///
/// Yields `Result<Event, HighlightError>`; after an error the stream is
/// terminal. See the crate docs for the event grammar.
pub struct HighlightIter<'a, F>
where
    F: FnMut(&str) -> Option<&'a HighlightConfiguration>,
{
    source: &'a [u8],
    language_name: &'a str,
    byte_offset: usize,
    highlighter: &'a mut Highlighter,
    injection_callback: F,
    cancellation_flag: Option<&'a AtomicBool>,
    layers: Vec<HighlightIterLayer<'a>>,
    next_events: VecDeque<Event<'a>>,
    last_highlight_range: Option<(usize, usize, usize)>,
    last_layer: Option<usize>,
    /// Stack of `(layer id, depth)` for layers whose start event has been
    /// emitted but whose end has not. Depths are strictly increasing.
    open_layers: Vec<(usize, usize)>,
    done: bool,
}

impl<'a, F> HighlightIter<'a, F>
where
    F: FnMut(&str) -> Option<&'a HighlightConfiguration>,
{
    /// Emits `event` at `offset`, first emitting the source run between the
    /// current position and `offset` if there is one.
    fn emit_event(&mut self, offset: usize, event: Event<'a>) -> Option<Result<Event<'a>>> {
        let result;
        if self.byte_offset < offset {
            result = Event::Source {
                start: self.byte_offset,
                end: offset,
            };
            self.byte_offset = offset;
            self.next_events.push_back(event);
        } else {
            result = event;
        }
        self.sort_layers();
        Some(Ok(result))
    }

    /// Restores the layer ordering after the front layer's boundary moved:
    /// bubbles the front layer back past every layer with a smaller key and
    /// retires exhausted layers as they surface.
    fn sort_layers(&mut self) {
        while !self.layers.is_empty() {
            if let Some(key) = self.layers[0].sort_key() {
                let mut i = 0;
                while i + 1 < self.layers.len() {
                    if let Some(next_key) = self.layers[i + 1].sort_key() {
                        if next_key < key {
                            i += 1;
                            continue;
                        }
                    }
                    break;
                }
                if i > 0 {
                    self.layers[..=i].rotate_left(1);
                }
                break;
            }
            let layer = self.layers.remove(0);
            self.highlighter.push_cursor(layer.into_cursor());
        }
    }

    /// Inserts a freshly constructed injection layer in sort-key order,
    /// retiring any exhausted layers encountered along the way. The front
    /// layer is mid-processing and never displaced.
    fn insert_layer(&mut self, mut layer: HighlightIterLayer<'a>) {
        let Some(key) = layer.sort_key() else {
            self.highlighter.push_cursor(layer.into_cursor());
            return;
        };
        let mut i = 1;
        while i < self.layers.len() {
            if let Some(key_i) = self.layers[i].sort_key() {
                if key_i > key {
                    self.layers.insert(i, layer);
                    return;
                }
                i += 1;
            } else {
                let removed = self.layers.remove(i);
                self.highlighter.push_cursor(removed.into_cursor());
            }
        }
        self.layers.push(layer);
    }

    fn layer_is_live(&self, id: usize) -> bool {
        self.layers.iter().any(|layer| layer.id() == id)
    }

    /// Emits the bracket events for a change of active layer: closes layers
    /// that finished, and opens the new layer if it is not already open.
    /// Source bytes preceding the new layer's first boundary are emitted
    /// before its start event so they stay outside the new bracket.
    fn transition_to_front(&mut self) -> bool {
        let front_id = self.layers[0].id();
        let mut emitted = false;

        while let Some(&(id, _)) = self.open_layers.last() {
            if id == front_id || self.layer_is_live(id) {
                break;
            }
            self.open_layers.pop();
            self.next_events.push_back(Event::LayerEnd);
            emitted = true;
        }

        if !self.open_layers.iter().any(|&(id, _)| id == front_id) {
            // Bytes before an injected layer's first boundary belong to the
            // enclosing layer, so they go out before the start event. The
            // root layer opens immediately instead.
            if !self.open_layers.is_empty() {
                let offset = self.layers[0]
                    .sort_key()
                    .map_or(self.byte_offset, |key| key.offset);
                if self.byte_offset < offset {
                    self.next_events.push_back(Event::Source {
                        start: self.byte_offset,
                        end: offset,
                    });
                    self.byte_offset = offset;
                }
            }
            let depth = self.layers[0].depth;
            self.open_layers.push((front_id, depth));
            self.next_events.push_back(Event::LayerStart {
                language: self.layers[0].language_name(),
            });
            emitted = true;
        }

        self.last_layer = Some(front_id);
        emitted
    }

    /// Closes out the stream once every layer is exhausted: any still-open
    /// injected layers end first, then the remaining source, then the root.
    fn finish(&mut self) {
        while self.open_layers.len() > 1 {
            self.open_layers.pop();
            self.next_events.push_back(Event::LayerEnd);
        }
        if self.byte_offset < self.source.len() {
            self.next_events.push_back(Event::Source {
                start: self.byte_offset,
                end: self.source.len(),
            });
            self.byte_offset = self.source.len();
        }
        if self.open_layers.pop().is_some() {
            self.next_events.push_back(Event::LayerEnd);
        }
        self.done = true;
    }
}

impl<'a, F> Iterator for HighlightIter<'a, F>
where
    F: FnMut(&str) -> Option<&'a HighlightConfiguration>,
{
    type Item = Result<Event<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        'main: loop {
            if let Some(event) = self.next_events.pop_front() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }

            if let Some(flag) = self.cancellation_flag {
                if flag.load(Ordering::Relaxed) {
                    self.done = true;
                    return Some(Err(HighlightError::Cancelled));
                }
            }

            if self.layers.is_empty() {
                self.finish();
                match self.next_events.pop_front() {
                    Some(event) => return Some(Ok(event)),
                    None => return None,
                }
            }

            if self.last_layer != Some(self.layers[0].id()) && self.transition_to_front() {
                continue 'main;
            }

            // Peek the front layer's next capture. A pending highlight end
            // at or before it goes out first.
            let layer = &mut self.layers[0];
            let range;
            if let Some(peeked) = layer.captures.peek() {
                range = peeked.node().byte_range();
                if let Some(&end_byte) = layer.highlight_end_stack.last() {
                    if end_byte <= range.start {
                        layer.highlight_end_stack.pop();
                        return self.emit_event(end_byte, Event::CaptureEnd);
                    }
                }
            } else {
                if let Some(&end_byte) = layer.highlight_end_stack.last() {
                    layer.highlight_end_stack.pop();
                    return self.emit_event(end_byte, Event::CaptureEnd);
                }
                // Nothing left in this layer; its end bracket is emitted at
                // the next transition or at finish.
                let layer = self.layers.remove(0);
                self.highlighter.push_cursor(layer.into_cursor());
                self.sort_layers();
                continue 'main;
            }

            let mut captured: Capture<'a> = layer
                .captures
                .advance()
                .expect("peeked capture is consumable");

            // Injection patterns spawn a sub-layer and emit nothing.
            if captured.pattern_index < layer.config.locals_pattern_index {
                let (language_name, content_node, include_children) = injection_for_match(
                    layer.config,
                    self.language_name,
                    &layer.config.query,
                    captured.pattern_index,
                    &captured.captures,
                    self.source,
                );
                layer.captures.remove_current_match();
                let depth = layer.depth;

                if let (Some(language_name), Some(content_node)) = (language_name, content_node) {
                    if let Some(new_config) = (self.injection_callback)(language_name) {
                        let ranges =
                            intersect_ranges(&self.layers[0].ranges, &[content_node], include_children);
                        if !ranges.is_empty() {
                            let new_layers = match build_layers(
                                self.source,
                                self.language_name,
                                self.highlighter,
                                &mut self.injection_callback,
                                new_config,
                                depth + 1,
                                ranges,
                            ) {
                                Ok(layers) => layers,
                                Err(err) => {
                                    self.done = true;
                                    return Some(Err(err));
                                }
                            };
                            for new_layer in new_layers {
                                self.insert_layer(new_layer);
                            }
                        }
                    }
                }

                self.sort_layers();
                continue 'main;
            }

            let layer = &mut self.layers[0];

            // Close any local scopes that ended before this capture.
            while let Some(scope) = layer.scope_stack.last() {
                if range.start > scope.range.end {
                    layer.scope_stack.pop();
                } else {
                    break;
                }
            }

            // Locals patterns update the scope stack and classify the node;
            // all locals captures for one node are absorbed before moving
            // on, and a trailing highlight capture for the same node falls
            // through with the classification intact.
            let mut reference_highlight = None;
            let mut pending_def: Option<(usize, usize)> = None;
            while captured.pattern_index < layer.config.highlights_pattern_index {
                let capture_index = captured.capture().index;
                if layer.config.local_scope_capture_index == Some(capture_index) {
                    pending_def = None;
                    let mut inherits = true;
                    for property in layer.config.query.property_settings(captured.pattern_index) {
                        if property.key.as_ref() == PROPERTY_LOCAL_SCOPE_INHERITS {
                            inherits = property.value.as_deref() == Some("true");
                        }
                    }
                    layer.scope_stack.push(LocalScope {
                        inherits,
                        range: range.clone(),
                        local_defs: Vec::new(),
                    });
                } else if layer.config.local_def_capture_index == Some(capture_index) {
                    reference_highlight = None;
                    pending_def = None;
                    if let Some(name) = self.source.get(range.clone()) {
                        let scope_index = layer.scope_stack.len() - 1;
                        let scope = &mut layer.scope_stack[scope_index];
                        scope.local_defs.push(LocalDef {
                            name,
                            range: range.clone(),
                            highlight: None,
                        });
                        pending_def = Some((scope_index, scope.local_defs.len() - 1));
                    }
                } else if layer.config.local_ref_capture_index == Some(capture_index)
                    && pending_def.is_none()
                {
                    if let Some(name) = self.source.get(range.clone()) {
                        'scopes: for scope in layer.scope_stack.iter().rev() {
                            let def = scope
                                .local_defs
                                .iter()
                                .rev()
                                .find(|def| def.name == name && range.start >= def.range.end);
                            if let Some(def) = def {
                                reference_highlight = def.highlight;
                                break 'scopes;
                            }
                            if !scope.inherits {
                                break;
                            }
                        }
                    }
                }

                match layer.captures.peek() {
                    Some(next) if next.node() == captured.node() => {
                        captured = layer
                            .captures
                            .advance()
                            .expect("peeked capture is consumable");
                    }
                    _ => {
                        self.sort_layers();
                        continue 'main;
                    }
                }
            }

            // A highlight capture. Skip it when a shallower layer is seeing
            // a range an inner layer already highlighted.
            if let Some((last_start, last_end, last_depth)) = self.last_highlight_range {
                if range.start == last_start && range.end == last_end && layer.depth < last_depth {
                    self.sort_layers();
                    continue 'main;
                }
            }

            // Later highlight patterns matching the same node take priority,
            // except patterns disabled for local variables when the node was
            // classified as one.
            loop {
                let same_node = layer
                    .captures
                    .peek()
                    .is_some_and(|next| next.node() == captured.node());
                if !same_node {
                    break;
                }
                let following = layer
                    .captures
                    .advance()
                    .expect("peeked capture is consumable");
                if (pending_def.is_some() || reference_highlight.is_some())
                    && layer.config.non_local_variable_patterns[following.pattern_index]
                {
                    continue;
                }
                captured = following;
            }

            let current_highlight =
                layer.config.highlight_indices[captured.capture().index as usize];

            // A definition's resolved highlight is what its references
            // inherit.
            if let Some((scope_index, def_index)) = pending_def {
                if let Some(def) = layer
                    .scope_stack
                    .get_mut(scope_index)
                    .and_then(|scope| scope.local_defs.get_mut(def_index))
                {
                    def.highlight = current_highlight;
                }
            }

            let highlight = reference_highlight.or(current_highlight);
            if let Some(highlight) = highlight {
                self.last_highlight_range = Some((range.start, range.end, layer.depth));
                layer.highlight_end_stack.push(range.end);
                return self.emit_event(range.start, Event::CaptureStart { highlight });
            }

            self.sort_layers();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rust_config(highlights: &str, injections: &str, locals: &str) -> HighlightConfiguration {
        HighlightConfiguration::new(
            tree_sitter_rust::LANGUAGE.into(),
            "rust",
            highlights,
            injections,
            locals,
        )
        .unwrap()
    }

    fn html_config(highlights: &str, injections: &str) -> HighlightConfiguration {
        HighlightConfiguration::new(
            tree_sitter_html::LANGUAGE.into(),
            "html",
            highlights,
            injections,
            "",
        )
        .unwrap()
    }

    fn collect<'a, F>(iter: HighlightIter<'a, F>) -> Vec<Event<'a>>
    where
        F: FnMut(&str) -> Option<&'a HighlightConfiguration>,
    {
        iter.map(|event| event.unwrap()).collect()
    }

    /// Source events must tile `[0, len)` exactly, in order.
    fn assert_source_coverage(events: &[Event], len: usize) {
        let mut position = 0;
        for event in events {
            if let Event::Source { start, end } = event {
                assert_eq!(*start, position, "source events out of order or gapped");
                assert!(start < end, "empty source event");
                position = *end;
            }
        }
        assert_eq!(position, len, "source events do not cover the input");
    }

    /// Start/end events must be balanced and properly nested.
    fn assert_balanced(events: &[Event]) {
        let mut stack = Vec::new();
        for event in events {
            match event {
                Event::LayerStart { .. } => stack.push("layer"),
                Event::CaptureStart { .. } => stack.push("capture"),
                Event::LayerEnd => assert_eq!(stack.pop(), Some("layer")),
                Event::CaptureEnd => assert_eq!(stack.pop(), Some("capture")),
                Event::Source { .. } => assert!(!stack.is_empty()),
            }
        }
        assert!(stack.is_empty(), "unclosed brackets: {stack:?}");
    }

    fn capture_starts(events: &[Event]) -> Vec<CaptureIndex> {
        events
            .iter()
            .filter_map(|event| match event {
                Event::CaptureStart { highlight } => Some(*highlight),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_single_capture_document() {
        let mut config = rust_config("(identifier) @variable", "", "");
        config.configure(&["variable"]);
        let mut highlighter = Highlighter::new();
        let source = b"fn x() {}";

        let events = collect(
            highlighter
                .highlight(&config, source, None, |_| None)
                .unwrap(),
        );

        assert_eq!(
            events,
            vec![
                Event::LayerStart { language: "rust" },
                Event::Source { start: 0, end: 3 },
                Event::CaptureStart {
                    highlight: CaptureIndex(0)
                },
                Event::Source { start: 3, end: 4 },
                Event::CaptureEnd,
                Event::Source { start: 4, end: 9 },
                Event::LayerEnd,
            ]
        );
    }

    #[test]
    fn test_document_with_no_matches_still_gets_layer_events() {
        let mut config = rust_config("(string_literal) @string", "", "");
        config.configure(&["string"]);
        let mut highlighter = Highlighter::new();
        let source = b"fn main() {}";

        let events = collect(
            highlighter
                .highlight(&config, source, None, |_| None)
                .unwrap(),
        );

        assert_eq!(
            events,
            vec![
                Event::LayerStart { language: "rust" },
                Event::Source {
                    start: 0,
                    end: source.len()
                },
                Event::LayerEnd,
            ]
        );
    }

    #[test]
    fn test_cancellation_before_first_pull() {
        let config = rust_config("(identifier) @variable", "", "");
        let mut highlighter = Highlighter::new();
        let source = b"fn main() {}";
        let cancelled = AtomicBool::new(true);

        let mut iter = highlighter
            .highlight(&config, source, Some(&cancelled), |_| None)
            .unwrap();

        assert!(matches!(
            iter.next(),
            Some(Err(HighlightError::Cancelled))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_coverage_and_balance_on_plain_document() {
        let mut config = rust_config(
            "\"fn\" @keyword\n(identifier) @variable\n(string_literal) @string",
            "",
            "",
        );
        config.configure(&["keyword", "variable", "string"]);
        let mut highlighter = Highlighter::new();
        let source = b"fn greet(name: u32) {\n    let s = \"hi\";\n}\n";

        let events = collect(
            highlighter
                .highlight(&config, source, None, |_| None)
                .unwrap(),
        );

        assert_source_coverage(&events, source.len());
        assert_balanced(&events);
        assert!(!capture_starts(&events).is_empty());
    }

    #[test]
    fn test_injected_layer_nests_inside_parent() {
        let mut html = html_config(
            "(tag_name) @tag",
            r#"
(script_element (raw_text) @injection.content (#set! injection.language "rust"))
((comment) @injection.language)
"#,
        );
        html.configure(&["tag"]);
        let mut rust = rust_config("(identifier) @variable", "", "");
        rust.configure(&["variable"]);

        let mut highlighter = Highlighter::new();
        let source = b"<script>fn x() {}</script>";

        let events = collect(
            highlighter
                .highlight(&html, source, None, |name| {
                    (name == "rust").then_some(&rust)
                })
                .unwrap(),
        );

        assert_source_coverage(&events, source.len());
        assert_balanced(&events);

        let structure: Vec<&Event> = events
            .iter()
            .filter(|event| !matches!(event, Event::Source { .. }))
            .collect();
        assert_eq!(
            structure,
            vec![
                // html opens and highlights the start tag's name.
                &Event::LayerStart { language: "html" },
                &Event::CaptureStart {
                    highlight: CaptureIndex(0)
                },
                &Event::CaptureEnd,
                // the injected layer nests inside html, highlighting `x`.
                &Event::LayerStart { language: "rust" },
                &Event::CaptureStart {
                    highlight: CaptureIndex(0)
                },
                &Event::CaptureEnd,
                &Event::LayerEnd,
                // back in html for the end tag's name.
                &Event::CaptureStart {
                    highlight: CaptureIndex(0)
                },
                &Event::CaptureEnd,
                &Event::LayerEnd,
            ]
        );

        // The injected layer's source events stay within the script body.
        let mut depth_rust = false;
        for event in &events {
            match event {
                Event::LayerStart { language } => depth_rust = *language == "rust",
                Event::LayerEnd => depth_rust = false,
                Event::Source { start, end } if depth_rust => {
                    assert!(*start >= 8 && *end <= 17, "rust source outside injection");
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_identical_ranges_highlight_once_across_layers() {
        let mut html = html_config(
            "(raw_text) @string",
            r#"
(script_element (raw_text) @injection.content (#set! injection.language "rust"))
((comment) @injection.language)
"#,
        );
        html.configure(&["string"]);
        let mut rust = rust_config("(identifier) @variable", "", "");
        rust.configure(&["variable"]);

        let mut highlighter = Highlighter::new();
        // The raw_text node and the injected identifier are the same byte
        // range, so only one of the two layers may highlight it.
        let source = b"<script>x</script>";

        let events = collect(
            highlighter
                .highlight(&html, source, None, |name| {
                    (name == "rust").then_some(&rust)
                })
                .unwrap(),
        );

        assert_source_coverage(&events, source.len());
        assert_balanced(&events);
        assert_eq!(capture_starts(&events).len(), 1);
    }

    #[test]
    fn test_local_references_inherit_definition_highlights() {
        let mut config = rust_config(
            "(identifier) @variable\n(closure_parameters (identifier) @variable.parameter)",
            "",
            "(block) @local.scope\n(closure_expression) @local.scope\n(let_declaration pattern: (identifier) @local.definition)\n(closure_parameters (identifier) @local.definition)\n(identifier) @local.reference",
        );
        config.configure(&["variable", "variable.parameter"]);
        let mut highlighter = Highlighter::new();
        let source = b"fn f() { let a = 1; let g = |a| a; a; }";

        let events = collect(
            highlighter
                .highlight(&config, source, None, |_| None)
                .unwrap(),
        );

        assert_source_coverage(&events, source.len());
        assert_balanced(&events);

        // In order: `f`, the two let-bound names, the closure parameter,
        // the closure-body reference (which resolves to the parameter and
        // inherits its highlight), and the trailing reference (which
        // resolves to the outer `a`).
        assert_eq!(
            capture_starts(&events),
            vec![
                CaptureIndex(0),
                CaptureIndex(0),
                CaptureIndex(0),
                CaptureIndex(1),
                CaptureIndex(1),
                CaptureIndex(0),
            ]
        );
    }

    #[test]
    fn test_non_local_patterns_skipped_for_local_variables() {
        let mut config = rust_config(
            "(identifier) @variable\n((identifier) @constant (#is-not? local))",
            "",
            "(block) @local.scope\n(let_declaration pattern: (identifier) @local.definition)\n(identifier) @local.reference",
        );
        config.configure(&["variable", "constant"]);
        let mut highlighter = Highlighter::new();
        let source = b"fn f() { let a = 1; a; }";

        let events = collect(
            highlighter
                .highlight(&config, source, None, |_| None)
                .unwrap(),
        );

        // `f` is not a resolved local, so the later `@constant` pattern
        // overshadows `@variable`. The definition and the resolved
        // reference keep `@variable` because `@constant` is disabled for
        // local variables.
        assert_eq!(
            capture_starts(&events),
            vec![CaptureIndex(1), CaptureIndex(0), CaptureIndex(0)]
        );
    }

    #[test]
    fn test_combined_injection_builds_one_layer_for_all_ranges() {
        let mut html = html_config(
            "(tag_name) @tag",
            r#"
(script_element (raw_text) @injection.content
 (#set! injection.language "rust")
 (#set! injection.combined))
((comment) @injection.language)
"#,
        );
        html.configure(&["tag"]);
        let mut rust = rust_config("(identifier) @variable", "", "");
        rust.configure(&["variable"]);

        let mut highlighter = Highlighter::new();
        let source = b"<script>fn a() {}</script><script>fn b() {}</script>";

        let events = collect(
            highlighter
                .highlight(&html, source, None, |name| {
                    (name == "rust").then_some(&rust)
                })
                .unwrap(),
        );

        assert_source_coverage(&events, source.len());
        assert_balanced(&events);

        // Both script bodies are highlighted by a single combined layer.
        let rust_starts = events
            .iter()
            .filter(|event| matches!(event, Event::LayerStart { language: "rust" }))
            .count();
        assert_eq!(rust_starts, 1);

        // Two identifiers and four tag names.
        assert_eq!(capture_starts(&events).len(), 6);
    }

    #[test]
    fn test_stream_is_terminal_after_exhaustion() {
        let mut config = rust_config("(identifier) @variable", "", "");
        config.configure(&["variable"]);
        let mut highlighter = Highlighter::new();
        let source = b"fn x() {}";

        let mut iter = highlighter
            .highlight(&config, source, None, |_| None)
            .unwrap();
        while iter.next().is_some() {}
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }
}
