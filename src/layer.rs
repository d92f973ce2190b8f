//! Language layers and their construction.
//!
//! Each layer is one grammar's view of a subregion of the source: a parse
//! tree restricted to the layer's included ranges, a capture stream over the
//! combined query, and the stacks the iterator maintains while walking it.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::mem;
use std::ops::Range as ByteRange;

use tracing::{debug, warn};
use tree_sitter::{Node, Query, QueryCapture, QueryCursor, Range, Tree};

use crate::captures::CaptureStream;
use crate::config::{
    HighlightConfiguration, PROPERTY_INJECTION_INCLUDE_CHILDREN, PROPERTY_INJECTION_LANGUAGE,
    PROPERTY_INJECTION_PARENT, PROPERTY_INJECTION_SELF,
};
use crate::error::Result;
use crate::event::CaptureIndex;
use crate::highlighter::Highlighter;
use crate::ranges::intersect_ranges;

/// A local variable definition tracked within a scope.
#[derive(Debug)]
pub(crate) struct LocalDef<'a> {
    /// The definition's name, a slice of the caller's source.
    pub name: &'a [u8],
    /// Byte range of the defining occurrence.
    pub range: ByteRange<usize>,
    /// Highlight assigned to the defining occurrence; references inherit it.
    pub highlight: Option<CaptureIndex>,
}

/// A lexical scope for local-variable resolution.
#[derive(Debug)]
pub(crate) struct LocalScope<'a> {
    /// Whether references inside this scope may resolve to definitions in
    /// enclosing scopes.
    pub inherits: bool,
    /// Byte range the scope spans.
    pub range: ByteRange<usize>,
    /// Definitions introduced in this scope, in source order.
    pub local_defs: Vec<LocalDef<'a>>,
}

/// Ordering key for the layer queue.
///
/// Layers are ordered by their next boundary byte. At equal offsets, closing
/// a highlight precedes opening one, and the deeper layer goes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SortKey {
    pub offset: usize,
    pub start: bool,
    pub depth: usize,
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.offset
            .cmp(&other.offset)
            .then(self.start.cmp(&other.start))
            .then(other.depth.cmp(&self.depth))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One grammar's view of a subregion of the source.
pub(crate) struct HighlightIterLayer<'a> {
    // The tree is never read back, but the capture stream borrows nodes out
    // of it, so it must live exactly as long as the stream.
    _tree: Tree,
    cursor: QueryCursor,
    pub captures: CaptureStream<'a>,
    pub config: &'a HighlightConfiguration,
    pub highlight_end_stack: Vec<usize>,
    pub scope_stack: Vec<LocalScope<'a>>,
    pub ranges: Vec<Range>,
    pub depth: usize,
    id: usize,
}

impl<'a> HighlightIterLayer<'a> {
    /// Stable identity for layer-transition tracking.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The language this layer highlights with.
    pub fn language_name(&self) -> &'a str {
        &self.config.language_name
    }

    /// Derives the layer's position in the queue from its next pending
    /// capture and its innermost open highlight. `None` means the layer is
    /// exhausted and can be retired.
    pub fn sort_key(&mut self) -> Option<SortKey> {
        let depth = self.depth;
        let next_start = self.captures.peek().map(|c| c.node().start_byte());
        let next_end = self.highlight_end_stack.last().copied();
        match (next_start, next_end) {
            (Some(start), Some(end)) if start < end => Some(SortKey {
                offset: start,
                start: true,
                depth,
            }),
            (_, Some(end)) => Some(SortKey {
                offset: end,
                start: false,
                depth,
            }),
            (Some(start), None) => Some(SortKey {
                offset: start,
                start: true,
                depth,
            }),
            (None, None) => None,
        }
    }

    /// Tears the layer down, releasing its query cursor for reuse.
    pub fn into_cursor(self) -> QueryCursor {
        let Self {
            captures, cursor, ..
        } = self;
        drop(captures);
        cursor
    }
}

/// Work item for iterative construction of combined-injection layers.
struct QueueItem<'a> {
    config: &'a HighlightConfiguration,
    depth: usize,
    ranges: Vec<Range>,
}

/// Builds the layer (or layers) for one language over the given ranges.
///
/// Combined injections discovered while running the injections query are
/// expanded breadth-first through a local work queue rather than by
/// recursion. Layers whose ranges are rejected by the parser, whose parse
/// fails, or whose capture stream is empty are skipped; skipping is not an
/// error.
pub(crate) fn build_layers<'a, F>(
    source: &'a [u8],
    parent_name: &'a str,
    highlighter: &mut Highlighter,
    injection_callback: &mut F,
    config: &'a HighlightConfiguration,
    depth: usize,
    ranges: Vec<Range>,
) -> Result<Vec<HighlightIterLayer<'a>>>
where
    F: FnMut(&str) -> Option<&'a HighlightConfiguration>,
{
    let mut result = Vec::new();
    let mut queue: VecDeque<QueueItem<'a>> = VecDeque::new();
    let mut item = QueueItem {
        config,
        depth,
        ranges,
    };

    loop {
        if highlighter.parser.set_included_ranges(&item.ranges).is_ok() {
            highlighter.parser.set_language(&item.config.language)?;

            if let Some(tree) = highlighter.parser.parse(source, None) {
                debug!(
                    language = %item.config.language_name,
                    depth = item.depth,
                    "built highlight layer"
                );
                let mut cursor = highlighter.pop_cursor();

                // Run the combined-injections query over the fresh tree and
                // queue one layer per populated pattern.
                if let Some(combined_query) = &item.config.combined_injections_query {
                    enqueue_combined_injections(
                        source,
                        parent_name,
                        injection_callback,
                        item.config,
                        combined_query,
                        &tree,
                        &mut cursor,
                        item.depth,
                        &item.ranges,
                        &mut queue,
                    );
                }

                // SAFETY: the tree and cursor are moved into the layer below
                // and are heap-backed handles, so moving the layer does not
                // move what the capture stream points at. The stream is
                // dropped with the layer.
                let tree_ref = unsafe { mem::transmute::<&Tree, &'a Tree>(&tree) };
                let cursor_ref =
                    unsafe { mem::transmute::<&mut QueryCursor, &'a mut QueryCursor>(&mut cursor) };
                let mut captures = CaptureStream::new(cursor_ref.captures(
                    &item.config.query,
                    tree_ref.root_node(),
                    source,
                ));

                if captures.peek().is_some() {
                    result.push(HighlightIterLayer {
                        _tree: tree,
                        cursor,
                        captures,
                        config: item.config,
                        highlight_end_stack: Vec::new(),
                        scope_stack: vec![LocalScope {
                            inherits: false,
                            range: 0..usize::MAX,
                            local_defs: Vec::new(),
                        }],
                        ranges: item.ranges,
                        depth: item.depth,
                        id: highlighter.next_layer_id(),
                    });
                } else {
                    drop(captures);
                    highlighter.push_cursor(cursor);
                }
            }
        } else {
            warn!(
                language = %item.config.language_name,
                "skipping injection: parser rejected included ranges"
            );
        }

        match queue.pop_front() {
            Some(next) => item = next,
            None => break,
        }
    }

    Ok(result)
}

/// Groups combined-injection matches by pattern and queues a work item for
/// each group that resolves to a known language.
#[allow(clippy::too_many_arguments)]
fn enqueue_combined_injections<'a, 'tree, F>(
    source: &'a [u8],
    parent_name: &'a str,
    injection_callback: &mut F,
    config: &'a HighlightConfiguration,
    combined_query: &'a Query,
    tree: &'tree Tree,
    cursor: &mut QueryCursor,
    depth: usize,
    ranges: &[Range],
    queue: &mut VecDeque<QueueItem<'a>>,
) where
    F: FnMut(&str) -> Option<&'a HighlightConfiguration>,
{
    use streaming_iterator::StreamingIterator;

    struct Injection<'a, 'tree> {
        language_name: Option<&'a str>,
        nodes: Vec<Node<'tree>>,
        include_children: bool,
    }

    let mut injections_by_pattern: Vec<Injection<'a, 'tree>> = (0..combined_query.pattern_count())
        .map(|_| Injection {
            language_name: None,
            nodes: Vec::new(),
            include_children: false,
        })
        .collect();

    let mut matches = cursor.matches(combined_query, tree.root_node(), source);
    while let Some(mat) = matches.next() {
        let (language_name, content_node, include_children) = injection_for_match(
            config,
            parent_name,
            combined_query,
            mat.pattern_index,
            mat.captures,
            source,
        );

        let injection = &mut injections_by_pattern[mat.pattern_index];
        if language_name.is_some() {
            injection.language_name = language_name;
        }
        if let Some(node) = content_node {
            injection.nodes.push(node);
        }
        injection.include_children = include_children;
    }

    for injection in injections_by_pattern {
        let Some(language_name) = injection.language_name else {
            continue;
        };
        if injection.nodes.is_empty() {
            continue;
        }
        let Some(next_config) = injection_callback(language_name) else {
            warn!(language = language_name, "unresolved combined injection");
            continue;
        };
        let next_ranges = intersect_ranges(ranges, &injection.nodes, injection.include_children);
        if !next_ranges.is_empty() {
            queue.push_back(QueueItem {
                config: next_config,
                depth: depth + 1,
                ranges: next_ranges,
            });
        }
    }
}

/// Extracts the injected language, content node and include-children flag
/// from one injection match.
///
/// The language comes from the `injection.language` capture's text when
/// present; otherwise the pattern's `injection.language`, `injection.self`
/// and `injection.parent` properties provide fallbacks, in that order.
/// Returns no language when the configuration never declares the reserved
/// injection captures.
pub(crate) fn injection_for_match<'a, 'tree>(
    config: &'a HighlightConfiguration,
    parent_name: &'a str,
    query: &'a Query,
    pattern_index: usize,
    captures: &[QueryCapture<'tree>],
    source: &'a [u8],
) -> (Option<&'a str>, Option<Node<'tree>>, bool) {
    let (Some(content_capture_index), Some(language_capture_index)) = (
        config.injection_content_capture_index,
        config.injection_language_capture_index,
    ) else {
        return (None, None, false);
    };

    let mut language_name = None;
    let mut content_node = None;
    for capture in captures {
        if capture.index == language_capture_index {
            language_name = std::str::from_utf8(&source[capture.node.byte_range()]).ok();
        } else if capture.index == content_capture_index {
            content_node = Some(capture.node);
        }
    }

    let mut include_children = false;
    for property in query.property_settings(pattern_index) {
        match property.key.as_ref() {
            PROPERTY_INJECTION_LANGUAGE => {
                if language_name.is_none() {
                    language_name = property.value.as_deref();
                }
            }
            PROPERTY_INJECTION_SELF => {
                if language_name.is_none() {
                    language_name = Some(&config.language_name);
                }
            }
            PROPERTY_INJECTION_PARENT => {
                if language_name.is_none() {
                    language_name = Some(parent_name);
                }
            }
            PROPERTY_INJECTION_INCLUDE_CHILDREN => include_children = true,
            _ => {}
        }
    }

    (language_name, content_node, include_children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_orders_by_offset_first() {
        let a = SortKey {
            offset: 1,
            start: false,
            depth: 10,
        };
        let b = SortKey {
            offset: 2,
            start: false,
            depth: 10,
        };
        assert_eq!(a.cmp(&b), Ordering::Less);
        assert_eq!(b.cmp(&a), Ordering::Greater);
    }

    #[test]
    fn test_sort_key_end_precedes_start_at_equal_offset() {
        let end = SortKey {
            offset: 3,
            start: false,
            depth: 10,
        };
        let start = SortKey {
            offset: 3,
            start: true,
            depth: 10,
        };
        assert_eq!(end.cmp(&start), Ordering::Less);
        assert_eq!(start.cmp(&end), Ordering::Greater);
    }

    #[test]
    fn test_sort_key_deeper_layer_first_on_full_tie() {
        let deep = SortKey {
            offset: 3,
            start: true,
            depth: 5,
        };
        let shallow = SortKey {
            offset: 3,
            start: true,
            depth: 1,
        };
        assert_eq!(deep.cmp(&shallow), Ordering::Less);
        assert_eq!(shallow.cmp(&deep), Ordering::Greater);
        assert_eq!(deep.cmp(&deep), Ordering::Equal);
    }

    #[test]
    fn test_build_layers_produces_root_layer() {
        let config = HighlightConfiguration::new(
            tree_sitter_rust::LANGUAGE.into(),
            "rust",
            "(identifier) @variable",
            "",
            "",
        )
        .unwrap();
        let mut highlighter = Highlighter::new();
        let source = b"fn main() {}".as_slice();

        let mut callback = |_: &str| None;
        let layers = build_layers(
            source,
            "rust",
            &mut highlighter,
            &mut callback,
            &config,
            0,
            vec![crate::ranges::full_range()],
        )
        .unwrap();

        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].depth, 0);
        assert_eq!(layers[0].scope_stack.len(), 1);
        assert!(!layers[0].scope_stack[0].inherits);
    }

    #[test]
    fn test_build_layers_discards_captureless_layer() {
        // The query matches nothing in this source, so no layer survives.
        let config = HighlightConfiguration::new(
            tree_sitter_rust::LANGUAGE.into(),
            "rust",
            "(string_literal) @string",
            "",
            "",
        )
        .unwrap();
        let mut highlighter = Highlighter::new();
        let source = b"fn main() {}".as_slice();

        let mut callback = |_: &str| None;
        let layers = build_layers(
            source,
            "rust",
            &mut highlighter,
            &mut callback,
            &config,
            0,
            vec![crate::ranges::full_range()],
        )
        .unwrap();

        assert!(layers.is_empty());
    }
}
