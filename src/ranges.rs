//! Range arithmetic for language injections.

use tree_sitter::{Node, Point, Range};

/// A range covering the entire document, used to seed the root layer.
pub(crate) fn full_range() -> Range {
    Range {
        start_byte: 0,
        end_byte: usize::MAX,
        start_point: Point { row: 0, column: 0 },
        end_point: Point {
            row: usize::MAX,
            column: usize::MAX,
        },
    }
}

/// Computes the ranges to include when parsing an injection.
///
/// Three inputs shape the result:
/// - `parent_ranges`: the result must fall within the current layer's own
///   included ranges.
/// - `nodes`: the injection content nodes; their ranges are the candidate
///   regions.
/// - `includes_children`: when false, the content nodes' direct children
///   are carved out so that only the nodes' own text is reparsed.
///
/// The returned ranges are sorted and disjoint. Empty candidates are
/// dropped, so the result may be empty.
///
/// Panics if `parent_ranges` or `nodes` is empty; layers are only ever
/// constructed with non-empty range sets.
pub(crate) fn intersect_ranges(
    parent_ranges: &[Range],
    nodes: &[Node],
    includes_children: bool,
) -> Vec<Range> {
    assert!(
        !parent_ranges.is_empty(),
        "layers are always constructed with non-empty ranges"
    );
    assert!(!nodes.is_empty(), "injections always capture content nodes");

    let mut parent_ranges = parent_ranges.iter().copied();
    let mut parent_range = parent_ranges
        .next()
        .expect("parent_ranges checked non-empty above");

    let mut cursor = nodes[0].walk();
    let mut results = Vec::new();

    for node in nodes {
        let mut preceding_range = Range {
            start_byte: 0,
            start_point: Point { row: 0, column: 0 },
            end_byte: node.start_byte(),
            end_point: node.start_position(),
        };
        let following_range = Range {
            start_byte: node.end_byte(),
            start_point: node.end_position(),
            end_byte: usize::MAX,
            end_point: Point {
                row: usize::MAX,
                column: usize::MAX,
            },
        };

        let mut excluded_ranges = Vec::new();
        if !includes_children {
            for child in node.children(&mut cursor) {
                excluded_ranges.push(child.range());
            }
        }
        excluded_ranges.push(following_range);

        for excluded_range in excluded_ranges {
            // Candidate region between the previous exclusion and this one.
            let mut range = Range {
                start_byte: preceding_range.end_byte,
                start_point: preceding_range.end_point,
                end_byte: excluded_range.start_byte,
                end_point: excluded_range.start_point,
            };
            preceding_range = excluded_range;

            if range.end_byte < parent_range.start_byte {
                continue;
            }

            while parent_range.start_byte <= range.end_byte {
                if parent_range.end_byte > range.start_byte {
                    if range.start_byte < parent_range.start_byte {
                        range.start_byte = parent_range.start_byte;
                        range.start_point = parent_range.start_point;
                    }

                    if parent_range.end_byte < range.end_byte {
                        if range.start_byte < parent_range.end_byte {
                            results.push(Range {
                                start_byte: range.start_byte,
                                start_point: range.start_point,
                                end_byte: parent_range.end_byte,
                                end_point: parent_range.end_point,
                            });
                        }
                        range.start_byte = parent_range.end_byte;
                        range.start_point = parent_range.end_point;
                    } else {
                        if range.start_byte < range.end_byte {
                            results.push(range);
                        }
                        break;
                    }
                }

                match parent_ranges.next() {
                    Some(next) => parent_range = next,
                    None => return results,
                }
            }
        }
    }

    results
}
