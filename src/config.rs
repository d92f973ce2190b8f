//! Highlight configuration: query compilation and theme mapping.
//!
//! A [`HighlightConfiguration`] compiles a language's injection, locals and
//! highlight queries into a single [`tree_sitter::Query`] and records where
//! each section's patterns begin, so the iterator can classify a capture by
//! its pattern index alone. [`HighlightConfiguration::configure`] then maps
//! the query's capture names onto a caller-supplied theme.

use ahash::AHashMap;
use tree_sitter::{Language, Query};

use crate::error::Result;
use crate::event::CaptureIndex;

pub(crate) const PROPERTY_INJECTION_COMBINED: &str = "injection.combined";
pub(crate) const PROPERTY_INJECTION_LANGUAGE: &str = "injection.language";
pub(crate) const PROPERTY_INJECTION_SELF: &str = "injection.self";
pub(crate) const PROPERTY_INJECTION_PARENT: &str = "injection.parent";
pub(crate) const PROPERTY_INJECTION_INCLUDE_CHILDREN: &str = "injection.include-children";
pub(crate) const PROPERTY_LOCAL: &str = "local";
pub(crate) const PROPERTY_LOCAL_SCOPE_INHERITS: &str = "local.scope-inherits";

/// Common capture names used in tree-sitter highlight queries.
///
/// This list is opinionated and may not align with the capture names used by
/// a particular grammar. It is the default canon for
/// [`HighlightConfiguration::nonconformant_capture_names`].
pub const STANDARD_CAPTURE_NAMES: &[&str] = &[
    "attribute",
    "boolean",
    "carriage-return",
    "comment",
    "comment.documentation",
    "constant",
    "constant.builtin",
    "constructor",
    "constructor.builtin",
    "embedded",
    "error",
    "escape",
    "function",
    "function.builtin",
    "keyword",
    "markup",
    "markup.bold",
    "markup.heading",
    "markup.italic",
    "markup.link",
    "markup.link.url",
    "markup.list",
    "markup.list.checked",
    "markup.list.numbered",
    "markup.list.unchecked",
    "markup.list.unnumbered",
    "markup.quote",
    "markup.raw",
    "markup.raw.block",
    "markup.raw.inline",
    "markup.strikethrough",
    "module",
    "number",
    "operator",
    "property",
    "property.builtin",
    "punctuation",
    "punctuation.bracket",
    "punctuation.delimiter",
    "punctuation.special",
    "string",
    "string.escape",
    "string.regexp",
    "string.special",
    "string.special.symbol",
    "tag",
    "type",
    "type.builtin",
    "variable",
    "variable.builtin",
    "variable.member",
    "variable.parameter",
];

/// A language grammar bundled with its name and query sources.
///
/// Convenience wrapper for registering languages; `into_configuration`
/// builds the compiled [`HighlightConfiguration`].
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Name the language is known by (used for injection lookup).
    pub name: String,
    /// The tree-sitter grammar.
    pub language: Language,
    /// The highlights query source.
    pub highlights_query: String,
    /// The injections query source.
    pub injections_query: String,
    /// The locals query source.
    pub locals_query: String,
}

impl LanguageConfig {
    /// Creates a new language configuration with a highlights query.
    pub fn new(
        name: impl Into<String>,
        language: Language,
        highlights_query: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            language,
            highlights_query: highlights_query.into(),
            injections_query: String::new(),
            locals_query: String::new(),
        }
    }

    /// Sets the injections query.
    pub fn with_injections_query(mut self, query: impl Into<String>) -> Self {
        self.injections_query = query.into();
        self
    }

    /// Sets the locals query.
    pub fn with_locals_query(mut self, query: impl Into<String>) -> Self {
        self.locals_query = query.into();
        self
    }

    /// Compiles the queries into a highlight configuration.
    pub fn into_configuration(self) -> Result<HighlightConfiguration> {
        HighlightConfiguration::new(
            self.language,
            self.name,
            &self.highlights_query,
            &self.injections_query,
            &self.locals_query,
        )
    }
}

/// Compiled queries and capture metadata for one language.
///
/// Immutable during iteration; shared by reference across every layer that
/// highlights with this language.
pub struct HighlightConfiguration {
    /// The grammar the queries were compiled against.
    pub language: Language,
    /// Name the language is known by.
    pub language_name: String,
    /// The combined injections ++ locals ++ highlights query.
    pub(crate) query: Query,
    /// Second compile of just the injections source; present only when at
    /// least one injection pattern is marked `injection.combined`.
    pub(crate) combined_injections_query: Option<Query>,
    /// Patterns below this index are injections.
    pub(crate) locals_pattern_index: usize,
    /// Patterns below this index (and at or above `locals_pattern_index`)
    /// are locals; the rest are highlights.
    pub(crate) highlights_pattern_index: usize,
    /// Theme index for each capture index, populated by `configure`.
    pub(crate) highlight_indices: Vec<Option<CaptureIndex>>,
    /// Whether each pattern carries a negative `local` predicate.
    pub(crate) non_local_variable_patterns: Vec<bool>,
    pub(crate) injection_content_capture_index: Option<u32>,
    pub(crate) injection_language_capture_index: Option<u32>,
    pub(crate) local_scope_capture_index: Option<u32>,
    pub(crate) local_def_capture_index: Option<u32>,
    #[allow(dead_code)]
    pub(crate) local_def_value_capture_index: Option<u32>,
    pub(crate) local_ref_capture_index: Option<u32>,
}

impl HighlightConfiguration {
    /// Compiles a highlight configuration from a grammar and query sources.
    ///
    /// The three sources are concatenated as injections, then locals, then
    /// highlights and compiled as one query; the iterator dispatches on
    /// pattern index against the recorded section boundaries. Any of the
    /// sources may be empty.
    pub fn new(
        language: Language,
        language_name: impl Into<String>,
        highlights_query: &str,
        injections_query: &str,
        locals_query: &str,
    ) -> Result<Self> {
        let mut query_source = String::with_capacity(
            injections_query.len() + locals_query.len() + highlights_query.len(),
        );
        query_source.push_str(injections_query);
        let locals_query_offset = query_source.len();
        query_source.push_str(locals_query);
        let highlights_query_offset = query_source.len();
        query_source.push_str(highlights_query);

        let mut query = Query::new(&language, &query_source)?;

        let mut locals_pattern_index = 0;
        let mut highlights_pattern_index = 0;
        for i in 0..query.pattern_count() {
            let pattern_offset = query.start_byte_for_pattern(i);
            if pattern_offset < highlights_query_offset {
                highlights_pattern_index += 1;
            }
            if pattern_offset < locals_query_offset {
                locals_pattern_index += 1;
            }
        }

        // Combined-injection patterns run against the whole tree up front,
        // so they move to a query of their own; every pattern is live in
        // exactly one of the two compiles.
        let mut combined_injections_query = Query::new(&language, injections_query)?;
        let mut has_combined_queries = false;
        for i in 0..locals_pattern_index {
            let is_combined = combined_injections_query
                .property_settings(i)
                .iter()
                .any(|prop| prop.key.as_ref() == PROPERTY_INJECTION_COMBINED);
            if is_combined {
                has_combined_queries = true;
                query.disable_pattern(i);
            } else {
                combined_injections_query.disable_pattern(i);
            }
        }
        let combined_injections_query = has_combined_queries.then_some(combined_injections_query);

        let non_local_variable_patterns = (0..query.pattern_count())
            .map(|i| {
                query
                    .property_predicates(i)
                    .iter()
                    .any(|(prop, positive)| !positive && prop.key.as_ref() == PROPERTY_LOCAL)
            })
            .collect();

        let mut injection_content_capture_index = None;
        let mut injection_language_capture_index = None;
        let mut local_scope_capture_index = None;
        let mut local_def_capture_index = None;
        let mut local_def_value_capture_index = None;
        let mut local_ref_capture_index = None;
        for (i, name) in query.capture_names().iter().enumerate() {
            let i = Some(i as u32);
            match *name {
                "injection.content" => injection_content_capture_index = i,
                "injection.language" => injection_language_capture_index = i,
                "local.scope" => local_scope_capture_index = i,
                "local.definition" => local_def_capture_index = i,
                "local.definition-value" => local_def_value_capture_index = i,
                "local.reference" => local_ref_capture_index = i,
                _ => {}
            }
        }

        let highlight_indices = vec![None; query.capture_names().len()];
        Ok(Self {
            language,
            language_name: language_name.into(),
            query,
            combined_injections_query,
            locals_pattern_index,
            highlights_pattern_index,
            highlight_indices,
            non_local_variable_patterns,
            injection_content_capture_index,
            injection_language_capture_index,
            local_scope_capture_index,
            local_def_capture_index,
            local_def_value_capture_index,
            local_ref_capture_index,
        })
    }

    /// Returns the query's capture names in capture-index order.
    pub fn names(&self) -> &[&str] {
        self.query.capture_names()
    }

    /// Sets the list of recognized highlight names.
    ///
    /// Queries name their captures with dot-separated specificity, like
    /// `punctuation.bracket` or `function.method.builtin`. Each capture name
    /// is matched against `recognized_names` by stripping trailing
    /// dot-separated parts until a recognized name is found, so
    /// `function.method.builtin` falls back to `function.method` and then
    /// `function`. Captures with no recognized prefix get no highlight.
    ///
    /// May be called repeatedly to re-theme without recompiling queries.
    pub fn configure(&mut self, recognized_names: &[impl AsRef<str>]) {
        let mut index_for_name = AHashMap::with_capacity(recognized_names.len());
        for (i, name) in recognized_names.iter().enumerate() {
            index_for_name.entry(name.as_ref()).or_insert(i);
        }

        self.highlight_indices = self
            .query
            .capture_names()
            .iter()
            .map(|full_name| {
                let mut name: &str = full_name;
                loop {
                    if let Some(&i) = index_for_name.get(name) {
                        return Some(CaptureIndex(i));
                    }
                    name = &name[..name.rfind('.')?];
                }
            })
            .collect();
    }

    /// Returns the capture names that are neither in `canonical` nor
    /// prefixed with an underscore (the convention for private captures).
    ///
    /// Passing an empty `canonical` list checks against
    /// [`STANDARD_CAPTURE_NAMES`].
    pub fn nonconformant_capture_names(&self, canonical: &[&str]) -> Vec<&str> {
        let canonical = if canonical.is_empty() {
            STANDARD_CAPTURE_NAMES
        } else {
            canonical
        };
        self.names()
            .iter()
            .copied()
            .filter(|name| !name.starts_with('_') && !canonical.contains(name))
            .collect()
    }
}

impl std::fmt::Debug for HighlightConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighlightConfiguration")
            .field("language_name", &self.language_name)
            .field("locals_pattern_index", &self.locals_pattern_index)
            .field("highlights_pattern_index", &self.highlights_pattern_index)
            .finish_non_exhaustive()
    }
}
