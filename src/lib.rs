//! Tree-sitter based syntax highlighting with language injections.
//!
//! This crate turns source bytes, a grammar and a set of tree-sitter
//! queries into a flat stream of highlight events, with support for:
//!
//! - Nested language injections (CSS inside HTML, regex inside a string),
//!   discovered lazily and highlighted recursively
//! - Local-variable resolution, so a reference can inherit the highlight of
//!   its definition
//! - Theming by capture name, with dotted-name fallback
//!   (`function.method.builtin` falls back to `function.method`, then
//!   `function`)
//!
//! # Architecture
//!
//! - [`HighlightConfiguration`]: compiles a language's highlights,
//!   injections and locals queries and maps capture names onto a theme
//! - [`Highlighter`]: owns the parser and cursor pool; entry point for
//!   highlighting
//! - [`HighlightIter`]: lazy iterator merging the capture streams of every
//!   active language layer into one ordered event stream
//! - [`Event`]: the event vocabulary renderers consume
//! - [`html`]: a reference renderer producing `<span>`-wrapped HTML
//!
//! # Example
//!
//! ```rust,ignore
//! use canopy_highlight::{Highlighter, HighlightConfiguration, Event};
//!
//! let mut config = HighlightConfiguration::new(
//!     tree_sitter_rust::LANGUAGE.into(),
//!     "rust",
//!     tree_sitter_rust::HIGHLIGHTS_QUERY,
//!     "",
//!     "",
//! )?;
//! config.configure(&["keyword", "function", "string", "comment"]);
//!
//! let mut highlighter = Highlighter::new();
//! let source = b"fn main() {}";
//! for event in highlighter.highlight(&config, source, None, |_| None)? {
//!     match event? {
//!         Event::Source { start, end } => print!("{:?}", &source[start..end]),
//!         other => println!("{other:?}"),
//!     }
//! }
//! ```
//!
//! # Event stream
//!
//! The stream partitions the source into `Source` events bracketed by
//! layer and capture start/end events. Brackets are balanced and properly
//! nested, and the `Source` ranges cover the input exactly once, in order,
//! so a renderer only needs a stack.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod event;
pub mod highlighter;
pub mod html;

mod captures;
mod layer;
mod ranges;

// Re-export main types at crate root
pub use config::{HighlightConfiguration, LanguageConfig, STANDARD_CAPTURE_NAMES};
pub use error::{HighlightError, Result};
pub use event::{CaptureIndex, Event};
pub use highlighter::{HighlightIter, Highlighter};

// Re-export tree-sitter types used in the public API
pub use tree_sitter::{Language, Query};
