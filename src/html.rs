//! HTML rendering of a highlight event stream.
//!
//! Walks the events keeping a stack of open highlights and the language of
//! each open layer, and wraps every highlighted region in a `<span>` whose
//! attributes come from a caller-supplied callback. At each newline all open
//! spans are closed and reopened after it, so every line of output is
//! self-contained.

use crate::error::Result;
use crate::event::{CaptureIndex, Event};

/// Renders a highlight event stream to HTML.
///
/// `attribute_callback` produces the attribute text for the span opened for
/// a capture, given its theme index and the language of the layer it
/// belongs to. Returning an empty string yields a bare `<span>`.
pub fn render<'a, E, F>(events: E, source: &str, attribute_callback: F) -> Result<String>
where
    E: IntoIterator<Item = Result<Event<'a>>>,
    F: Fn(CaptureIndex, &str) -> String,
{
    let mut output = String::with_capacity(source.len() * 2);
    let mut highlights: Vec<CaptureIndex> = Vec::new();
    let mut languages: Vec<&str> = Vec::new();

    for event in events {
        match event? {
            Event::LayerStart { language } => {
                highlights.push(CaptureIndex::DEFAULT);
                languages.push(language);
            }
            Event::LayerEnd => {
                highlights.pop();
                languages.pop();
            }
            Event::CaptureStart { highlight } => {
                highlights.push(highlight);
                let language = languages.last().copied().unwrap_or_default();
                start_highlight(&mut output, highlight, language, &attribute_callback);
            }
            Event::CaptureEnd => {
                highlights.pop();
                output.push_str("</span>");
            }
            Event::Source { start, end } => {
                add_text(
                    &mut output,
                    &source[start..end],
                    &highlights,
                    &languages,
                    &attribute_callback,
                );
            }
        }
    }

    Ok(output)
}

/// Writes one CSS rule per `(class, declarations)` pair.
pub fn render_css(theme: &[(&str, &str)]) -> String {
    let mut output = String::new();
    for (class, declarations) in theme {
        output.push('.');
        output.push_str(class);
        output.push_str(" { ");
        output.push_str(declarations);
        output.push_str(" }\n");
    }
    output
}

fn start_highlight<F>(output: &mut String, highlight: CaptureIndex, language: &str, callback: &F)
where
    F: Fn(CaptureIndex, &str) -> String,
{
    output.push_str("<span");
    let attributes = callback(highlight, language);
    if !attributes.is_empty() {
        output.push(' ');
        output.push_str(&attributes);
    }
    output.push('>');
}

fn add_text<F>(
    output: &mut String,
    text: &str,
    highlights: &[CaptureIndex],
    languages: &[&str],
    callback: &F,
) where
    F: Fn(CaptureIndex, &str) -> String,
{
    for c in text.chars() {
        if c == '\r' {
            continue;
        }

        if c == '\n' {
            // Close every open span, emit the newline, then reopen the same
            // spans so each line carries its own markup. Layer-boundary
            // entries re-synchronize which language the reopened spans
            // belong to.
            for _ in 1..highlights.len() {
                output.push_str("</span>");
            }
            output.push(c);

            let mut languages = languages.iter();
            let mut language = languages.next().copied().unwrap_or_default();
            for &highlight in highlights.iter().skip(1) {
                start_highlight(output, highlight, language, callback);
                if highlight == CaptureIndex::DEFAULT {
                    language = languages.next().copied().unwrap_or_default();
                }
            }
            continue;
        }

        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            _ => output.push(c),
        }
    }
}
