//! Markdown → structured HTML (the rich-editing view)
//!
//! Pipeline: markdown string → protect math → Comrak AST → HTML string
//!
//! # Library Choice
//!
//! We use `comrak` for both directions of the structured round trip (see
//! [`crate::formats::html`] for the way back), so the markdown read here is the
//! same dialect that gets written there.
//!
//! # Element Mapping Table
//!
//! | Markdown                  | HTML                      | Notes                              |
//! |---------------------------|---------------------------|------------------------------------|
//! | `# ..` to `###### ..`     | `<h1>`..`<h6>`            | Direct                             |
//! | `**bold**` / `*italic*`   | `<strong>` / `<em>`       | Direct                             |
//! | `~~strike~~`              | `<del>`                   | Extension, configurable            |
//! | `- item` / `1. item`      | `<ul>` / `<ol>`           | Direct, nesting preserved          |
//! | Pipe table                | `<table>`                 | Extension, configurable            |
//! | `$..$` / `$$..$$`         | placeholder token         | Never a math node, see [`crate::math`] |
//!
//! # Math
//!
//! Math is protected before parsing, so Comrak only ever sees alphanumeric
//! tokens. After rendering, every token must show up exactly once in the text or attribute
//! values of the HTML.
//! If one is missing or doubled the render is not trusted and the fallback is
//! used instead: the shielded text as plain escaped paragraphs. Display of a
//! math-bearing document is never blocked.

use crate::error::{Conversion, PipelineError};
use crate::formats::common::{html_escape, StructuredOptions};
use crate::formats::html::content_text;
use crate::math::{protect, SpanTable};
use comrak::{format_html, parse_document, Arena, ComrakOptions};

/// Structured form of a document, with the spans its tokens stand for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredDocument {
    /// HTML fragment with math placeholders embedded
    pub html: String,
    /// Table that turns the placeholders back into math
    pub spans: SpanTable,
}

/// Converts raw markup into the structured representation
#[derive(Debug, Clone, Default)]
pub struct MarkupToStructured {
    options: StructuredOptions,
}

impl MarkupToStructured {
    pub fn new(options: StructuredOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &StructuredOptions {
        &self.options
    }

    /// Convert markdown to structured HTML with math shielded.
    ///
    /// Never fails: a render that cannot be trusted degrades to plain
    /// paragraphs and is reported as `ConversionFailed` in the issues.
    pub fn convert(&self, markup: &str) -> Conversion<StructuredDocument> {
        let (shielded, spans) = protect(markup);
        let options = self.options.comrak_options();

        let rendered = render_html(&shielded, &options)
            .and_then(|html| verify_placeholders(&html, &spans).map(|()| html));

        match rendered {
            Ok(html) => {
                tracing::debug!(spans = spans.len(), bytes = html.len(), "markdown rendered");
                Conversion::clean(StructuredDocument { html, spans })
            }
            Err(err) => {
                tracing::warn!(error = %err, "markdown rendering failed, falling back to plain text");
                let html = plain_text_html(&shielded);
                Conversion::with_issues(StructuredDocument { html, spans }, vec![err])
            }
        }
    }
}

fn render_html(source: &str, options: &ComrakOptions) -> Result<String, PipelineError> {
    let arena = Arena::new();
    let root = parse_document(&arena, source, options);

    let mut output = Vec::new();
    format_html(root, options, &mut output)
        .map_err(|e| PipelineError::ConversionFailed(format!("Comrak rendering failed: {e}")))?;

    String::from_utf8(output)
        .map_err(|e| PipelineError::ConversionFailed(format!("UTF-8 conversion failed: {e}")))
}

/// Every token must survive the render exactly once, as text or as an attribute value.
///
/// A token swallowed into markup (a comment, a tag) would be lost on the way back.
fn verify_placeholders(html: &str, spans: &SpanTable) -> Result<(), PipelineError> {
    if spans.is_empty() {
        return Ok(());
    }
    let content = content_text(html);
    for entry in spans.iter() {
        let found = content.matches(entry.token.as_str()).count();
        if found != 1 {
            return Err(PipelineError::ConversionFailed(format!(
                "placeholder {} appeared {found} time(s) in rendered content",
                entry.token
            )));
        }
    }
    Ok(())
}

/// Wrap text as escaped paragraphs: blank lines split paragraphs, single newlines become `<br>`.
pub(crate) fn plain_text_html(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let mut html = String::new();
    for block in normalized.split("\n\n") {
        let block = block.trim_matches('\n');
        if block.trim().is_empty() {
            continue;
        }
        let lines: Vec<String> = block.lines().map(html_escape).collect();
        html.push_str("<p>");
        html.push_str(&lines.join("<br>\n"));
        html.push_str("</p>\n");
    }
    html
}
