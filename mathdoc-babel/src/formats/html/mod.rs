//! Structured HTML → markdown (committing rich edits)
//!
//! Pipeline: HTML string → html5ever DOM → Comrak AST → CommonMark string → restore math
//!
//! # Library Choice
//!
//! We use the `html5ever` + `markup5ever_rcdom` ecosystem for parsing:
//! - `html5ever`: Browser-grade HTML5 parser from the Servo project
//! - `markup5ever_rcdom`: Reference-counted DOM tree implementation
//!
//! Widget output is rarely well-formed (stray `<br>`, unclosed tags, text directly in
//! `<li>`), and html5ever repairs it the way a browser would. The repaired DOM is mapped onto
//! a Comrak AST and written with `format_commonmark`, using the same options the forward
//! direction parses with.
//!
//! # Element Mapping Table
//!
//! | HTML                               | Markdown                | Notes                               |
//! |------------------------------------|-------------------------|-------------------------------------|
//! | `<p>`, loose text                  | Paragraph               | Empty paragraphs dropped            |
//! | `<h1>`..`<h6>`                     | ATX heading             | Direct                              |
//! | `<strong>`/`<b>`, `<em>`/`<i>`     | `**..**`, `*..*`        | Direct                              |
//! | `<s>`/`<del>`/`<strike>`           | `~~..~~`                | Extension                           |
//! | `<ul>`, `<ol>`                     | `- ..`, `1. ..`         | `li[data-list=bullet]` is a bullet  |
//! | `<pre><code class="language-x">`   | Fenced code, info `x`   | Direct                              |
//! | `<table>`                          | Pipe table              | First row is the header             |
//! | `<a href>`, `<img src>`            | Link, image             | Direct                              |
//! | `<br>`                             | Hard line break         | Space inside table cells            |
//! | `<span>`, `<u>`, `<div>`, others   | (transparent)           | Content kept, element dropped       |
//!
//! # Math
//!
//! Placeholders are plain words to every stage here. After formatting, [`restore`] swaps
//! them back. A token that no longer appears was deleted by the user together with its
//! span: the span is omitted and reported as `SpanTableMismatch`.

mod parser;

use crate::error::{Conversion, PipelineError};
use crate::formats::common::StructuredOptions;
use crate::math::{restore, SpanTable};
use comrak::{format_commonmark, Arena, ComrakOptions};
use markup5ever_rcdom::Handle;
use parser::{find_body, parse_html, plain_text, AstBuilder};

pub(crate) use parser::content_text;

/// Converts structured HTML back into raw markup
#[derive(Debug, Clone, Default)]
pub struct StructuredToMarkup {
    options: StructuredOptions,
}

impl StructuredToMarkup {
    pub fn new(options: StructuredOptions) -> Self {
        Self { options }
    }

    /// Convert an edited structured form back to markdown with every surviving span restored.
    ///
    /// Never fails. Unparseable structure degrades to the plain text of the form
    /// (`ConversionFailed` in the issues); spans are restored either way.
    pub fn convert(&self, structured: &str, spans: &SpanTable) -> Conversion<String> {
        let dom = parse_html(structured);
        let mut issues = Vec::new();

        let markdown = match find_body(&dom) {
            Some(body) => match serialize_markdown(&body, &self.options.comrak_options()) {
                Ok(markdown) => markdown,
                Err(err) => {
                    tracing::warn!(error = %err, "markdown serialization failed, using plain text");
                    issues.push(err);
                    plain_text(&body)
                }
            },
            None => {
                let err = PipelineError::ConversionFailed(
                    "structured form has no document body".to_string(),
                );
                tracing::warn!(error = %err, "using plain text");
                issues.push(err);
                plain_text(&dom.document)
            }
        };

        let restored = restore(&markdown, spans);
        for issue in restored.issues {
            issues.push(classify(issue, spans));
        }

        tracing::debug!(
            spans = spans.len(),
            issues = issues.len(),
            "structured form converted to markdown"
        );
        Conversion::with_issues(restored.value, issues)
    }
}

/// A token with zero occurrences after an edit means the user deleted the span.
fn classify(issue: PipelineError, spans: &SpanTable) -> PipelineError {
    match issue {
        PipelineError::UnresolvedPlaceholder {
            token,
            occurrences: 0,
        } => {
            let content = spans
                .get(&token)
                .map(|span| span.content.clone())
                .unwrap_or_default();
            tracing::debug!(%token, "math span deleted in structured edit");
            PipelineError::SpanTableMismatch { token, content }
        }
        other => {
            tracing::warn!(issue = %other, "placeholder integrity problem");
            other
        }
    }
}

fn serialize_markdown(body: &Handle, options: &ComrakOptions) -> Result<String, PipelineError> {
    let arena = Arena::new();
    let root = AstBuilder::new(&arena).build(body);

    let mut output = Vec::new();
    format_commonmark(root, options, &mut output)
        .map_err(|e| PipelineError::ConversionFailed(format!("Comrak formatting failed: {e}")))?;

    let markdown = String::from_utf8(output)
        .map_err(|e| PipelineError::ConversionFailed(format!("UTF-8 conversion failed: {e}")))?;

    // Comrak separates adjacent lists with a comment; it means nothing to readers
    Ok(markdown.replace("<!-- end list -->\n\n", ""))
}
