//! Editor surfaces
//!
//! The host either has a rich-text widget or only a plain text area. The session talks to
//! whichever one was selected at construction through [`EditorSurface`] and never asks which.

use crate::math::{protect, restore};

/// What the session needs to know about the editing widget
pub trait EditorSurface {
    fn name(&self) -> &'static str;

    /// Whether the structured view can be shown at all.
    fn supports_structured(&self) -> bool;

    /// Clean up raw text coming back from the widget. Math spans are left byte-for-byte.
    fn normalize_raw(&self, text: &str) -> String {
        let (shielded, spans) = protect(text);
        restore(&shielded.replace("\r\n", "\n"), &spans).value
    }

    /// Clean up a structured form coming back from the widget.
    fn normalize_structured(&self, html: &str) -> String {
        html.replace("\r\n", "\n")
    }
}

/// Rich-text widget producing an HTML fragment
#[derive(Debug, Clone, Copy, Default)]
pub struct RichEditor;

impl EditorSurface for RichEditor {
    fn name(&self) -> &'static str {
        "rich"
    }

    fn supports_structured(&self) -> bool {
        true
    }

    /// Widgets keep an empty paragraph under the cursor; it is not content.
    fn normalize_structured(&self, html: &str) -> String {
        let mut html = html.replace("\r\n", "\n");
        loop {
            let trimmed = html.trim_end();
            match trimmed.strip_suffix("<p><br></p>") {
                Some(rest) => html = rest.to_string(),
                None => {
                    let len = trimmed.len();
                    html.truncate(len);
                    return html;
                }
            }
        }
    }
}

/// Plain text area; raw markup only
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainEditor;

impl EditorSurface for PlainEditor {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn supports_structured(&self) -> bool {
        false
    }
}

/// Pick the surface for a host that does or does not have a rich widget.
pub fn select_editor(rich_available: bool) -> Box<dyn EditorSurface> {
    if rich_available {
        Box::new(RichEditor)
    } else {
        tracing::info!("rich editor unavailable, using plain text editing");
        Box::new(PlainEditor)
    }
}
