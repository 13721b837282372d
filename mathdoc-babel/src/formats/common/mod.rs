//! Common utilities shared by the markdown and HTML sides of the pipeline
//!
//! Both directions must agree on the markdown dialect, otherwise a document that goes
//! markdown → HTML → markdown would be read with one grammar and written with another.

use comrak::ComrakOptions;

/// Markdown dialect knobs for the structured round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredOptions {
    /// GFM pipe tables
    pub tables: bool,
    /// `~~strike~~`
    pub strikethrough: bool,
    /// Bare URLs become links
    pub autolink: bool,
    /// Pass raw HTML in markdown through to the structured form
    pub raw_html: bool,
}

impl Default for StructuredOptions {
    fn default() -> Self {
        Self {
            tables: true,
            strikethrough: true,
            autolink: true,
            raw_html: true,
        }
    }
}

impl StructuredOptions {
    pub(crate) fn comrak_options(&self) -> ComrakOptions<'static> {
        let mut options = ComrakOptions::default();
        options.extension.table = self.tables;
        options.extension.strikethrough = self.strikethrough;
        options.extension.autolink = self.autolink;
        options.render.unsafe_ = self.raw_html;
        options
    }
}

/// Escape HTML special characters in text
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
