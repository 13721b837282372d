//! Math spans and their placeholder table
//!
//! Dollar-delimited math is the one thing in a document that no converter in the pipeline
//! understands. Markdown treats `_` and `*` as emphasis, HTML editors re-escape `<` and `&`,
//! and the CommonMark writer backslash-escapes whatever looks like syntax. Instead of teaching
//! each of them about math, every span is swapped for an opaque token before conversion and
//! swapped back afterwards (see [`codec`]).
//!
//! A token looks like `0MSPAN<nonce>N<index>E`: ASCII letters and digits only, so no markup
//! grammar in the pipeline has a rule that touches it. The leading digit matters: after a `<`
//! or `&` a letter would start a tag or entity name, a digit starts neither. The nonce is
//! chosen so that the token prefix never occurs in the text being protected.

pub mod codec;

pub use codec::{protect, restore};

use serde::{Deserialize, Serialize};

/// Fixed lead of every placeholder token.
pub const TOKEN_PREFIX: &str = "0MSPAN";

/// How a span was delimited in the source markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// `$...$`
    Inline,
    /// `$$...$$`
    Display,
}

/// A mathematical expression with its delimiters stripped.
///
/// `content` is carried opaquely: no stage re-escapes, trims or reflows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathSpan {
    pub content: String,
    pub kind: SpanKind,
}

impl MathSpan {
    pub fn inline(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: SpanKind::Inline,
        }
    }

    pub fn display(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: SpanKind::Display,
        }
    }

    /// The span in canonical dollar-delimited form.
    pub fn canonical(&self) -> String {
        match self.kind {
            SpanKind::Inline => format!("${}$", self.content),
            SpanKind::Display => format!("$${}$$", self.content),
        }
    }
}

/// One row of a [`SpanTable`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEntry {
    pub token: String,
    pub span: MathSpan,
}

/// Ordered mapping from placeholder token to the span it replaced.
///
/// Serializable so a host can persist it next to a structured form and
/// resume the session later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanTable {
    nonce: String,
    entries: Vec<SpanEntry>,
}

impl SpanTable {
    pub(crate) fn with_nonce(nonce: String) -> Self {
        Self {
            nonce,
            entries: Vec::new(),
        }
    }

    /// Append a span and return its token.
    pub(crate) fn push(&mut self, span: MathSpan) -> String {
        let token = format!("{}{}E", self.token_prefix(), self.entries.len());
        self.entries.push(SpanEntry {
            token: token.clone(),
            span,
        });
        token
    }

    /// The part every token of this table starts with, up to the index.
    pub fn token_prefix(&self) -> String {
        format!("{TOKEN_PREFIX}{}N", self.nonce)
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SpanEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpanEntry> {
        self.entries.iter()
    }

    pub fn get(&self, token: &str) -> Option<&MathSpan> {
        self.position(token).map(|idx| &self.entries[idx].span)
    }

    pub(crate) fn position(&self, token: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.token == token)
    }
}
