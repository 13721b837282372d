//! Conversion requests and the pipeline that serves them
//!
//! ```text
//! Raw(markup) ──MarkupToStructured──▶ Structured(html + spans)
//!      ▲                                     │
//!      └────────StructuredToMarkup───────────┘
//! Raw(markup) ──DocumentExporter──▶ Docx(artifact)
//! ```
//!
//! A [`ConversionRequest`] is a value consumed by exactly one call to
//! [`Pipeline::convert`]; the pipeline holds configuration only, so the same
//! request always produces the same result.

use crate::error::{Conversion, PipelineError};
use crate::formats::common::StructuredOptions;
use crate::formats::docx::{DocumentExporter, ExportArtifact, ExportOptions};
use crate::formats::html::StructuredToMarkup;
use crate::formats::markdown::{MarkupToStructured, StructuredDocument};
use crate::math::SpanTable;

/// A document in one of its two editable representations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Representation {
    Raw(String),
    Structured(StructuredDocument),
}

/// What a request should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Markup,
    Structured,
    Docx,
}

impl Target {
    pub fn name(&self) -> &'static str {
        match self {
            Target::Markup => "markup",
            Target::Structured => "structured",
            Target::Docx => "docx",
        }
    }
}

/// A representation plus a target; consumed by one conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub source: Representation,
    pub target: Target,
}

impl ConversionRequest {
    pub fn new(source: Representation, target: Target) -> Self {
        Self { source, target }
    }
}

/// Result of a conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Converted {
    Markup(String),
    Structured(StructuredDocument),
    Docx(ExportArtifact),
}

/// Owns the three converters
pub struct Pipeline {
    to_structured: MarkupToStructured,
    to_markup: StructuredToMarkup,
    exporter: DocumentExporter,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(StructuredOptions::default(), ExportOptions::default())
    }
}

impl Pipeline {
    pub fn new(structured: StructuredOptions, export: ExportOptions) -> Self {
        Self::with_exporter(structured, DocumentExporter::new(export))
    }

    pub fn with_exporter(structured: StructuredOptions, exporter: DocumentExporter) -> Self {
        Self {
            to_structured: MarkupToStructured::new(structured.clone()),
            to_markup: StructuredToMarkup::new(structured),
            exporter,
        }
    }

    pub fn exporter(&self) -> &DocumentExporter {
        &self.exporter
    }

    pub fn to_structured(&self, markup: &str) -> Conversion<StructuredDocument> {
        self.to_structured.convert(markup)
    }

    pub fn to_markup(&self, html: &str, spans: &SpanTable) -> Conversion<String> {
        self.to_markup.convert(html, spans)
    }

    pub fn export(&self, markup: &str) -> Result<ExportArtifact, PipelineError> {
        self.exporter.export(markup)
    }

    /// Serve a request. Export failures are `Err`; conversion problems are issues.
    pub fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<Conversion<Converted>, PipelineError> {
        tracing::debug!(output = request.target.name(), "conversion requested");
        match (request.source, request.target) {
            (Representation::Raw(markup), Target::Markup) => {
                Ok(Conversion::clean(Converted::Markup(markup)))
            }
            (Representation::Raw(markup), Target::Structured) => {
                Ok(self.to_structured(&markup).map(Converted::Structured))
            }
            (Representation::Raw(markup), Target::Docx) => {
                Ok(Conversion::clean(Converted::Docx(self.export(&markup)?)))
            }
            (Representation::Structured(doc), Target::Structured) => {
                Ok(Conversion::clean(Converted::Structured(doc)))
            }
            (Representation::Structured(doc), Target::Markup) => {
                Ok(self.to_markup(&doc.html, &doc.spans).map(Converted::Markup))
            }
            (Representation::Structured(doc), Target::Docx) => {
                let markup = self.to_markup(&doc.html, &doc.spans);
                let artifact = self.export(&markup.value)?;
                Ok(Conversion::with_issues(
                    Converted::Docx(artifact),
                    markup.issues,
                ))
            }
        }
    }
}
