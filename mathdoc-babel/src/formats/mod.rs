//! Format implementations
//!
//! Markdown and HTML are the two editable representations; DOCX is export only.

pub mod common;
pub mod docx;
pub mod html;
pub mod markdown;

pub use common::StructuredOptions;
pub use docx::{
    ConversionEngine, Directives, DocumentExporter, EngineStatus, ExportArtifact, ExportOptions,
    PandocEngine, DOCX_MEDIA_TYPE,
};
pub use html::StructuredToMarkup;
pub use markdown::{MarkupToStructured, StructuredDocument};
