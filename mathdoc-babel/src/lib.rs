//! Math-preserving conversion between markdown, structured HTML and DOCX
//!
//!     This crate moves a document between its raw markdown form, the HTML a rich-text
//!     widget edits, and a right-to-left DOCX, while keeping every dollar-delimited math
//!     expression byte-identical through any sequence of conversions.
//!
//!     TLDR:
//!         - No format is parsed or written here by hand: comrak does markdown, html5ever
//!           parses HTML, pandoc writes DOCX.
//!         - Math never reaches any of them. It is swapped for opaque tokens before a
//!           conversion and swapped back after (see ./math).
//!         - A conversion that cannot be trusted degrades to plain text and says so in its
//!           issues; it never blocks the document from being shown.
//!
//! Architecture
//!
//!     This is a pure lib, it powers the mathdoc cli but is shell agnostic: no printing, no
//!     process exit, no configuration files. The one environment variable read is the pandoc
//!     override, and only when no engine path was configured.
//!
//!     The file structure :
//!     .
//!     ├── error.rs                # PipelineError, Conversion<T>
//!     ├── math                    # MathSpan, SpanTable, protect / restore
//!     ├── formats
//!     │   ├── common              # Markdown dialect shared by both directions
//!     │   ├── markdown            # markdown → structured HTML
//!     │   ├── html                # structured HTML → markdown
//!     │   └── docx                # DocumentExporter, ConversionEngine, pandoc
//!     ├── pipeline.rs             # ConversionRequest and the Pipeline serving it
//!     ├── session                 # EditSession state machine and editor surfaces
//!     ├── extract.rs              # Extraction/translation collaborator
//!     └── lib.rs
//!
//! Testing
//!     tests
//!     ├── roundtrip               # Math survival through both directions
//!     ├── export                  # Exporter against a stub pandoc
//!     └── session                 # Full edit sessions
//!
//!     Note that rust does not by default discover tests in subdirectories, so these are
//!     included from tests/lib.rs.
//!
//! Core Algorithm
//!
//!     Placeholder substitution rather than escaping: each converter in the chain has its own
//!     escaping rules, and an ASCII alphanumeric token is the one thing all of them leave alone.
//!     The structured form is therefore only meaningful together with its SpanTable, which is
//!     why the two travel together as a StructuredDocument.
//!
pub mod error;
pub mod extract;
pub mod formats;
pub mod math;
pub mod pipeline;
pub mod session;

pub use error::{Conversion, PipelineError};
pub use extract::{CommandExtractor, Extractor, PassthroughExtractor, SourceDocument, SourceImage};
pub use formats::{
    ConversionEngine, DocumentExporter, ExportArtifact, ExportOptions, MarkupToStructured,
    PandocEngine, StructuredDocument, StructuredOptions, StructuredToMarkup, DOCX_MEDIA_TYPE,
};
pub use math::{MathSpan, SpanKind, SpanTable};
pub use pipeline::{ConversionRequest, Converted, Pipeline, Representation, Target};
pub use session::{select_editor, EditSession, EditorSurface, PlainEditor, RichEditor, SessionState};
