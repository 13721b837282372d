//! DOCX export through an external document-conversion engine.
//!
//! Canonical markdown (math back in dollar form) is handed to an engine that
//! understands `tex_math_dollars` and writes a word-processor document with
//! right-to-left direction forced in the document metadata. The engine writes
//! into a scoped temporary directory; the bytes are read back and the directory
//! is removed when the call returns, whichever way it returns.
//!
//! The engine sits behind [`ConversionEngine`] so hosts and tests can swap the
//! pandoc process for something else.

mod pandoc;

pub use pandoc::{PandocEngine, PANDOC_BIN_ENV};

use crate::error::PipelineError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};

/// Media type of the exported artifact
pub const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Markdown dialect the engine is asked to read
pub const DEFAULT_INPUT_FORMAT: &str = "markdown+tex_math_dollars";

/// Document language written next to the direction directive
pub const DEFAULT_LANG: &str = "ar";

const OUTPUT_FILE: &str = "export.docx";

/// Exporter settings, usually filled from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Explicit engine binary; when set it is never replaced by a PATH lookup
    pub engine: Option<PathBuf>,
    pub input_format: String,
    pub lang: Option<String>,
    /// Style template handed to the engine
    pub reference_doc: Option<PathBuf>,
    /// Parent directory for scoped temp artifacts (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            engine: None,
            input_format: DEFAULT_INPUT_FORMAT.to_string(),
            lang: Some(DEFAULT_LANG.to_string()),
            reference_doc: None,
            temp_dir: None,
        }
    }
}

/// What the engine is told besides the markup itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directives {
    pub input_format: String,
    pub lang: Option<String>,
    pub reference_doc: Option<PathBuf>,
}

impl Directives {
    /// Paragraph and table direction, fixed regardless of the script in the text.
    pub const DIRECTION: &'static str = "rtl";

    /// Document metadata as key/value pairs, direction first.
    pub fn metadata(&self) -> Vec<(&'static str, String)> {
        let mut metadata = vec![("dir", Self::DIRECTION.to_string())];
        if let Some(lang) = &self.lang {
            metadata.push(("lang", lang.clone()));
        }
        metadata
    }
}

impl From<&ExportOptions> for Directives {
    fn from(options: &ExportOptions) -> Self {
        Self {
            input_format: options.input_format.clone(),
            lang: options.lang.clone().filter(|lang| !lang.is_empty()),
            reference_doc: options.reference_doc.clone(),
        }
    }
}

/// A resolved, runnable engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub path: PathBuf,
    pub version: String,
}

/// An external document-conversion engine
pub trait ConversionEngine {
    fn name(&self) -> &str;

    /// Locate the engine and query its version. Idempotent; a failure is not remembered.
    fn ensure_ready(&self) -> Result<EngineStatus, PipelineError>;

    /// Convert `markup` and write the document to `output`.
    fn render(
        &self,
        markup: &str,
        directives: &Directives,
        output: &Path,
    ) -> Result<(), PipelineError>;
}

/// The exported document, owned by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    bytes: Vec<u8>,
    media_type: &'static str,
}

impl ExportArtifact {
    fn new(bytes: Vec<u8>, media_type: &'static str) -> Self {
        Self { bytes, media_type }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &'static str {
        self.media_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Turns canonical markup into an RTL DOCX artifact
pub struct DocumentExporter {
    engine: Box<dyn ConversionEngine>,
    directives: Directives,
    temp_dir: Option<PathBuf>,
}

impl Default for DocumentExporter {
    fn default() -> Self {
        Self::new(ExportOptions::default())
    }
}

impl DocumentExporter {
    /// Exporter backed by pandoc.
    pub fn new(options: ExportOptions) -> Self {
        let engine = PandocEngine::new(options.engine.clone());
        Self::with_engine(engine, options)
    }

    pub fn with_engine(engine: impl ConversionEngine + 'static, options: ExportOptions) -> Self {
        Self {
            engine: Box::new(engine),
            directives: Directives::from(&options),
            temp_dir: options.temp_dir,
        }
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    /// Explicit startup step: locate the engine and query its version.
    ///
    /// Hosts call this once at startup to report a broken environment early.
    /// [`export`](Self::export) calls it too, so skipping it is safe.
    pub fn ensure_ready(&self) -> Result<EngineStatus, PipelineError> {
        self.engine.ensure_ready()
    }

    /// Export canonical markup.
    ///
    /// `ExportEngineUnavailable` means the environment needs fixing, `ConversionFailed`
    /// that the engine rejected this document. No temporary file outlives the call.
    #[tracing::instrument(skip_all, fields(engine = self.engine.name(), bytes = markup.len()))]
    pub fn export(&self, markup: &str) -> Result<ExportArtifact, PipelineError> {
        self.engine.ensure_ready()?;

        let workspace = self.scoped_dir()?;
        let output = workspace.path().join(OUTPUT_FILE);
        self.engine.render(markup, &self.directives, &output)?;

        let bytes = match fs::read(&output) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::ConversionFailed(format!(
                    "{} reported success but wrote no document",
                    self.engine.name()
                )));
            }
            Err(err) => {
                return Err(PipelineError::Io(format!(
                    "reading {}: {err}",
                    output.display()
                )));
            }
        };
        if bytes.is_empty() {
            return Err(PipelineError::ConversionFailed(format!(
                "{} produced an empty document",
                self.engine.name()
            )));
        }

        tracing::info!(size = bytes.len(), "document exported");
        Ok(ExportArtifact::new(bytes, DOCX_MEDIA_TYPE))
    }

    fn scoped_dir(&self) -> Result<TempDir, PipelineError> {
        let mut builder = Builder::new();
        builder.prefix("mathdoc-export-");
        let dir = match &self.temp_dir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        };
        dir.map_err(|e| PipelineError::Io(format!("cannot create temp directory: {e}")))
    }
}
