//! The extraction/translation collaborator
//!
//! Source material (page images, a PDF, or pasted text) is turned into markdown by
//! something outside this crate, typically a language model behind a command-line
//! client. The pipeline only cares that markdown with dollar-delimited math comes
//! back; any failure is an `UpstreamError` and leaves no state behind.

use crate::error::PipelineError;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tempfile::Builder;

/// Environment variable carrying the instruction prompt to an extraction command
pub const PROMPT_ENV: &str = "MATHDOC_PROMPT";

/// Environment variable carrying the source kind (`images`, `pdf`, `text`)
pub const SOURCE_KIND_ENV: &str = "MATHDOC_SOURCE_KIND";

/// Language the extracted text is translated into unless configured otherwise
pub const DEFAULT_TARGET_LANGUAGE: &str = "Arabic";

/// An uploaded page image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// Original file name, used for the extension of the scoped copy
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Material handed to the extraction collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDocument {
    Images(Vec<SourceImage>),
    Pdf(Vec<u8>),
    Text(String),
}

impl SourceDocument {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceDocument::Images(_) => "images",
            SourceDocument::Pdf(_) => "pdf",
            SourceDocument::Text(_) => "text",
        }
    }
}

impl fmt::Display for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDocument::Images(images) => write!(f, "{} image(s)", images.len()),
            SourceDocument::Pdf(bytes) => write!(f, "PDF ({} bytes)", bytes.len()),
            SourceDocument::Text(text) => write!(f, "text ({} chars)", text.chars().count()),
        }
    }
}

/// The instruction sent along with a source.
///
/// Every variant asks for the translation only and for math in LaTeX dollar signs,
/// which is what the rest of the pipeline expects.
pub fn instruction_prompt(source: &SourceDocument, target_language: &str) -> String {
    match source {
        SourceDocument::Images(_) => format!(
            "Extract all the text from these images and translate it directly into {target_language}. \
             Do not include any extra conversation, explanations, or introductory text; \
             only provide the translated {target_language} text. \
             If there are any math equations, format them properly using LaTeX dollar signs."
        ),
        SourceDocument::Pdf(_) => format!(
            "Extract all the text from this document and translate it directly into {target_language}. \
             Do not include any extra conversation, explanations, or introductory text; \
             only provide the translated {target_language} text. \
             If there are any math equations, format them properly using LaTeX dollar signs."
        ),
        SourceDocument::Text(_) => format!(
            "Translate the following text into {target_language}. \
             Do not include any extra conversation or introductory text; \
             only provide the translated {target_language} text. \
             Preserve math equations natively using LaTeX dollar signs.\n\nText:"
        ),
    }
}

/// Produces markdown from source material
pub trait Extractor {
    fn extract_and_translate(&self, source: &SourceDocument) -> Result<String, PipelineError>;
}

/// Accepts text that is already in its final language
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughExtractor;

impl Extractor for PassthroughExtractor {
    fn extract_and_translate(&self, source: &SourceDocument) -> Result<String, PipelineError> {
        match source {
            SourceDocument::Text(text) => Ok(text.clone()),
            other => Err(PipelineError::UpstreamError(format!(
                "no extraction service configured for {other}"
            ))),
        }
    }
}

/// Runs an external command as the extraction service.
///
/// The prompt and source kind are passed in [`PROMPT_ENV`] and [`SOURCE_KIND_ENV`].
/// Text goes to stdin; images and PDFs are written to a scoped temp directory and
/// their paths appended to the arguments. Stdout is the markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExtractor {
    program: PathBuf,
    args: Vec<String>,
    target_language: String,
}

impl CommandExtractor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
        }
    }

    /// Build from a command line such as `gemini-cli --model flash`.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = language.into();
        self
    }

    fn upstream(&self, detail: impl fmt::Display) -> PipelineError {
        PipelineError::UpstreamError(format!("{}: {detail}", self.program.display()))
    }
}

impl Extractor for CommandExtractor {
    #[tracing::instrument(skip_all, fields(program = %self.program.display(), kind = source.kind()))]
    fn extract_and_translate(&self, source: &SourceDocument) -> Result<String, PipelineError> {
        let workspace = Builder::new()
            .prefix("mathdoc-extract-")
            .tempdir()
            .map_err(|e| PipelineError::Io(format!("cannot create temp directory: {e}")))?;

        let mut file_args: Vec<OsString> = Vec::new();
        let mut stdin_text: Option<&str> = None;
        match source {
            SourceDocument::Text(text) => stdin_text = Some(text),
            SourceDocument::Pdf(bytes) => {
                let path = workspace.path().join("source.pdf");
                fs::write(&path, bytes)?;
                file_args.push(path.into_os_string());
            }
            SourceDocument::Images(images) => {
                for (index, image) in images.iter().enumerate() {
                    let extension = image
                        .name
                        .rsplit_once('.')
                        .map(|(_, ext)| ext)
                        .filter(|ext| !ext.is_empty() && ext.chars().all(char::is_alphanumeric))
                        .unwrap_or("img");
                    let path = workspace.path().join(format!("page-{index}.{extension}"));
                    fs::write(&path, &image.bytes)?;
                    file_args.push(path.into_os_string());
                }
            }
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(&file_args)
            .env(PROMPT_ENV, instruction_prompt(source, &self.target_language))
            .env(SOURCE_KIND_ENV, source.kind())
            .stdin(if stdin_text.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.upstream(format!("failed to start: {e}")))?;

        if let (Some(text), Some(mut stdin)) = (stdin_text, child.stdin.take()) {
            if let Err(err) = stdin.write_all(text.as_bytes()) {
                if err.kind() != io::ErrorKind::BrokenPipe {
                    return Err(self.upstream(format!("writing input: {err}")));
                }
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| self.upstream(format!("waiting for exit: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.upstream(format!("exited with {}: {}", output.status, stderr.trim())));
        }

        let markup = String::from_utf8(output.stdout)
            .map_err(|_| self.upstream("output is not valid UTF-8"))?;
        if markup.trim().is_empty() {
            return Err(self.upstream("returned no text"));
        }

        tracing::debug!(chars = markup.chars().count(), "extraction finished");
        Ok(markup)
    }
}
