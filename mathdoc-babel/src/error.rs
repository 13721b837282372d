//! Error types for pipeline operations
//!
//! A single enum carries every failure kind of the pipeline. Some of them are
//! fatal to the call that produced them (`Err`), others are integrity reports
//! that travel next to a successful value in [`Conversion::issues`].

use thiserror::Error;

/// Errors and integrity reports produced by the conversion pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A math placeholder was lost, duplicated or left unmatched by a converter
    #[error("math placeholder {token} found {occurrences} time(s) after conversion")]
    UnresolvedPlaceholder { token: String, occurrences: usize },

    /// A math placeholder was removed from the structured form by an edit
    #[error("math span {token} was removed from the structured form")]
    SpanTableMismatch { token: String, content: String },

    /// Malformed or unsupported markup/structure; the caller fell back to plain text
    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    /// The document-conversion engine could not be located or started
    #[error("export engine unavailable: {0}")]
    ExportEngineUnavailable(String),

    /// The extraction/translation collaborator failed
    #[error("upstream service error: {0}")]
    UpstreamError(String),

    /// A session transition was requested from a state that does not allow it
    #[error("cannot {transition}: {reason}")]
    InvalidTransition {
        transition: &'static str,
        reason: String,
    },

    /// Filesystem failure around a scoped temporary artifact
    #[error("I/O error: {0}")]
    Io(String),
}

impl PipelineError {
    /// Whether this error aborts the operation that raised it.
    ///
    /// Integrity reports and recovered conversion failures are not fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::UnresolvedPlaceholder { .. }
                | PipelineError::SpanTableMismatch { .. }
                | PipelineError::ConversionFailed(_)
        )
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

/// A conversion result together with the non-fatal issues met while producing it
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion<T> {
    pub value: T,
    pub issues: Vec<PipelineError>,
}

impl<T> Conversion<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            issues: Vec::new(),
        }
    }

    pub fn with_issues(value: T, issues: Vec<PipelineError>) -> Self {
        Self { value, issues }
    }

    /// True when no issue was reported.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// True when the value came from a fallback path.
    pub fn used_fallback(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| matches!(issue, PipelineError::ConversionFailed(_)))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Conversion<U> {
        Conversion {
            value: f(self.value),
            issues: self.issues,
        }
    }
}
