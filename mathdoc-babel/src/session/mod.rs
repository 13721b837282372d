//! Edit sessions
//!
//! An [`EditSession`] owns one document and knows which of its two representations is
//! authoritative. The other one is a cache: the structured form is regenerated from the
//! markup when it is stale, and the markup is regenerated from the structured form on
//! commit. The representation only changes on an explicit `select_*` call.
//!
//! ```text
//!                  select_structured_view
//!   RawAuthoritative ──────────────────────▶ StructuredAuthoritative
//!     edit_raw ⟲     ◀──────────────────────   edit_structured ⟲
//!                  select_raw_view (commits)   commit ⟲
//! ```
//!
//! `export` works from either state and always commits first.

mod editor;

pub use editor::{select_editor, EditorSurface, PlainEditor, RichEditor};

use crate::error::{Conversion, PipelineError};
use crate::extract::{Extractor, SourceDocument};
use crate::formats::docx::ExportArtifact;
use crate::math::SpanTable;
use crate::pipeline::Pipeline;

/// Which representation holds the latest edits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    RawAuthoritative,
    StructuredAuthoritative,
}

#[derive(Debug, Clone)]
struct StructuredCache {
    html: String,
    spans: SpanTable,
    /// Unchanged since it was generated from the markup
    pristine: bool,
}

/// One document being edited
pub struct EditSession {
    pipeline: Pipeline,
    editor: Box<dyn EditorSurface>,
    state: SessionState,
    canonical_markup: String,
    /// False while structured edits are uncommitted
    markup_fresh: bool,
    /// `None` when stale
    structured: Option<StructuredCache>,
}

impl EditSession {
    /// Start a session on freshly arrived markup.
    pub fn new(markup: &str, pipeline: Pipeline, editor: Box<dyn EditorSurface>) -> Self {
        let canonical_markup = editor.normalize_raw(markup);
        tracing::debug!(editor = editor.name(), "session started");
        Self {
            pipeline,
            editor,
            state: SessionState::RawAuthoritative,
            canonical_markup,
            markup_fresh: true,
            structured: None,
        }
    }

    /// Start a session on the output of the extraction collaborator.
    ///
    /// An upstream failure is returned as-is and no session exists afterwards.
    pub fn from_source(
        extractor: &dyn Extractor,
        source: &SourceDocument,
        pipeline: Pipeline,
        editor: Box<dyn EditorSurface>,
    ) -> Result<Self, PipelineError> {
        let markup = extractor.extract_and_translate(source)?;
        Ok(Self::new(&markup, pipeline, editor))
    }

    /// Rebuild a session from a structured form the host kept, with its span table.
    ///
    /// The markup is stale until the first commit.
    pub fn resume_structured(
        html: &str,
        spans: SpanTable,
        pipeline: Pipeline,
        editor: Box<dyn EditorSurface>,
    ) -> Result<Self, PipelineError> {
        if !editor.supports_structured() {
            return Err(PipelineError::InvalidTransition {
                transition: "resume structured session",
                reason: format!("the {} editor has no structured view", editor.name()),
            });
        }
        let html = editor.normalize_structured(html);
        Ok(Self {
            pipeline,
            editor,
            state: SessionState::StructuredAuthoritative,
            canonical_markup: String::new(),
            markup_fresh: false,
            structured: Some(StructuredCache {
                html,
                spans,
                pristine: false,
            }),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn editor(&self) -> &dyn EditorSurface {
        self.editor.as_ref()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Markup as of the last commit; see [`is_markup_fresh`](Self::is_markup_fresh).
    pub fn canonical_markup(&self) -> &str {
        &self.canonical_markup
    }

    pub fn is_markup_fresh(&self) -> bool {
        self.markup_fresh
    }

    /// The cached structured form, if not stale.
    pub fn structured_form(&self) -> Option<&str> {
        self.structured.as_ref().map(|cache| cache.html.as_str())
    }

    /// Span table of the cached structured form; hosts persist it next to the form.
    pub fn span_table(&self) -> Option<&SpanTable> {
        self.structured.as_ref().map(|cache| &cache.spans)
    }

    /// Show the structured view, regenerating it if stale.
    pub fn select_structured_view(&mut self) -> Result<Vec<PipelineError>, PipelineError> {
        if !self.editor.supports_structured() {
            return Err(PipelineError::InvalidTransition {
                transition: "select structured view",
                reason: format!("the {} editor has no structured view", self.editor.name()),
            });
        }
        if self.state == SessionState::StructuredAuthoritative {
            return Ok(Vec::new());
        }

        let mut issues = Vec::new();
        if self.structured.is_none() {
            let Conversion { value, issues: found } =
                self.pipeline.to_structured(&self.canonical_markup);
            issues = found;
            self.structured = Some(StructuredCache {
                html: value.html,
                spans: value.spans,
                pristine: true,
            });
        }

        self.state = SessionState::StructuredAuthoritative;
        tracing::debug!(issues = issues.len(), "structured view selected");
        Ok(issues)
    }

    /// Show the raw view. Pending structured edits are committed first.
    pub fn select_raw_view(&mut self) -> Vec<PipelineError> {
        if self.state == SessionState::RawAuthoritative {
            return Vec::new();
        }
        let issues = self.commit();
        self.state = SessionState::RawAuthoritative;
        tracing::debug!("raw view selected");
        issues
    }

    /// Replace the markup. Invalidates the structured form.
    pub fn edit_raw(&mut self, markup: &str) -> Result<(), PipelineError> {
        if self.state != SessionState::RawAuthoritative {
            return Err(PipelineError::InvalidTransition {
                transition: "edit raw markup",
                reason: "the structured view is authoritative".to_string(),
            });
        }
        self.canonical_markup = self.editor.normalize_raw(markup);
        self.structured = None;
        Ok(())
    }

    /// Replace the structured form. The markup is stale until the next commit.
    pub fn edit_structured(&mut self, html: &str) -> Result<(), PipelineError> {
        if self.state != SessionState::StructuredAuthoritative {
            return Err(PipelineError::InvalidTransition {
                transition: "edit structured form",
                reason: "the raw view is authoritative".to_string(),
            });
        }
        let html = self.editor.normalize_structured(html);
        let Some(cache) = self.structured.as_mut() else {
            return Err(PipelineError::InvalidTransition {
                transition: "edit structured form",
                reason: "no structured form has been generated".to_string(),
            });
        };
        // Widgets resubmit their content unchanged; that is not an edit
        let unchanged = self.editor.normalize_structured(&cache.html) == html;
        cache.pristine = cache.pristine && unchanged;
        cache.html = html;
        self.markup_fresh = false;
        Ok(())
    }

    /// Regenerate the markup from the structured form.
    ///
    /// A no-op when the raw view is authoritative or nothing changed since the last commit.
    pub fn commit(&mut self) -> Vec<PipelineError> {
        if self.state == SessionState::RawAuthoritative || self.markup_fresh {
            return Vec::new();
        }
        let Some(cache) = self.structured.as_ref() else {
            return Vec::new();
        };

        let Conversion { value, issues } = self.pipeline.to_markup(&cache.html, &cache.spans);
        let issues = if cache.pristine {
            issues.into_iter().map(escalate_unedited).collect()
        } else {
            issues
        };

        self.canonical_markup = value;
        self.markup_fresh = true;
        tracing::debug!(issues = issues.len(), "structured edits committed");
        issues
    }

    /// Commit, then export the canonical markup.
    pub fn export(&mut self) -> Result<Conversion<ExportArtifact>, PipelineError> {
        let issues = self.commit();
        let artifact = self.pipeline.export(&self.canonical_markup)?;
        Ok(Conversion::with_issues(artifact, issues))
    }
}

/// Nobody edited the form, so a vanished placeholder was eaten by a converter.
fn escalate_unedited(issue: PipelineError) -> PipelineError {
    match issue {
        PipelineError::SpanTableMismatch { token, content } => {
            tracing::warn!(%token, %content, "math placeholder lost without an edit");
            PipelineError::UnresolvedPlaceholder {
                token,
                occurrences: 0,
            }
        }
        other => other,
    }
}
