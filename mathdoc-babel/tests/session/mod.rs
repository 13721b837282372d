use mathdoc_babel::formats::{Directives, EngineStatus};
use mathdoc_babel::{
    select_editor, ConversionEngine, DocumentExporter, EditSession, ExportOptions, Extractor,
    PassthroughExtractor, PipelineError, Pipeline, SessionState, SourceDocument, SpanTable,
    StructuredOptions,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes the markup it receives as the "document".
struct MemoryEngine;

impl ConversionEngine for MemoryEngine {
    fn name(&self) -> &str {
        "memory"
    }

    fn ensure_ready(&self) -> Result<EngineStatus, PipelineError> {
        Ok(EngineStatus {
            path: PathBuf::from("memory"),
            version: "memory 1.0".to_string(),
        })
    }

    fn render(
        &self,
        markup: &str,
        directives: &Directives,
        output: &Path,
    ) -> Result<(), PipelineError> {
        let meta: Vec<String> = directives
            .metadata()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        fs::write(output, format!("{}\n{markup}", meta.join(" ")))?;
        Ok(())
    }
}

struct FailingExtractor;

impl Extractor for FailingExtractor {
    fn extract_and_translate(&self, _source: &SourceDocument) -> Result<String, PipelineError> {
        Err(PipelineError::UpstreamError("quota exceeded".to_string()))
    }
}

fn pipeline() -> Pipeline {
    Pipeline::with_exporter(
        StructuredOptions::default(),
        DocumentExporter::with_engine(MemoryEngine, ExportOptions::default()),
    )
}

fn rich_session(markup: &str) -> EditSession {
    EditSession::new(markup, pipeline(), select_editor(true))
}

#[test]
fn extract_edit_and_export() {
    let source = SourceDocument::Text("Energy: $E=mc^2$ and more.\n".to_string());
    let mut session =
        EditSession::from_source(&PassthroughExtractor, &source, pipeline(), select_editor(true))
            .unwrap();

    session.select_structured_view().unwrap();
    let edited = session
        .structured_form()
        .unwrap()
        .replacen("Energy", "<strong>Energy</strong>", 1);
    session.edit_structured(&edited).unwrap();

    let export = session.export().unwrap();
    assert!(export.is_clean());
    let text = String::from_utf8(export.value.into_bytes()).unwrap();
    assert_eq!(text, "dir=rtl lang=ar\n**Energy**: $E=mc^2$ and more.\n");
    assert_eq!(session.state(), SessionState::StructuredAuthoritative);
}

#[test]
fn export_from_raw_state_uses_markup_as_is() {
    let mut session = rich_session("* raw $x$ list\n");
    let export = session.export().unwrap();
    let text = String::from_utf8(export.value.into_bytes()).unwrap();
    assert!(text.ends_with("* raw $x$ list\n"));
}

#[test]
fn deleting_math_in_structured_view_commits_cleanly() {
    let mut session = rich_session("Keep $a$ and drop $$b$$ here.\n");
    session.select_structured_view().unwrap();

    let token = session.span_table().unwrap().entries()[1].token.clone();
    let edited = session.structured_form().unwrap().replace(&token, "");
    session.edit_structured(&edited).unwrap();

    let issues = session.commit();
    assert_eq!(session.canonical_markup(), "Keep $a$ and drop here.\n");
    assert_eq!(
        issues,
        vec![PipelineError::SpanTableMismatch {
            token,
            content: "b".to_string(),
        }]
    );
}

#[test]
fn unchanged_resubmission_round_trips() {
    let mut session = rich_session("# Title\n\nMass $m_0 < m_1$ here\n");
    session.select_structured_view().unwrap();
    let html = session.structured_form().unwrap().to_string();

    session.edit_structured(&html).unwrap();
    assert!(session.commit().is_empty());
    assert_eq!(
        session.canonical_markup(),
        "# Title\n\nMass $m_0 < m_1$ here\n"
    );
}

#[test]
fn toggling_views_keeps_the_latest_edit() {
    let mut session = rich_session("first $x$\n");
    session.select_structured_view().unwrap();
    let edited = session.structured_form().unwrap().replace("first", "second");
    session.edit_structured(&edited).unwrap();

    let issues = session.select_raw_view();
    assert!(issues.is_empty());
    assert_eq!(session.state(), SessionState::RawAuthoritative);
    assert_eq!(session.canonical_markup(), "second $x$\n");

    session.edit_raw("third $x$\n").unwrap();
    assert!(session.structured_form().is_none());
    session.select_structured_view().unwrap();
    assert!(session.structured_form().unwrap().contains("third"));
}

#[test]
fn upstream_failure_creates_no_session() {
    let source = SourceDocument::Pdf(vec![0x25, 0x50, 0x44, 0x46]);
    let result = EditSession::from_source(&FailingExtractor, &source, pipeline(), select_editor(true));
    assert!(matches!(result, Err(PipelineError::UpstreamError(_))));
}

#[test]
fn resume_from_persisted_structured_form() {
    let mut original = rich_session("Sum $\\sum_i x_i$ done\n");
    original.select_structured_view().unwrap();
    let html = original.structured_form().unwrap().to_string();
    let json = serde_json::to_string(original.span_table().unwrap()).unwrap();

    let spans: SpanTable = serde_json::from_str(&json).unwrap();
    let mut resumed =
        EditSession::resume_structured(&html, spans, pipeline(), select_editor(true)).unwrap();
    assert_eq!(resumed.state(), SessionState::StructuredAuthoritative);
    assert!(!resumed.is_markup_fresh());

    assert!(resumed.commit().is_empty());
    assert_eq!(resumed.canonical_markup(), "Sum $\\sum_i x_i$ done\n");
}

#[test]
fn plain_editor_cannot_resume_structured() {
    let result = EditSession::resume_structured(
        "<p>x</p>",
        SpanTable::default(),
        pipeline(),
        select_editor(false),
    );
    assert!(matches!(
        result,
        Err(PipelineError::InvalidTransition { .. })
    ));
}

#[test]
fn plain_editor_session_still_exports() {
    let mut session = EditSession::new("only raw $y$\n", pipeline(), select_editor(false));
    assert!(session.select_structured_view().is_err());
    session.edit_raw("edited raw $y$\n").unwrap();

    let text = String::from_utf8(session.export().unwrap().value.into_bytes()).unwrap();
    assert!(text.ends_with("edited raw $y$\n"));
}
