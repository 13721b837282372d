use mathdoc_babel::{DocumentExporter, ExportOptions, PipelineError};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

fn entries(dir: &std::path::Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

#[test]
fn unavailable_engine_is_reported_and_leaves_nothing_behind() {
    let scratch = tempdir().unwrap();
    let exporter = DocumentExporter::new(ExportOptions {
        engine: Some(PathBuf::from("/nonexistent/pandoc")),
        temp_dir: Some(scratch.path().to_path_buf()),
        ..ExportOptions::default()
    });

    let err = exporter.export("$$x$$").unwrap_err();
    assert!(matches!(err, PipelineError::ExportEngineUnavailable(_)));
    assert!(!matches!(err, PipelineError::ConversionFailed(_)));
    assert_eq!(entries(scratch.path()), 0);
}

/// Reads a DOCX back to markdown with the same engine that wrote it.
fn reextract(pandoc: &std::path::Path, docx: &[u8]) -> String {
    let scratch = tempdir().unwrap();
    let path = scratch.path().join("out.docx");
    fs::write(&path, docx).unwrap();
    let output = std::process::Command::new(pandoc)
        .args(["-f", "docx", "-t", "markdown", "--wrap=none"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout).unwrap()
}

fn document_xml(docx: &[u8]) -> String {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(docx)).unwrap();
    let mut entry = archive.by_name("word/document.xml").unwrap();
    let mut xml = String::new();
    std::io::Read::read_to_string(&mut entry, &mut xml).unwrap();
    xml
}

#[test]
fn real_pandoc_keeps_math_and_direction() {
    let Ok(pandoc) = which::which("pandoc") else {
        eprintln!("Skipping real pandoc export (pandoc not on PATH)");
        return;
    };
    let exporter = DocumentExporter::default();
    let markup = "مرحبا $$\\int_0^1 x\\,dx$$\n";
    let first = exporter.export(markup).unwrap();
    assert!(first.bytes().starts_with(b"PK"));

    let back = reextract(&pandoc, first.bytes());
    let normalized: String = back
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '{' && *c != '}')
        .collect();
    assert!(normalized.contains("\\int_0^1"), "{back}");
    assert!(normalized.contains("dx"), "{back}");

    let second = exporter.export(markup).unwrap();
    assert_eq!(reextract(&pandoc, second.bytes()), back);

    let xml = document_xml(first.bytes());
    assert!(xml.contains("<w:bidi") || xml.contains("<w:rtl"), "no RTL markers in document.xml");
}

#[cfg(unix)]
mod unix {
    use super::entries;
    use mathdoc_babel::{ConversionEngine, DocumentExporter, ExportOptions, PipelineError};
    use mathdoc_babel::{PandocEngine, DOCX_MEDIA_TYPE};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::{tempdir, TempDir};

    /// Echoes its arguments (minus the output path) and stdin into the output file.
    const ECHO_PANDOC: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "pandoc 3.1.9"
  exit 0
fi
OUTPUT=""
PREV=""
ARGS=""
for arg in "$@"; do
  if [ "$PREV" = "--output" ]; then
    OUTPUT="$arg"
  else
    ARGS="$ARGS $arg"
  fi
  PREV="$arg"
done
if [ -z "$OUTPUT" ]; then
  echo "missing output" >&2
  exit 1
fi
{ echo "ARGS:$ARGS"; cat; } > "$OUTPUT"
exit 0
"#;

    const FAILING_PANDOC: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "pandoc 3.1.9"
  exit 0
fi
cat > /dev/null
echo "could not parse input at line 1" >&2
exit 64
"#;

    const SILENT_PANDOC: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "pandoc 3.1.9"
  exit 0
fi
cat > /dev/null
exit 0
"#;

    const BROKEN_PANDOC: &str = r#"#!/bin/sh
echo "error while loading shared libraries" >&2
exit 127
"#;

    fn write_stub(script: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let script_path = dir.path().join("fake-pandoc.sh");
        fs::write(&script_path, script).unwrap();
        let mut perms = fs::metadata(&script_path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms).unwrap();
        (dir, script_path)
    }

    fn exporter(engine: &Path, scratch: &Path) -> DocumentExporter {
        DocumentExporter::new(ExportOptions {
            engine: Some(engine.to_path_buf()),
            temp_dir: Some(scratch.to_path_buf()),
            ..ExportOptions::default()
        })
    }

    #[test]
    fn export_hands_dollar_math_and_rtl_to_the_engine() {
        let (_dir, stub) = write_stub(ECHO_PANDOC);
        let scratch = tempdir().unwrap();

        let artifact = exporter(&stub, scratch.path())
            .export("$$\\int_0^1 x\\,dx$$\n")
            .unwrap();
        let text = String::from_utf8(artifact.bytes().to_vec()).unwrap();

        assert_eq!(artifact.media_type(), DOCX_MEDIA_TYPE);
        assert!(text.starts_with(
            "ARGS: --from markdown+tex_math_dollars --to docx -M dir=rtl -M lang=ar --output\n"
        ));
        assert!(text.contains("$$\\int_0^1 x\\,dx$$"));
    }

    #[test]
    fn reference_doc_and_lang_are_forwarded() {
        let (_dir, stub) = write_stub(ECHO_PANDOC);
        let scratch = tempdir().unwrap();
        let exporter = DocumentExporter::new(ExportOptions {
            engine: Some(stub.clone()),
            lang: Some("fa".to_string()),
            reference_doc: Some(PathBuf::from("/styles/rtl.docx")),
            temp_dir: Some(scratch.path().to_path_buf()),
            ..ExportOptions::default()
        });

        let artifact = exporter.export("x").unwrap();
        let text = String::from_utf8(artifact.into_bytes()).unwrap();
        assert!(text.contains("-M lang=fa --reference-doc /styles/rtl.docx"));
    }

    #[test]
    fn exporting_twice_gives_identical_artifacts() {
        let (_dir, stub) = write_stub(ECHO_PANDOC);
        let scratch = tempdir().unwrap();
        let exporter = exporter(&stub, scratch.path());

        let markup = "نص $a^2$ و $$b$$\n";
        let first = exporter.export(markup).unwrap();
        let second = exporter.export(markup).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn temp_artifacts_are_released_on_success_and_failure() {
        let scratch = tempdir().unwrap();

        let (_ok_dir, ok) = write_stub(ECHO_PANDOC);
        exporter(&ok, scratch.path()).export("fine").unwrap();
        assert_eq!(entries(scratch.path()), 0);

        let (_bad_dir, bad) = write_stub(FAILING_PANDOC);
        exporter(&bad, scratch.path()).export("broken").unwrap_err();
        assert_eq!(entries(scratch.path()), 0);

        let (_silent_dir, silent) = write_stub(SILENT_PANDOC);
        exporter(&silent, scratch.path()).export("nothing").unwrap_err();
        assert_eq!(entries(scratch.path()), 0);
    }

    #[test]
    fn engine_rejection_is_a_conversion_failure_with_stderr() {
        let (_dir, stub) = write_stub(FAILING_PANDOC);
        let scratch = tempdir().unwrap();

        let err = exporter(&stub, scratch.path()).export("x").unwrap_err();
        match err {
            PipelineError::ConversionFailed(detail) => {
                assert!(detail.contains("could not parse input"), "{detail}");
            }
            other => panic!("expected ConversionFailed, got {other:?}"),
        }
    }

    #[test]
    fn no_output_is_a_conversion_failure() {
        let (_dir, stub) = write_stub(SILENT_PANDOC);
        let scratch = tempdir().unwrap();

        let err = exporter(&stub, scratch.path()).export("x").unwrap_err();
        assert!(matches!(err, PipelineError::ConversionFailed(_)));
    }

    #[test]
    fn ensure_ready_reports_version_once_available() {
        let (_dir, stub) = write_stub(ECHO_PANDOC);
        let engine = PandocEngine::new(Some(stub.clone()));

        let status = engine.ensure_ready().unwrap();
        assert_eq!(status.path, stub);
        assert_eq!(status.version, "pandoc 3.1.9");
        assert_eq!(engine.ensure_ready().unwrap(), status);
    }

    #[test]
    fn engine_that_cannot_start_is_unavailable() {
        let (_dir, stub) = write_stub(BROKEN_PANDOC);
        let scratch = tempdir().unwrap();

        let err = exporter(&stub, scratch.path()).export("x").unwrap_err();
        assert!(matches!(err, PipelineError::ExportEngineUnavailable(_)));
        assert_eq!(entries(scratch.path()), 0);
    }
}

#[cfg(not(unix))]
#[test]
fn pandoc_stub_skipped() {
    eprintln!("Skipping pandoc stub tests (Unix required)");
}
