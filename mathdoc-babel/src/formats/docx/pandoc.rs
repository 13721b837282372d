//! Pandoc as the conversion engine.
//!
//! Binary lookup order: explicitly configured path, `MATHDOC_PANDOC_BIN`,
//! `pandoc` on `PATH`, then the usual install locations of each platform.

use super::{ConversionEngine, Directives, EngineStatus};
use crate::error::PipelineError;
use once_cell::sync::OnceCell;
use std::env;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use which::which;

/// Environment variable naming the pandoc binary
pub const PANDOC_BIN_ENV: &str = "MATHDOC_PANDOC_BIN";

/// Runs the `pandoc` executable
#[derive(Debug, Default)]
pub struct PandocEngine {
    configured: Option<PathBuf>,
    ready: OnceCell<EngineStatus>,
}

impl PandocEngine {
    pub fn new(configured: Option<PathBuf>) -> Self {
        Self {
            configured,
            ready: OnceCell::new(),
        }
    }

    /// Where the binary would be taken from, without running it.
    pub fn locate(&self) -> Result<PathBuf, PipelineError> {
        resolve_pandoc_binary(self.configured.as_deref())
    }
}

impl ConversionEngine for PandocEngine {
    fn name(&self) -> &str {
        "pandoc"
    }

    fn ensure_ready(&self) -> Result<EngineStatus, PipelineError> {
        if let Some(status) = self.ready.get() {
            return Ok(status.clone());
        }

        let path = self.locate()?;
        let output = Command::new(&path)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                PipelineError::ExportEngineUnavailable(format!(
                    "cannot run pandoc ({}): {e}",
                    path.display()
                ))
            })?;
        if !output.status.success() {
            return Err(PipelineError::ExportEngineUnavailable(format!(
                "{} --version exited with {}",
                path.display(),
                output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        tracing::info!(path = %path.display(), %version, "pandoc ready");

        let status = self.ready.get_or_init(|| EngineStatus { path, version });
        Ok(status.clone())
    }

    fn render(
        &self,
        markup: &str,
        directives: &Directives,
        output: &Path,
    ) -> Result<(), PipelineError> {
        let status = self.ensure_ready()?;
        let args = pandoc_args(directives, output);
        tracing::debug!(?args, "running pandoc");

        let mut child = Command::new(&status.path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    PipelineError::ExportEngineUnavailable(format!(
                        "cannot run pandoc ({}): {e}",
                        status.path.display()
                    ))
                }
                _ => PipelineError::Io(format!("failed to start pandoc: {e}")),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // An engine that exits early closes the pipe; its exit status tells the story
            if let Err(err) = stdin.write_all(markup.as_bytes()) {
                if err.kind() != io::ErrorKind::BrokenPipe {
                    return Err(PipelineError::Io(format!("writing to pandoc: {err}")));
                }
            }
        }

        let result = child
            .wait_with_output()
            .map_err(|e| PipelineError::Io(format!("waiting for pandoc: {e}")))?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(PipelineError::ConversionFailed(format!(
                "pandoc exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

fn pandoc_args(directives: &Directives, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--from".into(),
        directives.input_format.clone().into(),
        "--to".into(),
        "docx".into(),
    ];
    for (key, value) in directives.metadata() {
        args.push("-M".into());
        args.push(format!("{key}={value}").into());
    }
    if let Some(reference) = &directives.reference_doc {
        args.push("--reference-doc".into());
        args.push(reference.clone().into_os_string());
    }
    args.push("--output".into());
    args.push(output.as_os_str().to_owned());
    args
}

fn resolve_pandoc_binary(configured: Option<&Path>) -> Result<PathBuf, PipelineError> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = env::var_os(PANDOC_BIN_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    if let Ok(path) = which("pandoc") {
        return Ok(path);
    }

    #[cfg(target_os = "macos")]
    {
        for candidate in ["/opt/homebrew/bin/pandoc", "/usr/local/bin/pandoc"] {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let mut candidates = vec![PathBuf::from(r"C:\Program Files\Pandoc\pandoc.exe")];
        if let Some(local) = env::var_os("LOCALAPPDATA") {
            candidates.push(PathBuf::from(local).join(r"Pandoc\pandoc.exe"));
        }
        for path in candidates {
            if path.exists() {
                return Ok(path);
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        for candidate in ["/usr/bin/pandoc", "/usr/local/bin/pandoc", "/snap/bin/pandoc"] {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    Err(PipelineError::ExportEngineUnavailable(format!(
        "pandoc not found; install it or set {PANDOC_BIN_ENV}"
    )))
}
