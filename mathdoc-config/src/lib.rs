//! Shared configuration loader for the mathdoc toolchain.
//!
//! `defaults/mathdoc.default.toml` is compiled in and always forms the bottom layer, so a
//! missing or partial user file still yields a complete [`MathdocConfig`]. Files and
//! `MATHDOC_*` environment variables go on top through [`Loader`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, Map, ValueKind};
use mathdoc_babel::extract::CommandExtractor;
use mathdoc_babel::formats::{ExportOptions, StructuredOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_TOML: &str = include_str!("../defaults/mathdoc.default.toml");

/// File picked up from the working directory when present.
pub const LOCAL_CONFIG_FILE: &str = "mathdoc.toml";

/// Top-level configuration consumed by mathdoc applications.
#[derive(Debug, Clone, Deserialize)]
pub struct MathdocConfig {
    pub editor: EditorConfig,
    pub structured: StructuredConfig,
    pub export: ExportConfig,
    pub extract: ExtractConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    pub rich: bool,
}

/// Markdown dialect knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct StructuredConfig {
    pub tables: bool,
    pub strikethrough: bool,
    pub autolink: bool,
    pub raw_html: bool,
}

impl From<&StructuredConfig> for StructuredOptions {
    fn from(config: &StructuredConfig) -> Self {
        StructuredOptions {
            tables: config.tables,
            strikethrough: config.strikethrough,
            autolink: config.autolink,
            raw_html: config.raw_html,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub engine: Option<PathBuf>,
    pub input_format: String,
    pub lang: String,
    #[serde(default)]
    pub reference_doc: Option<PathBuf>,
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        let non_empty = |path: &Option<PathBuf>| {
            path.clone()
                .filter(|path| !path.as_os_str().is_empty())
        };
        ExportOptions {
            engine: non_empty(&config.engine),
            input_format: config.input_format.clone(),
            lang: Some(config.lang.clone()).filter(|lang| !lang.is_empty()),
            reference_doc: non_empty(&config.reference_doc),
            temp_dir: non_empty(&config.temp_dir),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    #[serde(default)]
    pub command: Option<String>,
    pub target_language: String,
}

impl ExtractConfig {
    /// The configured extraction command, if any.
    pub fn extractor(&self) -> Option<CommandExtractor> {
        let command = self.command.as_deref()?;
        CommandExtractor::from_command_line(command)
            .map(|extractor| extractor.with_target_language(self.target_language.clone()))
    }
}

/// Prefix of the environment variables read by [`Loader::with_env`].
pub const ENV_PREFIX: &str = "MATHDOC";

/// Builds a [`MathdocConfig`] from the embedded defaults plus user layers.
///
/// Later layers win. The CLI stacks them as: defaults, `./mathdoc.toml`, `--config`,
/// environment, `--extra-*` overrides.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    pub fn new() -> Self {
        let defaults = File::from_str(DEFAULT_TOML, FileFormat::Toml);
        Self {
            builder: Config::builder().add_source(defaults),
        }
    }

    /// Layer a TOML file that must exist.
    pub fn with_file(self, path: impl AsRef<Path>) -> Self {
        self.layer_file(path.as_ref(), true)
    }

    /// Layer a TOML file if it exists.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> Self {
        self.layer_file(path.as_ref(), false)
    }

    /// Layer `MATHDOC_<SECTION>__<KEY>` variables, e.g. `MATHDOC_EXPORT__LANG=fa`.
    ///
    /// Other `MATHDOC_*` variables (`MATHDOC_LOG`, `MATHDOC_PANDOC_BIN`) land on keys no
    /// section reads and are ignored.
    pub fn with_env(self) -> Self {
        self.layer_env(None)
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<MathdocConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }

    fn layer_file(mut self, path: &Path, required: bool) -> Self {
        let source = File::from(path).format(FileFormat::Toml).required(required);
        self.builder = self.builder.add_source(source);
        self
    }

    /// `vars` replaces the process environment when given.
    fn layer_env(mut self, vars: Option<Map<String, String>>) -> Self {
        let source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(vars);
        self.builder = self.builder.add_source(source);
        self
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<MathdocConfig, ConfigError> {
    Loader::new().build()
}
