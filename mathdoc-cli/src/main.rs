// Command-line interface for mathdoc
//
// The mathdoc program moves a document through the conversion pipeline from the shell: text
// comes in from the extraction service, gets a structured (HTML) form for rich editing, comes
// back as markdown, and leaves as a right-to-left DOCX. Math in dollar delimiters survives
// every step unchanged. All conversion logic lives in mathdoc-babel; this binary only reads
// files, applies configuration and reports.
//
// Usage:
//  mathdoc <input.md> -o <out.docx>                   - Export markdown (default command)
//  mathdoc export <input> -o <out.docx> [--spans f]   - Same as above (explicit); with --spans
//                                                       the input is a structured form
//  mathdoc extract <inputs>... [-o <out.md>]          - Extract/translate images, a PDF or text
//  mathdoc structure <input.md> --spans <f> [-o ..]   - Markdown to structured HTML
//  mathdoc markup <input.html> --spans <f> [-o ..]    - Structured HTML back to markdown
//  mathdoc check-engine                               - Locate pandoc, print its version
//
// Extra Parameters:
//
// Configuration can be overridden per call with --extra-<key> <value>:
//  engine, lang, reference-doc, temp-dir, input-format, rich, target-language, extract-command
// Example:
//  mathdoc notes.md -o notes.docx --extra-lang fa --extra-reference-doc rtl.docx
//
// MATHDOC_<SECTION>__<KEY> environment variables sit between the config files and the
// extras, e.g. MATHDOC_EXPORT__LANG=fa.

use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use mathdoc_babel::extract::{Extractor, PassthroughExtractor, SourceDocument, SourceImage};
use mathdoc_babel::formats::{DocumentExporter, ExportOptions, StructuredOptions};
use mathdoc_babel::{select_editor, EditSession, Pipeline, PipelineError, SpanTable};
use mathdoc_config::{Loader, MathdocConfig, LOCAL_CONFIG_FILE};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const SUBCOMMANDS: &[&str] = &[
    "export",
    "extract",
    "structure",
    "markup",
    "check-engine",
    "help",
];

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp", "tif", "tiff"];

/// Parse extra-* arguments from command line args
/// Returns (cleaned_args_without_extras, extra_params_map)
///
/// Supports both:
/// - `--extra-<key> <value>` (explicit value)
/// - `--extra-<key>` (boolean flag, defaults to "true")
fn parse_extra_args(args: &[String]) -> (Vec<String>, HashMap<String, String>) {
    let mut cleaned_args = Vec::new();
    let mut extra_params = HashMap::new();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];

        if let Some(key) = arg.strip_prefix("--extra-") {
            let has_value = i + 1 < args.len() && !args[i + 1].starts_with('-');

            if has_value {
                extra_params.insert(key.to_string(), args[i + 1].clone());
                i += 2;
            } else {
                extra_params.insert(key.to_string(), "true".to_string());
                i += 1;
            }
            continue;
        }

        cleaned_args.push(arg.clone());
        i += 1;
    }

    (cleaned_args, extra_params)
}

fn output_arg() -> Arg {
    Arg::new("output")
        .long("output")
        .short('o')
        .help("Output file path (defaults to stdout)")
        .value_hint(ValueHint::FilePath)
}

fn spans_arg() -> Arg {
    Arg::new("spans")
        .long("spans")
        .value_name("PATH")
        .help("Span table (JSON) pairing the structured form with its math")
        .value_hint(ValueHint::FilePath)
}

fn build_cli() -> Command {
    Command::new("mathdoc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Math-preserving markdown, structured HTML and RTL DOCX conversion")
        .long_about(
            "mathdoc moves documents between markdown, the HTML a rich-text editor works on,\n\
            and right-to-left DOCX, keeping $inline$ and $$display$$ math byte-identical.\n\n\
            Extra Parameters:\n  \
            Use --extra-<name> [value] to override configuration for one call.\n  \
            Boolean flags can omit the value (defaults to 'true').\n\n\
            Examples:\n  \
            mathdoc notes.md -o notes.docx                       # Export (default command)\n  \
            mathdoc structure notes.md --spans notes.json        # Markdown to HTML\n  \
            mathdoc markup notes.html --spans notes.json         # HTML back to markdown\n  \
            mathdoc extract page1.png page2.png -o notes.md      # Extract and translate",
        )
        .arg_required_else_help(true)
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Path to a mathdoc.toml configuration file")
                .value_hint(ValueHint::FilePath)
                .global(true),
        )
        .subcommand(
            Command::new("export")
                .about("Export markdown (or a structured form) to RTL DOCX (default command)")
                .long_about(
                    "Export a document to DOCX through pandoc.\n\n\
                    The input is markdown unless --spans is given, in which case it is a\n\
                    structured form that is committed back to markdown first.\n\
                    DOCX is binary, so -o is required.\n\n\
                    Examples:\n  \
                    mathdoc export notes.md -o notes.docx\n  \
                    mathdoc export notes.html --spans notes.json -o notes.docx\n  \
                    mathdoc notes.md -o notes.docx                 # 'export' is optional",
                )
                .arg(
                    Arg::new("input")
                        .help("Input file path")
                        .required(true)
                        .index(1)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(output_arg().help("Output DOCX path (required)"))
                .arg(spans_arg()),
        )
        .subcommand(
            Command::new("extract")
                .about("Extract and translate images, a PDF or text into markdown")
                .long_about(
                    "Run the configured extraction command ([extract] command) on the inputs.\n\n\
                    Several images, one PDF, or one text file may be given. Without an\n\
                    extraction command only text input is accepted and passed through.",
                )
                .arg(
                    Arg::new("inputs")
                        .help("Input files")
                        .required(true)
                        .num_args(1..)
                        .index(1)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("structure")
                .about("Convert markdown to the structured HTML form")
                .arg(
                    Arg::new("input")
                        .help("Markdown file")
                        .required(true)
                        .index(1)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(output_arg())
                .arg(spans_arg().help("Where to write the span table (JSON)")),
        )
        .subcommand(
            Command::new("markup")
                .about("Convert a structured HTML form back to markdown")
                .arg(
                    Arg::new("input")
                        .help("Structured HTML file")
                        .required(true)
                        .index(1)
                        .value_hint(ValueHint::FilePath),
                )
                .arg(output_arg())
                .arg(spans_arg()),
        )
        .subcommand(
            Command::new("check-engine")
                .about("Locate the export engine and print its version")
                .arg(
                    Arg::new("quiet")
                        .long("quiet")
                        .short('q')
                        .help("Only set the exit status")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();

    // Parse extra-* arguments before clap processing
    let (cleaned_args, mut extra_params) = parse_extra_args(&args);

    let cli = build_cli();
    let matches = match cli.clone().try_get_matches_from(&cleaned_args) {
        Ok(m) => m,
        Err(e) => {
            // A bare file argument means export
            if cleaned_args.len() > 1
                && !cleaned_args[1].starts_with('-')
                && !SUBCOMMANDS.contains(&cleaned_args[1].as_str())
            {
                let mut new_args = vec![cleaned_args[0].clone(), "export".to_string()];
                new_args.extend_from_slice(&cleaned_args[1..]);

                match cli.try_get_matches_from(&new_args) {
                    Ok(m) => m,
                    Err(e2) => e2.exit(),
                }
            } else {
                e.exit();
            }
        }
    };

    let mut config = load_cli_config(matches.get_one::<String>("config").map(|s| s.as_str()));
    apply_config_overrides(&mut config, &mut extra_params);
    for key in extra_params.keys() {
        eprintln!("Warning: ignoring unknown option --extra-{key}");
    }

    match matches.subcommand() {
        Some(("export", sub_matches)) => handle_export_command(sub_matches, &config),
        Some(("extract", sub_matches)) => handle_extract_command(sub_matches, &config),
        Some(("structure", sub_matches)) => handle_structure_command(sub_matches, &config),
        Some(("markup", sub_matches)) => handle_markup_command(sub_matches, &config),
        Some(("check-engine", sub_matches)) => {
            handle_check_engine_command(sub_matches.get_flag("quiet"), &config)
        }
        _ => {
            eprintln!("Unknown subcommand. Use --help for usage information.");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MATHDOC_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn handle_export_command(matches: &ArgMatches, config: &MathdocConfig) {
    let input = required(matches, "input");
    let Some(output) = matches.get_one::<String>("output") else {
        eprintln!("DOCX is a binary format and requires an output file. Use -o <path>.");
        std::process::exit(1);
    };

    let source = read_file(input);
    let mut session = match matches.get_one::<String>("spans") {
        Some(spans_path) => {
            let spans = read_span_table(Some(spans_path));
            EditSession::resume_structured(
                &source,
                spans,
                build_pipeline(config),
                select_editor(true),
            )
            .unwrap_or_else(|e| fail(e))
        }
        None => EditSession::new(&source, build_pipeline(config), select_editor(config.editor.rich)),
    };

    let exported = session.export().unwrap_or_else(|e| fail(e));
    report_issues(&exported.issues);

    let artifact = exported.value;
    tracing::info!(
        path = %output,
        size = artifact.len(),
        media_type = artifact.media_type(),
        "writing export"
    );
    fs::write(output, artifact.into_bytes()).unwrap_or_else(|e| {
        eprintln!("Error writing file '{output}': {e}");
        std::process::exit(1);
    });
}

fn handle_extract_command(matches: &ArgMatches, config: &MathdocConfig) {
    let paths: Vec<PathBuf> = matches
        .get_many::<String>("inputs")
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default();
    let source = source_from_paths(&paths).unwrap_or_else(|msg| {
        eprintln!("Error: {msg}");
        std::process::exit(1);
    });

    let extractor: Box<dyn Extractor> = match config.extract.extractor() {
        Some(command) => Box::new(command),
        None => Box::new(PassthroughExtractor),
    };

    let session = EditSession::from_source(
        extractor.as_ref(),
        &source,
        build_pipeline(config),
        select_editor(config.editor.rich),
    )
    .unwrap_or_else(|e| fail(e));

    write_output(
        matches.get_one::<String>("output").map(|s| s.as_str()),
        session.canonical_markup(),
    );
}

fn handle_structure_command(matches: &ArgMatches, config: &MathdocConfig) {
    let markup = read_file(required(matches, "input"));
    let mut session =
        EditSession::new(&markup, build_pipeline(config), select_editor(config.editor.rich));

    let issues = session.select_structured_view().unwrap_or_else(|e| fail(e));
    report_issues(&issues);

    let spans = session.span_table().cloned().unwrap_or_default();
    match matches.get_one::<String>("spans") {
        Some(path) => {
            let json = serde_json::to_string_pretty(&spans).unwrap_or_else(|e| {
                eprintln!("Error encoding span table: {e}");
                std::process::exit(1);
            });
            fs::write(path, json).unwrap_or_else(|e| {
                eprintln!("Error writing file '{path}': {e}");
                std::process::exit(1);
            });
        }
        None if !spans.is_empty() => {
            eprintln!(
                "Warning: {} math span(s) not saved; pass --spans <path> to convert back",
                spans.len()
            );
        }
        None => {}
    }

    write_output(
        matches.get_one::<String>("output").map(|s| s.as_str()),
        session.structured_form().unwrap_or_default(),
    );
}

fn handle_markup_command(matches: &ArgMatches, config: &MathdocConfig) {
    let html = read_file(required(matches, "input"));
    let spans = read_span_table(matches.get_one::<String>("spans").map(|s| s.as_str()));

    let mut session = EditSession::resume_structured(
        &html,
        spans,
        build_pipeline(config),
        select_editor(config.editor.rich),
    )
    .unwrap_or_else(|e| fail(e));

    let issues = session.commit();
    report_issues(&issues);

    write_output(
        matches.get_one::<String>("output").map(|s| s.as_str()),
        session.canonical_markup(),
    );
}

fn handle_check_engine_command(quiet: bool, config: &MathdocConfig) {
    let exporter = DocumentExporter::new(ExportOptions::from(&config.export));
    let status = exporter.ensure_ready().unwrap_or_else(|e| fail(e));
    if !quiet {
        println!("{} ({})", status.version, status.path.display());
    }
}

fn build_pipeline(config: &MathdocConfig) -> Pipeline {
    Pipeline::new(
        StructuredOptions::from(&config.structured),
        ExportOptions::from(&config.export),
    )
}

/// Decide what kind of source a list of input files is.
fn source_from_paths(paths: &[PathBuf]) -> Result<SourceDocument, String> {
    let extension = |path: &Path| {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default()
    };

    match paths {
        [] => Err("no input files given".to_string()),
        [single] if extension(single.as_path()) == "pdf" => fs::read(single)
            .map(SourceDocument::Pdf)
            .map_err(|e| format!("reading '{}': {e}", single.display())),
        _ if paths
            .iter()
            .all(|path| IMAGE_EXTENSIONS.contains(&extension(path.as_path()).as_str())) =>
        {
            let mut images = Vec::with_capacity(paths.len());
            for path in paths {
                let bytes =
                    fs::read(path).map_err(|e| format!("reading '{}': {e}", path.display()))?;
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                images.push(SourceImage { name, bytes });
            }
            Ok(SourceDocument::Images(images))
        }
        [single] => fs::read_to_string(single)
            .map(SourceDocument::Text)
            .map_err(|e| format!("reading '{}': {e}", single.display())),
        _ => Err("several inputs must all be images".to_string()),
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches
        .get_one::<String>(name)
        .map(|s| s.as_str())
        .unwrap_or_else(|| {
            eprintln!("Missing required argument <{name}>");
            std::process::exit(2);
        })
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{path}': {e}");
        std::process::exit(1);
    })
}

fn read_span_table(path: Option<&str>) -> SpanTable {
    let Some(path) = path else {
        return SpanTable::default();
    };
    serde_json::from_str(&read_file(path)).unwrap_or_else(|e| {
        eprintln!("Error parsing span table '{path}': {e}");
        std::process::exit(1);
    })
}

fn write_output(output: Option<&str>, text: &str) {
    match output {
        Some(path) => fs::write(path, text).unwrap_or_else(|e| {
            eprintln!("Error writing file '{path}': {e}");
            std::process::exit(1);
        }),
        None => print!("{text}"),
    }
}

fn report_issues(issues: &[PipelineError]) {
    for issue in issues {
        eprintln!("Warning: {issue}");
    }
}

fn fail(err: PipelineError) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(1);
}

fn load_cli_config(explicit_path: Option<&str>) -> MathdocConfig {
    let loader = Loader::new().with_optional_file(LOCAL_CONFIG_FILE);
    let loader = if let Some(path) = explicit_path {
        loader.with_file(path)
    } else {
        loader
    };

    loader.with_env().build().unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {err}");
        std::process::exit(1);
    })
}

fn apply_config_overrides(config: &mut MathdocConfig, extra_params: &mut HashMap<String, String>) {
    if let Some(path) = extra_params.remove("engine") {
        config.export.engine = Some(PathBuf::from(path));
    }
    if let Some(lang) = extra_params.remove("lang") {
        config.export.lang = lang;
    }
    if let Some(path) = take_override(extra_params, &["reference-doc", "reference"]) {
        config.export.reference_doc = Some(PathBuf::from(path));
    }
    if let Some(path) = extra_params.remove("temp-dir") {
        config.export.temp_dir = Some(PathBuf::from(path));
    }
    if let Some(format) = extra_params.remove("input-format") {
        config.export.input_format = format;
    }
    if let Some(raw) = extra_params.remove("rich") {
        config.editor.rich = parse_bool_arg("rich", &raw);
    }
    if let Some(language) = take_override(extra_params, &["target-language", "language"]) {
        config.extract.target_language = language;
    }
    if let Some(command) = extra_params.remove("extract-command") {
        config.extract.command = Some(command);
    }
}

fn take_override(map: &mut HashMap<String, String>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(value) = map.remove(*key) {
            return Some(value);
        }
    }
    None
}

fn parse_bool_arg(flag: &str, raw: &str) -> bool {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => true,
        "false" | "0" | "no" | "n" => false,
        other => {
            eprintln!("Invalid boolean value '{other}' for --extra-{flag}");
            std::process::exit(1);
        }
    }
}
