use clap::{Arg, ArgAction, Command, ValueHint};
use clap_complete::{generate_to, shells::*};
use std::env;
use std::io::Error;

// Mirror of build_cli() in src/main.rs
// We need to duplicate this here since build scripts can't access src/ modules
fn input_arg(help: &'static str) -> Arg {
    Arg::new("input")
        .help(help)
        .required(true)
        .index(1)
        .value_hint(ValueHint::FilePath)
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

fn main() -> Result<(), Error> {
    let outdir = match env::var_os("OUT_DIR") {
        None => return Ok(()),
        Some(outdir) => outdir,
    };

    let mut cmd = Command::new("mathdoc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Math-preserving markdown, structured HTML and RTL DOCX conversion")
        .arg_required_else_help(true)
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
                .about("Export markdown (or a structured form) to RTL DOCX")
                .arg(input_arg("Input file path"))
                .arg(output_arg())
                .arg(spans_arg()),
        )
        .subcommand(
            Command::new("extract")
                .about("Extract and translate images, a PDF or text into markdown")
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
                .arg(input_arg("Markdown file"))
                .arg(output_arg())
                .arg(spans_arg()),
        )
        .subcommand(
            Command::new("markup")
                .about("Convert a structured HTML form back to markdown")
                .arg(input_arg("Structured HTML file"))
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
        );

    // Generate completions for bash
    generate_to(Bash, &mut cmd, "mathdoc", &outdir)?;

    // Generate completions for zsh
    generate_to(Zsh, &mut cmd, "mathdoc", &outdir)?;

    // Generate completions for fish
    generate_to(Fish, &mut cmd, "mathdoc", &outdir)?;

    println!("cargo:warning=Shell completions generated in {outdir:?}");

    Ok(())
}
