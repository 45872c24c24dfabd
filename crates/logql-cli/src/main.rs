//! LogQL command-line driver.
//!
//! Wires the pipeline end to end: flags to source bindings, query text
//! through parse/analyze/execute, result array to stdout or `--output`.
//! Any failure prints exactly one JSON envelope line on stderr, leaves
//! stdout empty, and exits non-zero.

use clap::Parser;
use logql_core::{parse_binding, Error, Result, SourceBindings, DEFAULT_ALIAS};
use logql_engine::{run_query, write_output};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Streaming LogQL queries over newline-delimited JSON logs.
#[derive(Parser, Debug)]
#[command(name = "logql", version, about)]
struct Cli {
    /// The query to run.
    #[arg(long)]
    query: String,

    /// Shorthand for `--source logs=PATH`.
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Bind a source alias to a file. Repeatable.
    #[arg(long = "source", value_name = "ALIAS=PATH")]
    source: Vec<String>,

    /// Write the result array to a file instead of stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(code = err.code(), "query failed");
            eprintln!("{}", err.envelope());
            ExitCode::FAILURE
        }
    }
}

/// Silent unless RUST_LOG opts in: stderr carries only the error envelope
/// and stdout only the result array.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> Result<()> {
    let args = parse_args()?;

    let mut bindings = SourceBindings::new();
    if let Some(path) = &args.log_file {
        bindings.bind(DEFAULT_ALIAS, path.clone())?;
    }
    for spec in &args.source {
        let (alias, path) = parse_binding(spec)?;
        bindings.bind(alias, path)?;
    }

    let rows = run_query(&args.query, &bindings)?;
    write_output(&rows, args.output.as_deref())
}

fn parse_args() -> Result<Cli> {
    Cli::try_parse().map_err(|err| match err.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
            let _ = err.print();
            std::process::exit(0);
        }
        _ => Error::InvalidInvocation(first_line(&err.to_string())),
    })
}

/// Clap errors span several lines; the envelope takes the headline only.
fn first_line(text: &str) -> String {
    text.lines()
        .next()
        .unwrap_or("invalid arguments")
        .trim_start_matches("error: ")
        .to_string()
}
