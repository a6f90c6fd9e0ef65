//! `datagator-import`: convert tabular files into `datagator#Matrix` documents.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::error::ErrorKind;

use datagator_importer::convert::{
    ConversionObserver, ConversionRequest, ConvertOptions, StdErrObserver,
};
use datagator_importer::extract::FormatRegistry;
use datagator_importer::matrix::JsonStyle;
use datagator_importer::types::Layout;

const EXIT_USAGE: u8 = 64;

/// Convert CSV/TSV (and, with the `excel` feature, workbook) files into matrix JSON.
///
/// Each input becomes one document; documents are written in input order.
///
/// ```bash
/// # First row is a header row
/// datagator-import -L 1,0 people.csv
///
/// # Two inputs, compact output, written atomically to a file
/// datagator-import --compact -o out.json a.csv b.tsv
/// ```
#[derive(Parser, Debug)]
#[command(name = "datagator-import")]
#[command(version, about = "Convert tabular files into datagator#Matrix JSON documents", long_about = None)]
struct Cli {
    /// Input files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Header layout as <columnHeaders>,<rowHeaders>
    #[arg(short = 'L', long, default_value = "0,0")]
    layout: Layout,

    /// Format key for every input (default: each file's extension)
    #[arg(long)]
    format: Option<String>,

    /// Compact separators, one document per line
    #[arg(long)]
    compact: bool,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report progress and failures on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    let registry = FormatRegistry::standard();
    if let Some(key) = cli.format.as_deref() {
        if !registry.contains(key) {
            let known: Vec<&str> = registry.keys().collect();
            eprintln!("Error: unknown format '{key}' (known: {})", known.join(", "));
            return ExitCode::from(EXIT_USAGE);
        }
    }

    let request = ConversionRequest {
        paths: cli.inputs,
        output: cli.output,
        options: ConvertOptions {
            format: cli.format,
            layout: cli.layout,
            style: if cli.compact {
                JsonStyle::Compact
            } else {
                JsonStyle::Standard
            },
            registry: Arc::new(registry),
            observer: cli
                .verbose
                .then(|| Arc::new(StdErrObserver) as Arc<dyn ConversionObserver>),
            ..Default::default()
        },
    };

    match request.run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
