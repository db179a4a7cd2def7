//! SPP - Streaming macro preprocessor for script sources
//!
//! Usage: spp [OPTIONS] <input> [-o <output>]

use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser as ClapParser;
use script_preprocessor::{
    DiagnosticReporter, FileIncludeResolver, NoopExecutor, PreprocessError, Preprocessor, Source,
};

#[derive(ClapParser, Debug)]
#[command(name = "spp")]
#[command(author = "SPP Team")]
#[command(version = "0.2.0")]
#[command(about = "Streaming macro preprocessor for script sources", long_about = None)]
struct Args {
    /// Input source file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Add a directory to the include search path
    #[arg(short = 'I', long = "include-dir")]
    include_dirs: Vec<PathBuf>,

    /// Predefine a macro, NAME, NAME=BODY or NAME(ARGS)=BODY
    #[arg(short = 'D', long = "define")]
    defines: Vec<String>,

    /// Treat missing include files as no-ops instead of errors
    #[arg(long)]
    ignore_missing_includes: bool,

    /// Replace #embedded blocks with nothing instead of failing
    #[arg(long)]
    skip_embedded: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

/// Split a `-D` argument into a macro name (with optional parameter list)
/// and body. A bare name defines it as `1`.
fn split_define(define: &str) -> (&str, &str) {
    match define.split_once('=') {
        Some((name, body)) => (name, body),
        None => (define, "1"),
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    // Read input file
    let source = fs::read_to_string(&args.input)
        .with_context(|| format!("cannot read {}", args.input.display()))?;
    let filename = args.input.display().to_string();

    // Set up diagnostic reporter
    let mut reporter = DiagnosticReporter::new();
    reporter.add_file(&filename, &source);

    let resolver = FileIncludeResolver::new(args.include_dirs.clone())
        .ignore_missing(args.ignore_missing_includes);

    let mut preprocessor =
        Preprocessor::new(Source::str(&source, &filename)).with_resolver(resolver);
    if args.skip_embedded {
        preprocessor = preprocessor.with_executor(NoopExecutor);
    }

    for define in &args.defines {
        let (name, body) = split_define(define);
        if let Err(e) = preprocessor.predefine(name, body) {
            reporter.report(&e);
            anyhow::bail!("preprocessing failed");
        }
    }

    if args.verbose {
        eprintln!("Preprocessing {}", args.input.display());
    }

    let output = match preprocessor.run_to_string() {
        Ok(output) => output,
        Err(e @ PreprocessError::Io(_)) => {
            return Err(anyhow::Error::new(e).context("preprocessing failed"));
        }
        Err(e) => {
            reporter.report(&e);
            anyhow::bail!("preprocessing failed");
        }
    };

    // Write output
    match &args.output {
        Some(path) => fs::write(path, output)
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => print!("{output}"),
    }

    if args.verbose {
        if let Some(path) = &args.output {
            eprintln!("Successfully preprocessed to {}", path.display());
        }
    }

    Ok(())
}
