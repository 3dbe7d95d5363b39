//! dsdlc command line driver.
//!
//! Reads one or more type-model documents and generates a libuavcan header
//! per type. With `--dry-run` the would-be output paths are printed to stdout,
//! separated by `;`, and nothing is written.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use dsdlc::codegen::{FailurePolicy, Generator};
use tracing::info;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "dsdlc", version)]
#[command(about = "Generates libuavcan C++ headers from DSDL type models")]
struct Args {
    /// Type-model documents
    #[arg(short, long = "types", value_name = "XML", required = true, num_args = 1..)]
    types: Vec<PathBuf>,

    /// Header template
    #[arg(long, value_name = "PATH")]
    template: PathBuf,

    /// Output directory, created if missing
    #[arg(short, long, value_name = "DIR", default_value = "dsdlc_generated")]
    output: PathBuf,

    /// Print the output paths instead of writing them
    #[arg(long)]
    dry_run: bool,

    /// Keep generating after a type fails
    #[arg(long)]
    keep_going: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    setup_tracing(args.verbose);

    let mut types = Vec::new();
    for path in &args.types {
        info!("source: {}", path.display());
        types.extend(dsdlc::schema::parse_file(path)?);
    }

    let policy = if args.keep_going {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    };
    let summary = Generator::new(&args.output, &args.template)
        .dry_run(args.dry_run)
        .failure_policy(policy)
        .run(&types)?;

    if args.dry_run {
        let mut stdout = std::io::stdout().lock();
        for path in summary.paths() {
            write!(stdout, "{};", path.display())?;
        }
        stdout.flush()?;
    }

    if !summary.is_success() {
        return Err(format!(
            "{} of {} types failed to generate",
            summary.failures.len(),
            types.len()
        )
        .into());
    }

    Ok(())
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
