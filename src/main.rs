//! Command-line interface for fsa029-validate

#[cfg(feature = "cli")]
use clap::{Parser, ValueEnum};

#[cfg(feature = "cli")]
use std::path::PathBuf;

use fsa029_validate::pipeline::EXIT_FAILURE;
#[cfg(feature = "cli")]
use fsa029_validate::pipeline::{self, RunRequest};
#[cfg(feature = "cli")]
use fsa029_validate::report::{Format, Report};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "fsa029-validate")]
#[command(author, version, about = "Validate an FSA029 submission against a local schema distribution", long_about = None)]
struct Cli {
    /// Directory containing FSA029-Schema.xsd and CommonTypes-Schema.xsd
    #[arg(value_name = "SCHEMA_DIR")]
    schema_dir: PathBuf,

    /// Path to the XML submission
    #[arg(value_name = "SUBMISSION")]
    submission: PathBuf,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log pipeline stages at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[cfg(feature = "cli")]
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[cfg(feature = "cli")]
impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => Format::Text,
            OutputFormat::Json => Format::Json,
        }
    }
}

#[cfg(feature = "cli")]
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let request = RunRequest::new(cli.schema_dir, cli.submission);
    let result = pipeline::run(&request);
    let code = pipeline::exit_code(&result);

    match Report::new(&result).render(cli.format.into()) {
        Ok(rendered) if code == EXIT_FAILURE && cli.format == OutputFormat::Text => {
            eprint!("{}", rendered)
        }
        Ok(rendered) => print!("{}", rendered),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    }
    std::process::exit(code);
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(EXIT_FAILURE);
}
