use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mdgen_core::id::{IdDomain, IdRegistry};
use mdgen_core::validation::ValidationReport;
use mdgen_data::config::{Config, DEFAULT_CONFIG_FILE};
use mdgen_data::{loader, pipeline};

#[derive(Parser)]
#[command(name = "mdgen")]
#[command(about = "Master-data schema compiler (schema -> C++ repositories).", long_about = None)]
struct Cli {
    /// Project configuration file.
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// More log output (-v debug, -vv trace). Ignored when RUST_LOG is set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Wipe the output root and regenerate every artifact.
    Generate,
    /// Check authored records against the schema. Writes nothing.
    Validate,
    /// Look up an identifier domain by value or by name.
    Id {
        /// A decimal id value, or a domain name.
        query: String,
    },
}

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn try_main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;

    match cli.cmd {
        Cmd::Generate => {
            let summary = pipeline::generate(&config).context("generate failed")?;
            println!(
                "generated {} files for {} data types",
                summary.files.len(),
                summary.data_types
            );
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Validate => {
            let report = pipeline::validate(&config).context("validate failed")?;
            print_report(&report);
            Ok(if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Cmd::Id { query } => {
            let path = config.id_registry_path();
            let ids = loader::load_id_registry(&path)
                .with_context(|| format!("loading id registry {}", path.display()))?;
            let (line, found) = answer_id_query(&ids, &IdQuery::parse(&query));
            println!("{line}");
            Ok(if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &ValidationReport) {
    for bucket in &report.buckets {
        let status = if bucket.is_clean() { "ok" } else { "FAILED" };
        println!(
            "{status}: {} ({}) {} records, {} offending",
            bucket.data_type,
            bucket.namespace,
            bucket.record_count,
            bucket.offending_records.len()
        );
    }
    for discrepancy in &report.discrepancies {
        println!("  {discrepancy}");
    }
}

// ---------------------------------------------------------------------------
// id queries
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum IdQuery {
    Value(i64),
    Name(String),
}

impl IdQuery {
    /// All-digit arguments are values; anything else is a domain name.
    fn parse(arg: &str) -> Self {
        if !arg.is_empty() && arg.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(value) = arg.parse() {
                return IdQuery::Value(value);
            }
        }
        IdQuery::Name(arg.to_string())
    }
}

/// The line to print and whether the query matched.
fn answer_id_query(ids: &IdRegistry, query: &IdQuery) -> (String, bool) {
    match query {
        IdQuery::Value(value) => match ids.search_by_value(*value) {
            Some(domain) => (format!("{value} is within {}", domain.name), true),
            None => (format!("Not found: {value}"), false),
        },
        IdQuery::Name(name) => match ids.search_by_name(name) {
            Some(IdDomain { name, begin, end }) => {
                (format!("{name}ID exists (range: {begin}-{end})"), true)
            }
            None => (format!("Not found: {name}"), false),
        },
    }
}
