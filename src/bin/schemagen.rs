//! schemagen: Infer a BigQuery schema from NDJSON files
//!
//! Usage:
//!   # Read files, write the schema to a file
//!   schemagen events1.ndjson events2.ndjson -o schema.json
//!
//!   # Read from stdin, output to stdout
//!   cat events.ndjson | schemagen
//!
//!   # Sample a quarter of the lines, keep a log of skipped lines
//!   schemagen big.ndjson --sampling-percentage 25 --error-log errors.ndjson

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use schemagen::{
    to_json, ExportFormat, ExportOptions, InferOptions, IngestConfig, IngestReport, NullPolicy, Pipeline,
    Source,
};
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NullArg {
    Reject,
    Skip,
    Unknown,
}

impl From<NullArg> for NullPolicy {
    fn from(arg: NullArg) -> Self {
        match arg {
            NullArg::Reject => NullPolicy::Reject,
            NullArg::Skip => NullPolicy::Skip,
            NullArg::Unknown => NullPolicy::Unknown,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "schemagen")]
#[command(version, about = "Infer a BigQuery schema from NDJSON input files", long_about = None)]
struct Args {
    /// Input files, one JSON object per line (use stdin if omitted or "-")
    #[arg(value_name = "FILE")]
    inputs: Vec<String>,

    /// Workers started per input file
    #[arg(long, default_value_t = schemagen::config::DEFAULT_FAN_OUT)]
    fan_out: usize,

    /// Lines buffered between readers and workers
    #[arg(long, default_value_t = schemagen::config::DEFAULT_QUEUE_CAPACITY)]
    buffer_size: usize,

    /// Percentage of lines to infer from; every line is still counted
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(0..=100))]
    sampling_percentage: u8,

    /// Fixed worker count, instead of fan-out times number of inputs
    #[arg(long)]
    workers: Option<usize>,

    /// Deepest record nesting accepted
    #[arg(long, default_value_t = schemagen::schema::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// What to do with null values and empty arrays
    #[arg(long, value_enum, default_value = "reject")]
    null_policy: NullArg,

    /// Infer TIMESTAMP, DATE and TIME from ISO-8601 strings
    #[arg(long)]
    detect_temporal: bool,

    /// Seed for line sampling, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Output file (stdout if omitted)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Output format: bigquery or tree
    #[arg(long, default_value = "bigquery")]
    format: ExportFormat,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,

    /// Reject field names BigQuery does not accept as column names
    #[arg(long)]
    strict_names: bool,

    /// Write every skipped line to this file as NDJSON
    #[arg(long)]
    error_log: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            fan_out_per_source: self.fan_out,
            queue_capacity: self.buffer_size,
            sampling_percentage: self.sampling_percentage,
            workers: self.workers,
            max_depth: self.max_depth,
            infer: InferOptions {
                null_policy: self.null_policy.into(),
                detect_temporal: self.detect_temporal,
            },
            sampling_seed: self.seed,
        }
    }

    fn sources(&self) -> Vec<Source> {
        if self.inputs.is_empty() {
            return vec![Source::Stdin];
        }
        self.inputs.iter().map(|arg| Source::from_arg(arg)).collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for the schema
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = args.ingest_config();
    let sources = args.sources();
    let source_count = sources.len();

    info!(
        fan_out = config.fan_out_per_source,
        buffer_size = config.queue_capacity,
        sampling_percentage = config.sampling_percentage,
        output = %args.output.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "-".to_string()),
        "starting process"
    );

    let cancel = CancellationToken::new();
    let pipeline = Pipeline::new(config)
        .context("Invalid configuration")?
        .with_cancellation(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing queued lines");
            cancel.cancel();
        }
    });

    let report = pipeline.run(sources).await.context("Failed to run ingestion")?;

    if report.all_sources_failed(source_count) {
        bail!("none of the {} input(s) could be read", source_count);
    }

    if let Some(path) = &args.error_log {
        write_error_log(path, &report).context("Failed to write error log")?;
    }

    let options = ExportOptions {
        strict_names: args.strict_names,
    };
    let output = to_json(&report.schema, args.format, &options, !args.compact)
        .context("Fatal schema conversion to JSON")?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{}\n", output))
                .with_context(|| format!("Error writing schema to output file: {}", path.display()))?;
            info!(path = %path.display(), "schema generated");
        }
        None => println!("{}", output),
    }

    print_summary(&report);
    Ok(())
}

fn write_error_log(path: &Path, report: &IngestReport) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for error in &report.errors {
        let entry = json!({
            "source": &*error.provenance.source,
            "line": error.provenance.line,
            "error": error.kind.to_string(),
        });
        writeln!(writer, "{}", entry)?;
    }
    for error in &report.source_errors {
        let entry = json!({
            "source": error.source_id(),
            "error": error.to_string(),
        });
        writeln!(writer, "{}", entry)?;
    }
    writer.flush()?;
    Ok(())
}

fn print_summary(report: &IngestReport) {
    info!("Schema length: {}", report.schema.len());
    info!("Total elapsed time: {:?}", report.elapsed);
    info!("Total lines counted: {}", report.counts.total);
    info!("Total lines processed: {}", report.counts.processed);
    if report.counts.failed > 0 {
        warn!("Lines skipped with errors: {}", report.counts.failed);
    }
    for error in &report.source_errors {
        warn!("Unreadable input: {}", error);
    }
    if report.cancelled {
        warn!("Run was interrupted; the schema covers only the lines read before that");
    }
}
