//! prism: run an effect plan over one or more data directories.
//!
//! Reads the plan from the data root, then processes each data-directory
//! tag as its own batch with the selected strategy, printing one report
//! per batch.
//!
//! # Usage
//!
//! ```text
//! prism [OPTIONS] <DATA_DIRS> [MODE] [THREADS]
//!
//! prism small                  # sequential
//! prism small+big bsp 8        # BSP with 8 workers, two batches
//! prism mixture pipeline 4     # pipeline with 4 consumers
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use prism_io::{DataLayout, PlanError, PngCodec, load_plan, split_tags};
use prism_pipeline::{BatchReport, PipelineError, RunConfig, Strategy, run_batch};

/// Apply chains of image effects to data directories under a sequential,
/// BSP, or pipelined strategy.
#[derive(Parser)]
#[command(name = "prism", version)]
struct Cli {
    /// Data-directory tags under `<data-root>/in`, separated by `+`.
    data_dirs: String,

    /// Strategy: omit for sequential, `pipeline` for the pipeline, any
    /// other word for BSP.
    mode: Option<String>,

    /// Worker count for the parallel strategies [default: available
    /// parallelism].
    #[arg(value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    threads: Option<usize>,

    /// Directory holding the plan, `in/` and `out/`.
    #[arg(long, default_value = DataLayout::DEFAULT_ROOT)]
    data_root: PathBuf,

    /// Plan file [default: `<data-root>/effects.txt`].
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Upper bound of the pipeline producer's random pause after each
    /// image, in milliseconds [default: 1000].
    #[arg(long)]
    max_delay_ms: Option<u64>,

    /// Print batch reports as JSON instead of human-readable text.
    #[arg(long)]
    json: bool,
}

/// Everything a run needs, resolved from the command line.
#[derive(Debug)]
struct Invocation {
    config: RunConfig,
    layout: DataLayout,
    tags: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("no data directories given")]
    NoTags,

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("failed to create {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tag}: {source}")]
    Batch {
        tag: String,
        #[source]
        source: PipelineError,
    },
}

/// Fold the command-line arguments into a run configuration and layout.
fn config_from_cli(cli: &Cli) -> Result<Invocation, RunError> {
    let tags = split_tags(&cli.data_dirs);
    if tags.is_empty() {
        return Err(RunError::NoTags);
    }
    let defaults = RunConfig::default();
    let config = RunConfig {
        strategy: Strategy::from_mode(cli.mode.as_deref()),
        workers: cli.threads.unwrap_or(defaults.workers),
        max_delay: cli
            .max_delay_ms
            .map_or(defaults.max_delay, Duration::from_millis),
    };
    let mut layout = DataLayout::new(&cli.data_root);
    if let Some(plan) = &cli.plan {
        layout = layout.with_plan(plan);
    }
    Ok(Invocation {
        config,
        layout,
        tags,
    })
}

/// Run every tag in order, stopping at the first failed batch.
fn run(invocation: &Invocation, mut on_report: impl FnMut(&BatchReport)) -> Result<(), RunError> {
    let Invocation {
        config,
        layout,
        tags,
    } = invocation;
    let records = load_plan(&layout.plan_path())?;
    layout.prepare_output().map_err(|source| RunError::Output {
        path: layout.output_dir(),
        source,
    })?;
    info!(
        "{} plan records, {} batches, {} x{}",
        records.len(),
        tags.len(),
        config.strategy,
        config.workers
    );
    for tag in tags {
        let batch = layout.batch(tag, &records);
        let report = run_batch(&batch, config, &PngCodec).map_err(|source| RunError::Batch {
            tag: tag.clone(),
            source,
        })?;
        on_report(&report);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let invocation = match config_from_cli(&cli) {
        Ok(invocation) => invocation,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut print_failed = false;
    let outcome = run(&invocation, |report| {
        if cli.json {
            match serde_json::to_string_pretty(report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing report: {e}");
                    print_failed = true;
                }
            }
        } else {
            println!("{}", report.report());
        }
    });

    match outcome {
        Ok(()) if !print_failed => ExitCode::SUCCESS,
        Ok(()) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
