//! Corpus distillation front end.
//!
//! Drives the moonlight OSCP engine over a directory of coverage traces:
//! optional large-data preprocessing, matrix construction (or cache
//! restore), the reduce/greedy solve loop, verification, and JSON/CSV
//! export.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use moonlight_oscp::{analytics, cache, Matrix, OscpSolver};

#[derive(Parser)]
#[command(name = "moonlight", version, about = "Corpus distillation via optimised set cover")]
struct Cli {
    /// Path to the corpus directory containing the exemplars.
    #[arg(short, long, default_value = ".")]
    directory: PathBuf,

    /// User defined name for this run; seeds the output file names.
    #[arg(short, long, default_value = "moonlight")]
    name: String,

    /// Regex pattern for corpus files in the directory.
    #[arg(short = 'r', long, default_value = "exemplar_")]
    pattern: String,

    /// File name stem to use when loading or saving matrix data on disk.
    #[arg(short, long)]
    matrix: Option<String>,

    /// Ignore an existing matrix data file and do not serialise the matrix
    /// to file; always load from raw data.
    #[arg(short, long)]
    ignore_matrix: bool,

    /// File name stem to use for storing corpus analytics.
    #[arg(short, long)]
    analytics: Option<String>,

    /// Path to the file containing the exemplar weights.
    #[arg(short, long, value_name = "FILE")]
    weighted: Option<PathBuf>,

    /// Use less memory: eliminate the columns of row unitarians with a
    /// streaming pass before the full read in.
    #[arg(short, long)]
    large_data: bool,

    /// Apply the standard greedy algorithm, skipping the exact reductions.
    #[arg(short, long)]
    greedy: bool,

    /// Enable debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let matrix_file = cli
        .directory
        .join(format!("{}.matrix", cli.matrix.as_deref().unwrap_or(&cli.name)));
    let analytics_file = match cli.analytics.as_deref() {
        Some(stem) => cli.directory.join(format!("{stem}.csv")),
        None => cli.directory.join(format!("{}_analytics.csv", cli.name)),
    };
    let result_file = cli.directory.join(format!("{}_solution.json", cli.name));

    info!(directory = %cli.directory.display(), name = %cli.name, "starting run");
    if cli.greedy && cli.large_data {
        info!("note: cannot save memory (large-data) when using greedy");
    }

    let weights = cli
        .weighted
        .as_deref()
        .map(moonlight_oscp::read_weight_file)
        .transpose()
        .context("reading weight file")?;

    let mut solver = OscpSolver::new();

    let mut matrix = if !cli.ignore_matrix && matrix_file.is_file() {
        info!(path = %matrix_file.display(), "restoring matrix from cache");
        cache::load_matrix(&matrix_file).context("restoring matrix cache")?
    } else {
        let cols_to_ignore = if cli.large_data && !cli.greedy {
            solver
                .calc_cols_to_ignore(&cli.directory, &cli.pattern, weights.as_ref())
                .context("large-data preprocessing")?
        } else {
            Vec::new()
        };

        let matrix = Matrix::from_corpus(
            &cli.directory,
            &cli.pattern,
            weights.as_ref(),
            &cols_to_ignore,
        )
        .context("constructing matrix from corpus")?;

        if !cli.ignore_matrix {
            cache::save_matrix(&matrix, &matrix_file).context("saving matrix cache")?;
        }
        matrix
    };

    let mut corpus_analytics = moonlight_oscp::initialise_analytics(&matrix);

    info!("solving for optimised set cover");
    let result = solver
        .solve_oscp(
            &mut matrix,
            &mut corpus_analytics,
            &cli.name,
            cli.greedy,
            weights.as_ref(),
        )
        .context("solving")?;

    info!(path = %result_file.display(), "writing corpus distillation solution");
    result
        .write_json(&result_file)
        .context("writing solution JSON")?;

    info!(path = %analytics_file.display(), "writing corpus analytics");
    analytics::write_csv(&analytics_file, &corpus_analytics)
        .context("writing analytics CSV")?;

    info!("done");
    Ok(())
}
