//! Solution accumulator and JSON report.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::corpus;
use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// The distilled cover being built: chosen exemplars, their raw rows, and
/// the bookkeeping the verifier and the report need.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    /// Human label for the corpus / run.
    pub corpus_name: String,
    /// Human label for the algorithm that produced the solution.
    pub score_label: String,
    /// Rows in the original matrix.
    pub num_rows: usize,
    /// Columns in the original matrix, before any deletions.
    pub num_columns: usize,
    /// Total weight of the chosen exemplars.
    pub weight: f64,
    /// File names (no directory) of the chosen exemplars, in selection order
    /// until sorted for output.
    pub solution: Vec<String>,
    /// Raw uncompressed bit rows of the chosen exemplars, captured at
    /// selection time for verification.
    pub row_data: Vec<Vec<u8>>,
    /// Original column indices whose frequency over the whole corpus was
    /// zero. Kept sorted.
    pub initial_singularities: Vec<usize>,
    /// Number of heuristic (non-reduction) selections.
    pub num_non_optimal: usize,
    /// Total weight of the heuristic selections.
    pub weight_non_optimal: f64,
}

impl Solution {
    /// Create an empty solution.
    pub fn new() -> Self {
        Solution::default()
    }

    /// Record a chosen exemplar.
    ///
    /// `optimal` is false for heuristic picks, which also bumps the
    /// non-optimal counters.
    pub fn add(&mut self, exemplar: String, row: Vec<u8>, weight: f64, optimal: bool) {
        self.weight += weight;
        self.solution.push(exemplar);
        self.row_data.push(row);

        if !optimal {
            self.num_non_optimal += 1;
            self.weight_non_optimal += weight;
        }
    }

    /// Build the serializable report. The exemplar list is sorted
    /// lexicographically.
    pub fn report(&self) -> SolutionReport {
        let mut exemplars = self.solution.clone();
        exemplars.sort();

        SolutionReport {
            corpus: self.corpus_name.clone(),
            corpus_size: self.num_rows,
            solution_size: self.solution.len(),
            solution_weight: self.weight,
            num_basic_blocks: self.num_columns,
            initial_singularities: self.initial_singularities.len(),
            num_non_optimal: self.num_non_optimal,
            weight_non_optimal: self.weight_non_optimal,
            score_label: self.score_label.clone(),
            solution: exemplars,
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.report())
            .map_err(|e| Error::format(format!("serialising solution: {e}")))?;
        Ok(())
    }
}

/// JSON form of a solution.
#[derive(Debug, Clone, Serialize)]
pub struct SolutionReport {
    /// Corpus / run label.
    pub corpus: String,
    /// Rows in the original matrix.
    pub corpus_size: usize,
    /// Number of chosen exemplars.
    pub solution_size: usize,
    /// Total weight of the chosen exemplars.
    pub solution_weight: f64,
    /// Columns in the original matrix.
    pub num_basic_blocks: usize,
    /// Count of initially-uncoverable columns.
    pub initial_singularities: usize,
    /// Number of heuristic selections.
    pub num_non_optimal: usize,
    /// Total weight of the heuristic selections.
    pub weight_non_optimal: f64,
    /// Algorithm label.
    pub score_label: String,
    /// Chosen exemplar file names, sorted lexicographically.
    pub solution: Vec<String>,
}

/// Add matrix row `row` to the solution.
///
/// Captures the exemplar's file name, its raw full-width bit row (re-read
/// from disk) and its weight.
pub fn add_row_to_solution(
    matrix: &Matrix,
    solution: &mut Solution,
    row: usize,
    optimal: bool,
) -> Result<()> {
    let full_path = matrix.row_exemplar(row)?.to_path_buf();
    let exemplar = full_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let row_data = corpus::read_exemplar_bits(&full_path)?;
    let weight = matrix.row_weight(row)?;
    solution.add(exemplar.clone(), row_data, weight, optimal);

    info!(row, exemplar = %exemplar, "row added to solution");
    Ok(())
}
