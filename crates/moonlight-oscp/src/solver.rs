//! Top-level OSCP solve flow.
//!
//! `Init -> Normalise -> ReduceLoop -> Verify -> Done`: snapshot the
//! dimensions and labels, strip column singularities, iterate the exact
//! rules with the greedy heuristic as a fallback until the matrix is empty,
//! then verify the cover.

use std::path::Path;

use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::analytics::CorpusAnalytics;
use crate::corpus::{self, read_exemplar_bits};
use crate::error::{Error, Result};
use crate::greedy::eliminate_max_score;
use crate::matrix::Matrix;
use crate::reduce::{
    eliminate_column_singularities, eliminate_row_unitarians, eliminate_subset_rows,
    eliminate_superset_cols,
};
use crate::solution::Solution;

/// Score label for the reduction algorithm.
const REDUCTION_LABEL: &str = "Milford-Hayes reduction";
/// Score label for the pure greedy algorithm.
const GREEDY_LABEL: &str = "Greedy heuristic";

/// Optimised set cover solver.
///
/// Holds the solution seed: in large-data mode the streaming pass records
/// row unitarians and initial singularities here before the matrix is ever
/// built, and `solve_oscp` continues from that seed.
#[derive(Debug, Default)]
pub struct OscpSolver {
    solution: Solution,
}

impl OscpSolver {
    /// Create a solver with an empty solution seed.
    pub fn new() -> Self {
        OscpSolver::default()
    }

    /// The solution seeded so far (large-data preselections).
    pub fn seed(&self) -> &Solution {
        &self.solution
    }

    /// Streaming large-data preprocessing: compute the columns to ignore at
    /// matrix-build time without materialising the matrix.
    ///
    /// Pass 1 counts per-column frequencies over all positively-weighted
    /// exemplars. Columns of frequency zero are recorded as initial
    /// singularities. Pass 2 finds row unitarians (rows covering a
    /// frequency-1 column), adds them to the solution seed as optimal picks,
    /// and marks every column they cover as ignorable.
    ///
    /// Returns the sorted, duplicate-free ignore list (original column
    /// indices).
    pub fn calc_cols_to_ignore(
        &mut self,
        directory: &Path,
        pattern: &str,
        weights: Option<&FxHashMap<String, f64>>,
    ) -> Result<Vec<usize>> {
        info!("calc_cols_to_ignore: eliminating row unitarians before full read in");

        let regex = Regex::new(pattern)
            .map_err(|e| Error::format(format!("bad corpus pattern {pattern:?}: {e}")))?;
        let files = corpus::scan_corpus(directory, &regex)?;
        if files.is_empty() {
            warn!("no corpus files matched");
            return Ok(Vec::new());
        }

        let num_cols = 8 * files[0].file_size as usize;

        let weight_of = |path: &Path| -> f64 {
            match weights {
                Some(map) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    map.get(name.as_str()).copied().unwrap_or(0.0)
                }
                None => 1.0,
            }
        };

        info!("step 1: counting column frequencies");
        let mut col_freq = vec![0usize; num_cols];
        for file in &files {
            if weights.is_some() && weight_of(&file.file_path) <= 0.0 {
                continue;
            }
            let row_data = read_exemplar_bits(&file.file_path)?;
            for (i, &bit) in row_data.iter().enumerate() {
                col_freq[i] += bit as usize;
            }
        }

        info!("step 2: recording all column singularities");
        let mut cols_to_ignore: Vec<usize> = crate::reduce::singular_columns(&col_freq);
        let num_singularities = cols_to_ignore.len();
        self.solution.initial_singularities = cols_to_ignore.clone();

        info!("step 3: finding row unitarians and ignoring their columns");
        let mut num_unitarian = 0usize;
        for file in &files {
            if weights.is_some() && weight_of(&file.file_path) <= 0.0 {
                continue;
            }
            let row_data = read_exemplar_bits(&file.file_path)?;
            let unitarian = row_data
                .iter()
                .enumerate()
                .any(|(i, &bit)| bit == 1 && col_freq[i] == 1);
            if !unitarian {
                continue;
            }

            num_unitarian += 1;
            let exemplar = file
                .file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let weight = weight_of(&file.file_path);
            for (i, &bit) in row_data.iter().enumerate() {
                if bit == 1 {
                    cols_to_ignore.push(i);
                }
            }
            self.solution.add(exemplar, row_data, weight, true);
        }

        cols_to_ignore.sort_unstable();
        cols_to_ignore.dedup();

        info!(
            row_unitarians = num_unitarian,
            cols_total = num_cols,
            cols_singular = num_singularities,
            cols_unitarian_covered = cols_to_ignore.len() - num_singularities,
            cols_remaining = num_cols - cols_to_ignore.len(),
            "ignore list complete, ready for full read in"
        );

        Ok(cols_to_ignore)
    }

    /// Solve the optimised set cover problem on `matrix`.
    ///
    /// With `greedy` set, the exact rules are skipped and every selection is
    /// a heuristic pick. The verification outcome is logged; the solution is
    /// returned either way.
    pub fn solve_oscp(
        &self,
        matrix: &mut Matrix,
        analytics: &mut CorpusAnalytics,
        name: &str,
        greedy: bool,
        weights: Option<&FxHashMap<String, f64>>,
    ) -> Result<Solution> {
        info!(
            rows = matrix.num_rows(),
            cols = matrix.num_cols(),
            "solve_oscp"
        );

        let mut solution = self.solution.clone();
        solution.score_label = if greedy {
            GREEDY_LABEL.to_string()
        } else {
            REDUCTION_LABEL.to_string()
        };
        solution.corpus_name = name.to_string();
        solution.num_rows = matrix.num_rows();
        solution.num_columns = matrix.num_cols_orig();

        // Column singularities would poison the unitarian rule; strip them
        // first. In large-data mode they are already recorded and absent.
        eliminate_column_singularities(matrix, &mut solution)?;

        // Reduction options in priority order:
        //   [0] row unitarians
        //   [1] row subsets
        //   [2] col supersets
        let mut options = [true, true, true];
        while matrix.num_rows() > 0 && matrix.num_cols() > 0 {
            debug!(
                rows = matrix.num_rows(),
                cols = matrix.num_cols(),
                soln_size = solution.solution.len(),
                soln_weight = solution.weight,
                "solve iteration"
            );

            if !greedy && options[0] {
                options[0] = false;
                if eliminate_row_unitarians(matrix, &mut solution, analytics)? {
                    options[1] = true;
                }
            } else if !greedy && options[1] {
                options[1] = false;
                if eliminate_subset_rows(matrix)? {
                    options[0] = true;
                    options[2] = true;
                }
            } else if !greedy && options[2] {
                options[2] = false;
                if eliminate_superset_cols(matrix)? {
                    options[1] = true;
                }
            } else if eliminate_max_score(matrix, &mut solution)? {
                options[1] = true;
            }
        }

        info!(
            rows = matrix.num_rows(),
            cols = matrix.num_cols(),
            "finished reducing"
        );

        solution.solution.sort();
        for exemplar in &solution.solution {
            debug!(soln = %exemplar);
        }
        info!(
            size = solution.solution.len(),
            weight = solution.weight,
            non_optimal = solution.num_non_optimal,
            "solution complete"
        );

        let verified = verify_solution(&solution, weights);
        if verified {
            info!("solution verified: true");
        } else {
            warn!("solution verified: false");
        }

        let unnecessary = primality_check(&solution);
        if !unnecessary.is_empty() {
            info!(
                unnecessary = unnecessary.len(),
                "primality: solution contains redundant rows"
            );
        }

        Ok(solution)
    }
}

/// Column sums over the solution's captured raw rows, at original width.
fn calc_soln_col_sum(solution: &Solution) -> Vec<usize> {
    let mut colsum = vec![0usize; solution.num_columns];
    for row in &solution.row_data {
        for (c, &bit) in row.iter().enumerate() {
            if c >= colsum.len() {
                break;
            }
            colsum[c] += bit as usize;
        }
    }
    colsum
}

/// Verify the solution covers every original column that is coverable.
///
/// Every zero-sum column over the captured rows must be an initial
/// singularity, and the accumulated weight must agree with the weight file
/// (weighted) or the solution size (unweighted).
pub fn verify_solution(solution: &Solution, weights: Option<&FxHashMap<String, f64>>) -> bool {
    debug_assert!(solution
        .initial_singularities
        .windows(2)
        .all(|w| w[0] <= w[1]));

    info!(
        init_singularities = solution.initial_singularities.len(),
        rows_to_verify = solution.solution.len(),
        "verifying solution"
    );

    let colsum = calc_soln_col_sum(solution);
    for (c, &sum) in colsum.iter().enumerate() {
        if sum == 0 && solution.initial_singularities.binary_search(&c).is_err() {
            warn!(column = c, "column not covered");
            return false;
        }
    }

    match weights {
        Some(map) => {
            let total: f64 = solution
                .solution
                .iter()
                .map(|name| map.get(name.as_str()).copied().unwrap_or(0.0))
                .sum();
            if total != solution.weight {
                warn!(
                    recomputed = total,
                    recorded = solution.weight,
                    "solution has inconsistent weight"
                );
                return false;
            }
        }
        None => {
            if solution.weight != solution.solution.len() as f64 {
                warn!("solution size does not equal solution weight");
                return false;
            }
        }
    }

    true
}

/// Indices (into the solution) of rows that are unnecessary: removing them
/// still leaves every covered column covered. Diagnostic only.
pub fn primality_check(solution: &Solution) -> Vec<usize> {
    let mut colsum = calc_soln_col_sum(solution);
    let mut result = Vec::new();

    for (r, row) in solution.row_data.iter().enumerate() {
        let necessary = row
            .iter()
            .enumerate()
            .any(|(c, &bit)| bit == 1 && c < colsum.len() && colsum[c] == 1);
        if !necessary {
            for (c, &bit) in row.iter().enumerate() {
                if bit == 1 && c < colsum.len() {
                    colsum[c] -= 1;
                }
            }
            debug!(row = r, "unnecessary solution row");
            result.push(r);
        }
    }

    result
}
