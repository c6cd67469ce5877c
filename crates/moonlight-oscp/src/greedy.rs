//! Greedy heuristic selection.
//!
//! Runs when the exact rules are exhausted: pick the single row with the
//! best rowsum-per-weight score and reduce the matrix by it. Ties on the
//! score go to the lexicographically smallest exemplar path, keeping runs
//! deterministic.

use std::cmp::Ordering;

use tracing::{debug, info};

use crate::error::Result;
use crate::matrix::Matrix;
use crate::reduce::{deterministic_compare, reduce};
use crate::solution::{add_row_to_solution, Solution};

/// Score every row: `row_sum / weight`.
fn score_rows(matrix: &Matrix) -> Vec<f64> {
    matrix
        .rows()
        .iter()
        .map(|row| row.row_sum as f64 / row.weight)
        .collect()
}

/// Among the rows tied for the maximum score, the one with the
/// lexicographically smallest exemplar path. `None` on an empty matrix.
fn deterministic_select(matrix: &Matrix, sorted_scores: &[(f64, usize)]) -> Option<usize> {
    let (best_score, first) = *sorted_scores.first()?;

    let mut best = first;
    for &(score, row) in &sorted_scores[1..] {
        if score != best_score {
            break;
        }
        if deterministic_compare(matrix, best, row) == Ordering::Greater {
            best = row;
        }
    }

    Some(best)
}

/// Perform a single greedy pick, recording it as a non-optimal selection,
/// and reduce the matrix by the chosen row.
///
/// Returns whether a row was selected.
pub fn eliminate_max_score(matrix: &mut Matrix, solution: &mut Solution) -> Result<bool> {
    debug!("method: heuristic (single greedy select)");

    let scores = score_rows(matrix);
    let mut sorted_scores: Vec<(f64, usize)> = scores.into_iter().zip(0..).collect();
    sorted_scores.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

    let row = match deterministic_select(matrix, &sorted_scores) {
        Some(row) => row,
        None => {
            debug!("no max score row found");
            return Ok(false);
        }
    };

    let max_score = sorted_scores[0].0;
    info!(score = max_score, row, "greedy choice");

    add_row_to_solution(matrix, solution, row, false)?;
    reduce(matrix, &[row])?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::RowElem;
    use std::path::PathBuf;

    fn weighted_row(name: &str, cols: &[u32], weight: f64) -> RowElem {
        RowElem::new(PathBuf::from(name), 1, cols.to_vec(), weight)
    }

    #[test]
    fn test_scores() {
        let mut m = Matrix::new(8);
        m.insert_row(weighted_row("a", &[0, 1, 2, 3], 2.0));
        m.insert_row(weighted_row("b", &[0, 1], 1.0));

        assert_eq!(score_rows(&m), vec![2.0, 2.0]);
    }

    #[test]
    fn test_select_smallest_path_on_tie() {
        let mut m = Matrix::new(8);
        m.insert_row(weighted_row("exemplar_c", &[0, 1], 1.0));
        m.insert_row(weighted_row("exemplar_a", &[2, 3], 1.0));
        m.insert_row(weighted_row("exemplar_b", &[4], 1.0));

        let scores = score_rows(&m);
        let mut sorted: Vec<(f64, usize)> = scores.into_iter().zip(0..).collect();
        sorted.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        // Rows c and a tie at score 2; a has the smaller path.
        assert_eq!(deterministic_select(&m, &sorted), Some(1));
    }

    #[test]
    fn test_select_empty() {
        let m = Matrix::new(8);
        assert_eq!(deterministic_select(&m, &[]), None);
    }

    #[test]
    fn test_weight_changes_ranking() {
        let mut m = Matrix::new(8);
        m.insert_row(weighted_row("exemplar_a", &[0, 1, 2, 3], 10.0));
        m.insert_row(weighted_row("exemplar_b", &[0, 1], 1.0));

        let scores = score_rows(&m);
        let mut sorted: Vec<(f64, usize)> = scores.into_iter().zip(0..).collect();
        sorted.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        // b scores 2.0, a scores 0.4.
        assert_eq!(deterministic_select(&m, &sorted), Some(1));
    }
}
