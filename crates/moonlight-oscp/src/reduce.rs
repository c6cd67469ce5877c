//! Exact reduction rules.
//!
//! Three rules shrink the matrix without sacrificing optimality:
//!
//! - **Row unitarians**: a column with sum 1 forces its covering row into
//!   every cover.
//! - **Subset rows**: a row whose columns are contained in an equally- or
//!   lower-weighted row is redundant.
//! - **Superset columns**: a column whose covering rows contain another
//!   column's covering rows is implied by that column and can be dropped.
//!
//! All tie-breaks are deterministic; identical inputs yield identical
//! deletions.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::analytics::CorpusAnalytics;
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::solution::{add_row_to_solution, Solution};

/// Compare two rows by exemplar path, the stable tie-break used everywhere.
pub(crate) fn deterministic_compare(matrix: &Matrix, row1: usize, row2: usize) -> Ordering {
    let rows = matrix.rows();
    rows[row1]
        .file_path
        .as_os_str()
        .cmp(rows[row2].file_path.as_os_str())
}

/// Rule 0: select every row covering a unitarian column.
///
/// Returns whether the matrix changed. Selected rows are recorded in the
/// solution as optimal picks and the matrix is reduced by them.
pub fn eliminate_row_unitarians(
    matrix: &mut Matrix,
    solution: &mut Solution,
    analytics: &mut CorpusAnalytics,
) -> Result<bool> {
    if matrix.num_rows() == 0 || matrix.num_cols() == 0 {
        return Ok(false);
    }

    debug!("method: row_unitarians");

    let freq = matrix.column_sums();
    let unity_cols: Vec<usize> = freq
        .iter()
        .enumerate()
        .filter(|(_, &sum)| sum == 1)
        .map(|(c, _)| c)
        .collect();

    if unity_cols.is_empty() {
        debug!("data is NOT unitarian");
        return Ok(false);
    }

    let unity_rows = find_unitarian_rows(matrix, &unity_cols, analytics);
    info!(
        unitarian_columns = unity_cols.len(),
        unitarian_rows = unity_rows.len(),
        "data IS unitarian"
    );

    for &row in &unity_rows {
        add_row_to_solution(matrix, solution, row, true)?;
    }

    reduce(matrix, &unity_rows)?;
    Ok(true)
}

/// Rows having at least one entry among the given unitarian columns.
///
/// A row counts once no matter how many unitarian columns it covers; the
/// per-exemplar unitarian score is bumped at the same time.
fn find_unitarian_rows(
    matrix: &Matrix,
    columns: &[usize],
    analytics: &mut CorpusAnalytics,
) -> Vec<usize> {
    let unity: rustc_hash::FxHashSet<u32> = columns.iter().map(|&c| c as u32).collect();

    let mut rows = Vec::new();
    for (r, row) in matrix.rows().iter().enumerate() {
        if row.live_columns().any(|c| unity.contains(&c)) {
            rows.push(r);
            if let Some(record) = analytics.get_mut(r) {
                record.score_unitarian += 1.0;
            }
        }
    }
    rows
}

/// Rule 1: delete rows dominated by an equal-or-lower-weighted superset row.
pub fn eliminate_subset_rows(matrix: &mut Matrix) -> Result<bool> {
    debug!("method: row_subsets");

    let subset_rows = find_subset_rows(matrix)?;
    if subset_rows.is_empty() {
        return Ok(false);
    }

    info!(rows = subset_rows.len(), "eliminating redundant rows");
    matrix.remove_rows(&subset_rows)?;
    Ok(true)
}

#[derive(Clone, Copy)]
struct RowMeta {
    index: usize,
    rowsum: usize,
    weight: f64,
}

/// Find rows to delete under the subset-domination rule.
///
/// Rows are sorted by descending rowsum, then ascending weight, then
/// descending exemplar path; a row earlier in this order can dominate a
/// later one but never vice-versa. Exact duplicates are coalesced first
/// (within a rowsum band), then strict subsets are detected pairwise via
/// the overlap count.
fn find_subset_rows(matrix: &Matrix) -> Result<Vec<usize>> {
    let num_rows = matrix.num_rows();
    if num_rows == 0 {
        return Ok(Vec::new());
    }

    let mut sorted: Vec<RowMeta> = matrix
        .rows()
        .iter()
        .enumerate()
        .map(|(index, row)| RowMeta {
            index,
            rowsum: row.row_sum,
            weight: row.weight,
        })
        .collect();
    sorted.sort_by(|a, b| {
        b.rowsum
            .cmp(&a.rowsum)
            .then_with(|| a.weight.total_cmp(&b.weight))
            .then_with(|| deterministic_compare(matrix, b.index, a.index))
    });

    let mut del_set: rustc_hash::FxHashSet<usize> = rustc_hash::FxHashSet::default();
    let mut count_strict = 0usize;

    // Duplicate coalescing. Keys are the live column sequences; two rows
    // with equal dense patterns have equal live sequences. The map only
    // needs to span one rowsum band.
    let mut seen: FxHashMap<Vec<u32>, usize> = FxHashMap::default();
    let mut cur_rowsum = sorted[0].rowsum;
    for meta in &sorted {
        if meta.rowsum != cur_rowsum {
            cur_rowsum = meta.rowsum;
            seen.clear();
        }

        let key: Vec<u32> = matrix.rows()[meta.index].live_columns().collect();
        match seen.get(&key).copied() {
            None => {
                seen.insert(key, meta.index);
            }
            Some(match_index) => {
                // The earlier row has equal or lower weight. On an exact
                // weight tie the lexicographically smaller exemplar stays.
                if meta.weight == matrix.rows()[match_index].weight
                    && deterministic_compare(matrix, match_index, meta.index) == Ordering::Greater
                {
                    seen.insert(key, meta.index);
                    del_set.insert(match_index);
                } else {
                    del_set.insert(meta.index);
                }
            }
        }
    }
    drop(seen);

    // Strict subsets: A before B in the sort order with weight(A) <=
    // weight(B) and overlap(A, B) == rowsum(B) means columns(A) contains
    // columns(B).
    for i in 0..sorted.len() {
        let a = sorted[i];
        if del_set.contains(&a.index) {
            continue;
        }
        for b in sorted.iter().skip(i + 1) {
            if del_set.contains(&b.index) {
                continue;
            }
            if a.weight > b.weight {
                continue;
            }
            if matrix.get_overlap(a.index, b.index)? == b.rowsum {
                del_set.insert(b.index);
                count_strict += 1;
            }
        }
    }

    debug!(
        rows = num_rows,
        strict_subsets = count_strict,
        duplicates = del_set.len() - count_strict,
        remaining = num_rows - del_set.len(),
        "subset row scan complete"
    );

    let mut result: Vec<usize> = del_set.into_iter().collect();
    result.sort_unstable();
    Ok(result)
}

/// Rule 2: delete columns whose covering rows are a superset of another
/// column's covering rows.
pub fn eliminate_superset_cols(matrix: &mut Matrix) -> Result<bool> {
    debug!("method: column_supersets");

    let superset_cols = find_superset_cols(matrix);
    if superset_cols.is_empty() {
        return Ok(false);
    }

    info!(cols = superset_cols.len(), "eliminating redundant cols");
    matrix.remove_cols(&superset_cols)?;
    Ok(true)
}

/// Find superset columns via a local column-major view.
///
/// Any row covering the subset column also covers the superset column, so
/// the superset's constraint is implied and the column can go. When two
/// columns are equal the lower-indexed one is dropped.
fn find_superset_cols(matrix: &Matrix) -> Vec<usize> {
    let num_cols = matrix.num_cols();

    debug!("building local column-major sparse matrix");
    let mut columns: Vec<Vec<usize>> = vec![Vec::new(); num_cols];
    for (r, row) in matrix.rows().iter().enumerate() {
        for c in row.live_columns() {
            columns[c as usize].push(r);
        }
    }

    let mut supersets: rustc_hash::FxHashSet<usize> = rustc_hash::FxHashSet::default();
    let mut count_strict = 0usize;

    for c1 in 0..num_cols {
        if supersets.contains(&c1) || columns[c1].is_empty() {
            continue;
        }

        for c2 in (c1 + 1)..num_cols {
            if supersets.contains(&c2) || columns[c2].is_empty() {
                continue;
            }

            // Both flags survive the merge iff the columns are equal.
            let (rows1, rows2) = (&columns[c1], &columns[c2]);
            let mut superset1 = true;
            let mut superset2 = true;
            let (mut i, mut j) = (0usize, 0usize);

            while superset1 || superset2 {
                if i == rows1.len() {
                    if j != rows2.len() {
                        superset1 = false;
                    }
                    break;
                }
                if j == rows2.len() {
                    superset2 = false;
                    break;
                }

                match rows1[i].cmp(&rows2[j]) {
                    Ordering::Less => {
                        superset2 = false;
                        i += 1;
                    }
                    Ordering::Greater => {
                        superset1 = false;
                        j += 1;
                    }
                    Ordering::Equal => {
                        i += 1;
                        j += 1;
                    }
                }
            }

            if superset1 {
                supersets.insert(c1);
                if !superset2 {
                    count_strict += 1;
                }
                break;
            } else if superset2 {
                supersets.insert(c2);
                count_strict += 1;
            }
        }
    }

    debug!(
        cols = num_cols,
        strict_supersets = count_strict,
        remaining = num_cols - supersets.len(),
        "superset column scan complete"
    );

    let mut result: Vec<usize> = supersets.into_iter().collect();
    result.sort_unstable();
    result
}

/// Remove initially-uncoverable columns (column sum zero).
///
/// The singularity record in the solution is only written if the large-data
/// pass has not already recorded the full set.
pub fn eliminate_column_singularities(matrix: &mut Matrix, solution: &mut Solution) -> Result<bool> {
    debug!("method: column_singularities");

    let freq = matrix.column_sums();
    let singularities = singular_columns(&freq);
    if singularities.is_empty() {
        return Ok(false);
    }

    if solution.initial_singularities.is_empty() {
        solution.initial_singularities = singularities.clone();
    } else {
        debug!("indices of column singularities already recorded");
    }

    info!(
        singularities = singularities.len(),
        "removing column singularities"
    );
    matrix.remove_cols(&singularities)?;
    Ok(true)
}

/// Columns with zero sum, ascending.
pub(crate) fn singular_columns(freq: &[usize]) -> Vec<usize> {
    freq.iter()
        .enumerate()
        .filter(|(_, &sum)| sum == 0)
        .map(|(c, _)| c)
        .collect()
}

/// Rows with zero sum, ascending.
pub(crate) fn singular_rows(rowsums: &[usize]) -> Vec<usize> {
    rowsums
        .iter()
        .enumerate()
        .filter(|(_, &sum)| sum == 0)
        .map(|(r, _)| r)
        .collect()
}

/// Remove the given rows and every column they cover, then sweep any rows
/// left all-zero.
pub fn reduce(matrix: &mut Matrix, rowset: &[usize]) -> Result<()> {
    for &r in rowset {
        if r >= matrix.num_rows() {
            return Err(Error::index("reduce", r, matrix.num_rows()));
        }
    }

    let cols = project_columns(matrix, rowset);

    let cols_before = matrix.num_cols();
    let reduction = if cols_before > 0 {
        100.0 * cols.len() as f64 / cols_before as f64
    } else {
        0.0
    };
    debug!(
        removing = cols.len(),
        remaining = cols_before - cols.len(),
        reduction_pct = reduction,
        "reducing matrix by selected rows"
    );

    matrix.remove_cols(&cols)?;
    matrix.remove_rows(rowset)?;

    let rowsums = matrix.row_sums();
    let singular = singular_rows(&rowsums);
    if !singular.is_empty() {
        debug!(rows = singular.len(), "sweeping row singularities");
        matrix.remove_rows(&singular)?;
    }

    Ok(())
}

/// Union of the columns covered by the given rows, sorted and
/// duplicate-free.
fn project_columns(matrix: &Matrix, rowset: &[usize]) -> Vec<usize> {
    let mut cols: Vec<usize> = rowset
        .iter()
        .flat_map(|&r| matrix.rows()[r].live_columns())
        .map(|c| c as usize)
        .collect();
    cols.sort_unstable();
    cols.dedup();
    cols
}
