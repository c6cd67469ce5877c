//! Row-major logical sparse matrix with tombstoned column deletion.
//!
//! The matrix stores only the column indices of its one-entries, one sorted
//! sequence per row. It supports row and column deletion but no insertion
//! after initial construction. Column removal never compacts the per-row
//! sequences: removed entries become [`DELETED`] tombstones and surviving
//! entries are rewritten through a fresh index transform, keeping every
//! column-removal batch O(total ones) with no reallocation.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use crate::corpus::{self, CorpusFile};
use crate::error::{Error, Result};

/// Tombstone marking a column entry removed in place.
///
/// `u32::MAX` is unreachable as a real column index: the widest supported
/// universe is far below 2^32 columns.
pub const DELETED: u32 = u32::MAX;

/// Build a column index transform for dropping the columns in `del_list`.
///
/// `del_list` must be sorted and duplicate-free. Position `i` of the result
/// is [`DELETED`] when `i` is dropped, otherwise `i` minus the number of
/// dropped columns below `i`. The transform is monotonically non-decreasing
/// on its kept inputs, so rewriting a sorted sequence through it preserves
/// order.
pub fn transform_index(num_elements: usize, del_list: &[usize]) -> Vec<u32> {
    debug_assert!(del_list.windows(2).all(|w| w[0] < w[1]));

    let mut transform = vec![0u32; num_elements];
    let mut del_count = 0usize;
    for (i, slot) in transform.iter_mut().enumerate() {
        if del_count < del_list.len() && i == del_list[del_count] {
            del_count += 1;
            *slot = DELETED;
        } else {
            *slot = (i - del_count) as u32;
        }
    }

    transform
}

/// One matrix row: the exemplar it models plus its sparse column data.
#[derive(Debug, Clone, PartialEq)]
pub struct RowElem {
    /// Path to the exemplar file this row was built from.
    pub file_path: PathBuf,
    /// Size of the exemplar file in bytes.
    pub file_size: u64,
    /// Number of live (non-tombstone) entries in `column`.
    pub row_sum: usize,
    /// Sorted column indices of the row's one-entries, with [`DELETED`]
    /// tombstones left in place by column removals.
    pub column: Vec<u32>,
    /// Row weight for the weighted set cover problem.
    pub weight: f64,
}

impl RowElem {
    /// Create a row from an explicit column sequence. `row_sum` is derived
    /// from the live entries.
    pub fn new(file_path: PathBuf, file_size: u64, column: Vec<u32>, weight: f64) -> Self {
        let row_sum = column.iter().filter(|&&c| c != DELETED).count();
        RowElem {
            file_path,
            file_size,
            row_sum,
            column,
            weight,
        }
    }

    /// Read an exemplar file and build its row through a column transform.
    ///
    /// Set bits whose transformed index is [`DELETED`] are skipped. Original
    /// indices are visited in ascending order and the transform is monotone
    /// on kept inputs, so the emitted sequence is strictly increasing.
    pub fn from_exemplar(exemplar: &Path, init_col_transform: &[u32]) -> Result<Self> {
        let bits = corpus::read_exemplar_bits(exemplar)?;

        let mut column = Vec::new();
        for (idx, &bit) in bits.iter().enumerate() {
            if bit != 0 && init_col_transform[idx] != DELETED {
                column.push(init_col_transform[idx]);
            }
        }

        let row_sum = column.len();
        Ok(RowElem {
            file_path: exemplar.to_path_buf(),
            file_size: (bits.len() / 8) as u64,
            row_sum,
            column,
            weight: 1.0,
        })
    }

    /// Iterate the live (non-tombstone) column indices of this row.
    pub fn live_columns(&self) -> impl Iterator<Item = u32> + '_ {
        self.column.iter().copied().filter(|&c| c != DELETED)
    }
}

/// Row-major logical sparse matrix over a corpus of exemplars.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    num_rows: usize,
    num_cols: usize,
    num_cols_orig: usize,
    num_elems: u64,
    directory: PathBuf,
    pattern: String,
    rowlist: Vec<RowElem>,
}

impl Matrix {
    /// Create an empty matrix with `num_cols` columns and no rows.
    pub fn new(num_cols: usize) -> Self {
        Matrix {
            num_rows: 0,
            num_cols,
            num_cols_orig: num_cols,
            num_elems: 0,
            directory: PathBuf::new(),
            pattern: String::new(),
            rowlist: Vec::new(),
        }
    }

    /// Build a matrix from the exemplar files under `directory` matching
    /// `pattern`.
    ///
    /// Rows are ingested in descending file-size order (ties broken by
    /// path), in parallel, and the column universe is `8 * max file size`.
    /// Columns listed in `cols_to_ignore` (sorted, duplicate-free, original
    /// indices) are dropped at ingest via the index transform. With a weight
    /// map, exemplars missing from the map or carrying non-positive weight
    /// are discarded.
    pub fn from_corpus(
        directory: &Path,
        pattern: &str,
        weights: Option<&FxHashMap<String, f64>>,
        cols_to_ignore: &[usize],
    ) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::format(format!("bad corpus pattern {pattern:?}: {e}")))?;

        info!(directory = %directory.display(), pattern, "finding corpus files");
        let files = corpus::scan_corpus(directory, &regex)?;
        if files.is_empty() {
            warn!("no corpus files matched");
        }
        info!(corpus_size = files.len(), "corpus scanned");

        let max_file_size = files.first().map_or(0, |f| f.file_size);
        let num_cols_orig = 8 * max_file_size as usize;
        for &c in cols_to_ignore {
            if c >= num_cols_orig {
                return Err(Error::index("from_corpus", c, num_cols_orig));
            }
        }
        let init_col_transform = transform_index(num_cols_orig, cols_to_ignore);

        if weights.is_some() {
            info!("weighted version");
        } else {
            info!("unweighted version");
        }

        info!("parsing corpus files and inserting into the matrix");
        let rows: Result<Vec<RowElem>> = files
            .par_iter()
            .map(|f: &CorpusFile| RowElem::from_exemplar(&f.file_path, &init_col_transform))
            .collect();
        let rows = rows?;

        let mut matrix = Matrix {
            num_rows: 0,
            num_cols: num_cols_orig - cols_to_ignore.len(),
            num_cols_orig,
            num_elems: 0,
            directory: directory.to_path_buf(),
            pattern: pattern.to_string(),
            rowlist: Vec::with_capacity(rows.len()),
        };

        let mut unused: FxHashSet<&str> = weights
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default();

        for mut row in rows {
            match weights {
                Some(map) => {
                    let name = row
                        .file_path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    match map.get(name.as_str()) {
                        Some(&weight) => {
                            unused.remove(name.as_str());
                            if weight > 0.0 {
                                row.weight = weight;
                                matrix.insert_row(row);
                            }
                        }
                        None => {
                            warn!(exemplar = %name, "ignoring exemplar with no known weight");
                        }
                    }
                }
                None => matrix.insert_row(row),
            }
        }

        if !unused.is_empty() {
            warn!(
                entries = unused.len(),
                "weight file entries matched no corpus exemplar"
            );
        }

        let density = if matrix.num_rows > 0 && matrix.num_cols > 0 {
            (100.0 * matrix.num_elems as f64) / (matrix.num_cols as f64 * matrix.num_rows as f64)
        } else {
            0.0
        };
        info!(
            rows = matrix.num_rows,
            cols = matrix.num_cols,
            elems = matrix.num_elems,
            density_pct = density,
            "finished creating the matrix"
        );

        Ok(matrix)
    }

    /// Restore a matrix from raw parts, checking the counting invariants.
    pub(crate) fn from_restored(
        num_cols: usize,
        num_cols_orig: usize,
        directory: PathBuf,
        pattern: String,
        rowlist: Vec<RowElem>,
    ) -> Result<Self> {
        let matrix = Matrix {
            num_rows: rowlist.len(),
            num_cols,
            num_cols_orig,
            num_elems: rowlist.iter().map(|r| r.row_sum as u64).sum(),
            directory,
            pattern,
            rowlist,
        };
        matrix.check_row_sums()?;
        Ok(matrix)
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns after any deletions.
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Number of columns before any were ignored or deleted
    /// (`8 * size of the largest corpus file`).
    pub fn num_cols_orig(&self) -> usize {
        self.num_cols_orig
    }

    /// Number of ones in the matrix.
    pub fn num_elements(&self) -> u64 {
        self.num_elems
    }

    /// Corpus directory this matrix was built from.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Corpus file pattern this matrix was built from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Read-only access to the row elements, in row-index order.
    pub fn rows(&self) -> &[RowElem] {
        &self.rowlist
    }

    /// Append a row. Only valid during initial construction.
    pub fn insert_row(&mut self, row: RowElem) {
        self.num_elems += row.row_sum as u64;
        self.num_rows += 1;
        self.rowlist.push(row);
    }

    /// Dense 0/1 vector of row `r`, width [`num_cols`](Self::num_cols).
    pub fn get_row(&self, r: usize) -> Result<Vec<u8>> {
        let row = self
            .rowlist
            .get(r)
            .ok_or_else(|| Error::index("get_row", r, self.num_rows))?;

        let mut result = vec![0u8; self.num_cols];
        for c in row.live_columns() {
            result[c as usize] = 1;
        }
        Ok(result)
    }

    /// Dense 0/1 vector of column `c`, length [`num_rows`](Self::num_rows).
    pub fn get_col(&self, c: usize) -> Result<Vec<u8>> {
        if c >= self.num_cols {
            return Err(Error::index("get_col", c, self.num_cols));
        }

        let mut result = vec![0u8; self.num_rows];
        for (r, row) in self.rowlist.iter().enumerate() {
            if Self::row_has_column(row, c as u32) {
                result[r] = 1;
            }
        }
        Ok(result)
    }

    /// Is the matrix one at `[r, c]`?
    pub fn is_row_column_set(&self, r: usize, c: usize) -> Result<bool> {
        if c >= self.num_cols {
            return Err(Error::index("is_row_column_set", c, self.num_cols));
        }
        let row = self
            .rowlist
            .get(r)
            .ok_or_else(|| Error::index("is_row_column_set", r, self.num_rows))?;
        Ok(Self::row_has_column(row, c as u32))
    }

    /// Bounded scan of a row's column sequence. Live entries are strictly
    /// increasing, so the scan stops at the first live entry >= `c`.
    fn row_has_column(row: &RowElem, c: u32) -> bool {
        for &value in &row.column {
            if value == DELETED {
                continue;
            }
            if value >= c {
                return value == c;
            }
        }
        false
    }

    /// Row sum of row `r`.
    pub fn row_sum(&self, r: usize) -> Result<usize> {
        self.rowlist
            .get(r)
            .map(|row| row.row_sum)
            .ok_or_else(|| Error::index("row_sum", r, self.num_rows))
    }

    /// Per-row sums, in row-index order.
    pub fn row_sums(&self) -> Vec<usize> {
        self.rowlist.iter().map(|row| row.row_sum).collect()
    }

    /// Per-column sums, ignoring tombstones.
    pub fn column_sums(&self) -> Vec<usize> {
        let mut result = vec![0usize; self.num_cols];
        for row in &self.rowlist {
            for c in row.live_columns() {
                result[c as usize] += 1;
            }
        }
        result
    }

    /// Number of columns shared by rows `r1` and `r2`, by two-pointer merge
    /// over the sorted live entries.
    pub fn get_overlap(&self, r1: usize, r2: usize) -> Result<usize> {
        let row1 = self
            .rowlist
            .get(r1)
            .ok_or_else(|| Error::index("get_overlap", r1, self.num_rows))?;
        let row2 = self
            .rowlist
            .get(r2)
            .ok_or_else(|| Error::index("get_overlap", r2, self.num_rows))?;

        let data1 = &row1.column;
        let data2 = &row2.column;
        let mut result = 0usize;
        let mut j = 0usize;

        for &value in data1 {
            if value == DELETED {
                continue;
            }

            while j < data2.len() && (data2[j] == DELETED || data2[j] < value) {
                j += 1;
            }
            if j >= data2.len() {
                break;
            }
            if data2[j] == value {
                result += 1;
            }
        }

        debug_assert!(result <= row1.row_sum && result <= row2.row_sum);
        Ok(result)
    }

    /// Path of the exemplar behind row `r`.
    pub fn row_exemplar(&self, r: usize) -> Result<&Path> {
        self.rowlist
            .get(r)
            .map(|row| row.file_path.as_path())
            .ok_or_else(|| Error::index("row_exemplar", r, self.num_rows))
    }

    /// File size of the exemplar behind row `r`.
    pub fn row_file_size(&self, r: usize) -> Result<u64> {
        self.rowlist
            .get(r)
            .map(|row| row.file_size)
            .ok_or_else(|| Error::index("row_file_size", r, self.num_rows))
    }

    /// Weight of row `r`.
    pub fn row_weight(&self, r: usize) -> Result<f64> {
        self.rowlist
            .get(r)
            .map(|row| row.weight)
            .ok_or_else(|| Error::index("row_weight", r, self.num_rows))
    }

    /// Remove exactly the row at index `r`.
    pub fn remove_row(&mut self, r: usize) -> Result<()> {
        self.remove_rows(&[r])
    }

    /// Remove a set of rows.
    ///
    /// All indices refer to row positions before this call. Deletion happens
    /// in descending index order so the remaining indices stay valid while
    /// rows are erased.
    pub fn remove_rows(&mut self, del_list: &[usize]) -> Result<()> {
        for &r in del_list {
            if r >= self.num_rows {
                return Err(Error::index("remove_rows", r, self.num_rows));
            }
        }

        debug!(rows = del_list.len(), "matrix: removing rows");

        let mut ordered: Vec<usize> = del_list.to_vec();
        ordered.sort_unstable_by_key(|&r| Reverse(r));
        ordered.dedup();

        for r in ordered {
            let row = self.rowlist.remove(r);
            self.num_elems -= row.row_sum as u64;
            self.num_rows -= 1;
        }

        Ok(())
    }

    /// Remove exactly the column at index `c`.
    pub fn remove_col(&mut self, c: usize) -> Result<()> {
        self.remove_cols(&[c])
    }

    /// Remove a set of columns.
    ///
    /// All indices refer to column positions before this call. Each row's
    /// column sequence is rewritten in place through the new transform:
    /// dropped entries become [`DELETED`] tombstones, surviving entries are
    /// relocated, and `row_sum` is adjusted per tombstoned entry.
    pub fn remove_cols(&mut self, del_list: &[usize]) -> Result<()> {
        self.check_row_sums()?;

        for &c in del_list {
            if c >= self.num_cols {
                return Err(Error::index("remove_cols", c, self.num_cols));
            }
        }

        debug!(cols = del_list.len(), "matrix: removing cols");

        let mut ordered: Vec<usize> = del_list.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        let transform = transform_index(self.num_cols, &ordered);

        for row in &mut self.rowlist {
            let mut new_rowsum = 0usize;
            for entry in &mut row.column {
                if *entry != DELETED {
                    *entry = transform[*entry as usize];
                    if *entry != DELETED {
                        new_rowsum += 1;
                    }
                }
            }
            let delta = row.row_sum - new_rowsum;
            row.row_sum = new_rowsum;
            self.num_elems -= delta as u64;
        }

        self.num_cols -= ordered.len();
        self.check_row_sums()
    }

    /// Check the counting invariants: `num_rows` matches the row list,
    /// every `row_sum` matches its live entries, and `num_elems` is the
    /// total of the row sums.
    pub fn check_row_sums(&self) -> Result<()> {
        if self.num_rows != self.rowlist.len() {
            return Err(Error::invariant(format!(
                "num_rows {} != rowlist length {}",
                self.num_rows,
                self.rowlist.len()
            )));
        }

        let mut total = 0u64;
        for (r, row) in self.rowlist.iter().enumerate() {
            let live = row.column.iter().filter(|&&c| c != DELETED).count();
            if live != row.row_sum {
                return Err(Error::invariant(format!(
                    "row {} row_sum {} != live entries {}",
                    r, row.row_sum, live
                )));
            }
            total += row.row_sum as u64;
        }

        if total != self.num_elems {
            return Err(Error::invariant(format!(
                "num_elems {} != total row sums {}",
                self.num_elems, total
            )));
        }

        Ok(())
    }
}
