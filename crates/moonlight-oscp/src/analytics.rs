//! Per-exemplar corpus analytics.
//!
//! One record per exemplar in original matrix order, collected while the
//! distillation runs and exported as CSV afterwards.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::matrix::Matrix;

/// Metadata about one exemplar.
#[derive(Debug, Clone, Default)]
pub struct ExemplarRecord {
    /// Path to the exemplar file.
    pub file_path: PathBuf,
    /// Size of the trace file in bytes.
    pub file_size: u64,
    /// True iff the greedy rowsum pick chose this exemplar. Reserved;
    /// always false in the current flow.
    pub selected_greedy: bool,
    /// The exemplar's initial row sum.
    pub score_rowsum: f64,
    /// Number of unitarian passes that selected this exemplar.
    pub score_unitarian: f64,
    /// Target basic block score. Reserved; always zero.
    pub score_block_target: f64,
}

/// Analytics for the whole corpus, parallel to the initial row list.
pub type CorpusAnalytics = Vec<ExemplarRecord>;

/// Build the initial analytics store from a freshly constructed matrix.
pub fn initialise_analytics(matrix: &Matrix) -> CorpusAnalytics {
    matrix
        .rows()
        .iter()
        .map(|row| ExemplarRecord {
            file_path: row.file_path.clone(),
            file_size: row.file_size,
            selected_greedy: false,
            score_rowsum: row.row_sum as f64,
            score_unitarian: 0.0,
            score_block_target: 0.0,
        })
        .collect()
}

/// CSV header for the analytics export.
const CSV_HEADER: &str = "index, file, trace_file_size, selected_greedy, \
                          score_rowsum, score_unitarian, score_block_target";

/// Write the analytics as CSV, one row per exemplar in original order.
pub fn write_csv(path: &Path, data: &CorpusAnalytics) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{CSV_HEADER}").map_err(|e| Error::io(path, e))?;
    for (i, record) in data.iter().enumerate() {
        let name = record
            .file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writeln!(
            out,
            "{}, \"{}\", {}, {}, {}, {}, {}",
            i,
            name,
            record.file_size,
            u8::from(record.selected_greedy),
            record.score_rowsum,
            record.score_unitarian,
            record.score_block_target
        )
        .map_err(|e| Error::io(path, e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::RowElem;
    use tempfile::tempdir;

    #[test]
    fn test_initialise_from_matrix() {
        let mut m = Matrix::new(8);
        m.insert_row(RowElem::new(PathBuf::from("/c/exemplar_a"), 3, vec![0, 4], 1.0));
        m.insert_row(RowElem::new(PathBuf::from("/c/exemplar_b"), 2, vec![1], 1.0));

        let analytics = initialise_analytics(&m);
        assert_eq!(analytics.len(), 2);
        assert_eq!(analytics[0].score_rowsum, 2.0);
        assert_eq!(analytics[0].file_size, 3);
        assert_eq!(analytics[1].score_rowsum, 1.0);
        assert!(!analytics[0].selected_greedy);
        assert_eq!(analytics[0].score_unitarian, 0.0);
    }

    #[test]
    fn test_csv_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analytics.csv");

        let data = vec![ExemplarRecord {
            file_path: PathBuf::from("/c/exemplar_a"),
            file_size: 5,
            selected_greedy: false,
            score_rowsum: 12.0,
            score_unitarian: 1.0,
            score_block_target: 0.0,
        }];
        write_csv(&path, &data).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "index, file, trace_file_size, selected_greedy, \
             score_rowsum, score_unitarian, score_block_target"
        );
        assert_eq!(lines.next().unwrap(), "0, \"exemplar_a\", 5, 0, 12, 1, 0");
    }
}
