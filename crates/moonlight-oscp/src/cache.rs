//! Binary on-disk matrix cache.
//!
//! Parsing a large corpus dominates start-up time, so a constructed matrix
//! can be snapshotted to disk and restored on the next run. The format is a
//! flat little-endian record stream behind magic bytes and a version word:
//!
//! ```text
//! magic   8 bytes  "MLMX0001"
//! version u32
//! num_cols, num_cols_orig          u64
//! directory, pattern               length-prefixed UTF-8
//! row count                        u64
//! per row:
//!   path                           length-prefixed UTF-8
//!   file_size                      u64
//!   weight                         f64
//!   column length                  u64
//!   column entries                 u32 each (tombstones included)
//! ```
//!
//! Row sums and element counts are recomputed on load and checked against
//! the matrix invariants. Paths are stored as strings, not native path
//! objects.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::matrix::{Matrix, RowElem};

const MAGIC: &[u8; 8] = b"MLMX0001";
const VERSION: u32 = 1;

fn write_u32(out: &mut impl Write, path: &Path, value: u32) -> Result<()> {
    out.write_all(&value.to_le_bytes())
        .map_err(|e| Error::io(path, e))
}

fn write_u64(out: &mut impl Write, path: &Path, value: u64) -> Result<()> {
    out.write_all(&value.to_le_bytes())
        .map_err(|e| Error::io(path, e))
}

fn write_f64(out: &mut impl Write, path: &Path, value: f64) -> Result<()> {
    out.write_all(&value.to_le_bytes())
        .map_err(|e| Error::io(path, e))
}

fn write_str(out: &mut impl Write, path: &Path, value: &str) -> Result<()> {
    write_u64(out, path, value.len() as u64)?;
    out.write_all(value.as_bytes())
        .map_err(|e| Error::io(path, e))
}

fn read_u32(input: &mut impl Read, path: &Path) -> Result<u32> {
    let mut buf = [0u8; 4];
    input
        .read_exact(&mut buf)
        .map_err(|e| Error::io(path, e))?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(input: &mut impl Read, path: &Path) -> Result<u64> {
    let mut buf = [0u8; 8];
    input
        .read_exact(&mut buf)
        .map_err(|e| Error::io(path, e))?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64(input: &mut impl Read, path: &Path) -> Result<f64> {
    let mut buf = [0u8; 8];
    input
        .read_exact(&mut buf)
        .map_err(|e| Error::io(path, e))?;
    Ok(f64::from_le_bytes(buf))
}

fn read_str(input: &mut impl Read, path: &Path) -> Result<String> {
    let len = read_u64(input, path)? as usize;
    let mut buf = vec![0u8; len];
    input
        .read_exact(&mut buf)
        .map_err(|e| Error::io(path, e))?;
    String::from_utf8(buf)
        .map_err(|_| Error::format(format!("invalid UTF-8 string in cache {}", path.display())))
}

/// Write a matrix snapshot to `path`, overwriting any previous snapshot.
pub fn save_matrix(matrix: &Matrix, path: &Path) -> Result<()> {
    info!(path = %path.display(), "writing matrix cache");

    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);

    out.write_all(MAGIC).map_err(|e| Error::io(path, e))?;
    write_u32(&mut out, path, VERSION)?;
    write_u64(&mut out, path, matrix.num_cols() as u64)?;
    write_u64(&mut out, path, matrix.num_cols_orig() as u64)?;
    write_str(&mut out, path, &matrix.directory().to_string_lossy())?;
    write_str(&mut out, path, matrix.pattern())?;

    write_u64(&mut out, path, matrix.num_rows() as u64)?;
    for row in matrix.rows() {
        write_str(&mut out, path, &row.file_path.to_string_lossy())?;
        write_u64(&mut out, path, row.file_size)?;
        write_f64(&mut out, path, row.weight)?;
        write_u64(&mut out, path, row.column.len() as u64)?;
        for &entry in &row.column {
            write_u32(&mut out, path, entry)?;
        }
    }

    out.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Restore a matrix snapshot from `path`.
pub fn load_matrix(path: &Path) -> Result<Matrix> {
    info!(path = %path.display(), "reading matrix cache");

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut input = BufReader::new(file);

    let mut magic = [0u8; 8];
    input
        .read_exact(&mut magic)
        .map_err(|e| Error::io(path, e))?;
    if &magic != MAGIC {
        return Err(Error::format(format!(
            "not a matrix cache file: {}",
            path.display()
        )));
    }
    let version = read_u32(&mut input, path)?;
    if version != VERSION {
        return Err(Error::format(format!(
            "unsupported matrix cache version {version} in {}",
            path.display()
        )));
    }

    let num_cols = read_u64(&mut input, path)? as usize;
    let num_cols_orig = read_u64(&mut input, path)? as usize;
    let directory = PathBuf::from(read_str(&mut input, path)?);
    let pattern = read_str(&mut input, path)?;

    let num_rows = read_u64(&mut input, path)? as usize;
    let mut rowlist = Vec::with_capacity(num_rows);
    for _ in 0..num_rows {
        let file_path = PathBuf::from(read_str(&mut input, path)?);
        let file_size = read_u64(&mut input, path)?;
        let weight = read_f64(&mut input, path)?;
        let len = read_u64(&mut input, path)? as usize;
        let mut column = Vec::with_capacity(len);
        for _ in 0..len {
            column.push(read_u32(&mut input, path)?);
        }
        rowlist.push(RowElem::new(file_path, file_size, column, weight));
    }

    let matrix = Matrix::from_restored(num_cols, num_cols_orig, directory, pattern, rowlist)?;
    info!(
        rows = matrix.num_rows(),
        cols = matrix.num_cols(),
        "matrix restored from cache"
    );
    Ok(matrix)
}
