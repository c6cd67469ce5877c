//! Corpus discovery and exemplar ingest.
//!
//! An exemplar file is an arbitrary-length byte sequence interpreted as a
//! bit-packed coverage row, MSB-first within each byte: offset 0 bit 7 is
//! column 0, offset 0 bit 0 is column 7, and so on. The column universe is
//! `8 * max(file size over corpus)` wide.

use std::cmp::Reverse;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{Error, Result};

/// One corpus file: a path plus its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    /// Absolute path to the exemplar file.
    pub file_path: PathBuf,
    /// Size of the file in bytes.
    pub file_size: u64,
}

/// List the corpus files under `directory` whose file name matches `pattern`.
///
/// The result is sorted descending by file size, ties broken ascending by
/// path, so callers see the same deterministic order regardless of how the
/// OS enumerates the directory.
pub fn scan_corpus(directory: &Path, pattern: &Regex) -> Result<Vec<CorpusFile>> {
    let entries = fs::read_dir(directory).map_err(|e| Error::io(directory, e))?;

    let mut corpus = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(directory, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => continue,
        };
        if pattern.is_match(&name) {
            let meta = fs::metadata(&path).map_err(|e| Error::io(&path, e))?;
            corpus.push(CorpusFile {
                file_path: path,
                file_size: meta.len(),
            });
        }
    }

    corpus.sort_by(|a, b| {
        Reverse(a.file_size)
            .cmp(&Reverse(b.file_size))
            .then_with(|| a.file_path.cmp(&b.file_path))
    });

    debug!(
        directory = %directory.display(),
        files = corpus.len(),
        "scanned corpus directory"
    );

    Ok(corpus)
}

/// Expand an exemplar file into a dense 0/1 row, MSB-first within each byte.
///
/// The returned vector has exactly `8 * file_size` entries. An empty file is
/// a format error: a zero-width exemplar cannot contribute coverage.
pub fn read_exemplar_bits(exemplar: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(exemplar).map_err(|e| Error::io(exemplar, e))?;
    if bytes.is_empty() {
        return Err(Error::format(format!(
            "empty exemplar file: {}",
            exemplar.display()
        )));
    }

    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for byte in bytes {
        let mut mask = 0x80u8;
        for _ in 0..8 {
            bits.push(u8::from(byte & mask != 0));
            mask >>= 1;
        }
    }

    Ok(bits)
}

/// Parse a weight file: one `<filename> <weight>` record per line.
///
/// Blank lines are skipped; any other line that does not parse is a format
/// error. Weights are keyed by bare file name, not path.
pub fn read_weight_file(weight_file: &Path) -> Result<FxHashMap<String, f64>> {
    let file = fs::File::open(weight_file).map_err(|e| Error::io(weight_file, e))?;
    let reader = BufReader::new(file);

    let mut weights = FxHashMap::default();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| Error::io(weight_file, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let record = fields
            .next()
            .zip(fields.next())
            .and_then(|(name, weight)| weight.parse::<f64>().ok().map(|w| (name, w)));
        match record {
            Some((name, weight)) => {
                weights.insert(name.to_string(), weight);
            }
            None => {
                return Err(Error::format(format!(
                    "bad record at {}:{}: {:?}",
                    weight_file.display(),
                    lineno + 1,
                    trimmed
                )));
            }
        }
    }

    Ok(weights)
}
