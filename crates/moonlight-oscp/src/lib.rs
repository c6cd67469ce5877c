//! Moonlight OSCP - optimised set cover engine for corpus distillation
//!
//! Given a directory of binary coverage traces (one bit per basic block,
//! MSB-first within each byte), selects a minimum-weight subset of traces
//! whose union covers every basic block any trace covers.
//!
//! ## Core components
//! - Row-major logical sparse matrix with tombstoned column deletion
//! - Exact reductions applied to fixed point: column singularities, row
//!   unitarians, subset-row domination, superset-column domination
//! - Deterministically tie-broken greedy heuristic for the residual kernel
//! - Streaming two-pass "large data" preprocessing that drops trivially
//!   dominated columns before the matrix is built
//! - Solution verification against the captured raw rows
//!
//! ## Ambient facilities
//! - Binary matrix cache for fast re-runs on the same corpus
//! - Per-exemplar analytics with CSV export
//! - Weighted covers driven by a `<filename> <weight>` file

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analytics;
pub mod cache;
pub mod corpus;
pub mod error;
pub mod greedy;
pub mod matrix;
pub mod reduce;
pub mod solution;
pub mod solver;

pub use analytics::{initialise_analytics, CorpusAnalytics, ExemplarRecord};
pub use corpus::{read_exemplar_bits, read_weight_file, scan_corpus, CorpusFile};
pub use error::{Error, Result};
pub use matrix::{transform_index, Matrix, RowElem, DELETED};
pub use solution::{Solution, SolutionReport};
pub use solver::{primality_check, verify_solution, OscpSolver};
