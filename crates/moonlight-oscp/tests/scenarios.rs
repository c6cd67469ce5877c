//! End-to-end distillation scenarios over byte-exact corpora.
//!
//! Each test writes a small corpus into a temp directory, runs the full
//! pipeline (optional large-data pass, matrix construction, solve, verify)
//! and checks the resulting cover.

use std::fs;
use std::path::Path;

use moonlight_oscp::{
    initialise_analytics, read_weight_file, verify_solution, CorpusAnalytics, Matrix, OscpSolver,
    Solution,
};
use tempfile::tempdir;

const PATTERN: &str = "exemplar_";

fn write_corpus(dir: &Path, files: &[(&str, &[u8])]) {
    for (name, bytes) in files {
        fs::write(dir.join(name), bytes).unwrap();
    }
}

fn run_pipeline(
    dir: &Path,
    weight_file: Option<&Path>,
    greedy: bool,
    large_data: bool,
) -> (Solution, CorpusAnalytics, bool) {
    let weights = weight_file.map(|p| read_weight_file(p).unwrap());

    let mut solver = OscpSolver::new();
    let cols_to_ignore = if large_data && !greedy {
        solver
            .calc_cols_to_ignore(dir, PATTERN, weights.as_ref())
            .unwrap()
    } else {
        Vec::new()
    };

    let mut matrix = Matrix::from_corpus(dir, PATTERN, weights.as_ref(), &cols_to_ignore).unwrap();
    let mut analytics = initialise_analytics(&matrix);

    let solution = solver
        .solve_oscp(&mut matrix, &mut analytics, "test", greedy, weights.as_ref())
        .unwrap();
    let verified = verify_solution(&solution, weights.as_ref());

    (solution, analytics, verified)
}

#[test]
fn s1_trivial_single_row() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path(), &[("exemplar_a", &[0b1000_0000])]);

    let (solution, _, verified) = run_pipeline(dir.path(), None, false, false);

    assert_eq!(solution.solution, vec!["exemplar_a"]);
    assert_eq!(solution.weight, 1.0);
    assert_eq!(solution.num_non_optimal, 0);
    assert_eq!(solution.initial_singularities, vec![1, 2, 3, 4, 5, 6, 7]);
    assert!(verified);
}

#[test]
fn s2_two_duplicates() {
    let dir = tempdir().unwrap();
    write_corpus(
        dir.path(),
        &[
            ("exemplar_a", &[0b1100_0000]),
            ("exemplar_b", &[0b1100_0000]),
        ],
    );

    let (solution, _, verified) = run_pipeline(dir.path(), None, false, false);

    // Lexicographic tie-break keeps `a`; `b` falls to the subset-row rule.
    assert_eq!(solution.solution, vec!["exemplar_a"]);
    assert_eq!(solution.weight, 1.0);
    assert_eq!(solution.num_non_optimal, 0);
    assert!(verified);
}

#[test]
fn s3_dominated_row() {
    let dir = tempdir().unwrap();
    write_corpus(
        dir.path(),
        &[
            ("exemplar_a", &[0b1110_0000]),
            ("exemplar_b", &[0b0110_0000]),
            ("exemplar_c", &[0b0001_0000]),
        ],
    );

    let (solution, analytics, verified) = run_pipeline(dir.path(), None, false, false);

    assert_eq!(solution.solution, vec!["exemplar_a", "exemplar_c"]);
    assert_eq!(solution.weight, 2.0);
    assert_eq!(solution.num_non_optimal, 0);
    assert!(verified);

    // Both picks came from the unitarian rule.
    let unitarian_total: f64 = analytics.iter().map(|r| r.score_unitarian).sum();
    assert_eq!(unitarian_total, 2.0);
}

#[test]
fn s4_superset_row_wins() {
    let dir = tempdir().unwrap();
    write_corpus(
        dir.path(),
        &[
            ("exemplar_x", &[0b1000_0000]),
            ("exemplar_y", &[0b0100_0000]),
            ("exemplar_z", &[0b1100_0000]),
        ],
    );

    let (solution, _, verified) = run_pipeline(dir.path(), None, false, false);

    // z covers both columns at equal weight, so x and y are dominated
    // subset rows and the cover is z alone.
    assert_eq!(solution.solution, vec!["exemplar_z"]);
    assert_eq!(solution.weight, 1.0);
    assert_eq!(solution.num_non_optimal, 0);
    assert!(verified);
}

#[test]
fn s5_single_superset_row() {
    let dir = tempdir().unwrap();
    write_corpus(
        dir.path(),
        &[
            ("exemplar_a", &[0b1100_0000]),
            ("exemplar_b", &[0b0011_0000]),
            ("exemplar_c", &[0b1111_0000]),
        ],
    );

    let (solution, _, verified) = run_pipeline(dir.path(), None, false, false);

    assert_eq!(solution.solution, vec!["exemplar_c"]);
    assert_eq!(solution.weight, 1.0);
    assert_eq!(solution.num_non_optimal, 0);
    assert!(verified);
}

#[test]
fn s6_weighted_preference() {
    let dir = tempdir().unwrap();
    write_corpus(
        dir.path(),
        &[
            ("exemplar_a", &[0b1100_0000]),
            ("exemplar_b", &[0b0011_0000]),
            ("exemplar_c", &[0b1111_0000]),
        ],
    );
    let weight_path = dir.path().join("weights");
    fs::write(
        &weight_path,
        "exemplar_a 1.0\nexemplar_b 1.0\nexemplar_c 10.0\n",
    )
    .unwrap();

    let (solution, _, verified) = run_pipeline(dir.path(), Some(&weight_path), false, false);

    // Two cheap rows beat the expensive superset: total weight 2 < 10.
    assert_eq!(solution.solution, vec!["exemplar_a", "exemplar_b"]);
    assert_eq!(solution.weight, 2.0);
    assert!(verified);
}

#[test]
fn greedy_mode_picks_best_score() {
    let dir = tempdir().unwrap();
    write_corpus(
        dir.path(),
        &[
            ("exemplar_a", &[0b1100_0000]),
            ("exemplar_b", &[0b0011_0000]),
            ("exemplar_c", &[0b1111_0000]),
        ],
    );

    let (solution, _, verified) = run_pipeline(dir.path(), None, true, false);

    assert_eq!(solution.solution, vec!["exemplar_c"]);
    assert_eq!(solution.num_non_optimal, 1);
    assert_eq!(solution.weight_non_optimal, 1.0);
    assert!(verified);
}

#[test]
fn large_data_mode_matches_normal_mode() {
    let dir = tempdir().unwrap();
    write_corpus(
        dir.path(),
        &[
            ("exemplar_a", &[0b1110_0000]),
            ("exemplar_b", &[0b0110_0000]),
            ("exemplar_c", &[0b0001_0000]),
        ],
    );

    let (normal, _, normal_ok) = run_pipeline(dir.path(), None, false, false);
    let (large, _, large_ok) = run_pipeline(dir.path(), None, false, true);

    assert!(normal_ok);
    assert!(large_ok);
    assert_eq!(normal.solution, large.solution);
    assert_eq!(normal.weight, large.weight);
}

#[test]
fn deterministic_output() {
    let dir = tempdir().unwrap();
    write_corpus(
        dir.path(),
        &[
            ("exemplar_a", &[0b1010_1010, 0b0000_1111]),
            ("exemplar_b", &[0b1010_0000, 0b0000_0011]),
            ("exemplar_c", &[0b0101_0101]),
            ("exemplar_d", &[0b0101_0100]),
            ("exemplar_e", &[0b1111_0000, 0b1100_0000]),
        ],
    );

    let (first, _, _) = run_pipeline(dir.path(), None, false, false);
    let (second, _, _) = run_pipeline(dir.path(), None, false, false);

    let json_a = serde_json::to_string(&first.report()).unwrap();
    let json_b = serde_json::to_string(&second.report()).unwrap();
    assert_eq!(json_a, json_b);
}

#[test]
fn cover_and_weight_laws_on_mixed_corpus() {
    let dir = tempdir().unwrap();

    // Deterministic pseudo-random corpus, wide enough to force greedy picks.
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let files: Vec<(String, Vec<u8>)> = (0..12)
        .map(|i| {
            let bytes: Vec<u8> = (0..4).map(|_| (next() & 0xff) as u8).collect();
            (format!("exemplar_{i:02}"), bytes)
        })
        .collect();
    for (name, bytes) in &files {
        fs::write(dir.path().join(name), bytes).unwrap();
    }

    let (solution, _, verified) = run_pipeline(dir.path(), None, false, false);

    // Law 8: the cover property holds on every terminal solution.
    assert!(verified);
    // Law 9: unweighted weight equals solution size.
    assert_eq!(solution.weight, solution.solution.len() as f64);
    // The cover is genuine: every column some exemplar covers is covered
    // by a selected exemplar.
    let mut covered = vec![false; 32];
    for row in &solution.row_data {
        for (c, &bit) in row.iter().enumerate() {
            if bit == 1 {
                covered[c] = true;
            }
        }
    }
    for (name, bytes) in &files {
        for (i, byte) in bytes.iter().enumerate() {
            for b in 0..8 {
                if byte & (0x80 >> b) != 0 {
                    assert!(
                        covered[i * 8 + b],
                        "column {} of {} uncovered",
                        i * 8 + b,
                        name
                    );
                }
            }
        }
    }
}

#[test]
fn unitarian_inclusion_law() {
    let dir = tempdir().unwrap();
    // exemplar_u uniquely covers column 7; it must appear in the solution.
    write_corpus(
        dir.path(),
        &[
            ("exemplar_p", &[0b1110_0000]),
            ("exemplar_q", &[0b1100_0000]),
            ("exemplar_u", &[0b1000_0001]),
        ],
    );

    let (solution, _, verified) = run_pipeline(dir.path(), None, false, false);

    assert!(verified);
    assert!(solution.solution.iter().any(|s| s == "exemplar_u"));
}

#[test]
fn empty_corpus_yields_empty_solution() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("unmatched"), [1u8]).unwrap();

    let (solution, analytics, verified) = run_pipeline(dir.path(), None, false, false);

    assert!(solution.solution.is_empty());
    assert_eq!(solution.weight, 0.0);
    assert!(analytics.is_empty());
    assert!(verified);
}

#[test]
fn weighted_skips_non_positive_and_unknown() {
    let dir = tempdir().unwrap();
    write_corpus(
        dir.path(),
        &[
            ("exemplar_a", &[0b1100_0000]),
            ("exemplar_b", &[0b1100_0000]),
            ("exemplar_c", &[0b0010_0000]),
        ],
    );
    // b is zero-weighted out; c has no weight entry and is skipped.
    let weight_path = dir.path().join("weights");
    fs::write(&weight_path, "exemplar_a 2.0\nexemplar_b 0.0\n").unwrap();

    let (solution, _, verified) = run_pipeline(dir.path(), Some(&weight_path), false, false);

    assert_eq!(solution.solution, vec!["exemplar_a"]);
    assert_eq!(solution.weight, 2.0);
    assert!(verified);
}

#[test]
fn reducer_is_idempotent_on_reduced_matrix() {
    use moonlight_oscp::RowElem;
    use std::path::PathBuf;

    // A 4-cycle: every column sum is 2, no subset rows, no superset cols.
    let mut m = Matrix::new(4);
    for (name, cols) in [
        ("exemplar_a", [0u32, 1]),
        ("exemplar_b", [1, 2]),
        ("exemplar_c", [2, 3]),
        ("exemplar_d", [3, 0]),
    ] {
        m.insert_row(RowElem::new(PathBuf::from(name), 1, cols.to_vec(), 1.0));
    }

    let mut solution = Solution::new();
    let mut analytics = initialise_analytics(&m);
    let before = m.clone();

    assert!(
        !moonlight_oscp::reduce::eliminate_row_unitarians(&mut m, &mut solution, &mut analytics)
            .unwrap()
    );
    assert!(!moonlight_oscp::reduce::eliminate_subset_rows(&mut m).unwrap());
    assert!(!moonlight_oscp::reduce::eliminate_superset_cols(&mut m).unwrap());
    assert_eq!(m, before);
}
