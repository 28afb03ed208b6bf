//! End-to-end CLI tests for the `cm` binary (spec §6).

use assert_cmd::Command;
use predicates::prelude::*;

fn cm() -> Command {
    Command::cargo_bin("cm").unwrap()
}

#[test]
fn run_fib_iterative_prints_fifty_five() {
    cm().args(["run", "--fixture", "fib-iterative"])
        .assert()
        .success()
        .stdout(predicate::str::contains("55"));
}

#[test]
fn run_sum_loop_prints_4950() {
    cm().args(["run", "--fixture", "sum-loop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4950"));
}

#[test]
fn run_dynamic_dispatch_shape_prints_twelve() {
    cm().args(["run", "--fixture", "dynamic-dispatch-shape"])
        .assert()
        .success()
        .stdout(predicate::str::contains("12"));
}

#[test]
fn run_unknown_fixture_fails_with_message() {
    cm().args(["run", "--fixture", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown fixture"));
}

#[test]
fn build_emit_mir_prints_block_listing() {
    cm().args(["build", "--fixture", "sum-loop", "--emit", "mir"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fn sum100"));
}

#[test]
fn build_emit_js_produces_a_while_loop() {
    cm().args(["build", "--fixture", "sum-loop", "--emit", "js"])
        .assert()
        .success()
        .stdout(predicate::str::contains("function sum100").and(predicate::str::contains("while (")));
}

#[test]
fn build_with_opt_level_still_succeeds() {
    cm().args(["build", "--fixture", "fib-iterative", "-O", "2", "--emit", "mir"])
        .assert()
        .success();
}

#[test]
fn build_writes_to_out_file_when_given() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("sum.mir");
    cm().args(["build", "--fixture", "sum-loop", "--emit", "mir", "--out"])
        .arg(&out_path)
        .assert()
        .success();
    let contents = std::fs::read_to_string(&out_path).unwrap();
    assert!(contents.contains("fn sum100"));
}

#[test]
fn cache_stats_runs_without_a_populated_cache() {
    cm().args(["cache", "stats"]).assert().success().stdout(predicate::str::contains("cached module"));
}

#[test]
fn cache_clear_runs_cleanly() {
    cm().args(["cache", "clear"]).assert().success().stdout(predicate::str::contains("cache cleared"));
}
