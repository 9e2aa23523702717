//! End-to-end runs of the `bib-check` binary without network passes.

use std::path::Path;
use std::process::{Command, Output};

const ARTICLE: &str = "@article{su2024,\n  title = {RoFormer:   Enhanced Transformer},\n  author = {Jianlin Su},\n  journal = {Neurocomputing},\n  year = {2024}\n}\n";

const BOOK: &str = "@book{knuth1968,\n  title = {The Art of Computer Programming},\n  author = {Donald Knuth},\n  year = {1968}\n}\n";

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bib-check"))
        .current_dir(dir)
        .args(args)
        .args(["--no-interactive", "--no-color", "--log-file"])
        .arg(dir.join("run.log"))
        .env_remove("BIBCHECK_AI_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn clean_file_normalizes_and_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("refs.bib"), ARTICLE).unwrap();

    let out = run(dir.path(), &["refs.bib"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stdout));

    let written = std::fs::read_to_string(dir.path().join("refs.chk.bib")).unwrap();
    assert!(written.starts_with("@article{su2024,"));
    assert!(written.contains("{RoFormer: Enhanced Transformer}"));
    assert!(dir.path().join("run.log").exists());
}

#[test]
fn unrecognized_type_halts_but_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("refs.bib"), format!("{}\n{}", BOOK, ARTICLE)).unwrap();

    let out = run(dir.path(), &["refs.bib", "-o", "checked.bib"]);
    assert_eq!(out.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("HALTED at knuth1968"));
    assert!(stdout.contains("unrecognized-type"));

    let written = std::fs::read_to_string(dir.path().join("checked.bib")).unwrap();
    assert!(written.contains("@book{knuth1968,"));
    assert!(written.contains("@article{su2024,"));
    assert!(stdout.contains("Not checked:    1"));
}

#[test]
fn suppressed_type_is_not_blocking() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("refs.bib"), format!("{}\n{}", BOOK, ARTICLE)).unwrap();

    let out = run(dir.path(), &["refs.bib", "--suppress-type"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("[warning] unrecognized-type"));
}

#[test]
fn warnings_reach_the_log_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("refs.bib"), format!("{}\n{}", BOOK, ARTICLE)).unwrap();

    let out = run(dir.path(), &["refs.bib", "--suppress-type"]);
    assert!(out.status.success());
    let log = std::fs::read_to_string(dir.path().join("run.log")).unwrap();
    let line = log
        .lines()
        .find(|l| l.contains("unrecognized-type"))
        .expect("warning missing from log");
    assert!(line.contains("WARN"));
    assert!(line.contains("knuth1968"));
}

#[test]
fn ai_without_key_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("refs.bib"), ARTICLE).unwrap();

    let out = run(dir.path(), &["refs.bib", "--ai"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("API key"));
    assert!(!dir.path().join("refs.chk.bib").exists());
}

#[test]
fn missing_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(dir.path(), &["nope.bib"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("File not found"));
}
