use assert_cmd::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn repo_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("expected crates/<name> layout")
        .to_path_buf()
}

fn fixture(name: &str) -> PathBuf {
    let path = repo_root().join("fixtures").join(name);
    assert!(path.exists(), "fixture missing: {}", path.display());
    path
}

#[test]
fn cli_exports_dot() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let out = tmp.path().join("out.dot");

    let exe = assert_cmd::cargo_bin!("sismograph-cli");
    Command::new(exe)
        .args([
            fixture("microwave.yaml").to_string_lossy().as_ref(),
            "-o",
            out.to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let doc = fs::read_to_string(&out).expect("read dot");
    assert!(doc.starts_with("digraph {\n"), "{doc}");
    assert!(doc.contains("label = <<b>microwave</b>>"), "{doc}");
    assert!(doc.contains("subgraph \"cluster_door closed\" {"), "{doc}");
    assert!(doc.contains("[power > 0]"), "{doc}");
}

#[test]
fn cli_exports_plantuml() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let out = tmp.path().join("out.puml");

    let exe = assert_cmd::cargo_bin!("sismograph-cli");
    Command::new(exe)
        .args([
            fixture("elevator.yaml").to_string_lossy().as_ref(),
            "-T",
            "plantuml",
            "-o",
            out.to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let doc = fs::read_to_string(&out).expect("read plantuml");
    assert!(doc.starts_with("@startuml\n"), "{doc}");
    assert!(doc.contains("state movement {"), "{doc}");
    assert!(doc.contains("standing --> moving : floor_selected"), "{doc}");
}

#[test]
fn cli_label_toggles_strip_guards_and_actions() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let out = tmp.path().join("out.dot");

    let exe = assert_cmd::cargo_bin!("sismograph-cli");
    Command::new(exe)
        .args([
            fixture("microwave.yaml").to_string_lossy().as_ref(),
            "--no-guards",
            "--no-actions",
            "--trans-font-size",
            "10",
            "-o",
            out.to_string_lossy().as_ref(),
        ])
        .assert()
        .success();

    let doc = fs::read_to_string(&out).expect("read dot");
    assert!(doc.contains("edge [ fontsize=10 ];"), "{doc}");
    assert!(!doc.contains("[power > 0]"), "{doc}");
    assert!(!doc.contains("send('lamp_on')"), "{doc}");
    assert!(doc.contains("[label=\"start\""), "{doc}");
}

#[test]
fn cli_requires_exactly_one_output_mode() {
    let exe = assert_cmd::cargo_bin!("sismograph-cli");

    // Neither -o nor -it.
    Command::new(&exe)
        .args([fixture("microwave.yaml").to_string_lossy().as_ref()])
        .assert()
        .failure()
        .code(2);

    // Both at once.
    Command::new(&exe)
        .args([
            fixture("microwave.yaml").to_string_lossy().as_ref(),
            "-it",
            "-o",
            "out.dot",
        ])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn cli_requires_an_input_path() {
    let exe = assert_cmd::cargo_bin!("sismograph-cli");
    Command::new(exe)
        .args(["-o", "out.dot"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn cli_reports_model_errors_distinctly() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let bad = tmp.path().join("bad.yaml");
    fs::write(
        &bad,
        "statechart:\n  name: bad\n  root state:\n    name: root\n    states:\n      - name: a\n        transitions:\n          - target: missing\n",
    )
    .expect("write fixture");
    let out = tmp.path().join("out.dot");

    let exe = assert_cmd::cargo_bin!("sismograph-cli");
    Command::new(exe)
        .args([
            bad.to_string_lossy().as_ref(),
            "-o",
            out.to_string_lossy().as_ref(),
        ])
        .assert()
        .failure()
        .code(1);
}
