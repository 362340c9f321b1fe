use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn splice(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_splice"))
        .args(args)
        .current_dir(cwd)
        .env_remove("SPLICE_LOG")
        .output()
        .expect("failed to run splice")
}

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn fixture_suite_passes() {
    let output = splice(&["test", "--no-color", fixtures().to_str().expect("utf-8 path")], &fixtures());
    assert!(output.status.success(), "fixtures failed:\n{}", stderr(&output));
    assert!(stderr(&output).contains("test result: ok."));
}

#[test]
fn fixture_categories_filter() {
    let output = splice(
        &["test", "--no-color", "-c", "errors", fixtures().to_str().expect("utf-8 path")],
        &fixtures(),
    );
    assert!(output.status.success(), "{}", stderr(&output));
    let log = stderr(&output);
    assert!(log.contains("errors"));
    assert!(!log.contains("conditional include picks"));
    assert!(log.contains("4 passed"), "{log}");
}

#[test]
fn expand_is_the_default_subcommand() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("doc.md"), "%{n = 20}Twice: %(n * 2)\n").expect("write");

    let output = splice(&["doc.md"], dir.path());
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "Twice: 40\n");

    let output = splice(&["expand", "doc.md", "-o", "out.md"], dir.path());
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("out.md")).expect("output file"),
        "Twice: 40\n"
    );
}

#[test]
fn target_flag_and_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("doc.md"), "%target_format %(1 / 3)").expect("write");
    std::fs::write(
        dir.path().join("splice.toml"),
        "target = \"latex\"\n[format]\ndefault = \".2f\"\n",
    )
    .expect("write");

    let output = splice(&["doc.md", "--config", "splice.toml"], dir.path());
    assert_eq!(stdout(&output), "latex 0.33");

    let output = splice(&["doc.md", "--config", "splice.toml", "--to", "docx"], dir.path());
    assert_eq!(stdout(&output), "docx 0.33");
}

#[test]
fn json_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("doc.md"), "x = %%(sym(\"x\"))").expect("write");

    let output = splice(&["doc.md", "--json"], dir.path());
    assert!(output.status.success(), "{}", stderr(&output));
    let json = stdout(&output);
    assert!(json.contains("\"Math\""), "{json}");
    assert!(json.contains("\"x = \""), "{json}");
}

#[test]
fn check_and_spans_do_not_evaluate() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("doc.md"), "a %(undefined) b").expect("write");

    let output = splice(&["doc.md", "--check"], dir.path());
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("1 directive(s)"));

    let output = splice(&["doc.md", "--spans"], dir.path());
    assert!(output.status.success());
    let spans = stdout(&output);
    assert!(spans.contains("inline expression \"undefined\""), "{spans}");
    assert_eq!(spans.lines().count(), 3);
}

#[test]
fn errors_are_reported_with_location() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("doc.md"), "line one\nvalue: %(1 + nope)\n").expect("write");

    let output = splice(&["--no-color", "doc.md"], dir.path());
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    let report = stderr(&output);
    assert!(report.contains("error[eval]: name 'nope' is not defined"), "{report}");
    assert!(report.contains("doc.md:2:"), "{report}");
}
