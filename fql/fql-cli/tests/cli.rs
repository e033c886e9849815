//! End-to-end tests driving the `fql` binary.

use std::io::Write;
use std::process::{Command, Stdio};

fn fql() -> Command {
    Command::new(env!("CARGO_BIN_EXE_fql"))
}

fn populated_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();

    for (name, size) in [("e1", 5), ("e2", 1), ("e3", 9), ("e4", 3), ("e5", 7)] {
        std::fs::write(dir.path().join(name), vec![b'x'; size]).unwrap();
    }

    dir
}

fn stdout_lines(output: std::process::Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

fn names(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| {
            line.rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

#[test]
fn translate_and_print() {
    let output = fql()
        .args(["-d", "/tmp", "-e", "size>=10M and type==file", "-p"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "find /tmp ( -size 10485760c -o -size +10485760c ) -a -type f\n"
    );
}

#[test]
fn searches_files() {
    let dir = populated_dir();

    let output = fql()
        .args(["-d"])
        .arg(dir.path())
        .args(["-e", "type==file"])
        .output()
        .unwrap();

    assert!(output.status.success());

    let mut found = names(stdout_lines(output));
    found.sort();
    assert_eq!(found, vec!["e1", "e2", "e3", "e4", "e5"]);
}

#[test]
fn order_by_and_limit() {
    let dir = populated_dir();

    let output = fql()
        .args(["-d"])
        .arg(dir.path())
        .args(["-e", "type==file", "--order-by", "s", "--limit", "3"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(names(stdout_lines(output)), vec!["e2", "e4", "e1"]);
}

#[test]
fn order_by_descending() {
    let dir = populated_dir();

    let output = fql()
        .args(["-d"])
        .arg(dir.path())
        .args(["-e", "type==file", "--order-by", "-s", "--limit", "3"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(names(stdout_lines(output)), vec!["e3", "e5", "e1"]);
}

#[test]
fn skip_drops_leading_results() {
    let dir = populated_dir();

    let output = fql()
        .args(["-d"])
        .arg(dir.path())
        .args(["-e", "type==file", "--order-by", "s", "--skip", "3"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(names(stdout_lines(output)), vec!["e5", "e3"]);
}

#[test]
fn printf_formats_output() {
    let dir = populated_dir();

    let output = fql()
        .args(["-d"])
        .arg(dir.path())
        .args([
            "-e",
            "type==file and name==\"e2\"",
            "--printf",
            "%f:%s\\n",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "e2:1\n");
}

#[test]
fn exec_runs_per_path() {
    let dir = populated_dir();

    let output = fql()
        .args(["-d"])
        .arg(dir.path())
        .args(["-e", "type==file and name==\"e1\""])
        .args(["--exec", "touch", "{}.done", ";"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(dir.path().join("e1.done").exists());
}

#[test]
fn multi_dir_sort_keeps_each_starting_point() {
    let one = tempfile::tempdir().unwrap();
    let two = tempfile::tempdir().unwrap();

    std::fs::write(one.path().join("small"), vec![b'x'; 1]).unwrap();
    std::fs::write(two.path().join("medium"), vec![b'x'; 2]).unwrap();
    std::fs::write(one.path().join("large"), vec![b'x'; 3]).unwrap();

    let output = fql()
        .args(["-d"])
        .arg(one.path())
        .args(["-d"])
        .arg(two.path())
        .args(["-e", "type==file", "--order-by", "s", "--printf", "%H %f\\n"])
        .output()
        .unwrap();

    assert!(output.status.success());

    // %H is the starting-point a path was found under; the sort stage must
    // not smear the last directory over entries from the first one.
    let expected = format!(
        "{} small\n{} medium\n{} large\n",
        one.path().display(),
        two.path().display(),
        one.path().display()
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout), expected);
}

#[test]
fn multi_dir_exec_runs_in_each_starting_point() {
    let one = tempfile::tempdir().unwrap();
    let two = tempfile::tempdir().unwrap();

    std::fs::write(one.path().join("a"), vec![b'x'; 2]).unwrap();
    std::fs::write(two.path().join("b"), vec![b'x'; 1]).unwrap();

    let output = fql()
        .args(["-d"])
        .arg(one.path())
        .args(["-d"])
        .arg(two.path())
        .args(["-e", "type==file", "--order-by", "s"])
        .args(["--exec", "touch", "ran-here", ";"])
        .output()
        .unwrap();

    assert!(output.status.success());

    // The exec child's working directory is the starting-point the path
    // was found under, even when the sort stage defers all output.
    assert!(one.path().join("ran-here").exists());
    assert!(two.path().join("ran-here").exists());
}

#[test]
fn expression_from_stdin() {
    let dir = populated_dir();

    let mut child = fql()
        .arg(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"type==file and name==\"e3\"\n")
        .unwrap();

    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert_eq!(names(stdout_lines(output)), vec!["e3"]);
}

#[test]
fn positional_expression() {
    let dir = populated_dir();

    let output = fql()
        .arg(dir.path())
        .arg("type==file and name==\"e4\"")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(names(stdout_lines(output)), vec!["e4"]);
}

#[test]
fn translation_errors_exit_nonzero() {
    let output = fql().args(["-d", "/tmp", "-e", "name>5"]).output().unwrap();

    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("name"), "{stderr}");
}

#[test]
fn invalid_directory_exits_nonzero() {
    let output = fql()
        .args(["-d", "/definitely/not/there", "-e", "type==file"])
        .output()
        .unwrap();

    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid"), "{stderr}");
}

#[test]
fn unterminated_exec_is_a_usage_error() {
    let output = fql()
        .args(["-d", "/tmp", "-e", "type==file", "--exec", "true"])
        .output()
        .unwrap();

    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--exec"), "{stderr}");
}

#[test]
fn quote_mode_quotes_strings() {
    let output = fql()
        .args(["-d", "/tmp", "-e", "name==\"*.log\"", "-p", "-q"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "find /tmp -name \"*.log\"\n"
    );
}
