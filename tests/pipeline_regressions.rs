use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

fn run_shell_in(lines: &[&str], dir: &Path) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_myshell"))
        .current_dir(dir)
        .env("HISTFILE", dir.join("histfile"))
        .env_remove("MYSHELL_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn myshell");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "exit").expect("write exit");
    }

    child.wait_with_output().expect("wait output")
}

fn scratch(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "myshell_pipeline_{label}_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn external_pipeline_outputs() {
    let dir = scratch("external");
    let output = run_shell_in(&["printf hello | tr a-z A-Z"], &dir);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("HELLO"), "stdout was: {stdout}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn builtin_to_external_pipeline_outputs() {
    let dir = scratch("builtin");
    let output = run_shell_in(&["echo hello | tr a-z A-Z"], &dir);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("HELLO"), "stdout was: {stdout}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_stage_does_not_stop_siblings() {
    let dir = scratch("missing");
    let output = run_shell_in(&["nosuchcmd_xyz | echo hi"], &dir);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("hi"), "stdout was: {stdout}");
    assert!(stderr.contains("nosuchcmd_xyz: not found"), "stderr was: {stderr}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_single_command_reports_not_found() {
    let dir = scratch("unknown");
    let output = run_shell_in(&["nosuchcmd_abc arg", "echo AFTER"], &dir);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nosuchcmd_abc: not found"), "stderr was: {stderr}");
    assert!(stdout.contains("AFTER"), "stdout was: {stdout}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn pipeline_output_redirects_to_file() {
    let dir = scratch("redirect");
    let output = run_shell_in(&["printf 'b\\na\\nb\\n' | sort | uniq > out.txt"], &dir);
    assert!(output.status.success());
    assert_eq!(std::fs::read_to_string(dir.join("out.txt")).unwrap(), "a\nb\n");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn builtin_redirects_and_restores_stdout() {
    let dir = scratch("builtin_redirect");
    let output = run_shell_in(&["echo first > out.txt", "echo second >> out.txt", "echo VISIBLE"], &dir);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        std::fs::read_to_string(dir.join("out.txt")).unwrap(),
        "first\nsecond\n"
    );
    assert!(stdout.contains("VISIBLE"), "stdout was: {stdout}");
    assert!(!stdout.contains("first"), "stdout was: {stdout}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn stderr_redirect_captures_diagnostics() {
    let dir = scratch("stderr");
    let output = run_shell_in(&["cd /no/such/dir_xyz 2> err.txt", "ls /no/such/dir_xyz 2>> err.txt"], &dir);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let captured = std::fs::read_to_string(dir.join("err.txt")).unwrap();
    assert!(captured.starts_with("cd: /no/such/dir_xyz"), "captured: {captured}");
    assert!(captured.lines().count() >= 2, "captured: {captured}");
    assert!(!stderr.contains("dir_xyz"), "stderr was: {stderr}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn bare_redirection_creates_file() {
    let dir = scratch("bare");
    let output = run_shell_in(&["> created.txt"], &dir);
    assert!(output.status.success());
    assert!(dir.join("created.txt").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn quoting_keeps_arguments_together() {
    let dir = scratch("quoting");
    let output = run_shell_in(&["echo 'a   b' \"c  d\" e\\ f"], &dir);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("a   b c  d e f"), "stdout was: {stdout}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unmatched_quote_is_reported_and_shell_continues() {
    let dir = scratch("unmatched");
    let output = run_shell_in(&["echo 'oops", "echo NEXT"], &dir);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unmatched quote"), "stderr was: {stderr}");
    assert!(stdout.contains("NEXT"), "stdout was: {stdout}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn malformed_pipeline_is_skipped_silently() {
    let dir = scratch("malformed");
    let output = run_shell_in(&["| cat", "echo a |", "echo a || cat", "echo NEXT"], &dir);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.is_empty(), "stderr was: {stderr}");
    assert!(stdout.contains("NEXT"), "stdout was: {stdout}");
    let _ = std::fs::remove_dir_all(&dir);
}
