//! Integration tests for the `sicxe` CLI.

use log as _;
use sicxe_assembler as _;
use sicxe_core as _;
use simple_logger as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const HELLO: &str = "\
HELLO   START   0
FIRST   LDA     #72
        WD      OUTDEV
        LDA     #73
        WD      OUTDEV
DONE    J       DONE
OUTDEV  BYTE    X'05'
        END     FIRST
";

fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sicxe"))
}

fn create_temp_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn sicxe(args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(args)
        .output()
        .expect("failed to run sicxe")
}

#[test]
fn build_writes_object_program() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "hello.asm", HELLO);
    let output = temp_dir.path().join("out.obj");

    let result = sicxe(&[
        "build",
        source.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ]);

    assert!(result.status.success());
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("HHELLO "));
    assert!(text.contains("T000000"));
    assert!(text.trim_end().ends_with("E000000"));
}

#[test]
fn build_with_default_output() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "test.asm", " LDA 0\n");

    let result = sicxe(&["build", source.to_str().unwrap()]);

    assert!(result.status.success());
    assert!(temp_dir.path().join("test.obj").exists());
}

#[test]
fn build_reports_errors_with_line() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "bad.asm", " LDA 0\n BOGUS 1\n");

    let result = sicxe(&["build", source.to_str().unwrap()]);

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains(&format!("{}:2: error: unknown mnemonic", source.display())),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn build_verbose_prints_listing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "verbose.asm", HELLO);

    let result = sicxe(&["build", source.to_str().unwrap(), "--verbose"]);

    assert!(result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("00000  010048"));
    assert!(stderr.contains("LDA     #72"));
}

#[test]
fn run_assembles_and_reports_device_output() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "hello.asm", HELLO);

    let result = sicxe(&["run", source.to_str().unwrap()]);

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(result.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("device 05: HI"));
    assert!(stdout.contains("halted"));
}

#[test]
fn run_accepts_object_programs_and_saves_snapshot() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "hello.asm", HELLO);
    let object = temp_dir.path().join("hello.obj");
    let snapshot = temp_dir.path().join("memory.txt");

    assert!(sicxe(&["build", source.to_str().unwrap()]).status.success());
    let result = sicxe(&[
        "run",
        object.to_str().unwrap(),
        "--capacity",
        "16",
        "--snapshot",
        snapshot.to_str().unwrap(),
    ]);

    assert!(result.status.success());
    assert!(String::from_utf8_lossy(&result.stdout).contains("device 05: HI"));
    assert!(!fs::read_to_string(&snapshot).unwrap().is_empty());
}

#[test]
fn run_step_limit_leaves_program_running() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "hello.asm", HELLO);

    let result = sicxe(&["run", source.to_str().unwrap(), "--max-steps", "2"]);

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("running after 2 steps"));
    assert!(stdout.contains("device 05: H"));
}

#[test]
fn run_reports_faults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "fault.asm", " BYTE X'FF0000'\n");

    let result = sicxe(&["run", source.to_str().unwrap()]);

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("error: fault at 000000"), "stderr: {stderr}");
}

#[test]
fn run_verbose_traces_instructions() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "hello.asm", HELLO);

    let result = sicxe(&["run", source.to_str().unwrap(), "-v"]);

    assert!(result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("000000  LDA"));
    assert!(stderr.contains("000003  WD"));
}

#[test]
fn disasm_lists_instructions() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "hello.asm", HELLO);

    let result = sicxe(&["disasm", source.to_str().unwrap()]);

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.lines().next().unwrap().starts_with("000000  LDA"));
    assert!(stdout.contains("000006  LDA"));
}

#[test]
fn bundled_program_runs() {
    let program = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../programs/hello.asm");

    let result = sicxe(&["run", program.to_str().unwrap()]);

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(result.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("device 05: HI"));
}

#[test]
fn help_shows_usage() {
    let result = sicxe(&["--help"]);

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("Commands:"));
    assert!(stdout.contains("build"));
    assert!(stdout.contains("run"));
}

#[test]
fn unknown_command_fails() {
    let result = sicxe(&["unknown"]);

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("unknown command"));
}
