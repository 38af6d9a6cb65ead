//! CLI integration tests

use std::process::Command;

fn run_cli(args: &[&str]) -> std::process::Output {
    let mut full = vec!["run", "-q", "-p", "capacity-cli", "--"];
    full.extend_from_slice(args);
    Command::new("cargo")
        .args(full)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run_cli(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Capacity report"), "Should show about text");
    assert!(stdout.contains("-d, --out-dir"), "Should show out-dir option");
    assert!(
        stdout.contains("-e, --pull-enterprise"),
        "Should show pull-enterprise flag"
    );
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run_cli(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("cache-capacity"), "Should show binary name");
}

/// Test that unknown flags are rejected
#[test]
fn test_unknown_flag_rejected() {
    let output = run_cli(&["--format", "json"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Unknown flag should fail");
    assert!(stderr.contains("--format"), "Should name the bad flag");
}
