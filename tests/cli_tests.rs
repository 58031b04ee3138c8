mod common;

use common::{run_huddle, TestEnv};

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Extract the meeting code from `huddle create` output.
fn created_code(output: &std::process::Output) -> String {
    stdout(output)
        .lines()
        .find_map(|line| line.trim().strip_prefix("Code: ").map(str::to_string))
        .expect("create output should contain a meeting code")
}

#[test]
fn huddle_help_shows_usage() {
    let output = run_huddle(&["--help"]);

    assert!(
        output.status.success(),
        "--help should succeed\nstdout:\n{}\nstderr:\n{}",
        stdout(&output),
        stderr(&output)
    );
    assert!(stdout(&output).contains("Usage:"));
    assert!(stdout(&output).contains("Commands:"));
}

#[test]
fn huddle_version_shows_version() {
    let output = run_huddle(&["--version"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("huddle "));
}

#[test]
fn completions_bash_outputs_script() {
    let output = run_huddle(&["completions", "bash"]);

    assert!(output.status.success());
    assert!(
        stdout(&output).contains("huddle"),
        "expected completion output to reference command name\nstdout:\n{}",
        stdout(&output)
    );
}

#[test]
fn config_show_works() {
    let output = run_huddle(&["config", "show"]);

    assert!(
        output.status.success(),
        "config show should succeed\nstdout:\n{}\nstderr:\n{}",
        stdout(&output),
        stderr(&output)
    );
    assert!(stdout(&output).contains("[general]"));
    assert!(stdout(&output).contains("data_dir"));
}

#[test]
fn meeting_lifecycle_via_cli() {
    let env = TestEnv::new();

    let output = env.run(&["create", "Weekly Sync", "--host", "alice"]);
    assert!(
        output.status.success(),
        "create should succeed\nstderr:\n{}",
        stderr(&output)
    );
    let code = created_code(&output);

    let output = env.run(&["join", &code, "--session", "s-host", "--user", "alice"]);
    assert!(output.status.success(), "join failed:\n{}", stderr(&output));

    let output = env.run(&["agenda", &code, "Budget review", "--owner", "alice"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Budget review"));

    let output = env.run(&["status", &code]);
    assert!(output.status.success());
    let status = stdout(&output);
    assert!(status.contains("Weekly Sync"));
    assert!(status.contains("State: active"));
    assert!(status.contains("alice"));

    let output = env.run(&["end", &code]);
    assert!(output.status.success());

    let output = env.run(&["status", &code]);
    assert!(stdout(&output).contains("State: completed"));
}

#[test]
fn upload_requires_host_under_default_policy() {
    let env = TestEnv::new();

    let output = env.run(&["create", "Sync", "--host", "alice"]);
    let code = created_code(&output);
    env.run(&["join", &code, "--session", "s-guest", "--user", "bob"]);

    let audio = std::env::temp_dir().join(format!("huddle-test-{}.webm", std::process::id()));
    std::fs::write(&audio, b"not-really-audio").unwrap();

    let output = env.run(&["upload", &code, "--session", "s-guest", audio.to_str().unwrap()]);
    assert!(
        !output.status.success(),
        "guest upload should be rejected\nstdout:\n{}",
        stdout(&output)
    );
    assert!(stderr(&output).contains("host"));

    env.run(&["join", &code, "--session", "s-host", "--user", "alice"]);
    let output = env.run(&["upload", &code, "--session", "s-host", audio.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "host upload should succeed\nstderr:\n{}",
        stderr(&output)
    );
    assert!(stdout(&output).contains("Recording uploaded"));

    let _ = std::fs::remove_file(&audio);
}

#[test]
fn process_once_without_credentials_leaves_recordings_pending() {
    let env = TestEnv::new();

    let output = env.run(&["process", "--once"]);
    assert!(
        output.status.success(),
        "process --once should succeed on an empty queue\nstderr:\n{}",
        stderr(&output)
    );
    assert!(stdout(&output).contains("Processed 0 recording(s)"));
}

#[test]
fn status_for_unknown_meeting_fails() {
    let output = run_huddle(&["status", "nope1234"]);
    assert!(!output.status.success());
}
