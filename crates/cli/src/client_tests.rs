// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serial_test::serial;

use super::*;

#[test]
fn parse_startup_error_with_blank_line_separator() {
    let log = "\
--- mprd: starting (pid: 12345) ---

2026-01-01T00:00:00Z ERROR failed to start agent: Failed to bind socket at /tmp/x: address in use
";
    let err = parse_startup_error(log).unwrap();
    assert_eq!(err, "Failed to bind socket at /tmp/x: address in use");
}

#[test]
fn parse_startup_error_no_error() {
    let log = "\
--- mprd: starting (pid: 12345) ---
2026-01-01T00:00:00Z  INFO Agent started
";
    assert!(parse_startup_error(log).is_none());
}

#[test]
fn parse_startup_error_multiple_startups_picks_last() {
    let log = "\
--- mprd: starting (pid: 100) ---
ERROR failed to start agent: first failure
--- mprd: starting (pid: 200) ---
ERROR failed to start agent: second failure
";
    assert_eq!(parse_startup_error(log).unwrap(), "second failure");
}

#[test]
fn parse_startup_error_ignores_failures_before_the_last_start() {
    let log = "\
--- mprd: starting (pid: 100) ---
ERROR failed to start agent: stale failure
--- mprd: starting (pid: 200) ---
INFO Agent started
";
    assert!(parse_startup_error(log).is_none());
}

#[test]
fn parse_startup_error_keeps_other_error_lines() {
    let log = "--- mprd: starting (pid: 7) ---\nERROR something else broke\n";
    assert_eq!(parse_startup_error(log).unwrap(), "ERROR something else broke");
}

#[test]
fn parse_startup_error_no_marker() {
    assert!(parse_startup_error("some random log content\n").is_none());
}

#[test]
#[serial]
fn agent_binary_override_wins() {
    std::env::set_var("MPR_AGENT_BIN", "/opt/mpr/bin/mprd");
    let found = find_mprd_binary();
    std::env::remove_var("MPR_AGENT_BIN");
    assert_eq!(found, PathBuf::from("/opt/mpr/bin/mprd"));
}

#[test]
fn paths_live_in_the_state_dir() {
    let client = AgentClient::in_dir(PathBuf::from("/s"));
    assert_eq!(client.socket_path(), PathBuf::from("/s/agent.sock"));
    assert_eq!(client.log_path(), PathBuf::from("/s/agent.log"));
    assert_eq!(client.pid_path(), PathBuf::from("/s/agent.pid"));
}

#[tokio::test]
async fn nothing_listening_is_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let client = AgentClient::in_dir(dir.path().to_path_buf());
    assert!(client.connect().await.unwrap_err().is_not_running());
    assert!(!client.stop().await.unwrap());
}

#[yare::parameterized(
    not_running = { ClientError::NotRunning, ErrorCode::AgentUnreachable },
    start_failed = { ClientError::StartFailed("bind".into()), ErrorCode::AgentBind },
    timeout = { ClientError::StartTimeout(Duration::from_secs(5)), ErrorCode::AgentUnreachable },
    unexpected = { ClientError::UnexpectedReply("x".into()), ErrorCode::AgentInternal },
)]
fn client_errors_are_agent_errors(error: ClientError, code: ErrorCode) {
    let report = error.report();
    assert_eq!(report.code, code);
    assert_eq!(report.exit_code(), 5);
}
