//! Agent start/stop/status lifecycle specs

use crate::prelude::*;

#[test]
fn status_when_not_running() {
    let temp = Project::empty();
    temp.mpr().args(&["agent", "status"]).passes().stdout_has("Agent not running");
}

#[test]
fn stop_when_not_running_says_already_stopped() {
    let temp = Project::empty();
    temp.mpr().args(&["agent", "stop"]).passes().stdout_has("Agent already stopped");
}

#[test]
fn start_status_stop() {
    let temp = Project::empty();

    temp.mpr().args(&["agent", "start"]).passes().stdout_has("Agent started");
    temp.mpr().args(&["agent", "status"]).passes().stdout_has("Status: running");
    assert!(temp.state_dir().join("agent.sock").exists());

    temp.mpr().args(&["agent", "stop"]).passes().stdout_has("Agent stopped");
    temp.mpr().args(&["agent", "stop"]).passes().stdout_has("Agent already stopped");
    assert!(!temp.state_dir().join("agent.sock").exists());
}

#[test]
fn start_twice_reports_already_running() {
    let temp = Project::empty();

    temp.mpr().args(&["agent", "start"]).passes();
    temp.mpr().args(&["agent", "start"]).passes().stdout_has("Agent already running");
}

#[test]
fn status_json_reports_running() {
    let temp = Project::empty();
    temp.mpr().args(&["agent", "start"]).passes();

    let out = temp.mpr().args(&["agent", "status", "-o", "json"]).passes().stdout();
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["status"], "running");
}

#[test]
fn log_starts_with_a_marker() {
    let temp = Project::empty();
    temp.mpr().args(&["agent", "start"]).passes();

    let logged = wait_for(SPEC_WAIT_MAX_MS, || temp.agent_log().contains("--- mprd: starting"));
    assert!(logged, "agent log:\n{}", temp.agent_log());
    temp.mpr().args(&["agent", "logs", "-n", "50"]).passes().stdout_has("mprd: starting");
}

#[test]
fn restart_brings_the_agent_back() {
    let temp = Project::empty();
    temp.mpr().args(&["agent", "start"]).passes();

    temp.mpr().args(&["agent", "restart"]).passes().stdout_has("Agent restarted");
    temp.mpr().args(&["agent", "status"]).passes().stdout_has("Status: running");
}
