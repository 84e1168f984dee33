//! Target resolution as seen from the command line

use crate::prelude::*;

#[test]
fn command_without_any_target_exits_three() {
    let temp = Project::empty();

    temp.mpr()
        .args(&["exec", "print(1)"])
        .exits(3)
        .stderr_has("no target")
        .stderr_has("hint:");
}

#[test]
fn bare_command_starts_the_agent() {
    let temp = Project::empty();

    temp.mpr().args(&["info"]).exits(3);
    temp.mpr().args(&["agent", "status"]).passes().stdout_has("Status: running");
}

#[test]
fn missing_device_is_a_device_error() {
    let temp = Project::empty();

    temp.mpr().args(&["-p", "/dev/mpr-spec-missing", "exec", "print(1)"]).exits(4);
}

#[test]
fn setup_of_missing_device_writes_no_default() {
    let temp = Project::empty();

    temp.mpr().args(&["setup", "/dev/mpr-spec-missing", "--default"]).exits(4);
    assert!(!temp.path().join(".mpr.toml").exists());
}

#[test]
fn workspace_default_that_is_missing_is_a_device_error() {
    let temp = Project::empty();
    temp.file(".mpr.toml", "[default]\nport = \"/dev/mpr-spec-missing\"\n");

    temp.mpr().args(&["exec", "print(1)"]).exits(4);
}

#[test]
fn fg_of_unconnected_port_is_a_usage_error() {
    let temp = Project::empty();

    temp.mpr().args(&["fg", "/dev/mpr-spec-missing"]).exits(2).stderr_has("mpr setup");
}
