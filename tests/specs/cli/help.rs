//! CLI help output specs

use crate::prelude::*;

#[test]
fn mpr_help_lists_board_and_session_commands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("Usage:")
        .stdout_has("setup")
        .stdout_has("exec")
        .stdout_has("repl")
        .stdout_has("agent");
}

#[test]
fn mpr_agent_help_shows_subcommands() {
    cli()
        .args(&["agent", "--help"])
        .passes()
        .stdout_has("start")
        .stdout_has("stop")
        .stdout_has("status")
        .stdout_has("logs");
}

#[test]
fn mpr_version_shows_version() {
    cli().args(&["--version"]).passes().stdout_has("0.2");
}

#[test]
fn unknown_command_is_a_usage_error() {
    cli().args(&["frobnicate"]).exits(2);
}

#[test]
fn disconnect_port_and_all_conflict() {
    cli().args(&["disconnect", "/dev/ttyACM0", "--all"]).exits(2);
}
