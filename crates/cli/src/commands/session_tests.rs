// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use mpr_core::{BoardInfo, Port, Workspace, MARKER_FILE};
use mpr_wire::SetupReply;

use super::record;

fn setup_reply(port: &str) -> SetupReply {
    SetupReply {
        port: Port::new(port),
        info: BoardInfo {
            version: "1.24.0".into(),
            core: "RP2040".into(),
            device: "Raspberry Pi Pico W".into(),
            manufacturer: "Raspberry Pi".into(),
        },
        agent_endpoint: "/state/agent.sock".into(),
    }
}

#[test]
fn default_creates_the_workspace_in_cwd() {
    let dir = tempfile::tempdir().unwrap();

    let saved = record(&setup_reply("/dev/ttyACM0"), true, dir.path()).unwrap();

    assert_eq!(saved, Some(dir.path().join(MARKER_FILE)));
    let workspace = Workspace::discover(dir.path()).unwrap().unwrap();
    assert_eq!(workspace.default_port(), Some(&Port::new("/dev/ttyACM0")));
    let default = workspace.config.default.unwrap();
    assert_eq!(default.core, "RP2040");
    assert_eq!(default.agent_endpoint, Some("/state/agent.sock".into()));
}

#[test]
fn default_lands_in_the_enclosing_workspace() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(MARKER_FILE), "").unwrap();
    let nested = dir.path().join("src/app");
    std::fs::create_dir_all(&nested).unwrap();

    let saved = record(&setup_reply("/dev/ttyUSB0"), true, &nested).unwrap();

    assert_eq!(saved, Some(dir.path().join(MARKER_FILE)));
    assert!(!nested.join(MARKER_FILE).exists());
}

#[test]
fn without_default_no_workspace_is_created() {
    let dir = tempfile::tempdir().unwrap();

    let saved = record(&setup_reply("/dev/ttyACM0"), false, dir.path()).unwrap();

    assert_eq!(saved, None);
    assert!(!dir.path().join(MARKER_FILE).exists());
}

#[test]
fn without_default_an_existing_workspace_caches_the_board() {
    let dir = tempfile::tempdir().unwrap();
    record(&setup_reply("/dev/ttyACM0"), true, dir.path()).unwrap();

    record(&setup_reply("/dev/ttyUSB0"), false, dir.path()).unwrap();

    let workspace = Workspace::discover(dir.path()).unwrap().unwrap();
    assert_eq!(workspace.default_port(), Some(&Port::new("/dev/ttyACM0")));
    assert!(workspace.config.boards.contains_key("/dev/ttyUSB0"));
}
