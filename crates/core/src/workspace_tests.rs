// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tempfile::tempdir;

use super::*;

fn pico() -> BoardInfo {
    BoardInfo {
        version: "1.24.0".into(),
        core: "RP2040".into(),
        device: "Raspberry Pi Pico".into(),
        manufacturer: "Raspberry Pi".into(),
    }
}

#[test]
fn no_marker_means_no_workspace() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("a/b");
    std::fs::create_dir_all(&nested).unwrap();
    assert!(Workspace::discover(&nested).unwrap().is_none());
}

#[test]
fn nearest_ancestor_marker_wins() {
    let dir = tempdir().unwrap();
    let outer = dir.path();
    let inner = outer.join("project");
    let deep = inner.join("src/lib");
    std::fs::create_dir_all(&deep).unwrap();
    std::fs::write(outer.join(MARKER_FILE), "").unwrap();
    std::fs::write(inner.join(MARKER_FILE), "").unwrap();

    assert_eq!(find_root(&deep), Some(inner));
}

#[test]
fn filesystem_root_is_never_a_workspace() {
    assert!(find_root(Path::new("/")).is_none());
    assert!(matches!(
        Workspace::discover_or_create(Path::new("/")),
        Err(WorkspaceError::RootNotAllowed)
    ));
}

#[test]
fn set_default_persists_and_reloads() {
    let dir = tempdir().unwrap();
    let mut ws = Workspace::discover_or_create(dir.path()).unwrap();
    ws.set_default(&Port::new("/dev/ttyACM0"), &pico(), Some(PathBuf::from("/tmp/agent.sock")));
    ws.save().unwrap();

    let loaded = Workspace::discover(dir.path()).unwrap().unwrap();
    assert_eq!(loaded.default_port(), Some(&Port::new("/dev/ttyACM0")));
    let default = loaded.config.default.unwrap();
    assert_eq!(default.core, "RP2040");
    assert_eq!(default.agent_endpoint, Some(PathBuf::from("/tmp/agent.sock")));
    assert_eq!(loaded.config.boards["/dev/ttyACM0"], pico());
}

#[test]
fn later_setup_supersedes_default() {
    let dir = tempdir().unwrap();
    let mut ws = Workspace::discover_or_create(dir.path()).unwrap();
    ws.set_default(&Port::new("COM3"), &pico(), None);
    ws.set_default(&Port::new("COM4"), &pico(), None);
    ws.save().unwrap();

    let loaded = Workspace::discover(dir.path()).unwrap().unwrap();
    assert_eq!(loaded.default_port(), Some(&Port::new("COM4")));
    assert_eq!(loaded.config.boards.len(), 2);
}

#[test]
fn invalid_toml_is_a_parse_error() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(MARKER_FILE), "default = [").unwrap();
    assert!(matches!(Workspace::discover(dir.path()), Err(WorkspaceError::Parse(..))));
}

#[test]
fn empty_marker_has_no_default() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(MARKER_FILE), "").unwrap();
    let ws = Workspace::discover(dir.path()).unwrap().unwrap();
    assert!(ws.default_port().is_none());
}
