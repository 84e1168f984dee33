// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

fn force_color(on: bool) {
    if on {
        std::env::set_var("COLOR", "1");
        std::env::remove_var("NO_COLOR");
    } else {
        std::env::set_var("NO_COLOR", "1");
        std::env::remove_var("COLOR");
    }
}

#[test]
#[serial]
fn styles_follow_color_setting() {
    let plain = format!("{:?}", Styles::plain());

    force_color(true);
    assert_ne!(format!("{:?}", styles()), plain);

    force_color(false);
    assert_eq!(format!("{:?}", styles()), plain);
}

#[test]
#[serial]
fn header_produces_ansi_when_color_forced() {
    force_color(true);
    let result = header("Connections");
    assert!(result.starts_with("\x1b[38;5;74m"), "expected ANSI header color");
    assert!(result.ends_with("\x1b[0m"), "expected ANSI reset");
}

#[test]
#[serial]
fn no_color_leaves_text_alone() {
    force_color(false);
    assert_eq!(header("a"), "a");
    assert_eq!(literal("/dev/ttyACM0"), "/dev/ttyACM0");
    assert_eq!(muted("b"), "b");
}

#[test]
#[serial]
fn muted_uses_the_muted_code() {
    force_color(true);
    assert!(muted("x").contains(&format!("38;5;{}m", codes::MUTED)));
}
