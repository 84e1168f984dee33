// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    plain = { b"print(1)\r", b"print(1)\r", false },
    exit_only = { b"\x1d", b"", true },
    exit_mid_chunk = { b"ab\x1dcd", b"ab", true },
    ctrl_c_passes = { b"\x03", b"\x03", false },
)]
fn exit_key_splits_input(input: &[u8], forward: &[u8], exit: bool) {
    assert_eq!(split_exit(input), (forward, exit));
}
