// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mpr agent library
//!
//! The long-lived process behind `mpr`: it owns the serial connections to
//! MicroPython boards, tracks which board each shell session uses, and
//! serves requests over a Unix socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod connection;
pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod repl;
