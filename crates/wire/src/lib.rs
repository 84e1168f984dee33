// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol between the `mpr` client and the `mprd` agent.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.
//!
//! A client sends one [`Request`], then reads [`Frame`]s until the final
//! [`Frame::Status`]. During an interactive takeover it may also send
//! [`Input`] messages on the same connection.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod reply;
mod request;
mod utf8;
mod wire;

pub use frame::{Frame, Input, Status};
pub use reply::{
    AgentStatus, ConnectionEntry, DfInfo, FileEntry, MemInfo, PortEntry, Reply, SetupReply,
};
pub use request::{Request, Verb};
pub use utf8::Utf8Carry;
pub use wire::{
    decode, encode, read_frame, read_input, read_message, read_request, write_frame, write_input,
    write_message, write_request, ProtocolError, MAX_MESSAGE_SIZE,
};
