// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mpr-core: sessions, target resolution and board identity for the mpr agent

pub mod macros;

pub mod board;
pub mod error;
pub mod id;
pub mod registry;
pub mod resolve;
pub mod workspace;

pub use board::{normalize_core, parse_banner, root_fs_for_core, BoardInfo};
pub use error::{exit_code, ErrorCode, ErrorKind, ErrorReport};
pub use id::{Port, SessionId};
pub use registry::{Detached, Session, SessionRegistry, SessionView};
pub use resolve::{resolve, Resolution, ResolveError, TargetSource};
pub use workspace::{DefaultConnection, Workspace, WorkspaceConfig, WorkspaceError, MARKER_FILE};
