// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.

use std::fmt;

use mpr_core::ErrorReport;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Exit quietly: whatever needed saying was already printed.
    pub fn silent(code: i32) -> Self {
        Self::new(code, String::new())
    }
}

impl From<ErrorReport> for ExitError {
    fn from(report: ErrorReport) -> Self {
        let message = match report.hint() {
            Some(hint) => format!("{report}\nhint: {hint}"),
            None => report.to_string(),
        };
        Self::new(report.exit_code(), message)
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}
