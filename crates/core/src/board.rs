// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Board identity: firmware banner parsing and filesystem root mapping.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Descriptive metadata for a board, fetched once per connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    /// Firmware version, e.g. `1.24.0` (`?` when the banner has none)
    pub version: String,
    /// Core / MCU, e.g. `RP2040`, `ESP32S3`
    pub core: String,
    /// Board name, e.g. `Raspberry Pi Pico W`
    pub device: String,
    pub manufacturer: String,
}

impl BoardInfo {
    /// Filesystem root on the board.
    pub fn root(&self) -> &'static str {
        root_fs_for_core(&self.core)
    }
}

#[allow(clippy::expect_used)]
static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"v(\d+\.\d+(?:\.\d+)?)(?:-[\w.]+)?").expect("constant regex pattern is valid")
});

/// `; <board> with <wifi> module of external <core2> with <core1>`
#[allow(clippy::expect_used)]
static EXTERNAL_RADIO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r";\s*(.+?)\s+with\s+(.+?)\s+module\s+of\s+external\s+(\w+)\s+with\s+(\w+)")
        .expect("constant regex pattern is valid")
});

/// `; <board> with <core>`
#[allow(clippy::expect_used)]
static BOARD_WITH_CORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r";\s*(.+?)\s+with\s+(\S+)").expect("constant regex pattern is valid")
});

/// Parse the banner MicroPython prints on entering the friendly REPL.
///
/// ```text
/// MicroPython v1.24.0 on 2024-10-25; Raspberry Pi Pico W with RP2040
/// ```
pub fn parse_banner(banner: &str) -> Option<BoardInfo> {
    let line = banner.lines().find(|l| l.contains("MicroPython") || l.contains(" with "))?;
    let version = VERSION
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "?".to_string());

    if let Some(caps) = EXTERNAL_RADIO.captures(line) {
        let board = strip_module(caps[1].trim());
        let radio = caps[2].trim();
        let companion = caps[3].to_ascii_uppercase();
        let primary = caps[4].to_ascii_uppercase();
        // ESP32P4 paired with an external C5/C6 radio is reported as its own variant
        let core = if primary == "ESP32P4" && matches!(companion.as_str(), "ESP32C5" | "ESP32C6") {
            format!("ESP32P4{}", &companion[companion.len() - 2..])
        } else {
            primary
        };
        return Some(BoardInfo {
            version,
            device: core.clone(),
            manufacturer: format!("{board} with {radio} ({companion})"),
            core,
        });
    }

    let caps = BOARD_WITH_CORE.captures(line)?;
    let board = caps[1].trim().to_string();
    let core = normalize_core(&caps[2].to_ascii_uppercase());
    Some(BoardInfo { version, manufacturer: manufacturer_of(&board), device: board, core })
}

/// Canonical core name: drops a `/secondary` core and a trailing package
/// letter on plain `<letters><digits>` names (`RP2350B` is an `RP2350`).
pub fn normalize_core(core: &str) -> String {
    let primary = core.split('/').next().unwrap_or(core);
    let Some(last) = primary.chars().last() else {
        return String::new();
    };
    if last.is_ascii_alphabetic() {
        let stem = &primary[..primary.len() - 1];
        let letters = stem.trim_end_matches(|c: char| c.is_ascii_digit());
        if letters.len() < stem.len()
            && !letters.is_empty()
            && letters.chars().all(|c| c.is_ascii_alphabetic())
        {
            return stem.to_string();
        }
    }
    primary.to_string()
}

/// Filesystem root for a core; most ports mount at `/`.
pub fn root_fs_for_core(core: &str) -> &'static str {
    match normalize_core(core).as_str() {
        "EFR32MG" | "MIMXRT1062DVJ6A" => "/flash",
        _ => "/",
    }
}

fn strip_module(board: &str) -> &str {
    board.strip_suffix(" module").map(str::trim).unwrap_or(board)
}

fn manufacturer_of(board: &str) -> String {
    if board.starts_with("Raspberry Pi") {
        return "Raspberry Pi".to_string();
    }
    let board = strip_module(board);
    match board.split_whitespace().next() {
        Some(first) => first.to_string(),
        None => "Unknown".to_string(),
    }
}

#[cfg(test)]
#[path = "board_tests.rs"]
mod tests;
