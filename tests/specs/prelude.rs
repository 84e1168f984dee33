// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers: an isolated agent state dir and a fluent command wrapper.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use tempfile::TempDir;

pub const SPEC_WAIT_MAX_MS: u64 = 5_000;

/// Directory holding the built binaries (next to this test's `deps/`).
fn bin_dir() -> PathBuf {
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap();
    deps.parent().unwrap().to_path_buf()
}

pub fn mpr_bin() -> PathBuf {
    bin_dir().join("mpr")
}

pub fn mprd_bin() -> PathBuf {
    bin_dir().join("mprd")
}

/// `mpr` with no agent state; for commands that never reach the agent.
pub fn cli() -> Cmd {
    let mut cmd = Command::new(mpr_bin());
    cmd.env("NO_COLOR", "1");
    Cmd { cmd }
}

/// A scratch working directory with its own agent.
pub struct Project {
    state: TempDir,
    cwd: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self { state: TempDir::new().unwrap(), cwd: TempDir::new().unwrap() }
    }

    pub fn path(&self) -> &Path {
        self.cwd.path()
    }

    pub fn state_dir(&self) -> &Path {
        self.state.path()
    }

    pub fn file(&self, rel: &str, content: &str) {
        let path = self.cwd.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn mpr(&self) -> Cmd {
        let mut cmd = Command::new(mpr_bin());
        cmd.current_dir(self.cwd.path())
            .env("MPR_STATE_DIR", self.state.path())
            .env("MPR_AGENT_BIN", mprd_bin())
            .env("MPR_SESSION", "spec")
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        Cmd { cmd }
    }

    pub fn agent_log(&self) -> String {
        std::fs::read_to_string(self.state.path().join("agent.log")).unwrap_or_default()
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        let _ = self.mpr().args(&["agent", "stop"]).cmd.timeout(Duration::from_secs(10)).output();
    }
}

pub struct Cmd {
    cmd: Command,
}

impl Cmd {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        self.cmd.env(key, value);
        self
    }

    fn run(mut self) -> Output {
        let output = self.cmd.timeout(Duration::from_secs(30)).output().unwrap();
        Output {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    pub fn passes(self) -> Output {
        let out = self.run();
        assert_eq!(out.code, Some(0), "expected success\nstdout:\n{}\nstderr:\n{}", out.stdout, out.stderr);
        out
    }

    pub fn exits(self, code: i32) -> Output {
        let out = self.run();
        assert_eq!(
            out.code,
            Some(code),
            "expected exit {code}\nstdout:\n{}\nstderr:\n{}",
            out.stdout,
            out.stderr
        );
        out
    }
}

pub struct Output {
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl Output {
    pub fn stdout(&self) -> String {
        self.stdout.clone()
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(self.stdout.contains(needle), "stdout missing {needle:?}:\n{}", self.stdout);
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(self.stderr.contains(needle), "stderr missing {needle:?}:\n{}", self.stderr);
        self
    }
}

/// Poll `check` until it holds or `max_ms` elapses.
pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}
