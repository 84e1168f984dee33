// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory MicroPython board for tests.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::{Timeouts, Transport, CTRL_A, CTRL_B, CTRL_C, CTRL_D, CTRL_E};

pub(crate) const BANNER: &str = "MicroPython v1.24.0 on 2024-10-25; Raspberry Pi Pico W with RP2040\r\nType \"help()\" for more information.\r\n";
const RAW_BANNER: &str = "raw REPL; CTRL-B to exit\r\n>";
const TRACEBACK_INTERRUPT: &str =
    "Traceback (most recent call last):\r\n  File \"<stdin>\", line 1, in <module>\r\nKeyboardInterrupt: \r\n";

/// Timeouts short enough for tests against the fake board.
pub(crate) fn quick_timeouts() -> Timeouts {
    Timeouts {
        prompt: Duration::from_millis(500),
        command: Duration::from_secs(5),
        interrupt_grace: Duration::from_millis(300),
        settle: Duration::from_millis(1),
    }
}

/// What a program does once the board runs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Done { stdout: String, stderr: String },
    /// Prints `stdout`, then runs until Ctrl-C, echoing keyboard input
    Forever { stdout: String },
    /// Finishes after the host has polled `reads` more times
    Slow { stdout: String, reads: usize },
}

impl Outcome {
    pub(crate) fn stdout(text: impl Into<String>) -> Self {
        Outcome::Done { stdout: text.into(), stderr: String::new() }
    }

    pub(crate) fn raises(traceback: impl Into<String>) -> Self {
        Outcome::Done { stdout: String::new(), stderr: traceback.into() }
    }
}

type Program = Box<dyn FnMut(&str) -> Outcome + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Friendly,
    Raw,
    Paste,
    Running { reads_left: Option<usize> },
}

struct Sim {
    mode: Mode,
    out: VecDeque<u8>,
    code: Vec<u8>,
    line: Vec<u8>,
    paste_prefix: usize,
    window: Option<u16>,
    legacy: bool,
    bad_grant: bool,
    received: usize,
    since_grant: usize,
    grants: usize,
    window_violated: bool,
    executed: Vec<String>,
    resets: usize,
    unplugged: bool,
    max_read: usize,
    program: Program,
}

/// Cloneable handle; clones share one simulated board.
#[derive(Clone)]
pub(crate) struct FakeBoard {
    sim: Arc<Mutex<Sim>>,
}

impl FakeBoard {
    /// Board with raw-paste (window increment 128) running [`interpret`].
    pub(crate) fn new() -> Self {
        Self {
            sim: Arc::new(Mutex::new(Sim {
                mode: Mode::Friendly,
                out: VecDeque::new(),
                code: Vec::new(),
                line: Vec::new(),
                paste_prefix: 0,
                window: Some(128),
                legacy: false,
                bad_grant: false,
                received: 0,
                since_grant: 0,
                grants: 0,
                window_violated: false,
                executed: Vec::new(),
                resets: 0,
                unplugged: false,
                max_read: 64,
                program: Box::new(interpret),
            })),
        }
    }

    pub(crate) fn with_program(self, program: impl FnMut(&str) -> Outcome + Send + 'static) -> Self {
        self.sim.lock().program = Box::new(program);
        self
    }

    /// Raw-paste window increment; `None` refuses raw-paste with `R\x00`.
    pub(crate) fn with_window(self, window: Option<u16>) -> Self {
        self.sim.lock().window = window;
        self
    }

    /// Firmware that predates raw-paste altogether.
    pub(crate) fn legacy(self) -> Self {
        self.sim.lock().legacy = true;
        self
    }

    /// Send a garbage byte instead of the first window grant.
    pub(crate) fn with_bad_grant(self) -> Self {
        self.sim.lock().bad_grant = true;
        self
    }

    pub(crate) fn unplug(&self) {
        self.sim.lock().unplugged = true;
    }

    pub(crate) fn is_unplugged(&self) -> bool {
        self.sim.lock().unplugged
    }

    /// Programs run so far, in order.
    pub(crate) fn executed(&self) -> Vec<String> {
        self.sim.lock().executed.clone()
    }

    pub(crate) fn resets(&self) -> usize {
        self.sim.lock().resets
    }

    /// The host sent more than the window allowed at some point.
    pub(crate) fn window_violated(&self) -> bool {
        self.sim.lock().window_violated
    }

    pub(crate) fn in_raw_mode(&self) -> bool {
        matches!(self.sim.lock().mode, Mode::Raw)
    }
}

impl Transport for FakeBoard {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut sim = self.sim.lock();
        if sim.unplugged {
            return Err(unplugged());
        }
        for &b in data {
            sim.feed(b);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut sim = self.sim.lock();
        if sim.unplugged {
            return Err(unplugged());
        }
        sim.tick();
        if sim.out.is_empty() {
            drop(sim);
            thread::sleep(Duration::from_millis(1));
            return Ok(0);
        }
        let n = buf.len().min(sim.out.len()).min(sim.max_read);
        for slot in buf.iter_mut().take(n) {
            *slot = sim.out.pop_front().unwrap_or_default();
        }
        Ok(n)
    }

    fn available(&mut self) -> io::Result<usize> {
        let sim = self.sim.lock();
        if sim.unplugged {
            return Err(unplugged());
        }
        Ok(sim.out.len())
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.sim.lock().out.clear();
        Ok(())
    }
}

fn unplugged() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged")
}

impl Sim {
    fn emit(&mut self, bytes: impl AsRef<[u8]>) {
        self.out.extend(bytes.as_ref());
    }

    fn feed(&mut self, b: u8) {
        match self.mode {
            Mode::Friendly => self.feed_friendly(b),
            Mode::Raw => self.feed_raw(b),
            Mode::Paste => self.feed_paste(b),
            Mode::Running { .. } => self.feed_running(b),
        }
    }

    fn feed_friendly(&mut self, b: u8) {
        match b {
            CTRL_A => self.enter_raw(),
            CTRL_B => self.emit(format!("\r\n{BANNER}>>> ")),
            CTRL_C => {
                self.line.clear();
                self.emit("\r\n>>> ");
            }
            CTRL_D => {
                self.resets += 1;
                self.emit(format!("MPY: soft reboot\r\n{BANNER}>>> "));
            }
            b'\r' => {
                let line = String::from_utf8_lossy(&std::mem::take(&mut self.line)).into_owned();
                self.emit("\r\n");
                if !line.trim().is_empty() {
                    if let Outcome::Done { stdout, stderr } = (self.program)(&line) {
                        self.emit(stdout);
                        self.emit(stderr);
                    }
                }
                self.emit(">>> ");
            }
            other => {
                self.line.push(other);
                self.emit([other]);
            }
        }
    }

    fn enter_raw(&mut self) {
        self.code.clear();
        self.paste_prefix = 0;
        self.mode = Mode::Raw;
        self.emit(RAW_BANNER);
    }

    fn feed_raw(&mut self, b: u8) {
        if self.paste_prefix == 1 && b == b'A' {
            self.paste_prefix = 2;
            return;
        }
        if self.paste_prefix == 2 && b == CTRL_A {
            self.paste_prefix = 0;
            self.begin_paste();
            return;
        }
        self.paste_prefix = 0;
        match b {
            CTRL_A => self.enter_raw(),
            CTRL_B => {
                self.code.clear();
                self.mode = Mode::Friendly;
                self.emit(format!("\r\n{BANNER}>>> "));
            }
            CTRL_C => self.code.clear(),
            CTRL_D if self.code.iter().all(u8::is_ascii_whitespace) => {
                self.code.clear();
                self.resets += 1;
                self.emit(format!("OK\r\nMPY: soft reboot\r\n{RAW_BANNER}"));
            }
            CTRL_D => {
                self.emit("OK");
                self.execute();
            }
            CTRL_E if self.code.is_empty() => self.paste_prefix = 1,
            other => self.code.push(other),
        }
    }

    fn begin_paste(&mut self) {
        if self.legacy {
            self.emit(RAW_BANNER);
            return;
        }
        match self.window {
            None => self.emit(b"R\x00"),
            Some(w) => {
                self.emit(b"R\x01");
                self.emit(w.to_le_bytes());
                self.received = 0;
                self.since_grant = 0;
                self.grants = 0;
                self.mode = Mode::Paste;
            }
        }
    }

    fn feed_paste(&mut self, b: u8) {
        let w = usize::from(self.window.unwrap_or(1));
        if b == CTRL_C {
            self.code.clear();
            self.mode = Mode::Raw;
            return;
        }
        if b == CTRL_D {
            self.emit([CTRL_D]);
            self.mode = Mode::Raw;
            self.execute();
            return;
        }
        self.code.push(b);
        self.received += 1;
        self.since_grant += 1;
        if self.received > 2 * w + self.grants * w {
            self.window_violated = true;
        }
        if self.since_grant >= w {
            self.since_grant -= w;
            self.grants += 1;
            if self.bad_grant {
                self.emit([0x07]);
            } else {
                self.emit([0x01]);
            }
        }
    }

    fn feed_running(&mut self, b: u8) {
        if b == CTRL_C {
            self.emit([CTRL_D]);
            self.emit(TRACEBACK_INTERRUPT);
            self.emit([CTRL_D, b'>']);
            self.mode = Mode::Raw;
        } else {
            self.emit([b]);
        }
    }

    fn execute(&mut self) {
        let code = String::from_utf8_lossy(&std::mem::take(&mut self.code)).into_owned();
        self.executed.push(code.clone());
        match (self.program)(&code) {
            Outcome::Done { stdout, stderr } => {
                self.emit(stdout);
                self.emit([CTRL_D]);
                self.emit(stderr);
                self.emit([CTRL_D, b'>']);
            }
            Outcome::Forever { stdout } => {
                self.emit(stdout);
                self.mode = Mode::Running { reads_left: None };
            }
            Outcome::Slow { stdout, reads } => {
                self.emit(stdout);
                self.mode = Mode::Running { reads_left: Some(reads) };
            }
        }
    }

    /// Called once per host read, so slow programs advance with polling.
    fn tick(&mut self) {
        if let Mode::Running { reads_left: Some(left) } = self.mode {
            if left == 0 {
                self.emit([CTRL_D, CTRL_D, b'>']);
                self.mode = Mode::Raw;
            } else {
                self.mode = Mode::Running { reads_left: Some(left - 1) };
            }
        }
    }
}

/// Default program: `print('...')` lines echo their literal, `raise` fails,
/// `while True` runs until interrupted.
pub(crate) fn interpret(code: &str) -> Outcome {
    if code.contains("while True") {
        return Outcome::Forever { stdout: String::new() };
    }
    if code.contains("raise") {
        return Outcome::raises(
            "Traceback (most recent call last):\r\n  File \"<stdin>\", line 1, in <module>\r\nValueError: boom\r\n",
        );
    }
    let mut stdout = String::new();
    for line in code.lines() {
        let line = line.trim();
        if let Some(inner) = line.strip_prefix("print(").and_then(|l| l.strip_suffix(')')) {
            stdout.push_str(inner.trim_matches(|c| c == '\'' || c == '"'));
            stdout.push_str("\r\n");
        }
    }
    Outcome::stdout(stdout)
}
