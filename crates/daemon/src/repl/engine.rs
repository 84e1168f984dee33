// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::thread;
use std::time::{Duration, Instant};

use mpr_core::{parse_banner, BoardInfo};
use tracing::{debug, warn};

use super::{
    Capture, Cancel, Console, ConsoleInput, ReplError, Transport, CTRL_A, CTRL_B, CTRL_C, CTRL_D,
};

const RAW_BANNER: &[u8] = b"raw REPL; CTRL-B to exit\r\n";
const FRIENDLY_PROMPT: &[u8] = b">>> ";
const SOFT_REBOOT: &[u8] = b"soft reboot\r\n";

/// Standard raw mode has no flow control; the board's line buffer copes
/// with this much at a time.
const STANDARD_CHUNK: usize = 256;
const STANDARD_CHUNK_PAUSE: Duration = Duration::from_millis(10);

const ENTER_ATTEMPTS: usize = 2;

/// Where the board's REPL is, as far as the engine knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplState {
    /// Friendly `>>>` prompt
    Interactive,
    /// Raw REPL, at the `>` prompt
    MachineIdle,
    /// Code is running and producing output
    Streaming,
    /// Code is being sent
    Transfer,
    /// Lost track; the next operation re-enters raw mode
    Unknown,
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Waiting for a prompt, banner or acknowledgement
    pub prompt: Duration,
    /// Output limit for scripts the agent runs itself
    pub command: Duration,
    /// How long an interrupted program gets to unwind
    pub interrupt_grace: Duration,
    /// Pause after Ctrl-C before stale input is flushed
    pub settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            prompt: Duration::from_secs(5),
            command: Duration::from_secs(30),
            interrupt_grace: Duration::from_secs(2),
            settle: Duration::from_millis(50),
        }
    }
}

/// Protocol driver for one board.
pub struct ReplEngine<T> {
    transport: T,
    state: ReplState,
    /// Raw-paste support, learned on first use
    raw_paste: Option<bool>,
    /// Bytes read from the board but not yet consumed
    pending: Vec<u8>,
    timeouts: Timeouts,
}

impl<T: Transport> ReplEngine<T> {
    pub fn new(transport: T) -> Self {
        Self::with_timeouts(transport, Timeouts::default())
    }

    pub fn with_timeouts(transport: T, timeouts: Timeouts) -> Self {
        Self { transport, state: ReplState::Unknown, raw_paste: None, pending: Vec::new(), timeouts }
    }

    pub fn state(&self) -> ReplState {
        self.state
    }

    pub fn raw_paste(&self) -> Option<bool> {
        self.raw_paste
    }

    pub(super) fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Switch to the raw REPL, optionally soft-resetting once there.
    pub fn enter_raw(&mut self, soft_reset: bool) -> Result<(), ReplError> {
        for attempt in 1..=ENTER_ATTEMPTS {
            match self.try_enter_raw(soft_reset) {
                Ok(()) => {
                    self.state = ReplState::MachineIdle;
                    return Ok(());
                }
                Err(e @ ReplError::DeviceGone(_)) => {
                    self.state = ReplState::Unknown;
                    return Err(e);
                }
                Err(e) => {
                    debug!(attempt, error = %e, "raw REPL entry failed");
                    self.write(&[b'\r', CTRL_B])?;
                }
            }
        }
        self.state = ReplState::Unknown;
        Err(ReplError::EnterRaw)
    }

    fn try_enter_raw(&mut self, soft_reset: bool) -> Result<(), ReplError> {
        self.write(&[b'\r', CTRL_C, CTRL_C])?;
        thread::sleep(self.timeouts.settle);
        self.flush_input()?;

        self.write(&[b'\r', CTRL_A])?;
        self.read_until(RAW_BANNER, self.timeouts.prompt, "raw REPL banner")?;
        if soft_reset {
            self.write(&[CTRL_D])?;
            self.read_until(SOFT_REBOOT, self.timeouts.prompt, "soft reboot")?;
            self.read_until(RAW_BANNER, self.timeouts.prompt, "raw REPL banner")?;
        }
        self.read_until(b">", self.timeouts.prompt, "raw prompt")?;
        Ok(())
    }

    /// Return to the friendly REPL.
    pub fn exit_raw(&mut self) -> Result<(), ReplError> {
        self.write(&[b'\r', CTRL_B])?;
        match self.read_until(FRIENDLY_PROMPT, self.timeouts.prompt, "friendly prompt") {
            Ok(_) => {}
            Err(ReplError::Timeout { .. }) => warn!("no friendly prompt after leaving raw mode"),
            Err(e) => return Err(e),
        }
        self.state = ReplState::Interactive;
        Ok(())
    }

    fn ensure_raw(&mut self) -> Result<(), ReplError> {
        if self.state != ReplState::MachineIdle {
            self.enter_raw(false)?;
        }
        Ok(())
    }

    /// Run `code` and stream its output to `console` until it finishes.
    ///
    /// A traceback on the board comes back as [`ReplError::Remote`].
    /// `limit` bounds the silence between pieces of output; `None` waits as
    /// long as the program runs.
    pub fn exec(
        &mut self,
        code: &[u8],
        console: &mut dyn Console,
        limit: Option<Duration>,
    ) -> Result<(), ReplError> {
        self.start(code)?;
        let stderr = self.follow(console, limit)?;
        if stderr.is_empty() {
            Ok(())
        } else {
            Err(ReplError::Remote(stderr))
        }
    }

    /// Run a script the agent wrote and collect what it prints.
    pub fn exec_capture(&mut self, code: &str, cancel: &Cancel) -> Result<Vec<u8>, ReplError> {
        let mut capture = Capture::new(cancel);
        self.exec(code.as_bytes(), &mut capture, Some(self.timeouts.command))?;
        Ok(capture.into_bytes())
    }

    /// Send `code` and leave it running; pair with [`ReplEngine::follow`].
    pub fn start(&mut self, code: &[u8]) -> Result<(), ReplError> {
        self.ensure_raw()?;
        self.state = ReplState::Transfer;
        if let Err(e) = self.send_code(code) {
            self.resync(&e);
            return Err(e);
        }
        self.state = ReplState::Streaming;
        Ok(())
    }

    fn send_code(&mut self, code: &[u8]) -> Result<(), ReplError> {
        if self.raw_paste != Some(false) {
            let accepted = self.send_raw_paste(code)?;
            self.raw_paste = Some(accepted);
            if accepted {
                return Ok(());
            }
            debug!("raw-paste not supported, using standard raw mode");
        }
        self.send_standard(code)
    }

    fn send_standard(&mut self, code: &[u8]) -> Result<(), ReplError> {
        for chunk in code.chunks(STANDARD_CHUNK) {
            self.write(chunk)?;
            thread::sleep(STANDARD_CHUNK_PAUSE);
        }
        self.write(&[CTRL_D])?;
        let ack = self.read_exact(2, self.timeouts.prompt, "OK")?;
        if ack != b"OK" {
            return Err(ReplError::Desync(format!(
                "expected OK, got {:?}",
                String::from_utf8_lossy(&ack)
            )));
        }
        Ok(())
    }

    /// Forward program output until the board reports completion.
    ///
    /// Returns the program's stderr. Keyboard input from the console is
    /// written through while the program runs.
    pub fn follow(
        &mut self,
        console: &mut dyn Console,
        limit: Option<Duration>,
    ) -> Result<String, ReplError> {
        let mut deadline = limit.map(|d| Instant::now() + d);
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == CTRL_D) {
                let out: Vec<u8> = self.pending.drain(..=pos).collect();
                console.stdout(&out[..pos]);
                break;
            }
            if !self.pending.is_empty() {
                console.stdout(&self.pending);
                self.pending.clear();
                deadline = limit.map(|d| Instant::now() + d);
            }
            if console.cancelled() {
                return self.abort_running();
            }
            match console.poll_input() {
                ConsoleInput::None => {}
                ConsoleInput::Data(bytes) => self.write(&bytes)?,
                ConsoleInput::Interrupt | ConsoleInput::Exit => return self.abort_running(),
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                self.resync_quietly();
                return Err(ReplError::Timeout { waiting_for: "program output" });
            }
            self.fill()?;
        }
        let stderr = self.read_until(&[CTRL_D], self.timeouts.prompt, "end of error output")?;
        self.read_until(b">", self.timeouts.prompt, "raw prompt")?;
        self.state = ReplState::MachineIdle;
        Ok(String::from_utf8_lossy(&stderr).into_owned())
    }

    /// Ctrl-C the running program and throw away whatever it still prints.
    fn abort_running(&mut self) -> Result<String, ReplError> {
        self.write(&[CTRL_C])?;
        let grace = self.timeouts.interrupt_grace;
        let unwound = self
            .read_until(&[CTRL_D], grace, "end of output")
            .and_then(|_| self.read_until(&[CTRL_D], grace, "end of error output"))
            .and_then(|_| self.read_until(b">", grace, "raw prompt"));
        match unwound {
            Ok(_) => self.state = ReplState::MachineIdle,
            Err(e @ ReplError::DeviceGone(_)) => return Err(e),
            Err(_) => {
                self.pending.clear();
                self.state = ReplState::Unknown;
                self.enter_raw(false)?;
            }
        }
        self.pending.clear();
        Err(ReplError::Interrupted)
    }

    /// Send Ctrl-C and drain the board back to an idle raw prompt.
    pub fn interrupt(&mut self) -> Result<(), ReplError> {
        self.write(&[CTRL_C])?;
        thread::sleep(self.timeouts.settle);
        self.flush_input()?;
        self.state = ReplState::Unknown;
        self.enter_raw(false)
    }

    /// Soft reset from the raw prompt.
    pub fn soft_reset(&mut self) -> Result<(), ReplError> {
        self.enter_raw(true)
    }

    /// Identify the board from its banner, falling back to `os.uname()`.
    pub fn board_info(&mut self, cancel: &Cancel) -> Result<BoardInfo, ReplError> {
        match self.read_banner() {
            Ok(info) => Ok(info),
            Err(e @ ReplError::DeviceGone(_)) => Err(e),
            Err(e) => {
                debug!(error = %e, "banner not usable, asking os.uname()");
                self.uname_info(cancel)
            }
        }
    }

    fn read_banner(&mut self) -> Result<BoardInfo, ReplError> {
        self.write(&[b'\r', CTRL_C])?;
        thread::sleep(self.timeouts.settle);
        self.flush_input()?;
        self.write(&[b'\r', CTRL_B])?;
        self.state = ReplState::Interactive;

        // A stray prompt from the carriage return can come before the banner.
        for _ in 0..3 {
            let text = self.read_until(FRIENDLY_PROMPT, self.timeouts.prompt, "banner")?;
            let text = String::from_utf8_lossy(&text);
            if text.contains("MicroPython") {
                return parse_banner(&text)
                    .ok_or_else(|| ReplError::Desync(format!("unrecognised banner {text:?}")));
            }
        }
        Err(ReplError::Desync("no banner".to_string()))
    }

    fn uname_info(&mut self, cancel: &Cancel) -> Result<BoardInfo, ReplError> {
        let out = self.exec_capture(
            "import os\nu = os.uname()\nprint('MicroPython v' + u.release + '; ' + u.machine)\n",
            cancel,
        )?;
        let text = String::from_utf8_lossy(&out);
        parse_banner(&text).ok_or_else(|| ReplError::Desync(format!("unrecognised uname {text:?}")))
    }

    /// Hand the friendly REPL to an interactive client.
    ///
    /// Bytes flow both ways until the console reports `Exit` or is cancelled.
    pub fn bridge(&mut self, console: &mut dyn Console) -> Result<(), ReplError> {
        if self.state != ReplState::Interactive {
            // Leaving raw mode prints the banner and prompt for the user.
            self.write(&[b'\r', CTRL_B])?;
            self.state = ReplState::Interactive;
        }
        loop {
            if !self.pending.is_empty() {
                console.stdout(&self.pending);
                self.pending.clear();
            }
            if console.cancelled() {
                break;
            }
            match console.poll_input() {
                ConsoleInput::None => {}
                ConsoleInput::Data(bytes) => self.write(&bytes)?,
                ConsoleInput::Interrupt => self.write(&[CTRL_C])?,
                ConsoleInput::Exit => break,
            }
            self.fill()?;
        }
        Ok(())
    }

    /// After a failed transfer, try to get back to a clean raw prompt.
    fn resync(&mut self, cause: &ReplError) {
        if cause.is_device_gone() {
            self.state = ReplState::Unknown;
            return;
        }
        self.resync_quietly();
    }

    fn resync_quietly(&mut self) {
        self.pending.clear();
        self.state = ReplState::Unknown;
        if let Err(e) = self.enter_raw(false) {
            warn!(error = %e, "could not resynchronise with board");
        }
    }

    pub(super) fn write(&mut self, data: &[u8]) -> Result<(), ReplError> {
        self.transport.write_all(data).map_err(ReplError::DeviceGone)
    }

    /// Pull whatever arrives within one poll interval into `pending`.
    fn fill(&mut self) -> Result<usize, ReplError> {
        let mut buf = [0u8; 512];
        let n = self.transport.read(&mut buf).map_err(ReplError::DeviceGone)?;
        self.pending.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush_input(&mut self) -> Result<(), ReplError> {
        self.pending.clear();
        self.transport.discard_input().map_err(ReplError::DeviceGone)
    }

    pub(super) fn has_input(&mut self) -> Result<bool, ReplError> {
        if !self.pending.is_empty() {
            return Ok(true);
        }
        Ok(self.transport.available().map_err(ReplError::DeviceGone)? > 0)
    }

    pub(super) fn read_byte(
        &mut self,
        timeout: Duration,
        waiting_for: &'static str,
    ) -> Result<u8, ReplError> {
        let bytes = self.read_exact(1, timeout, waiting_for)?;
        Ok(bytes[0])
    }

    pub(super) fn read_exact(
        &mut self,
        n: usize,
        timeout: Duration,
        waiting_for: &'static str,
    ) -> Result<Vec<u8>, ReplError> {
        let deadline = Instant::now() + timeout;
        while self.pending.len() < n {
            if Instant::now() >= deadline {
                return Err(ReplError::Timeout { waiting_for });
            }
            self.fill()?;
        }
        Ok(self.pending.drain(..n).collect())
    }

    /// Consume up to and including `marker`, returning what came before it.
    pub(super) fn read_until(
        &mut self,
        marker: &[u8],
        timeout: Duration,
        waiting_for: &'static str,
    ) -> Result<Vec<u8>, ReplError> {
        let deadline = Instant::now() + timeout;
        let mut scanned = 0;
        loop {
            if let Some(pos) = find(&self.pending[scanned..], marker).map(|p| p + scanned) {
                let mut head: Vec<u8> = self.pending.drain(..pos + marker.len()).collect();
                head.truncate(pos);
                return Ok(head);
            }
            scanned = self.pending.len().saturating_sub(marker.len() - 1);
            if Instant::now() >= deadline {
                return Err(ReplError::Timeout { waiting_for });
            }
            self.fill()?;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
