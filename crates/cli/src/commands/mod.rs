// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod agent;
pub mod board;
pub mod repl;
pub mod session;

use std::io::Write;

use anyhow::Result;
use mpr_core::{exit_code, ErrorReport, Port, SessionId};
use mpr_wire::{Frame, Reply, Request, Verb};

use crate::client::AgentClient;
use crate::exit_error::ExitError;
use crate::output::OutputFormat;

/// Everything a board or session command needs to build its request.
pub struct Invocation {
    pub client: AgentClient,
    pub sid: SessionId,
    /// `--port`, if given
    pub port: Option<Port>,
    /// Default from the enclosing `.mpr.toml`
    pub default_port: Option<Port>,
    pub wait: bool,
    pub format: OutputFormat,
}

impl Invocation {
    pub fn request(&self, verb: Verb) -> Request {
        Request::new(self.sid.clone(), verb)
            .port(self.port.clone())
            .default_port(self.default_port.clone())
            .wait(self.wait)
    }

    /// Send one request, render streamed output, and return the reply.
    ///
    /// Ctrl-C drops the connection, which interrupts the board.
    pub async fn call(&self, request: Request) -> Result<Option<Reply>> {
        let mut exchange =
            self.client.open(&request, true).await.map_err(|e| ExitError::from(e.report()))?;
        let mut tally = Tally::default();
        loop {
            let frame = tokio::select! {
                frame = exchange.next_frame() => frame.map_err(|e| ExitError::from(e.report()))?,
                _ = tokio::signal::ctrl_c() => {
                    return Err(ExitError::new(exit_code::INTERRUPTED, "interrupted").into());
                }
            };
            if let Some(done) = tally.apply(frame, &mut std::io::stdout(), &mut std::io::stderr()) {
                return Ok(done?);
            }
        }
    }

    /// `call`, then print whatever reply came back.
    pub async fn call_and_print(&self, verb: Verb) -> Result<()> {
        let request = self.request(verb).streaming(true);
        if let Some(reply) = self.call(request).await? {
            crate::output::print_reply(&reply, self.format)?;
        }
        Ok(())
    }
}

/// Running state of one response stream.
#[derive(Default)]
pub struct Tally {
    error: Option<ErrorReport>,
}

impl Tally {
    /// Render one frame. Returns the outcome once the final status arrives.
    pub fn apply(
        &mut self,
        frame: Frame,
        out: &mut impl Write,
        err: &mut impl Write,
    ) -> Option<Result<Option<Reply>, ExitError>> {
        match frame {
            Frame::Stdout(text) => {
                let _ = out.write_all(text.as_bytes());
                let _ = out.flush();
                None
            }
            Frame::Stderr(text) => {
                let _ = err.write_all(text.as_bytes());
                let _ = err.flush();
                None
            }
            Frame::Error(report) => {
                self.error = Some(report);
                None
            }
            Frame::Status(status) if status.success() => Some(Ok(status.reply)),
            Frame::Status(status) => Some(Err(match self.error.take() {
                Some(report) => ExitError { code: status.exit_code, ..ExitError::from(report) },
                None => ExitError::silent(status.exit_code),
            })),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
