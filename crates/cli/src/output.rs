// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rendering agent replies for the terminal.

use std::io::{self, Write};

use clap::ValueEnum;
use mpr_core::SessionView;
use mpr_wire::{AgentStatus, FileEntry, Reply};
use serde::Serialize;

use crate::color;

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Renders as JSON when `format` is `Json`, otherwise calls `text_fn`.
pub fn format_or_json<T: Serialize>(
    format: OutputFormat,
    data: &T,
    text_fn: impl FnOnce(),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Text => text_fn(),
    }
    Ok(())
}

pub fn print_reply(reply: &Reply, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(reply)?),
        OutputFormat::Text => write_reply(&mut io::stdout().lock(), reply)?,
    }
    Ok(())
}

pub fn write_reply(out: &mut impl Write, reply: &Reply) -> io::Result<()> {
    match reply {
        Reply::Pong { version } => writeln!(out, "mprd {version}"),
        Reply::Status(status) => write_status(out, status),
        Reply::Ports { ports } => {
            if ports.is_empty() {
                return writeln!(out, "No serial ports found");
            }
            let width = ports.iter().map(|p| p.port.as_str().len()).max().unwrap_or(0);
            for entry in ports {
                let mark = if entry.connected { "*" } else { " " };
                let port = format!("{:<width$}", entry.port.as_str());
                writeln!(out, "{mark} {}  {}", color::literal(&port), color::muted(&entry.description))?;
            }
            Ok(())
        }
        Reply::ShuttingDown => writeln!(out, "Agent stopping"),
        Reply::Setup(setup) => writeln!(
            out,
            "Connected {}: MicroPython {} on {} ({})",
            setup.port, setup.info.version, setup.info.device, setup.info.core
        ),
        Reply::Foreground { port } => writeln!(out, "Foreground: {port}"),
        Reply::Disconnected { ports } => {
            for port in ports {
                writeln!(out, "Disconnected {port}")?;
            }
            Ok(())
        }
        Reply::Info { port, info, root } => {
            writeln!(out, "port:         {port}")?;
            writeln!(out, "version:      {}", info.version)?;
            writeln!(out, "device:       {}", info.device)?;
            writeln!(out, "core:         {}", info.core)?;
            writeln!(out, "manufacturer: {}", info.manufacturer)?;
            writeln!(out, "root:         {root}")
        }
        Reply::Entries { entries } => {
            for entry in entries {
                write_entry(out, entry)?;
            }
            Ok(())
        }
        Reply::Stat(entry) => write_entry(out, entry),
        Reply::Mem(mem) => writeln!(
            out,
            "free: {}  alloc: {}  total: {}",
            format_size(mem.free),
            format_size(mem.alloc),
            format_size(mem.total)
        ),
        Reply::Df(df) => writeln!(
            out,
            "total: {}  used: {}  free: {}",
            format_size(df.total),
            format_size(df.used),
            format_size(df.free)
        ),
        Reply::Transferred { bytes } => writeln!(out, "{bytes} bytes"),
        Reply::Files { files, bytes } => {
            let noun = if *files == 1 { "file" } else { "files" };
            writeln!(out, "{files} {noun}, {}", format_size(*bytes))
        }
        Reply::Detached { port } => {
            writeln!(out, "Running detached on {port} (`mpr stop` interrupts it)")
        }
    }
}

fn write_entry(out: &mut impl Write, entry: &FileEntry) -> io::Result<()> {
    if entry.is_dir {
        writeln!(out, "{:>8}  {}/", "", entry.path.trim_end_matches('/'))
    } else {
        writeln!(out, "{:>8}  {}", entry.size, entry.path)
    }
}

fn write_status(out: &mut impl Write, status: &AgentStatus) -> io::Result<()> {
    writeln!(out, "Agent: running (pid {}, up {})", status.pid, format_uptime(status.uptime_secs))?;
    writeln!(out, "Version: {}", status.version)?;

    writeln!(out, "\n{}", color::header("Connections"))?;
    if status.connections.is_empty() {
        writeln!(out, "  none")?;
    }
    for conn in &status.connections {
        let state = if conn.dead {
            "dead".to_string()
        } else if let Some(sid) = &conn.leased_by {
            format!("leased by {sid}")
        } else if let Some(verb) = &conn.busy {
            format!("busy ({verb})")
        } else {
            "idle".to_string()
        };
        writeln!(
            out,
            "  {}  {} {} ({})  {}",
            color::literal(conn.port.as_str()),
            conn.info.device,
            conn.info.version,
            conn.info.core,
            color::muted(&state)
        )?;
    }

    if let Some(session) = &status.session {
        writeln!(out, "\n{}", color::header("This session"))?;
        write_session(out, session)?;
    }
    let others: Vec<_> =
        status.sessions.iter().filter(|s| Some(&s.sid) != status.session.as_ref().map(|v| &v.sid)).collect();
    if !others.is_empty() {
        writeln!(out, "\n{}", color::header("Other sessions"))?;
        for session in others {
            write_session(out, session)?;
        }
    }
    Ok(())
}

fn write_session(out: &mut impl Write, session: &SessionView) -> io::Result<()> {
    let fg = session.fg.as_ref().map_or("-", |p| p.as_str());
    let bg: Vec<&str> = session.bg.iter().map(|p| p.as_str()).collect();
    write!(out, "  {}  fg: {}", session.sid, color::literal(fg))?;
    if !bg.is_empty() {
        write!(out, "  bg: {}", bg.join(", "))?;
    }
    writeln!(out)
}

pub fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{hours}h {mins}m {secs}s")
    } else if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Human-readable byte count in binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "K", "M", "G"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}B")
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
