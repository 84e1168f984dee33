// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Byte transport to a board.

use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

use mpr_core::Port;
use mpr_wire::PortEntry;
use serialport::{ClearBuffer, SerialPortType};
use thiserror::Error;

pub const BAUD_RATE: u32 = 115_200;

/// How long a single read waits before reporting that nothing arrived.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Bidirectional byte stream to a board.
///
/// Any error other than a read timeout means the device is gone.
pub trait Transport: Send {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read what the board has sent. `Ok(0)` means nothing arrived within
    /// [`POLL_INTERVAL`].
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Bytes that can be read without waiting.
    fn available(&mut self) -> io::Result<usize>;

    /// Drop everything buffered on the receive side.
    fn discard_input(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_all(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn available(&mut self) -> io::Result<usize> {
        (**self).available()
    }

    fn discard_input(&mut self) -> io::Result<()> {
        (**self).discard_input()
    }
}

/// Why a port could not be opened.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("{0}: no such device")]
    NotFound(Port),

    #[error("{0}: port is held by another program")]
    Busy(Port),

    #[error("{port}: {message}")]
    Other { port: Port, message: String },
}

/// A USB serial port opened exclusively at [`BAUD_RATE`].
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn open(port: &Port) -> Result<Self, OpenError> {
        let name = port.normalized();
        if name.as_str().starts_with('/') && !Path::new(name.as_str()).exists() {
            return Err(OpenError::NotFound(port.clone()));
        }
        let inner = serialport::new(name.as_str(), BAUD_RATE)
            .timeout(POLL_INTERVAL)
            .open()
            .map_err(|e| classify_open_error(port, e))?;
        Ok(Self { port: inner })
    }
}

fn classify_open_error(port: &Port, err: serialport::Error) -> OpenError {
    let text = err.description.to_lowercase();
    match err.kind() {
        serialport::ErrorKind::NoDevice | serialport::ErrorKind::Io(io::ErrorKind::NotFound) => {
            OpenError::NotFound(port.clone())
        }
        _ if text.contains("busy") || text.contains("access is denied") || text.contains("in use") => {
            OpenError::Busy(port.clone())
        }
        _ => OpenError::Other { port: port.clone(), message: err.description },
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn available(&mut self) -> io::Result<usize> {
        self.port.bytes_to_read().map(|n| n as usize).map_err(io::Error::from)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// USB serial ports the OS currently exposes.
pub fn list_serial_ports() -> io::Result<Vec<PortEntry>> {
    let ports = serialport::available_ports().map_err(io::Error::from)?;
    let mut entries: Vec<PortEntry> = ports
        .into_iter()
        .filter_map(|p| {
            let description = match p.port_type {
                SerialPortType::UsbPort(usb) => {
                    let product = usb.product.or(usb.manufacturer).unwrap_or_default();
                    format!("{:04x}:{:04x} {}", usb.vid, usb.pid, product).trim_end().to_string()
                }
                _ if looks_like_usb_serial(&p.port_name) => String::new(),
                _ => return None,
            };
            Some(PortEntry { port: Port::new(p.port_name), description, connected: false })
        })
        .collect();
    entries.sort_by(|a, b| a.port.cmp(&b.port));
    Ok(entries)
}

fn looks_like_usb_serial(name: &str) -> bool {
    ["ttyACM", "ttyUSB", "cu.usbmodem", "tty.usbmodem"].iter().any(|p| name.contains(p))
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
