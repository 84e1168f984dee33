// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use mpr_core::{ErrorCode, ErrorReport, Port};
use mpr_wire::PortEntry;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

use super::Connection;
use crate::repl::{list_serial_ports, OpenError, ReplError, SerialTransport, Timeouts, Transport};

/// Boards one agent will hold open at once.
pub const MAX_CONNECTIONS: usize = 10;

/// Opens ports by name. The agent uses [`SerialOpener`]; tests plug in
/// simulated boards.
pub trait PortOpener: Send + Sync {
    fn open(&self, port: &Port) -> Result<Box<dyn Transport>, OpenError>;

    fn list(&self) -> io::Result<Vec<PortEntry>>;
}

pub struct SerialOpener;

impl PortOpener for SerialOpener {
    fn open(&self, port: &Port) -> Result<Box<dyn Transport>, OpenError> {
        Ok(Box::new(SerialTransport::open(port)?))
    }

    fn list(&self) -> io::Result<Vec<PortEntry>> {
        list_serial_ports()
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error("{port}: board did not answer: {source}")]
    Handshake {
        port: Port,
        #[source]
        source: ReplError,
    },

    #[error("already connected to {0} boards")]
    TooMany(usize),

    #[error("opening the port failed: {0}")]
    Task(String),
}

impl ConnectError {
    pub fn report(&self) -> ErrorReport {
        let code = match self {
            ConnectError::Open(OpenError::NotFound(_)) => ErrorCode::DeviceNotFound,
            ConnectError::Open(OpenError::Busy(_)) => ErrorCode::DeviceBusy,
            ConnectError::Open(OpenError::Other { .. }) => ErrorCode::DeviceNotFound,
            ConnectError::Handshake { source, .. } if source.is_device_gone() => {
                ErrorCode::DeviceNotFound
            }
            ConnectError::Handshake { .. } => ErrorCode::ProtocolTimeout,
            ConnectError::TooMany(_) => ErrorCode::TooManyConnections,
            ConnectError::Task(_) => ErrorCode::AgentInternal,
        };
        ErrorReport::new(code, self.to_string())
    }
}

/// Open connections, keyed by normalized port name.
pub struct ConnectionTable {
    conns: Mutex<BTreeMap<Port, Arc<Connection>>>,
    opener: Arc<dyn PortOpener>,
    /// Serializes opens so two requests never race to open one port
    opening: tokio::sync::Mutex<()>,
    timeouts: Timeouts,
    max: usize,
}

impl ConnectionTable {
    pub fn new(opener: Arc<dyn PortOpener>, timeouts: Timeouts) -> Self {
        Self {
            conns: Mutex::new(BTreeMap::new()),
            opener,
            opening: tokio::sync::Mutex::new(()),
            timeouts,
            max: MAX_CONNECTIONS,
        }
    }

    pub fn with_limit(mut self, max: usize) -> Self {
        self.max = max;
        self
    }

    /// Live connection for `port`. Dead connections are dropped on sight.
    pub fn get(&self, port: &Port) -> Option<Arc<Connection>> {
        let key = port.normalized();
        let mut conns = self.conns.lock();
        match conns.get(&key) {
            Some(conn) if conn.is_dead() => {
                conns.remove(&key);
                None
            }
            Some(conn) => Some(Arc::clone(conn)),
            None => None,
        }
    }

    /// Existing connection, or open one.
    pub async fn get_or_open(&self, port: &Port) -> Result<Arc<Connection>, ConnectError> {
        if let Some(conn) = self.get(port) {
            return Ok(conn);
        }
        let _gate = self.opening.lock().await;
        if let Some(conn) = self.get(port) {
            return Ok(conn);
        }
        if self.len() >= self.max {
            return Err(ConnectError::TooMany(self.max));
        }

        let key = port.normalized();
        let opener = Arc::clone(&self.opener);
        let target = key.clone();
        let transport = tokio::task::spawn_blocking(move || opener.open(&target))
            .await
            .map_err(|e| ConnectError::Task(e.to_string()))??;
        let conn = Connection::open(key.clone(), transport, self.timeouts)
            .await
            .map_err(|source| ConnectError::Handshake { port: key.clone(), source })?;
        info!(
            port = %key,
            core = %conn.info().core,
            version = %conn.info().version,
            "connected"
        );

        let conn = Arc::new(conn);
        self.conns.lock().insert(key, Arc::clone(&conn));
        Ok(conn)
    }

    pub fn remove(&self, port: &Port) -> Option<Arc<Connection>> {
        self.conns.lock().remove(&port.normalized())
    }

    /// Take every connection out of the table.
    pub fn drain(&self) -> Vec<Arc<Connection>> {
        std::mem::take(&mut *self.conns.lock()).into_values().collect()
    }

    pub fn list(&self) -> Vec<Arc<Connection>> {
        self.conns.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.conns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.lock().is_empty()
    }

    /// Ports the OS exposes, flagged when the agent holds them.
    pub fn available_ports(&self) -> io::Result<Vec<PortEntry>> {
        let mut ports = self.opener.list()?;
        let conns = self.conns.lock();
        for entry in &mut ports {
            entry.connected = conns.contains_key(&entry.port.normalized());
        }
        Ok(ports)
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
