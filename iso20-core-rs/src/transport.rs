//! Connection seam for the V2GTP byte stream
//!
//! TCP/TLS sockets are provided by the embedding application through the
//! [`Connection`] trait. [`memory_pipe`] gives an in-process pair used by
//! the integration tests and the harness.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

/// Connection lifecycle notifications delivered to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Peer accepted, handshake may still be running
    Accepted,
    /// Bytes are available for reading
    NewData,
    /// Connection is ready for V2GTP traffic
    Open,
    Closed,
}

/// Result of a non-blocking read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResult {
    pub would_block: bool,
    pub bytes_read: usize,
}

impl ReadResult {
    pub fn data(bytes_read: usize) -> Self {
        Self { would_block: false, bytes_read }
    }

    pub fn would_block(bytes_read: usize) -> Self {
        Self { would_block: true, bytes_read }
    }
}

/// Non-blocking byte-stream connection
pub trait Connection: Send {
    /// Read up to `buf.len()` bytes without blocking
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadResult>;

    /// Write the whole buffer
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    fn close(&mut self);

    /// Public endpoint of this connection, if known
    fn endpoint(&self) -> Option<SocketAddr> {
        None
    }
}

// ============================================================================
// In-memory pipe
// ============================================================================

#[derive(Debug, Default)]
struct PipeState {
    to_evse: VecDeque<u8>,
    to_ev: VecDeque<u8>,
    closed: bool,
}

/// EVSE end of an in-memory connection
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    state: Arc<Mutex<PipeState>>,
}

/// EV end of an in-memory connection
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    state: Arc<Mutex<PipeState>>,
}

/// Create a connected EVSE/EV pair
pub fn memory_pipe() -> (MemoryConnection, MemoryPeer) {
    let state = Arc::new(Mutex::new(PipeState::default()));
    (MemoryConnection { state: state.clone() }, MemoryPeer { state })
}

impl Connection for MemoryConnection {
    fn read(&mut self, buf: &mut [u8]) -> Result<ReadResult> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::NotConnected);
        }

        let n = buf.len().min(state.to_evse.len());
        for (slot, byte) in buf.iter_mut().zip(state.to_evse.drain(..n)) {
            *slot = byte;
        }

        if n < buf.len() {
            Ok(ReadResult::would_block(n))
        } else {
            Ok(ReadResult::data(n))
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::NotConnected);
        }
        state.to_ev.extend(buf.iter().copied());
        Ok(())
    }

    fn close(&mut self) {
        debug!("Memory connection closed by EVSE");
        self.state.lock().closed = true;
    }
}

impl MemoryPeer {
    /// Queue bytes for the EVSE to read
    pub fn send(&self, bytes: &[u8]) {
        self.state.lock().to_evse.extend(bytes.iter().copied());
    }

    /// Take everything the EVSE has written so far
    pub fn take_received(&self) -> Vec<u8> {
        self.state.lock().to_ev.drain(..).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
