use std::collections::VecDeque;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::BusPort;

/// In-memory bus port with scripted replies.
///
/// Commands written to the port are recorded; reply bytes queued with
/// [`queue_reply`] become readable afterwards. With
/// [`trickle`] enabled, at most one queued byte is visible per
/// `bytes_to_read` poll, which exercises the decoder's slow-arrival path
/// the way a sluggish device would.
///
/// [`queue_reply`]: MemoryPort::queue_reply
/// [`trickle`]: MemoryPort::trickle
#[derive(Debug, Default)]
pub struct MemoryPort {
    written: Vec<u8>,
    pending: VecDeque<u8>,
    trickle: bool,
    visible: usize,
}

impl MemoryPort {
    /// Create an empty port.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes that subsequent polls will see as received.
    pub fn queue_reply(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes.iter().copied());
    }

    /// Release queued bytes one per poll instead of all at once.
    pub fn trickle(&mut self, enabled: bool) {
        self.trickle = enabled;
    }

    /// All bytes written to the port so far, in order.
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    /// Drop the record of written bytes.
    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    /// Number of queued reply bytes not yet read.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl BusPort for MemoryPort {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.written.extend_from_slice(bytes);
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        if self.trickle {
            if self.visible < self.pending.len() {
                self.visible += 1;
            }
            Ok(self.visible)
        } else {
            Ok(self.pending.len())
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        if self.trickle {
            if self.visible == 0 {
                return Err(TransportError::NoData);
            }
            self.visible -= 1;
        }
        self.pending.pop_front().ok_or(TransportError::NoData)
    }

    fn purge(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            debug!(discarded = self.pending.len(), "purging unread bytes");
        }
        self.pending.clear();
        self.visible = 0;
        Ok(())
    }
}
