use crate::error::Result;

/// One endpoint of a shared half-duplex servo bus.
///
/// The reply decoder busy-polls `bytes_to_read` instead of blocking, because
/// round-trip latency is measured at microsecond granularity and a blocking
/// read would add scheduling jitter. Implementations must keep all four
/// operations non-blocking.
pub trait BusPort {
    /// Transmit a complete command packet.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Number of received bytes buffered and ready to read. Non-blocking.
    fn bytes_to_read(&mut self) -> Result<usize>;

    /// Read one buffered byte.
    ///
    /// Only valid after `bytes_to_read` reported at least one byte;
    /// otherwise returns [`TransportError::NoData`].
    ///
    /// [`TransportError::NoData`]: crate::TransportError::NoData
    fn read_byte(&mut self) -> Result<u8>;

    /// Discard any buffered unread bytes.
    ///
    /// Callers purge before each transaction and after any failed one, so a
    /// late reply from a previous command cannot corrupt the next decode.
    fn purge(&mut self) -> Result<()>;
}

impl<P: BusPort + ?Sized> BusPort for &mut P {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        (**self).bytes_to_read()
    }

    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn purge(&mut self) -> Result<()> {
        (**self).purge()
    }
}
