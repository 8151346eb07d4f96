/// Errors that can occur on a bus port.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred while talking to the port.
    #[error("port I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `read_byte` was called with no byte buffered.
    ///
    /// The contract is poll-then-read: callers must observe
    /// `bytes_to_read() > 0` before reading.
    #[error("no byte available to read")]
    NoData,

    /// The port has been closed or disconnected.
    #[error("port closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
