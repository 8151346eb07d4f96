use servobus_codec::{DecodeError, FailureKind};
use servobus_transport::TransportError;
use thiserror::Error;

/// Errors surfaced by bus transactions.
#[derive(Debug, Error)]
pub enum BusError {
    /// The reply could not be decoded, or the port failed mid-decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The port failed outside of decoding (transmit or purge).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A bulk read broke down at one of its per-device replies. Replies
    /// arrive strictly in request order, so every entry after the named
    /// device is lost too.
    #[error("bulk read failed at device {device_id}: {source}")]
    BulkRead {
        device_id: u8,
        #[source]
        source: DecodeError,
    },
}

impl BusError {
    /// The protocol-level failure classification, when there is one.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Decode(err) | Self::BulkRead { source: err, .. } => err.kind(),
            Self::Transport(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BusError>;
