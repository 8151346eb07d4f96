use std::time::Duration;

use servobus_transport::TransportError;

/// Classified reasons a reply transaction fails.
///
/// This set is closed: every decode attempt ends in success or exactly one
/// of these. None are retried by the codec; the caller decides policy and
/// must purge the port before the next transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FailureKind {
    /// No complete frame arrived before the decode deadline elapsed.
    #[error("timed out waiting for a complete reply")]
    Timeout,

    /// The reply's device id did not match the expected id.
    #[error("reply from unexpected device id")]
    MismatchedDeviceId,

    /// The length field did not match the expected reply size.
    #[error("reply length field does not match expected reply size")]
    InvalidLength,

    /// The frame was structurally complete but its checksum did not verify.
    #[error("reply checksum mismatch")]
    InvalidChecksum,

    /// SCW only: the device answered with a NACK.
    #[error("device negatively acknowledged the command")]
    NegativeAcknowledged,

    /// SCW only: the reply opcode was neither ACK nor NACK.
    #[error("reply opcode is neither ACK nor NACK")]
    UnexpectedOpcode,
}

/// A failed decode attempt, with the time it took to fail.
///
/// Elapsed time is carried even on failure: the surrounding benchmarking
/// callers feed it into their round-trip statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{kind} after {elapsed:?}")]
pub struct ReplyError {
    /// What went wrong.
    pub kind: FailureKind,
    /// Total time from the start of the decode attempt.
    pub elapsed: Duration,
}

/// Errors returned by the polling decode loop.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Protocol-level failure, classified and timed.
    #[error(transparent)]
    Reply(#[from] ReplyError),

    /// The port itself failed while polling or reading.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl DecodeError {
    /// The failure classification, if this is a protocol-level failure.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            DecodeError::Reply(err) => Some(err.kind),
            DecodeError::Transport(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
