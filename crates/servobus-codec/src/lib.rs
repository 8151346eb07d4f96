//! Packet builders and reply decoder for two sibling servo-bus protocols.
//!
//! Servo controllers on a shared half-duplex serial bus speak one of two
//! framed binary protocols, DYN1 and SCW. Both use the same outer layout:
//!
//! ```text
//! ┌──────────────┬────────┬────────┬──────────┬────────────────┬──────────┐
//! │ 0xFF 0xFF    │ id     │ len    │ opcode   │ params          │ checksum │
//! │ markers (2B) │ (1B)   │ (1B)   │ (1B)     │ (len-2 bytes)   │ (1B)     │
//! └──────────────┴────────┴────────┴──────────┴────────────────┴──────────┘
//! ```
//!
//! They differ in instruction set, checksum salt, and reply-opcode rules;
//! those differences live in the [`ProtocolVariant`] trait, implemented by
//! [`Dyn1`] and [`Scw`]. One packet builder and one decoder state machine
//! serve both.
//!
//! The decoder consumes the live byte stream one byte at a time, resyncs on
//! garbage, and classifies every failure mode (timeout, id mismatch, length
//! mismatch, checksum mismatch, NACK, unexpected opcode), reporting elapsed
//! time in every outcome so callers can build latency statistics.
//!
//! [`Dyn1`]: dyn1::Dyn1
//! [`Scw`]: scw::Scw

pub mod checksum;
pub mod decoder;
pub mod dyn1;
pub mod error;
pub mod frame;
pub mod reply;
pub mod scw;
pub mod variant;

pub use checksum::checksum;
pub use decoder::{read_reply, DecoderState, ReplyDecoder, Step};
pub use error::{DecodeError, FailureKind, ReplyError, Result};
pub use frame::{
    build_frame, encode_frame, extract_params, MARKER, MAX_PARAMS, MIN_FRAME_SIZE, PARAMS_OFFSET,
};
pub use reply::Reply;
pub use variant::{OpcodeClass, ProtocolVariant};
