//! Half-duplex serial bus port abstraction.
//!
//! Servo controllers share one half-duplex bus: a command goes out, a reply
//! trickles back on the same wire. The codec only needs four things from the
//! port, captured by the [`BusPort`] trait:
//! - write a command packet
//! - ask how many bytes are buffered, without blocking
//! - read one byte that is already known to be buffered
//! - purge stale bytes before the next transaction
//!
//! This is the lowest layer of servobus. Everything else builds on top of
//! [`BusPort`]. A concrete serial driver is supplied by the embedding
//! application; [`MemoryPort`] covers tests and simulation.

pub mod error;
pub mod mem;
pub mod traits;

pub use error::{Result, TransportError};
pub use mem::MemoryPort;
pub use traits::BusPort;
