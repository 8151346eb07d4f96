//! Transaction-level client for DYN1 and SCW servo buses.
//!
//! [`Bus`] wraps any [`BusPort`] and runs one transaction at a time:
//! purge stale bytes, transmit one packet, decode the reply (or replies,
//! for bulk reads) with the right expected size and protocol variant.
//! Packet construction and reply decoding live in `servobus-codec`; this
//! crate owns the sequencing discipline around them.
//!
//! [`BusPort`]: servobus_transport::BusPort

pub mod bus;
pub mod error;

pub use bus::{Bus, BusConfig};
pub use error::{BusError, Result};
