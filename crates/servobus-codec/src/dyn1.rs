//! DYN1 protocol: instruction set, packet builders, and variant descriptor.
//!
//! DYN1 is the classic servo instruction protocol. Replies echo an
//! instruction/error-mask byte in the opcode slot, which the decoder does
//! not validate. Reboot, bootloader-jump, and write-no-reply are firmware
//! extensions, not part of the base instruction set.

use bytes::Bytes;

use crate::frame::{build_frame, MIN_FRAME_SIZE};
use crate::variant::{OpcodeClass, ProtocolVariant};

/// Ping a single device.
pub const INSTR_PING: u8 = 0x01;
/// Read from the control table.
pub const INSTR_READ: u8 = 0x02;
/// Write to the control table.
pub const INSTR_WRITE: u8 = 0x03;
/// Reboot the device (firmware extension).
pub const INSTR_REBOOT: u8 = 0x08;
/// Jump to the bootloader (firmware extension).
pub const INSTR_JUMP_TO_BOOTLOADER: u8 = 0x09;
/// Write without generating a status reply (firmware extension).
pub const INSTR_WRITE_NO_REPLY: u8 = 0x33;
/// Synchronized write to many devices.
pub const INSTR_SYNC_WRITE: u8 = 0x83;
/// Delegated aggregate read relayed through one device.
pub const INSTR_DSYNC_READ: u8 = 0x84;
/// Multi-device bulk read.
pub const INSTR_BULK_READ: u8 = 0x92;

/// Address every device on the bus at once.
pub const BROADCAST_ID: u8 = 0xFE;

/// A ping reply carries no parameters.
pub const REPLY_SIZE_PING: usize = MIN_FRAME_SIZE;
/// A write status reply carries no parameters.
pub const REPLY_SIZE_WRITE: usize = MIN_FRAME_SIZE;

/// Total reply size for a read of `read_len` bytes.
pub fn read_reply_size(read_len: u8) -> usize {
    MIN_FRAME_SIZE + read_len as usize
}

/// Total reply size for a delegated aggregate read: one frame whose payload
/// concatenates `read_len` bytes per device, with no boundary markers.
pub fn dsync_read_reply_size(device_count: usize, read_len: u8) -> usize {
    MIN_FRAME_SIZE + device_count * read_len as usize
}

/// DYN1 variant descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Dyn1;

impl ProtocolVariant for Dyn1 {
    const SALT: u8 = 0x00;
    const NAME: &'static str = "DYN1";

    fn length_acceptable(declared: u8, expected_reply_size: usize) -> bool {
        declared as usize + 4 == expected_reply_size
    }

    fn classify_opcode(_opcode: u8) -> OpcodeClass {
        // Instruction-echo/error-mask byte; anything goes.
        OpcodeClass::Accepted
    }
}

/// One target of a bulk read: which device, where, how much.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkReadEntry {
    /// Device to read from.
    pub device_id: u8,
    /// Control-table address to start reading at.
    pub read_start_addr: u8,
    /// Number of bytes to read.
    pub read_len: u8,
}

impl BulkReadEntry {
    /// Create an entry.
    pub fn new(device_id: u8, read_start_addr: u8, read_len: u8) -> Self {
        Self {
            device_id,
            read_start_addr,
            read_len,
        }
    }

    /// Total reply size this entry's device will send back.
    pub fn reply_size(&self) -> usize {
        read_reply_size(self.read_len)
    }
}

/// Build a PING packet.
pub fn ping_packet(id: u8) -> Bytes {
    build_frame::<Dyn1>(id, INSTR_PING, &[])
}

/// Build a READ packet for `read_len` bytes starting at `start_addr`.
pub fn read_packet(id: u8, start_addr: u8, read_len: u8) -> Bytes {
    build_frame::<Dyn1>(id, INSTR_READ, &[start_addr, read_len])
}

/// Build a WRITE packet: `data` is written starting at `start_addr`.
pub fn write_packet(id: u8, start_addr: u8, data: &[u8]) -> Bytes {
    let mut params = Vec::with_capacity(1 + data.len());
    params.push(start_addr);
    params.extend_from_slice(data);
    build_frame::<Dyn1>(id, INSTR_WRITE, &params)
}

/// Build a WRITE packet that suppresses the status reply.
pub fn write_no_reply_packet(id: u8, start_addr: u8, data: &[u8]) -> Bytes {
    let mut params = Vec::with_capacity(1 + data.len());
    params.push(start_addr);
    params.extend_from_slice(data);
    build_frame::<Dyn1>(id, INSTR_WRITE_NO_REPLY, &params)
}

/// Build a REBOOT packet.
pub fn reboot_packet(id: u8) -> Bytes {
    build_frame::<Dyn1>(id, INSTR_REBOOT, &[])
}

/// Build a bootloader-jump packet.
///
/// The device waits `delay_ms`, reprograms its baud register, and jumps to
/// `jump_address`. Both 16-bit values travel low byte first.
pub fn jump_to_bootloader_packet(
    id: u8,
    delay_ms: u16,
    baud_register: u16,
    jump_address: u16,
) -> Bytes {
    let delay = delay_ms.to_le_bytes();
    let baud = baud_register.to_le_bytes();
    let jump = jump_address.to_le_bytes();
    build_frame::<Dyn1>(
        id,
        INSTR_JUMP_TO_BOOTLOADER,
        &[delay[0], delay[1], baud[0], baud[1], jump[0], jump[1]],
    )
}

/// Build a BULK_READ packet covering every entry, in caller order.
///
/// Always addressed to the broadcast id. The parameter block opens with a
/// fixed 0x00 (a protocol artifact, not a count), then one
/// `[read_len, device_id, start_addr]` triplet per entry.
pub fn bulk_read_packet(entries: &[BulkReadEntry]) -> Bytes {
    let mut params = Vec::with_capacity(1 + entries.len() * 3);
    params.push(0x00);
    for entry in entries {
        params.push(entry.read_len);
        params.push(entry.device_id);
        params.push(entry.read_start_addr);
    }
    build_frame::<Dyn1>(BROADCAST_ID, INSTR_BULK_READ, &params)
}

/// Build a DSYNC_READ packet, addressed to the delegate device.
///
/// The delegate fans the read out to `device_ids` in order and returns one
/// concatenated reply.
pub fn dsync_read_packet(
    delegate_id: u8,
    device_ids: &[u8],
    start_addr: u8,
    read_len: u8,
) -> Bytes {
    let mut params = Vec::with_capacity(2 + device_ids.len());
    params.push(start_addr);
    params.push(read_len);
    params.extend_from_slice(device_ids);
    build_frame::<Dyn1>(delegate_id, INSTR_DSYNC_READ, &params)
}
