//! SCW protocol: command set, memory map, packet builders, and variant
//! descriptor.
//!
//! SCW devices expose two memory maps (EEPROM and SRAM) read and written
//! whole. Writes carry a 16-bit bitmask selecting which map bytes actually
//! take effect; bytes outside the mask are ignored by the device even when
//! present in the value block. Every reply opens with ACK or NACK in the
//! opcode slot, and the checksum salt keeps SCW frames from ever validating
//! as DYN1 on a shared bus.

use bytes::Bytes;

use crate::frame::{build_frame, MIN_FRAME_SIZE};
use crate::variant::{OpcodeClass, ProtocolVariant};

/// Read the whole EEPROM map.
pub const CMD_GET_EEPROM: u8 = 0x34;
/// Read the whole SRAM map.
pub const CMD_GET_SRAM: u8 = 0x35;
/// Masked write into the EEPROM map.
pub const CMD_WRITE_EEPROM: u8 = 0x36;
/// Masked write into the SRAM map.
pub const CMD_WRITE_SRAM: u8 = 0x37;
/// Commit the EEPROM map to non-volatile storage.
pub const CMD_BURN_EEPROM: u8 = 0x40;

/// Reply opcode: command accepted.
pub const REPLY_ACK: u8 = 0x50;
/// Reply opcode: command refused.
pub const REPLY_NACK: u8 = 0x51;

/// Checksum salt. Flips two nibbles of the sum so an SCW frame is invalid
/// under the DYN1 checksum rule and vice versa.
pub const CHECKSUM_SALT: u8 = 0x22;

/// Size of the EEPROM memory map in bytes.
pub const EEPROM_MAP_SIZE: usize = 0x15;
/// Size of the SRAM memory map in bytes.
pub const SRAM_MAP_SIZE: usize = 0x13;

/// An ACK or NACK reply is always exactly this long, regardless of the
/// originating command's nominal payload size.
pub const REPLY_SIZE_ACK_NACK: usize = MIN_FRAME_SIZE;
/// Length-field value of an ACK/NACK frame.
pub const ACK_NACK_FRAME_LEN: u8 = (REPLY_SIZE_ACK_NACK - 4) as u8;

/// Total reply size for a GET_EEPROM command.
pub const REPLY_SIZE_GET_EEPROM: usize = MIN_FRAME_SIZE + EEPROM_MAP_SIZE;
/// Total reply size for a GET_SRAM command.
pub const REPLY_SIZE_GET_SRAM: usize = MIN_FRAME_SIZE + SRAM_MAP_SIZE;

/// EEPROM memory-map register offsets.
pub mod eeprom {
    pub const DEVICE_ID: u8 = 0x00;
    pub const ZERO_OFFSET: u8 = 0x01;
    pub const POT_LIMIT_CW_LOW: u8 = 0x02;
    pub const POT_LIMIT_CW_HIGH: u8 = 0x03;
    pub const POT_LIMIT_CCW_LOW: u8 = 0x04;
    pub const POT_LIMIT_CCW_HIGH: u8 = 0x05;
    pub const TEMP_OFFSET: u8 = 0x06;
    pub const SPEED_GAIN_P: u8 = 0x07;
    pub const SPEED_GAIN_I: u8 = 0x08;
    pub const POS_GAIN_P: u8 = 0x09;
    pub const POS_GAIN_I: u8 = 0x0A;
    pub const POS_GAIN_D: u8 = 0x0B;
    pub const PWM_PRESCALER_TCCR1A: u8 = 0x0C;
    pub const PWM_PRESCALER_TCCR1B: u8 = 0x0D;
    pub const MODEL_NR: u8 = 0x0E;
    pub const FW_VERSION: u8 = 0x0F;
    pub const JOINT_POSITION: u8 = 0x10;
    pub const BOOTLDR_TIMEOUT: u8 = 0x11;
    pub const BOOTLDR_PW_LEN: u8 = 0x12;
    pub const BOOTLDR_PW_FIRST_CHAR: u8 = 0x13;
    pub const BOOTLDR_JOINT_POS: u8 = 0x14;
}

/// SRAM memory-map register offsets.
pub mod sram {
    pub const CONFIGURED_ERROR_MASK: u8 = 0x00;
    pub const PRESENT_ERROR_MASK: u8 = 0x01;
    pub const OP_MODE: u8 = 0x02;
    pub const TARGET_POT_LOW: u8 = 0x03;
    pub const TARGET_POT_HIGH: u8 = 0x04;
    pub const TARGET_SPEED_LOW: u8 = 0x05;
    pub const TARGET_SPEED_HIGH: u8 = 0x06;
    pub const TARGET_CURRENT_LOW: u8 = 0x07;
    pub const TARGET_CURRENT_HIGH: u8 = 0x08;
    pub const PRESENT_CURRENT_LOW: u8 = 0x09;
    pub const PRESENT_CURRENT_HIGH: u8 = 0x0A;
    pub const PRESENT_CURRENT_WTD_CNTR: u8 = 0x0B;
    pub const PWM_LOW: u8 = 0x0C;
    pub const PWM_HIGH: u8 = 0x0D;
    pub const PRESENT_POS_LOW: u8 = 0x0E;
    pub const PRESENT_POS_HIGH: u8 = 0x0F;
    pub const PRESENT_SPEED_LOW: u8 = 0x10;
    pub const PRESENT_SPEED_HIGH: u8 = 0x11;
    pub const PRESENT_TEMP: u8 = 0x12;
}

/// Device error-flag bits (same bit assignments as DYN1, for ease of use).
pub mod error_flags {
    pub const NONE: u8 = 0x00;
    pub const VOLTAGE: u8 = 0x01;
    pub const WRONG_HW_MODEL: u8 = 0x02;
    pub const TEMPERATURE: u8 = 0x04;
    pub const RANGE: u8 = 0x08;
    pub const CHECKSUM: u8 = 0x10;
    pub const OVERLOAD: u8 = 0x20;
    pub const INSTRUCTION: u8 = 0x40;

    /// Default configured mask: everything except VOLTAGE.
    pub const DEFAULT_MASK: u8 = 0x7E;
    /// Flags that cannot be disabled or cleared in software.
    pub const PERSISTENT_MASK: u8 = 0x5A;
}

/// Operation modes (SRAM `OP_MODE` register).
pub mod op_mode {
    pub const TORQUE_DISABLED: u8 = 0x00;
    pub const EEPROM_CALIBRATION: u8 = 0x01;
    pub const POS_SPEED_CONTROL: u8 = 0x02;
    pub const DIRECT_PWM: u8 = 0x04;
    pub const CURRENT_POS_CONTROL: u8 = 0x08;
}

/// SCW variant descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Scw;

impl ProtocolVariant for Scw {
    const SALT: u8 = CHECKSUM_SALT;
    const NAME: &'static str = "SCW";

    fn length_acceptable(declared: u8, expected_reply_size: usize) -> bool {
        // A write acknowledgement is always the short fixed-size frame,
        // whatever payload size the command nominally expects.
        declared as usize + 4 == expected_reply_size || declared == ACK_NACK_FRAME_LEN
    }

    fn classify_opcode(opcode: u8) -> OpcodeClass {
        match opcode {
            REPLY_ACK => OpcodeClass::Accepted,
            REPLY_NACK => OpcodeClass::NegativeAck,
            _ => OpcodeClass::Unexpected,
        }
    }
}

/// Build a GET_EEPROM packet (no parameters).
pub fn get_eeprom_packet(id: u8) -> Bytes {
    build_frame::<Scw>(id, CMD_GET_EEPROM, &[])
}

/// Build a GET_SRAM packet (no parameters).
pub fn get_sram_packet(id: u8) -> Bytes {
    build_frame::<Scw>(id, CMD_GET_SRAM, &[])
}

/// Build a BURN_EEPROM packet (no parameters); the device answers ACK or
/// NACK once the commit finishes.
pub fn burn_eeprom_packet(id: u8) -> Bytes {
    build_frame::<Scw>(id, CMD_BURN_EEPROM, &[])
}

/// Build a WRITE_EEPROM packet.
///
/// `write_mask` selects which of the `values` bytes the device applies; the
/// trailing byte requests an ACK reply when set.
pub fn write_eeprom_packet(id: u8, write_mask: u16, values: &[u8], request_ack: bool) -> Bytes {
    build_frame::<Scw>(id, CMD_WRITE_EEPROM, &masked_write_params(write_mask, values, request_ack))
}

/// Build a WRITE_SRAM packet. Same parameter layout as WRITE_EEPROM.
pub fn write_sram_packet(id: u8, write_mask: u16, values: &[u8], request_ack: bool) -> Bytes {
    build_frame::<Scw>(id, CMD_WRITE_SRAM, &masked_write_params(write_mask, values, request_ack))
}

fn masked_write_params(write_mask: u16, values: &[u8], request_ack: bool) -> Vec<u8> {
    let mask = write_mask.to_le_bytes();
    let mut params = Vec::with_capacity(3 + values.len());
    params.push(mask[0]);
    params.push(mask[1]);
    params.extend_from_slice(values);
    params.push(u8::from(request_ack));
    params
}
