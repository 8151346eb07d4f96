//! Frame layout, encoding, and out-of-band parameter extraction.

use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum::checksum;
use crate::variant::ProtocolVariant;

/// Header marker byte; two in a row open every frame.
pub const MARKER: u8 = 0xFF;

/// Smallest possible frame: markers (2) + id + len + opcode + checksum,
/// with zero parameters. Also the generic minimum reply size.
pub const MIN_FRAME_SIZE: usize = 6;

/// Maximum parameter count representable in the length byte
/// (`len == params + 2` must fit in one byte).
pub const MAX_PARAMS: usize = 253;

/// Byte offset of the device id within a frame.
pub const ID_OFFSET: usize = 2;
/// Byte offset of the length field.
pub const LEN_OFFSET: usize = 3;
/// Byte offset of the opcode (instruction outbound, echo/error-mask or
/// ACK/NACK inbound).
pub const OPCODE_OFFSET: usize = 4;
/// Byte offset of the first parameter.
pub const PARAMS_OFFSET: usize = 5;

/// Encode one complete frame into `dst`.
///
/// Computes `len = params.len() + 2` and appends the checksum over
/// `id..last param` with the variant's salt. Inputs with more than
/// [`MAX_PARAMS`] parameters are a caller contract violation, not a
/// recoverable condition.
pub fn encode_frame<V: ProtocolVariant>(id: u8, opcode: u8, params: &[u8], dst: &mut BytesMut) {
    assert!(
        params.len() <= MAX_PARAMS,
        "{} frame with {} params exceeds the length byte",
        V::NAME,
        params.len()
    );

    // The frame may be appended after existing bytes; the checksum covers
    // this frame's id..params only.
    let start = dst.len();
    dst.reserve(MIN_FRAME_SIZE + params.len());
    dst.put_u8(MARKER);
    dst.put_u8(MARKER);
    dst.put_u8(id);
    dst.put_u8((params.len() + 2) as u8);
    dst.put_u8(opcode);
    dst.put_slice(params);
    let cs = checksum(&dst[start + ID_OFFSET..], V::SALT);
    dst.put_u8(cs);
}

/// Build one complete frame as a ready-to-transmit byte sequence.
pub fn build_frame<V: ProtocolVariant>(id: u8, opcode: u8, params: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(MIN_FRAME_SIZE + params.len());
    encode_frame::<V>(id, opcode, params, &mut buf);
    buf.freeze()
}

/// Locate a frame inside an over-read buffer and return its parameter bytes.
///
/// Re-scans for the double marker, so a frame preceded by stale bytes is
/// still found. Returns `None` when no marker pair exists or the buffer
/// does not hold a complete frame per the embedded length field. This is
/// the batch counterpart of the decoder's own resync logic; both must
/// agree on where a frame starts.
pub fn extract_params(reply: &[u8]) -> Option<&[u8]> {
    let start = reply
        .windows(2)
        .position(|pair| pair == [MARKER, MARKER])?;
    let frame = &reply[start..];

    if frame.len() < MIN_FRAME_SIZE {
        return None;
    }

    let declared = frame[LEN_OFFSET] as usize;
    if declared < 2 || frame.len() < declared + 4 {
        return None; // malformed length or incomplete
    }

    Some(&frame[PARAMS_OFFSET..PARAMS_OFFSET + declared - 2])
}
