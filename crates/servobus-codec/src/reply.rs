use std::time::Duration;

use bytes::Bytes;

use crate::frame::OPCODE_OFFSET;

/// A validated reply frame plus the time it took to arrive.
#[derive(Debug, Clone)]
pub struct Reply {
    /// The raw frame, from the first header marker through the checksum.
    pub raw: Bytes,
    /// The parameter bytes (zero-copy slice of `raw`).
    pub params: Bytes,
    /// Total time from the start of the decode attempt.
    pub elapsed: Duration,
}

impl Reply {
    /// The reply's opcode byte: instruction-echo/error-mask for DYN1,
    /// ACK for SCW.
    pub fn opcode(&self) -> u8 {
        self.raw[OPCODE_OFFSET]
    }

    /// Single register value, when the reply carries exactly one parameter.
    pub fn byte_value(&self) -> Option<u8> {
        match self.params.as_ref() {
            [value] => Some(*value),
            _ => None,
        }
    }

    /// 16-bit register value, when the reply carries exactly two parameters.
    /// Registers are transmitted low byte first.
    pub fn word_value(&self) -> Option<u16> {
        match self.params.as_ref() {
            [lo, hi] => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::Reply;

    fn reply_with_params(params: &'static [u8]) -> Reply {
        let mut raw = vec![0xFF, 0xFF, 0x01, (params.len() + 2) as u8, 0x00];
        raw.extend_from_slice(params);
        raw.push(0x00);
        Reply {
            raw: Bytes::from(raw),
            params: Bytes::from_static(params),
            elapsed: Duration::from_micros(250),
        }
    }

    #[test]
    fn byte_value_requires_exactly_one_param() {
        assert_eq!(reply_with_params(&[42]).byte_value(), Some(42));
        assert_eq!(reply_with_params(&[1, 2]).byte_value(), None);
        assert_eq!(reply_with_params(&[]).byte_value(), None);
    }

    #[test]
    fn word_value_uses_both_bytes() {
        // Low byte first; 0x34 0x12 is 0x1234, not 0x34 + 0x34 * 256.
        assert_eq!(reply_with_params(&[0x34, 0x12]).word_value(), Some(0x1234));
        assert_eq!(reply_with_params(&[0x00, 0x01]).word_value(), Some(0x0100));
    }

    #[test]
    fn word_value_requires_exactly_two_params() {
        assert_eq!(reply_with_params(&[1]).word_value(), None);
        assert_eq!(reply_with_params(&[1, 2, 3]).word_value(), None);
    }
}
