//! Protocol variant descriptor.
//!
//! DYN1 and SCW share one frame layout and one decoder state machine; the
//! per-protocol differences are small enough to capture as data and two
//! policy decisions. Implementations: [`Dyn1`](crate::dyn1::Dyn1) and
//! [`Scw`](crate::scw::Scw).

/// Classification of an inbound reply's opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeClass {
    /// The byte is acceptable; continue decoding.
    Accepted,
    /// The device refused the command (SCW NACK).
    NegativeAck,
    /// The byte is not a valid reply opcode for this variant.
    Unexpected,
}

/// Everything that parameterizes the packet builder and reply decoder per
/// protocol.
pub trait ProtocolVariant {
    /// Additive constant mixed into the checksum. Chosen so that a frame of
    /// one variant never validates under the other's rule.
    const SALT: u8;

    /// Protocol name for log lines.
    const NAME: &'static str;

    /// Whether a reply's declared length field is acceptable given the
    /// expected total reply size.
    fn length_acceptable(declared: u8, expected_reply_size: usize) -> bool;

    /// Classify the opcode byte of an inbound reply.
    ///
    /// DYN1 replies carry an instruction-echo/error-mask byte here and
    /// accept anything; SCW replies must be ACK or NACK.
    fn classify_opcode(opcode: u8) -> OpcodeClass;
}
