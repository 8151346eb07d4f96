//! Salted complement checksum shared by both protocol variants.

/// Compute the trailing checksum byte for a frame.
///
/// Sums `bytes` with 8-bit wraparound, adds the variant's `salt`, and
/// returns the bitwise complement. The salt is what keeps the two protocols
/// apart on a shared bus: an SCW frame (salt 0x22) never validates under the
/// DYN1 rule (salt 0) and vice versa.
///
/// Covers `id` through the last parameter byte; the header markers are
/// excluded.
pub fn checksum(bytes: &[u8], salt: u8) -> u8 {
    let sum = bytes
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
        .wrapping_add(salt);
    !sum
}
