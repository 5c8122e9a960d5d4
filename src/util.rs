//! Small byte and randomness helpers shared by the codec and transports.

use rand::Rng;

/// Draws a transaction ID from a cryptographically-unbiased source.
///
/// `rand`'s default generator samples uniformly over the full range of the
/// requested integer type, so this is never the classic `rand() % 65536`
/// modulo-biased mistake spec.md §9 warns against.
pub fn random_txid() -> u16 {
    rand::rng().random()
}

/// Reads a big-endian `u16` at `offset`, bounds-checked.
pub fn read_u16(buf: &[u8], offset: usize) -> Option<u16> {
    buf.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
}

/// Reads a big-endian `u32` at `offset`, bounds-checked.
pub fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    buf.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}
