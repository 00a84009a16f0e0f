// rust/lattice-io/src/endian.rs

//! Canonical byte order.
//!
//! Payload words are stored big-endian on disk. On a little-endian host every
//! datum is word-reversed in place on its way out and again on its way in.

use std::sync::OnceLock;

static BIG_ENDIAN: OnceLock<bool> = OnceLock::new();

/// Whether the host stores multi-byte integers most significant byte first.
///
/// Probed once by looking at the low-address byte of the integer 1.
pub fn host_is_big_endian() -> bool {
    *BIG_ENDIAN.get_or_init(|| {
        let probe: u32 = 1;
        probe.to_ne_bytes()[0] == 0
    })
}

/// Reverses the bytes of every `word_size`-byte word in `buf`.
///
/// A trailing partial word is left untouched. `word_size` of 0 or 1 is a
/// no-op.
pub fn byterev(buf: &mut [u8], word_size: usize) {
    if word_size < 2 {
        return;
    }
    for word in buf.chunks_exact_mut(word_size) {
        word.reverse();
    }
}

/// Converts between host order and canonical order.
///
/// The operation is its own inverse, so the same call serves both
/// directions.
pub fn to_canonical(buf: &mut [u8], word_size: usize) {
    if !host_is_big_endian() {
        byterev(buf, word_size);
    }
}
