// rust/lattice-io/src/checksum.rs

//! Site-ranked checksums.
//!
//! Each datum contributes its CRC-32 rotated by an amount derived from the
//! site's lexicographic rank into two independent accumulators. XOR makes
//! the result independent of the order in which sites are visited, so the
//! per-node partial sums can be combined with a global XOR reduction.

use crate::error::Result;
use crate::transport::Transport;

/// A pair of 32-bit checksum accumulators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum {
    pub suma: u32,
    pub sumb: u32,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one datum, in canonical byte order, into the accumulators.
    pub fn accumulate(&mut self, rank: u64, bytes: &[u8]) {
        let work = crc32fast::hash(bytes);
        self.suma ^= work.rotate_left((rank % 29) as u32);
        self.sumb ^= work.rotate_left((rank % 31) as u32);
    }

    /// XOR-merges another partial checksum into this one.
    pub fn merge(&mut self, other: &Checksum) {
        self.suma ^= other.suma;
        self.sumb ^= other.sumb;
    }

    /// Combines the partial checksums of all nodes. Every node receives the
    /// same result.
    pub fn combine(&mut self, transport: &dyn Transport) -> Result<()> {
        self.suma = transport.global_xor(self.suma)?;
        self.sumb = transport.global_xor(self.sumb)?;
        Ok(())
    }

    pub fn as_pair(&self) -> (u32, u32) {
        (self.suma, self.sumb)
    }
}
