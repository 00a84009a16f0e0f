// rust/lattice-io/src/transfer/buffer.rs

use tracing::trace;

use crate::error::{LatticeError, Result};
use crate::record::{RecordSink, RecordSource};

/// How the I/O node moves through a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Sites arrive in file order and are batched.
    #[default]
    Sequential,
    /// Each site is placed by seeking `size * rank` bytes from the current
    /// position. Offsets compound from one site to the next.
    Seek,
}

/// The I/O node's staging buffer.
///
/// In sequential mode it holds up to `budget / datum_size` sites and is
/// flushed when full or when the last site arrives; reads refill it with
/// as many sites as remain, up to capacity. In seek mode it holds one site.
#[derive(Debug)]
pub struct TransferBuffer {
    data: Vec<u8>,
    datum_size: usize,
    max_sites: usize,
    mode: AccessMode,
    /// Sites staged for writing, or sites loaded for reading.
    filled: usize,
    /// Next site to hand out on the read side.
    cursor: usize,
    flushes: usize,
    bytes: u64,
}

impl TransferBuffer {
    pub fn new(datum_size: usize, budget_bytes: usize, mode: AccessMode) -> Result<Self> {
        if datum_size == 0 {
            return Err(LatticeError::usage("datum size must be positive"));
        }
        let max_sites = match mode {
            AccessMode::Sequential => (budget_bytes / datum_size).max(1),
            AccessMode::Seek => 1,
        };
        let len = max_sites * datum_size;

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| LatticeError::alloc(format!("transfer buffer of {len} bytes: {e}")))?;
        data.resize(len, 0);

        Ok(Self {
            data,
            datum_size,
            max_sites,
            mode,
            filled: 0,
            cursor: 0,
            flushes: 0,
            bytes: 0,
        })
    }

    pub fn max_sites(&self) -> usize {
        self.max_sites
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Number of writes or refills issued so far.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Bytes moved to or from the record so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Sites staged but not yet written.
    pub fn pending(&self) -> usize {
        self.filled
    }

    /// Stages one datum for writing. Writes out the buffer when it is full
    /// or `last` is set.
    pub fn push(
        &mut self,
        sink: &mut dyn RecordSink,
        datum: &[u8],
        rank: u64,
        last: bool,
    ) -> Result<()> {
        if self.mode == AccessMode::Seek {
            sink.seek_relative(self.seek_offset(rank)?)?;
        }

        let start = self.filled * self.datum_size;
        self.data[start..start + self.datum_size].copy_from_slice(datum);
        self.filled += 1;

        if self.filled == self.max_sites || last || self.mode == AccessMode::Seek {
            self.flush(sink)?;
        }
        Ok(())
    }

    /// Writes any staged sites.
    pub fn flush(&mut self, sink: &mut dyn RecordSink) -> Result<()> {
        if self.filled == 0 {
            return Ok(());
        }
        let len = self.filled * self.datum_size;
        let written = sink.write(&self.data[..len])?;
        if written != len {
            return Err(LatticeError::BadWriteBytes {
                expected: len as u64,
                actual: written as u64,
            });
        }

        trace!(sites = self.filled, bytes = len, "flushed transfer buffer");
        self.bytes += len as u64;
        self.flushes += 1;
        self.filled = 0;
        Ok(())
    }

    /// Hands out the next datum, refilling from `source` when the buffer is
    /// exhausted. `remaining` counts the sites still to be read, this one
    /// included.
    pub fn pull(
        &mut self,
        source: &mut dyn RecordSource,
        datum: &mut [u8],
        rank: u64,
        remaining: u64,
    ) -> Result<()> {
        if self.mode == AccessMode::Seek {
            source.seek_relative(self.seek_offset(rank)?)?;
            self.filled = 0;
            self.cursor = 0;
        }

        if self.cursor == self.filled {
            let sites = (self.max_sites as u64).min(remaining.max(1)) as usize;
            let len = sites * self.datum_size;
            let got = source.read(&mut self.data[..len])?;
            if got != len {
                return Err(LatticeError::BadReadBytes {
                    expected: len as u64,
                    actual: got as u64,
                });
            }

            trace!(sites, bytes = len, "refilled transfer buffer");
            self.bytes += len as u64;
            self.flushes += 1;
            self.filled = sites;
            self.cursor = 0;
        }

        let start = self.cursor * self.datum_size;
        datum.copy_from_slice(&self.data[start..start + self.datum_size]);
        self.cursor += 1;
        Ok(())
    }

    fn seek_offset(&self, rank: u64) -> Result<i64> {
        (self.datum_size as u64)
            .checked_mul(rank)
            .and_then(|off| i64::try_from(off).ok())
            .ok_or_else(|| LatticeError::usage(format!("seek to site {rank} overflows")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every call instead of touching a file.
    #[derive(Default)]
    struct Recorder {
        writes: Vec<usize>,
        seeks: Vec<i64>,
        data: Vec<u8>,
        read_pos: usize,
        short_by: usize,
    }

    impl RecordSink for Recorder {
        fn write(&mut self, buf: &[u8]) -> Result<usize> {
            self.writes.push(buf.len());
            self.data.extend_from_slice(buf);
            Ok(buf.len() - self.short_by.min(buf.len()))
        }

        fn seek_relative(&mut self, offset: i64) -> Result<()> {
            self.seeks.push(offset);
            Ok(())
        }
    }

    impl RecordSource for Recorder {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = buf.len().min(self.data.len() - self.read_pos);
            buf[..n].copy_from_slice(&self.data[self.read_pos..self.read_pos + n]);
            self.read_pos += n;
            self.writes.push(n);
            Ok(n)
        }

        fn seek_relative(&mut self, offset: i64) -> Result<()> {
            self.seeks.push(offset);
            Ok(())
        }
    }

    #[test]
    fn test_max_sites_from_budget() {
        assert_eq!(TransferBuffer::new(4, 262_144, AccessMode::Sequential).unwrap().max_sites(), 65_536);
        assert_eq!(TransferBuffer::new(100, 64, AccessMode::Sequential).unwrap().max_sites(), 1);
        assert_eq!(TransferBuffer::new(4, 1 << 20, AccessMode::Seek).unwrap().max_sites(), 1);
        assert!(TransferBuffer::new(0, 64, AccessMode::Sequential).is_err());
    }

    #[test]
    fn test_flush_on_full_and_last() {
        // 4 sites per buffer, 2 full flushes and a final flush of 3.
        let mut buffer = TransferBuffer::new(2, 8, AccessMode::Sequential).unwrap();
        let mut sink = Recorder::default();
        let total = 2 * 4 + 3;

        for rank in 0..total {
            let datum = [rank as u8, 0xff];
            buffer.push(&mut sink, &datum, rank, rank + 1 == total).unwrap();
        }

        assert_eq!(sink.writes, vec![8, 8, 6]);
        assert_eq!(buffer.flushes(), 3);
        assert_eq!(buffer.bytes(), 22);
        assert_eq!(buffer.pending(), 0);
        assert_eq!(sink.data[20], 10);
        assert!(sink.seeks.is_empty());
    }

    #[test]
    fn test_refill_reads_what_remains() {
        let mut source = Recorder {
            data: (0..22u8).collect(),
            ..Default::default()
        };
        let mut buffer = TransferBuffer::new(2, 8, AccessMode::Sequential).unwrap();
        let total = 11u64;

        let mut out = Vec::new();
        for (done, rank) in (0..total).enumerate() {
            let mut datum = [0u8; 2];
            buffer
                .pull(&mut source, &mut datum, rank, total - done as u64)
                .unwrap();
            out.extend_from_slice(&datum);
        }

        assert_eq!(source.writes, vec![8, 8, 6]);
        assert_eq!(out, (0..22u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_short_read_is_bad_read_bytes() {
        let mut source = Recorder {
            data: vec![0; 5],
            ..Default::default()
        };
        let mut buffer = TransferBuffer::new(2, 8, AccessMode::Sequential).unwrap();
        let mut datum = [0u8; 2];
        assert!(matches!(
            buffer.pull(&mut source, &mut datum, 0, 3),
            Err(LatticeError::BadReadBytes { expected: 6, actual: 5 })
        ));
    }

    #[test]
    fn test_short_write_is_bad_write_bytes() {
        let mut sink = Recorder {
            short_by: 1,
            ..Default::default()
        };
        let mut buffer = TransferBuffer::new(2, 8, AccessMode::Sequential).unwrap();
        assert!(matches!(
            buffer.push(&mut sink, &[1, 2], 0, true),
            Err(LatticeError::BadWriteBytes { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_seek_mode_seeks_relative_before_each_site() {
        let mut sink = Recorder::default();
        let mut buffer = TransferBuffer::new(4, 1024, AccessMode::Seek).unwrap();

        for rank in [3u64, 5, 6] {
            buffer.push(&mut sink, &[0; 4], rank, false).unwrap();
        }

        assert_eq!(sink.seeks, vec![12, 20, 24]);
        assert_eq!(sink.writes, vec![4, 4, 4]);
    }

    #[test]
    fn test_seek_mode_read_single_site() {
        let mut source = Recorder {
            data: (0..16u8).collect(),
            ..Default::default()
        };
        let mut buffer = TransferBuffer::new(4, 1024, AccessMode::Seek).unwrap();
        let mut datum = [0u8; 4];

        buffer.pull(&mut source, &mut datum, 2, 1).unwrap();

        assert_eq!(source.seeks, vec![8]);
        assert_eq!(buffer.flushes(), 1);
        // The recorder ignores seeks, so it hands out the first bytes.
        assert_eq!(datum, [0, 1, 2, 3]);
    }
}
