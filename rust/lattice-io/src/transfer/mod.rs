// rust/lattice-io/src/transfer/mod.rs

//! Moving site data between compute nodes and files.
//!
//! - [`TransferBuffer`]: batches sites into large sequential writes and
//!   reads, or degrades to one site at a time with a seek before each.
//! - [`PartitionWriter`] and [`PartitionReader`]: the per-site protocol
//!   between an I/O partition's member nodes and its I/O node.
//! - [`write_global`] and [`read_global`]: a single datum for the whole
//!   lattice, handled by the master I/O node.
//!
//! Callers hand their data over through a [`SiteAccessor`], addressed by
//! the owning node's local site index.

mod buffer;
mod global;
mod partition;

pub use buffer::{AccessMode, TransferBuffer};
pub use global::{read_global, write_global};
pub use partition::{read_partition, write_partition, PartitionReader, PartitionWriter};

use crate::checksum::Checksum;
use crate::error::{LatticeError, Result};
use crate::metadata::RecordInfo;

/// Caller-side access to per-site data.
pub trait SiteAccessor {
    /// Copies the datum of local site `index` into `buf`. `count` is the
    /// number of elements in the datum.
    fn get(&mut self, buf: &mut [u8], index: usize, count: usize);

    /// Stores `buf` as the datum of local site `index`.
    fn put(&mut self, buf: &[u8], index: usize, count: usize);
}

/// Size and shape of one site's datum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatumShape {
    /// Bytes per datum.
    pub size: usize,
    /// Word length for byte-order conversion.
    pub word_size: usize,
    /// Elements per datum, passed through to the accessor.
    pub count: usize,
}

impl DatumShape {
    pub fn new(size: usize, word_size: usize, count: usize) -> Self {
        Self {
            size,
            word_size,
            count,
        }
    }

    /// A zeroed buffer for one datum.
    pub fn zeroed(&self) -> Result<Vec<u8>> {
        let mut datum = Vec::new();
        datum
            .try_reserve_exact(self.size)
            .map_err(|e| LatticeError::alloc(format!("datum of {} bytes: {e}", self.size)))?;
        datum.resize(self.size, 0);
        Ok(datum)
    }

    /// Bytes taken by `sites` data.
    pub fn bytes(&self, sites: u64) -> Result<u64> {
        sites.checked_mul(self.size as u64).ok_or_else(|| {
            LatticeError::bad_record_info(format!("{sites} sites of {} bytes overflows", self.size))
        })
    }
}

impl TryFrom<&RecordInfo> for DatumShape {
    type Error = LatticeError;

    fn try_from(info: &RecordInfo) -> Result<Self> {
        let size = info.datum_size()?;
        if size == 0 {
            return Err(LatticeError::bad_record_info("datum size is zero"));
        }
        Ok(Self::new(size, info.word_size(), info.datacount))
    }
}

/// What one node moved during a transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    /// Bytes this node wrote to or read from its file.
    pub bytes: u64,
    /// This node's partial checksum.
    pub checksum: Checksum,
}

/// A node's field data held contiguously in local site order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteBuffer {
    datum_size: usize,
    data: Vec<u8>,
}

impl SiteBuffer {
    /// A zeroed buffer for `sites` sites.
    pub fn new(sites: usize, datum_size: usize) -> Result<Self> {
        let len = sites
            .checked_mul(datum_size)
            .ok_or_else(|| LatticeError::alloc(format!("{sites} sites of {datum_size} bytes")))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| LatticeError::alloc(format!("site buffer of {len} bytes: {e}")))?;
        data.resize(len, 0);
        Ok(Self { datum_size, data })
    }

    pub fn from_bytes(datum_size: usize, data: Vec<u8>) -> Result<Self> {
        if datum_size == 0 || data.len() % datum_size != 0 {
            return Err(LatticeError::usage(format!(
                "{} bytes is not a whole number of {datum_size}-byte sites",
                data.len()
            )));
        }
        Ok(Self { datum_size, data })
    }

    pub fn datum_size(&self) -> usize {
        self.datum_size
    }

    /// Number of sites.
    pub fn len(&self) -> usize {
        self.data.len() / self.datum_size.max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn site(&self, index: usize) -> &[u8] {
        &self.data[index * self.datum_size..(index + 1) * self.datum_size]
    }

    pub fn site_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.data[index * self.datum_size..(index + 1) * self.datum_size]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl SiteAccessor for SiteBuffer {
    fn get(&mut self, buf: &mut [u8], index: usize, _count: usize) {
        buf.copy_from_slice(self.site(index));
    }

    fn put(&mut self, buf: &[u8], index: usize, _count: usize) {
        self.site_mut(index).copy_from_slice(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_buffer_accessor() {
        let mut sites = SiteBuffer::new(3, 4).unwrap();
        sites.put(&[1, 2, 3, 4], 1, 1);

        let mut out = [0u8; 4];
        sites.get(&mut out, 1, 1);
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(sites.site(0), &[0, 0, 0, 0]);
        assert_eq!(sites.len(), 3);
        assert_eq!(&sites.as_bytes()[4..8], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_site_buffer_from_bytes() {
        assert!(SiteBuffer::from_bytes(4, vec![0; 10]).is_err());
        assert!(SiteBuffer::from_bytes(0, Vec::new()).is_err());
        let sites = SiteBuffer::from_bytes(2, vec![9; 6]).unwrap();
        assert_eq!(sites.len(), 3);
        assert_eq!(sites.into_bytes(), vec![9; 6]);
    }

    #[test]
    fn test_datum_shape_from_record_info() {
        let info = RecordInfo::field("ColorMatrix", 'D', 16, 9);
        assert_eq!(DatumShape::try_from(&info).unwrap(), DatumShape::new(144, 8, 9));

        let huge = RecordInfo::field("ColorMatrix", 'D', 1 << 62, 8);
        assert!(matches!(
            DatumShape::try_from(&huge),
            Err(LatticeError::BadRecordInfo { .. })
        ));
        let empty = RecordInfo::field("ColorMatrix", 'D', 16, 0);
        assert!(DatumShape::try_from(&empty).is_err());
        assert!(DatumShape::new(1 << 40, 8, 1).bytes(1 << 40).is_err());
    }
}
