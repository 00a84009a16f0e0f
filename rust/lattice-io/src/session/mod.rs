// rust/lattice-io/src/session/mod.rs

//! Reading and writing lattice files.
//!
//! A [`QioWriter`] or [`QioReader`] is opened collectively: every node calls
//! `open` with its own transport endpoint and the same layout, and then
//! every node makes the same sequence of record calls. Which nodes touch
//! physical files depends on the volume format:
//!
//! | format | files | I/O done by |
//! |---|---|---|
//! | SINGLEFILE, serial | `base` | the master I/O node, for every site |
//! | SINGLEFILE, parallel | `base` | every I/O node, seeking to its sites |
//! | MULTIFILE | `base.volNNNN` per node | every node, for its own sites |
//! | PARTFILE | `base.volNNNN` per I/O node | every I/O node, for its partition |
//!
//! Each record goes through `AwaitingRecordInfo -> AwaitingData` and back.
//! Running out of records is reported as `Ok(None)` at a record boundary.

mod convert;
mod reader;
mod writer;

pub use convert::{part_to_single, single_to_part, ConvertSummary};
pub use reader::{QioReader, ReaderOptions};
pub use writer::{QioWriter, WriterOptions};

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::storage::StorageBackend;
use crate::transfer::AccessMode;
use crate::volume::{suffixed, IoMode, VolumeFormat};

/// Where a reader is in the record sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    AwaitingRecordInfo,
    AwaitingData,
    /// No records left.
    Eof,
    /// Opened only to learn the lattice shape.
    Discovery,
}

/// Access pattern the I/O node uses inside a binary record.
pub(crate) fn access_mode(volfmt: VolumeFormat, mode: IoMode) -> AccessMode {
    match (volfmt, mode) {
        (VolumeFormat::SingleFile, IoMode::Parallel) => AccessMode::Seek,
        _ => AccessMode::Sequential,
    }
}

/// The file the master opens first: `base` if it exists, else the
/// master's `.volNNNN` file.
pub(crate) fn first_file(storage: &dyn StorageBackend, base: &Path, master: usize) -> Result<PathBuf> {
    if storage.exists(base)? {
        Ok(base.to_path_buf())
    } else {
        Ok(suffixed(base, master))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the session tests.

    use std::path::Path;

    use tempfile::TempDir;

    use crate::config::{IoConfig, StorageConfig};
    use crate::layout::{lex_rank, LatticeLayout};
    use crate::storage::LocalStorage;
    use crate::transfer::SiteBuffer;
    use crate::transport::{ChannelMesh, MeshTransport};

    pub fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(&StorageConfig {
            base_path: dir.to_path_buf(),
            ..Default::default()
        })
        .unwrap()
    }

    pub fn temp_storage() -> (LocalStorage, TempDir) {
        let temp = TempDir::new().unwrap();
        (storage(temp.path()), temp)
    }

    /// A small buffer so that every transfer needs several flushes.
    pub fn config() -> IoConfig {
        let mut config = IoConfig::default();
        config.transfer.buffer_budget_bytes = 40;
        config
    }

    /// A field whose datum at each site is derived from the site's rank and
    /// a record seed, in host byte order.
    pub fn field(layout: &dyn LatticeLayout, node: usize, seed: u32) -> SiteBuffer {
        let mut sites = SiteBuffer::new(layout.num_sites(node), 4).unwrap();
        let mut coords = vec![0; layout.dims().len()];
        for index in 0..layout.num_sites(node) {
            layout.get_coords(&mut coords, node, index);
            let value = lex_rank(&coords, layout.dims()) as u32 * 31 + seed;
            sites.site_mut(index).copy_from_slice(&value.to_ne_bytes());
        }
        sites
    }

    /// Runs `body` once per node of an `n`-node mesh, each on its own thread.
    pub fn run_nodes<T: Send>(n: usize, body: impl Fn(MeshTransport) -> T + Sync) -> Vec<T> {
        let mesh = ChannelMesh::new(n);
        std::thread::scope(|s| {
            let body = &body;
            let handles: Vec<_> = mesh
                .into_iter()
                .map(|transport| s.spawn(move || body(transport)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_mode() {
        assert_eq!(
            access_mode(VolumeFormat::SingleFile, IoMode::Parallel),
            AccessMode::Seek
        );
        assert_eq!(
            access_mode(VolumeFormat::PartFile, IoMode::Parallel),
            AccessMode::Sequential
        );
    }

    #[test]
    fn test_first_file_falls_back_to_volume_zero() {
        let (storage, temp) = testing::temp_storage();
        let base = Path::new("cfg");
        assert_eq!(first_file(&storage, base, 0).unwrap(), PathBuf::from("cfg.vol0000"));

        std::fs::write(temp.path().join("cfg"), b"").unwrap();
        assert_eq!(first_file(&storage, base, 0).unwrap(), PathBuf::from("cfg"));
    }
}
