// rust/lattice-io/src/lib.rs

//! Lattice I/O - Core Library
//!
//! This crate reads and writes binary field data distributed over the nodes
//! of a parallel machine, including site layouts, partitioned transfer
//! between compute nodes and I/O nodes, the record container, and
//! host-side conversion between file formats.

pub mod checksum;
pub mod config;
pub mod endian;
pub mod error;
pub mod layout;
pub mod logging;
pub mod metadata;
pub mod record;
pub mod session;
pub mod sitelist;
pub mod storage;
pub mod transfer;
pub mod transport;
pub mod volume;

// Re-export commonly used types for convenience
pub use checksum::Checksum;
pub use config::{IoConfig, Verbosity};
pub use error::{LatticeError, Result};
pub use storage::{LocalStorage, StorageBackend, StorageReader, StorageWriter};

pub use layout::{BlockLayout, IoNodeLayout, LatticeLayout, ScalarLayout};
pub use metadata::{FileInfo, RecordInfo};
pub use transfer::{SiteAccessor, SiteBuffer};
pub use transport::{ChannelMesh, MeshTransport, SingleProcess, Transport};
pub use volume::{IoMode, VolumeFormat};

pub use session::{
    part_to_single, single_to_part, ConvertSummary, QioReader, QioWriter, ReaderOptions,
    RecordState, WriterOptions,
};
