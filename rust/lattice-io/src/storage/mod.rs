// rust/lattice-io/src/storage/mod.rs

//! Physical file access for lattice I/O.
//!
//! The record container never touches `std::fs` directly. It reads and
//! writes through a [`StorageBackend`], which resolves file names against a
//! base directory and hands out seekable reader and writer handles.
//!
//! # Example
//!
//! ```no_run
//! use lattice_io::config::StorageConfig;
//! use lattice_io::storage::{LocalStorage, StorageBackend};
//! use std::io::{Read, Write};
//! use std::path::Path;
//!
//! let storage = LocalStorage::new(&StorageConfig::default()).unwrap();
//!
//! let mut writer = storage.open_write(Path::new("lattice.vol0000")).unwrap();
//! writer.write_all(b"payload").unwrap();
//! writer.finish().unwrap();
//!
//! let mut reader = storage.open_read(Path::new("lattice.vol0000")).unwrap();
//! let mut content = Vec::new();
//! reader.read_to_end(&mut content).unwrap();
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{StorageBackend, StorageReader, StorageWriter};
