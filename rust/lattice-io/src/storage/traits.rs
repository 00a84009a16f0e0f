// rust/lattice-io/src/storage/traits.rs

//! Storage abstraction traits.

use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::error::Result;

/// A readable, seekable physical file.
pub trait StorageReader: Read + Seek + Send {
    /// Length of the file in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A writable physical file.
///
/// Seeking lets a random-access transfer place a site anywhere inside a
/// record that was already declared.
pub trait StorageWriter: Write + Seek + Send {
    /// Flushes buffered bytes and syncs the file to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or sync fails.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Where lattice files live.
///
/// Object-safe; every node of a session may share one backend.
pub trait StorageBackend: Send + Sync {
    fn exists(&self, path: &Path) -> Result<bool>;

    /// # Errors
    ///
    /// Returns `OpenFailed` if the file doesn't exist or cannot be opened.
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>>;

    /// Creates (or truncates) a file. Missing parent directories are
    /// created.
    ///
    /// # Errors
    ///
    /// Returns `OpenFailed` if the file cannot be created.
    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>>;

    /// Opens an existing file for writing without truncating it, so that
    /// several handles can fill disjoint parts of one file.
    ///
    /// # Errors
    ///
    /// Returns `OpenFailed` if the file doesn't exist or cannot be opened.
    fn open_update(&self, path: &Path) -> Result<Box<dyn StorageWriter>>;

    /// Removes a file. Removing a missing file is not an error.
    fn delete(&self, path: &Path) -> Result<()>;
}
