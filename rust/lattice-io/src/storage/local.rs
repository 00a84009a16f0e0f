// rust/lattice-io/src/storage/local.rs

//! Lattice files on the local filesystem.
//!
//! Files are opened with buffered handles. Readers of large files may map
//! them into memory instead, which suits the many small relative seeks of a
//! random-access transfer.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::traits::{StorageBackend, StorageReader, StorageWriter};
use crate::config::StorageConfig;
use crate::error::{LatticeError, Result};

/// Lattice files under one base directory.
pub struct LocalStorage {
    /// Relative names resolve against this directory.
    base_path: PathBuf,
    buffer_size: usize,
    use_mmap: bool,
    /// Files at least this large are mapped when `use_mmap` is set.
    mmap_threshold: u64,
}

impl LocalStorage {
    /// # Errors
    ///
    /// Returns an error if the base directory cannot be created.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let base_path = config.base_path.clone();
        fs::create_dir_all(&base_path).map_err(|e| {
            LatticeError::storage_with_source(&base_path, "failed to create base directory", e)
        })?;

        Ok(Self {
            base_path,
            buffer_size: config.buffer_size,
            use_mmap: config.use_mmap,
            mmap_threshold: config.mmap_threshold,
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    fn should_map(&self, len: u64) -> bool {
        self.use_mmap && len > 0 && len >= self.mmap_threshold
    }
}

impl StorageBackend for LocalStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve(path).is_file())
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        let full = self.resolve(path);
        let file = File::open(&full).map_err(|e| LatticeError::open_failed(&full, e))?;
        let len = file
            .metadata()
            .map_err(|e| LatticeError::storage_with_source(&full, "failed to stat file", e))?
            .len();

        if self.should_map(len) {
            // SAFETY: the file is opened read-only and the map lives exactly
            // as long as the reader that owns it.
            let map = unsafe { Mmap::map(&file) }
                .map_err(|e| LatticeError::storage_with_source(&full, "failed to map file", e))?;
            Ok(Box::new(MappedReader { map, pos: 0 }))
        } else {
            Ok(Box::new(BufferedReader {
                inner: BufReader::with_capacity(self.buffer_size, file),
                len,
            }))
        }
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LatticeError::storage_with_source(parent, "failed to create parent directories", e)
            })?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&full)
            .map_err(|e| LatticeError::open_failed(&full, e))?;

        Ok(Box::new(BufferedWriter {
            inner: BufWriter::with_capacity(self.buffer_size, file),
            path: full,
        }))
    }

    fn open_update(&self, path: &Path) -> Result<Box<dyn StorageWriter>> {
        let full = self.resolve(path);
        let file = OpenOptions::new()
            .write(true)
            .open(&full)
            .map_err(|e| LatticeError::open_failed(&full, e))?;

        Ok(Box::new(BufferedWriter {
            inner: BufWriter::with_capacity(self.buffer_size, file),
            path: full,
        }))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path);
        match fs::remove_file(&full) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(
                LatticeError::storage_with_source(&full, "failed to delete file", e),
            ),
            _ => Ok(()),
        }
    }
}

struct BufferedReader {
    inner: BufReader<File>,
    len: u64,
}

impl Read for BufferedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for BufferedReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        // Short relative hops stay inside the buffer.
        match pos {
            SeekFrom::Current(offset) => {
                self.inner.seek_relative(offset)?;
                self.inner.stream_position()
            }
            other => self.inner.seek(other),
        }
    }
}

impl StorageReader for BufferedReader {
    fn len(&self) -> u64 {
        self.len
    }
}

struct MappedReader {
    map: Mmap,
    pos: u64,
}

impl Read for MappedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX).min(self.map.len());
        let n = buf.len().min(self.map.len() - start);
        buf[..n].copy_from_slice(&self.map[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MappedReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(offset) => {
                self.pos = offset;
                return Ok(offset);
            }
            SeekFrom::End(offset) => (self.map.len() as u64, offset),
            SeekFrom::Current(offset) => (self.pos, offset),
        };
        self.pos = base.checked_add_signed(offset).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "seek before start of file")
        })?;
        Ok(self.pos)
    }
}

impl StorageReader for MappedReader {
    fn len(&self) -> u64 {
        self.map.len() as u64
    }
}

struct BufferedWriter {
    inner: BufWriter<File>,
    path: PathBuf,
}

impl Write for BufferedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for BufferedWriter {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl StorageWriter for BufferedWriter {
    fn finish(mut self: Box<Self>) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to flush file", e))?;
        self.inner
            .get_ref()
            .sync_all()
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to sync file", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(use_mmap: bool) -> (LocalStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp_dir.path().to_path_buf(),
            buffer_size: 64,
            use_mmap,
            mmap_threshold: 1024,
        };
        (LocalStorage::new(&config).unwrap(), temp_dir)
    }

    fn write_file(storage: &LocalStorage, name: &str, data: &[u8]) {
        let mut writer = storage.open_write(Path::new(name)).unwrap();
        writer.write_all(data).unwrap();
        writer.finish().unwrap();
    }

    fn read_all(storage: &LocalStorage, name: &str) -> Vec<u8> {
        let mut reader = storage.open_read(Path::new(name)).unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(reader.len(), buf.len() as u64);
        buf
    }

    #[test]
    fn test_new_creates_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("ensemble");
        LocalStorage::new(&StorageConfig {
            base_path: base.clone(),
            ..Default::default()
        })
        .unwrap();
        assert!(base.is_dir());
    }

    #[test]
    fn test_open_read_missing_is_open_failed() {
        let (storage, _temp) = storage(false);
        assert!(matches!(
            storage.open_read(Path::new("lattice.vol0003")),
            Err(LatticeError::OpenFailed { .. })
        ));
    }

    #[test]
    fn test_buffered_and_mapped_reads_agree() {
        let data: Vec<u8> = (0..2048).map(|i| (i % 251) as u8).collect();
        for use_mmap in [false, true] {
            let (storage, _temp) = storage(use_mmap);
            write_file(&storage, "small", &data[..100]);
            write_file(&storage, "large", &data);
            assert_eq!(read_all(&storage, "small"), &data[..100]);
            assert_eq!(read_all(&storage, "large"), data);
        }
    }

    #[test]
    fn test_relative_seeks_compound() {
        let digits: Vec<u8> = (0..2048).map(|i| (i % 10) as u8 + b'0').collect();
        for use_mmap in [false, true] {
            let (storage, _temp) = storage(use_mmap);
            write_file(&storage, "digits", &digits);

            let mut reader = storage.open_read(Path::new("digits")).unwrap();
            let mut buf = [0u8; 1];
            assert_eq!(reader.seek(SeekFrom::Current(5)).unwrap(), 5);
            reader.read_exact(&mut buf).unwrap();
            assert_eq!(buf[0], b'5');

            assert_eq!(reader.seek(SeekFrom::Current(200)).unwrap(), 206);
            reader.read_exact(&mut buf).unwrap();
            assert_eq!(buf[0], b'6');

            assert_eq!(reader.seek(SeekFrom::Current(-207)).unwrap(), 0);
            assert!(reader.seek(SeekFrom::Current(-1)).is_err());
        }
    }

    #[test]
    fn test_read_past_end_of_mapped_file() {
        let (storage, _temp) = storage(true);
        write_file(&storage, "large", &[7u8; 1500]);

        let mut reader = storage.open_read(Path::new("large")).unwrap();
        reader.seek(SeekFrom::Start(1490)).unwrap();
        let mut buf = [0u8; 32];
        assert_eq!(reader.read(&mut buf).unwrap(), 10);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_writer_seek_overwrites_in_place() {
        let (storage, _temp) = storage(false);

        let mut writer = storage.open_write(Path::new("patched")).unwrap();
        writer.write_all(b"aaaaaaaa").unwrap();
        writer.seek(SeekFrom::Current(-4)).unwrap();
        writer.write_all(b"bb").unwrap();
        writer.finish().unwrap();

        assert_eq!(read_all(&storage, "patched"), b"aaaabbaa");
    }

    #[test]
    fn test_update_keeps_existing_bytes() {
        let (storage, _temp) = storage(false);
        write_file(&storage, "shared", b"aaaaaaaa");

        let mut writer = storage.open_update(Path::new("shared")).unwrap();
        writer.seek(SeekFrom::Start(6)).unwrap();
        writer.write_all(b"cc").unwrap();
        writer.finish().unwrap();
        assert_eq!(read_all(&storage, "shared"), b"aaaaaacc");

        assert!(matches!(
            storage.open_update(Path::new("absent")),
            Err(LatticeError::OpenFailed { .. })
        ));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let (storage, temp) = storage(false);
        write_file(&storage, "run/cfg.vol0000", b"x");
        assert!(storage.exists(Path::new("run/cfg.vol0000")).unwrap());
        assert!(!storage.exists(Path::new("run")).unwrap());
        assert!(temp.path().join("run").is_dir());
    }

    #[test]
    fn test_delete() {
        let (storage, _temp) = storage(false);

        write_file(&storage, "stale", b"old");
        storage.delete(Path::new("stale")).unwrap();
        assert!(!storage.exists(Path::new("stale")).unwrap());
        storage.delete(Path::new("stale")).unwrap();
    }
}
