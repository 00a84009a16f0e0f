// rust/lattice-io/src/record/lime.rs

use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{trace, warn};

use super::{RecordSink, RecordSource};
use crate::error::{LatticeError, Result};
use crate::storage::{StorageBackend, StorageReader, StorageWriter};

pub const LIME_MAGIC: u32 = 0x4567_89ab;
pub const LIME_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 144;

const TYPE_OFFSET: usize = 16;
const TYPE_LEN: usize = HEADER_LEN - TYPE_OFFSET;
const FLAG_MESSAGE_BEGIN: u16 = 0x8000;
const FLAG_MESSAGE_END: u16 = 0x4000;

fn padding(length: u64) -> u64 {
    (8 - length % 8) % 8
}

/// Header of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub record_type: String,
    pub data_length: u64,
    pub message_begin: bool,
    pub message_end: bool,
}

impl RecordHeader {
    pub fn new(record_type: &str, data_length: u64) -> Self {
        Self {
            record_type: record_type.to_string(),
            data_length,
            message_begin: false,
            message_end: false,
        }
    }

    pub fn encode(&self) -> Result<[u8; HEADER_LEN]> {
        let name = self.record_type.as_bytes();
        if name.len() >= TYPE_LEN {
            return Err(LatticeError::usage(format!(
                "record type '{}' is longer than {} bytes",
                self.record_type,
                TYPE_LEN - 1
            )));
        }

        let mut flags = 0u16;
        if self.message_begin {
            flags |= FLAG_MESSAGE_BEGIN;
        }
        if self.message_end {
            flags |= FLAG_MESSAGE_END;
        }

        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&LIME_MAGIC.to_be_bytes());
        out[4..6].copy_from_slice(&LIME_VERSION.to_be_bytes());
        out[6..8].copy_from_slice(&flags.to_be_bytes());
        out[8..16].copy_from_slice(&self.data_length.to_be_bytes());
        out[TYPE_OFFSET..TYPE_OFFSET + name.len()].copy_from_slice(name);
        Ok(out)
    }

    /// Parses a header. `None` if the magic number is wrong.
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Option<Self> {
        let magic = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != LIME_MAGIC {
            return None;
        }
        let flags = u16::from_be_bytes([bytes[6], bytes[7]]);
        let mut length = [0u8; 8];
        length.copy_from_slice(&bytes[8..16]);

        let name = &bytes[TYPE_OFFSET..];
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());

        Some(Self {
            record_type: String::from_utf8_lossy(&name[..end]).into_owned(),
            data_length: u64::from_be_bytes(length),
            message_begin: flags & FLAG_MESSAGE_BEGIN != 0,
            message_end: flags & FLAG_MESSAGE_END != 0,
        })
    }
}

/// Position inside the record currently open.
#[derive(Debug, Clone, Copy)]
struct OpenRecord {
    length: u64,
    pos: u64,
    high_water: u64,
}

impl OpenRecord {
    fn new(length: u64) -> Self {
        Self {
            length,
            pos: 0,
            high_water: 0,
        }
    }

    fn target(&self, offset: i64) -> Option<u64> {
        let target = self.pos.checked_add_signed(offset)?;
        (target <= self.length).then_some(target)
    }
}

/// Writes records into one physical file.
pub struct RecordWriter {
    path: PathBuf,
    writer: Box<dyn StorageWriter>,
    current: Option<OpenRecord>,
    records: usize,
}

impl RecordWriter {
    pub fn create(storage: &dyn StorageBackend, path: &Path) -> Result<Self> {
        let writer = storage.open_write(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            current: None,
            records: 0,
        })
    }

    /// Opens an existing file to write into records that another writer of
    /// the same file declares.
    pub fn attach(storage: &dyn StorageBackend, path: &Path) -> Result<Self> {
        let writer = storage.open_update(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            current: None,
            records: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolute file offset of the open record's first payload byte.
    pub fn record_origin(&mut self) -> Result<u64> {
        let pos = self
            .current
            .as_ref()
            .ok_or_else(|| LatticeError::usage("no record is open"))?
            .pos;
        let at = self
            .writer
            .stream_position()
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to locate record", e))?;
        Ok(at - pos)
    }

    /// Enters a record of `length` bytes whose payload starts at `origin`,
    /// declared through another handle on the same file.
    pub fn join_record(&mut self, origin: u64, length: u64) -> Result<()> {
        if self.current.is_some() {
            return Err(LatticeError::usage(format!(
                "record open in '{}' while joining another",
                self.path.display()
            )));
        }
        self.writer
            .seek(SeekFrom::Start(origin))
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to seek to record", e))?;
        self.current = Some(OpenRecord::new(length));
        Ok(())
    }

    /// Leaves a joined record, flushing what this handle wrote into it.
    pub fn leave_record(&mut self) -> Result<()> {
        self.current
            .take()
            .ok_or_else(|| LatticeError::usage("no record is open"))?;
        self.writer
            .flush()
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to flush record data", e))
    }

    /// Writes the header of a new record of `length` payload bytes.
    pub fn begin_record(&mut self, header: &RecordHeader) -> Result<()> {
        if self.current.is_some() {
            return Err(LatticeError::usage(format!(
                "record open in '{}' while starting '{}'",
                self.path.display(),
                header.record_type
            )));
        }
        let bytes = header.encode()?;
        self.writer
            .write_all(&bytes)
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to write record header", e))?;

        trace!(path = %self.path.display(), record_type = %header.record_type, length = header.data_length, "begin record");
        self.current = Some(OpenRecord::new(header.data_length));
        Ok(())
    }

    /// Writes a whole record in one call.
    pub fn write_record(&mut self, record_type: &str, payload: &[u8]) -> Result<()> {
        self.begin_record(&RecordHeader::new(record_type, payload.len() as u64))?;
        RecordSink::write(self, payload)?;
        self.end_record()
    }

    /// Pads and closes the open record. Every declared byte must have been
    /// written.
    pub fn end_record(&mut self) -> Result<()> {
        let record = self
            .current
            .take()
            .ok_or_else(|| LatticeError::usage("no record is open"))?;
        if record.high_water != record.length {
            return Err(LatticeError::BadWriteBytes {
                expected: record.length,
                actual: record.high_water,
            });
        }
        self.pad(record)
    }

    /// Pads and closes a record that other handles wrote into as well. The
    /// caller accounts for the bytes.
    pub fn end_shared_record(&mut self) -> Result<()> {
        let record = self
            .current
            .take()
            .ok_or_else(|| LatticeError::usage("no record is open"))?;
        self.pad(record)
    }

    fn pad(&mut self, record: OpenRecord) -> Result<()> {
        let to_end = (record.length - record.pos) as i64;
        if to_end != 0 {
            self.writer
                .seek(SeekFrom::Current(to_end))
                .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to seek to record end", e))?;
        }
        let pad = [0u8; 8];
        self.writer
            .write_all(&pad[..padding(record.length) as usize])
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to pad record", e))?;

        self.records += 1;
        Ok(())
    }

    /// Flushes and closes the file.
    pub fn finish(self) -> Result<usize> {
        if self.current.is_some() {
            return Err(LatticeError::usage(format!(
                "closing '{}' with a record still open",
                self.path.display()
            )));
        }
        self.writer.finish()?;
        Ok(self.records)
    }
}

impl RecordSink for RecordWriter {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let record = self
            .current
            .as_mut()
            .ok_or_else(|| LatticeError::usage("write outside a record"))?;

        let end = record.pos + buf.len() as u64;
        if end > record.length {
            return Err(LatticeError::BadWriteBytes {
                expected: record.length,
                actual: end,
            });
        }
        self.writer
            .write_all(buf)
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to write record data", e))?;

        record.pos = end;
        record.high_water = record.high_water.max(end);
        Ok(buf.len())
    }

    fn seek_relative(&mut self, offset: i64) -> Result<()> {
        let record = self
            .current
            .as_mut()
            .ok_or_else(|| LatticeError::usage("seek outside a record"))?;
        let target = record.target(offset).ok_or(LatticeError::BadWriteBytes {
            expected: record.length,
            actual: record.pos.saturating_add_signed(offset),
        })?;

        self.writer
            .seek(SeekFrom::Current(offset))
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to seek in record", e))?;
        record.pos = target;
        Ok(())
    }
}

/// Reads records from one physical file.
pub struct RecordReader {
    path: PathBuf,
    reader: Box<dyn StorageReader>,
    current: Option<OpenRecord>,
}

impl RecordReader {
    pub fn open(storage: &dyn StorageBackend, path: &Path) -> Result<Self> {
        let reader = storage.open_read(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            current: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Advances to the next record, skipping whatever is left of the current
    /// one. `None` at a clean end of file.
    pub fn next_record(&mut self) -> Result<Option<RecordHeader>> {
        if let Some(record) = self.current.take() {
            let skip = (record.length - record.pos + padding(record.length)) as i64;
            self.reader
                .seek(SeekFrom::Current(skip))
                .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to skip record", e))?;
        }

        let mut bytes = [0u8; HEADER_LEN];
        let got = read_full(self.reader.as_mut(), &mut bytes)
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to read record header", e))?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_LEN {
            return Err(LatticeError::storage(
                &self.path,
                format!("truncated record header ({got} of {HEADER_LEN} bytes)"),
            ));
        }

        let header = RecordHeader::decode(&bytes)
            .ok_or_else(|| LatticeError::storage(&self.path, "bad record magic number"))?;
        let at = self
            .reader
            .stream_position()
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to locate record", e))?;
        let available = self.reader.len().saturating_sub(at);
        if header.data_length > available {
            warn!(
                path = %self.path.display(),
                record_type = %header.record_type,
                declared = header.data_length,
                available,
                "record runs past the end of the file"
            );
            return Err(LatticeError::BadReadBytes {
                expected: header.data_length,
                actual: available,
            });
        }
        trace!(path = %self.path.display(), record_type = %header.record_type, length = header.data_length, "next record");
        self.current = Some(OpenRecord::new(header.data_length));
        Ok(Some(header))
    }

    /// Advances to the next record and checks its type. Running out of
    /// records here is an error.
    pub fn expect_record(&mut self, record_type: &str) -> Result<RecordHeader> {
        let header = self.next_record()?.ok_or_else(|| {
            LatticeError::storage(&self.path, format!("missing '{record_type}' record"))
        })?;
        if header.record_type != record_type {
            return Err(LatticeError::storage(
                &self.path,
                format!("expected '{record_type}' record, found '{}'", header.record_type),
            ));
        }
        Ok(header)
    }

    /// Reads what is left of the current record.
    pub fn read_record_data(&mut self) -> Result<Vec<u8>> {
        let record = self
            .current
            .ok_or_else(|| LatticeError::usage("read outside a record"))?;
        let left = record.length - record.pos;
        let left = usize::try_from(left)
            .map_err(|_| LatticeError::alloc(format!("record of {left} bytes")))?;

        let mut data = Vec::new();
        data.try_reserve_exact(left)
            .map_err(|e| LatticeError::alloc(format!("record of {left} bytes: {e}")))?;
        data.resize(left, 0);

        let got = RecordSource::read(self, &mut data)?;
        if got != left {
            return Err(LatticeError::BadReadBytes {
                expected: left as u64,
                actual: got as u64,
            });
        }
        Ok(data)
    }

    /// Data length of the current record.
    pub fn record_length(&self) -> Option<u64> {
        self.current.map(|r| r.length)
    }
}

impl RecordSource for RecordReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let record = self
            .current
            .as_mut()
            .ok_or_else(|| LatticeError::usage("read outside a record"))?;

        let want = (buf.len() as u64).min(record.length - record.pos) as usize;
        let got = read_full(self.reader.as_mut(), &mut buf[..want])
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to read record data", e))?;
        record.pos += got as u64;
        Ok(got)
    }

    fn seek_relative(&mut self, offset: i64) -> Result<()> {
        let record = self
            .current
            .as_mut()
            .ok_or_else(|| LatticeError::usage("seek outside a record"))?;
        let target = record.target(offset).ok_or(LatticeError::BadReadBytes {
            expected: record.length,
            actual: record.pos.saturating_add_signed(offset),
        })?;

        self.reader
            .seek(SeekFrom::Current(offset))
            .map_err(|e| LatticeError::storage_with_source(&self.path, "failed to seek in record", e))?;
        record.pos = target;
        Ok(())
    }
}

/// Reads until `buf` is full or the file ends.
fn read_full(reader: &mut dyn StorageReader, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
