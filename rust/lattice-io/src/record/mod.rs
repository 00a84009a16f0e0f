// rust/lattice-io/src/record/mod.rs

//! The record container.
//!
//! A lattice file is a sequence of typed, byte-counted records. Each record
//! starts with a fixed 144-byte big-endian header followed by its payload,
//! zero-padded to a multiple of 8 bytes.
//!
//! The buffered transfer only needs to write, read, and seek relative to the
//! current position inside an open record. Those three calls are the
//! [`RecordSink`] and [`RecordSource`] traits.

mod lime;

pub use lime::{RecordHeader, RecordReader, RecordWriter, HEADER_LEN, LIME_MAGIC, LIME_VERSION};

use crate::error::Result;

pub const PRIVATE_FILE_XML: &str = "scidac-private-file-xml";
pub const SITELIST: &str = "scidac-sitelist";
pub const FILE_XML: &str = "scidac-file-xml";
pub const PRIVATE_RECORD_XML: &str = "scidac-private-record-xml";
pub const RECORD_XML: &str = "scidac-record-xml";
pub const BINARY_DATA: &str = "scidac-binary-data";
pub const CHECKSUM: &str = "scidac-checksum";

/// Destination of an open record's payload.
pub trait RecordSink {
    /// Writes all of `buf`, returning the number of bytes written.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Moves the write position by `offset` bytes from where it is now.
    fn seek_relative(&mut self, offset: i64) -> Result<()>;
}

/// Source of an open record's payload.
pub trait RecordSource {
    /// Fills `buf` from the record, returning how many bytes were read. A
    /// short count means the record ended first.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Moves the read position by `offset` bytes from where it is now.
    fn seek_relative(&mut self, offset: i64) -> Result<()>;
}
