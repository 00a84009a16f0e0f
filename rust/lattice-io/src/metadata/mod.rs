// rust/lattice-io/src/metadata/mod.rs

//! Private metadata records.
//!
//! Every file starts with a [`FileInfo`] document describing the lattice
//! and the volume format. Every record carries a [`RecordInfo`] document
//! describing its datum and ends with a [`ChecksumInfo`] document. Caller
//! supplied XML travels alongside these untouched.

mod info;
pub mod xml;

pub use info::{ChecksumInfo, FileInfo, RecordInfo, CHECKSUM_VERSION, FILE_VERSION, RECORD_VERSION};
pub use xml::{TagTable, TagValue, MAX_XML_LEN};
