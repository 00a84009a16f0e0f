// rust/lattice-io/src/session/writer.rs

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::access_mode;
use crate::checksum::Checksum;
use crate::config::{IoConfig, Verbosity};
use crate::error::{LatticeError, Result};
use crate::layout::{validate_layout, LatticeLayout};
use crate::metadata::{ChecksumInfo, FileInfo, RecordInfo};
use crate::record::{
    RecordHeader, RecordSink, RecordWriter, BINARY_DATA, CHECKSUM, FILE_XML, PRIVATE_FILE_XML,
    PRIVATE_RECORD_XML, RECORD_XML, SITELIST,
};
use crate::sitelist::SiteList;
use crate::storage::StorageBackend;
use crate::transfer::{write_global, write_partition, DatumShape, SiteAccessor};
use crate::transport::Transport;
use crate::volume::{file_holders, role, volume_path, IoMode, Role, VolumeFormat};

/// How a file is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    pub volfmt: VolumeFormat,
    pub mode: IoMode,
}

impl WriterOptions {
    pub fn new(volfmt: VolumeFormat) -> Self {
        Self {
            volfmt,
            mode: IoMode::Serial,
        }
    }
}

/// Every I/O node writes its own sites into the one file.
fn shares_one_file(volfmt: VolumeFormat, mode: IoMode) -> bool {
    volfmt == VolumeFormat::SingleFile && mode == IoMode::Parallel
}

/// One node's end of a collective file write.
pub struct QioWriter<'a> {
    layout: &'a dyn LatticeLayout,
    transport: &'a dyn Transport,
    config: IoConfig,
    volfmt: VolumeFormat,
    mode: IoMode,
    role: Role,
    share_globals: bool,
    sites: SiteList,
    file: Option<RecordWriter>,
    records: usize,
    bytes: u64,
}

impl<'a> QioWriter<'a> {
    /// Creates the files of a new lattice file and writes their headers.
    ///
    /// Every node calls this with the same `path`, `user_file_xml` and
    /// options.
    pub fn open(
        storage: &dyn StorageBackend,
        path: &Path,
        layout: &'a dyn LatticeLayout,
        transport: &'a dyn Transport,
        user_file_xml: &str,
        options: WriterOptions,
        config: &IoConfig,
    ) -> Result<Self> {
        validate_layout(layout)?;
        config.validate()?;
        let me = transport.this_node();

        let master = layout.master_io_node();
        let volfmt = options.volfmt;
        let mode = options.mode;
        let shared = shares_one_file(volfmt, mode);

        let role = role(layout, volfmt, mode, me);
        let share_globals = !shared && file_holders(layout, volfmt, mode).len() > 1;
        let sites = SiteList::build(layout, volfmt, mode, me)?;

        if volfmt != VolumeFormat::SingleFile && me == master {
            // Readers try the bare path before any `.volNNNN` file.
            storage.delete(path)?;
        }

        let mut file = if role.holds_file && (!shared || me == master) {
            let file_path: PathBuf = volume_path(path, volfmt, me);
            let mut file = RecordWriter::create(storage, &file_path)?;

            let file_info = FileInfo::new(layout.dims(), volfmt);
            file.write_record(PRIVATE_FILE_XML, file_info.to_xml()?.as_bytes())?;
            if volfmt.has_sitelist() {
                file.write_record(SITELIST, &sites.encode()?)?;
            }
            file.write_record(FILE_XML, user_file_xml.as_bytes())?;
            Some(file)
        } else {
            None
        };

        if shared {
            // The master creates the file; the other I/O nodes open it after.
            transport.barrier()?;
            if role.holds_file && me != master {
                file = Some(RecordWriter::attach(storage, path)?);
            }
        }

        if me == master && config.logging.verbosity >= Verbosity::Low {
            info!(
                path = %path.display(),
                format = %volfmt,
                mode = ?mode,
                nodes = transport.number_of_nodes(),
                "opened lattice file for writing"
            );
        }

        Ok(Self {
            layout,
            transport,
            config: config.clone(),
            volfmt,
            mode,
            role,
            share_globals,
            sites,
            file,
            records: 0,
            bytes: 0,
        })
    }

    pub fn volfmt(&self) -> VolumeFormat {
        self.volfmt
    }

    pub fn mode(&self) -> IoMode {
        self.mode
    }

    /// Binary data bytes written so far, summed over every node.
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Whether this node writes record headers and checksums. In a shared
    /// SINGLEFILE only the master does; the other I/O nodes fill in sites.
    fn writes_headers(&self) -> bool {
        self.file.is_some()
            && (!shares_one_file(self.volfmt, self.mode)
                || self.transport.this_node() == self.layout.master_io_node())
    }

    /// Writes one record. Returns the checksum stored with it, the same on
    /// every node.
    pub fn write(
        &mut self,
        record_info: &RecordInfo,
        user_record_xml: &str,
        accessor: &mut dyn SiteAccessor,
    ) -> Result<Checksum> {
        let shape = DatumShape::try_from(record_info)?;
        let me = self.transport.this_node();
        let master = self.layout.master_io_node();
        let leader = self.writes_headers();
        let joined = shares_one_file(self.volfmt, self.mode) && !record_info.globaldata;

        let (file_bytes, expected_total) = if record_info.globaldata {
            (shape.size as u64, shape.size as u64)
        } else {
            let volume = self.layout.volume();
            let local = match self.volfmt {
                VolumeFormat::SingleFile => volume,
                _ => self.sites.len(),
            };
            (shape.bytes(local)?, shape.bytes(volume)?)
        };

        if leader {
            if let Some(file) = self.file.as_mut() {
                file.write_record(PRIVATE_RECORD_XML, record_info.to_xml()?.as_bytes())?;
                file.write_record(RECORD_XML, user_record_xml.as_bytes())?;
                file.begin_record(&RecordHeader::new(BINARY_DATA, file_bytes))?;
            }
        }
        if joined {
            let mut origin = [0u8; 8];
            if me == master {
                if let Some(file) = self.file.as_mut() {
                    origin = file.record_origin()?.to_be_bytes();
                }
            }
            self.transport.broadcast(&mut origin, master)?;
            if !leader {
                if let Some(file) = self.file.as_mut() {
                    file.join_record(u64::from_be_bytes(origin), file_bytes)?;
                }
            }
        }

        let summary = if record_info.globaldata {
            let sink = if leader {
                self.file.as_mut().map(|f| f as &mut dyn RecordSink)
            } else {
                None
            };
            write_global(self.transport, master, shape, accessor, sink, self.share_globals)?
        } else {
            write_partition(
                self.layout,
                self.transport,
                self.role.io_node,
                &self.sites,
                shape,
                accessor,
                self.file.as_mut().map(|f| f as &mut dyn RecordSink),
                access_mode(self.volfmt, self.mode),
                self.config.transfer.buffer_budget_bytes,
            )?
        };

        if let Some(file) = self.file.as_mut() {
            match (leader, joined) {
                (true, false) => file.end_record()?,
                (true, true) => file.end_shared_record()?,
                (false, true) => file.leave_record()?,
                (false, false) => {}
            }
        }

        let total = self.transport.global_sum(summary.bytes)?;
        if total != expected_total {
            return Err(LatticeError::BadWriteBytes {
                expected: expected_total,
                actual: total,
            });
        }

        let mut checksum = summary.checksum;
        checksum.combine(self.transport)?;
        if leader {
            if let Some(file) = self.file.as_mut() {
                file.write_record(CHECKSUM, ChecksumInfo::from(checksum).to_xml()?.as_bytes())?;
            }
        }

        self.records += 1;
        self.bytes += total;
        if me == master && self.config.logging.verbosity >= Verbosity::Regular {
            debug!(
                record = self.records,
                datatype = %record_info.datatype,
                global = record_info.globaldata,
                bytes = total,
                suma = checksum.suma,
                sumb = checksum.sumb,
                "wrote record"
            );
        }
        Ok(checksum)
    }

    /// Closes this node's file and waits for every node to finish.
    pub fn close(self) -> Result<usize> {
        if let Some(file) = self.file {
            file.finish()?;
        }
        self.transport.barrier()?;
        Ok(self.records)
    }
}
