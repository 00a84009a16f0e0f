// rust/lattice-io/src/session/reader.rs

use std::path::Path;

use tracing::{debug, info, warn};

use super::{access_mode, first_file, RecordState};
use crate::checksum::Checksum;
use crate::config::{IoConfig, Verbosity};
use crate::error::{LatticeError, Result};
use crate::layout::{validate_layout, LatticeLayout, ScalarLayout};
use crate::metadata::{ChecksumInfo, FileInfo, RecordInfo};
use crate::record::{
    RecordReader, RecordSource, BINARY_DATA, CHECKSUM, FILE_XML, PRIVATE_FILE_XML,
    PRIVATE_RECORD_XML, RECORD_XML, SITELIST,
};
use crate::sitelist::SiteList;
use crate::storage::StorageBackend;
use crate::transfer::{read_global, read_partition, DatumShape, SiteAccessor};
use crate::transport::{broadcast_bytes, Transport};
use crate::volume::{role, volume_path, IoMode, Role, VolumeFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaderOptions {
    /// Parallel mode lets every I/O node read its own sites out of a
    /// SINGLEFILE file. Other formats ignore it.
    pub mode: IoMode,
}

fn utf8(bytes: Vec<u8>, what: &str) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| LatticeError::bad_record_info(format!("{what} is not UTF-8")))
}

/// One node's end of a collective file read.
pub struct QioReader<'a> {
    layout: &'a dyn LatticeLayout,
    transport: &'a dyn Transport,
    config: IoConfig,
    file_info: FileInfo,
    user_file_xml: String,
    mode: IoMode,
    role: Role,
    sites: SiteList,
    file: Option<RecordReader>,
    state: RecordState,
    pending: Option<RecordInfo>,
    records: usize,
}

impl<'a> QioReader<'a> {
    /// Opens a lattice file on every node.
    ///
    /// A layout with no dimensions opens the file only to learn its shape:
    /// the reader is then in discovery mode and gives no record access.
    pub fn open(
        storage: &dyn StorageBackend,
        path: &Path,
        layout: &'a dyn LatticeLayout,
        transport: &'a dyn Transport,
        options: ReaderOptions,
        config: &IoConfig,
    ) -> Result<Self> {
        config.validate()?;
        let me = transport.this_node();
        let master = layout.master_io_node();
        let discovery = layout.dims().is_empty();

        let mut master_file = None;
        let mut xml = Vec::new();
        if me == master {
            let first = first_file(storage, path, master)?;
            let mut file = RecordReader::open(storage, &first)?;
            file.expect_record(PRIVATE_FILE_XML)?;
            xml = file.read_record_data()?;
            master_file = Some((first, file));
        }
        broadcast_bytes(transport, &mut xml, master)?;
        let file_info = FileInfo::from_xml(
            &String::from_utf8(xml).map_err(|_| LatticeError::bad_file_info("file info is not UTF-8"))?,
        )?;

        if discovery {
            if me == master && config.logging.verbosity >= Verbosity::Low {
                info!(path = %path.display(), dims = ?file_info.dims, format = %file_info.volfmt, "discovered lattice file");
            }
            return Ok(Self {
                layout,
                transport,
                config: config.clone(),
                file_info,
                user_file_xml: String::new(),
                mode: options.mode,
                role: Role {
                    io_node: master,
                    holds_file: false,
                },
                sites: SiteList::implicit(0),
                file: None,
                state: RecordState::Discovery,
                pending: None,
                records: 0,
            });
        }

        file_info.validate(layout)?;
        validate_layout(layout)?;

        let volfmt = file_info.volfmt;
        let mode = options.mode;
        let role = role(layout, volfmt, mode, me);
        let sites = SiteList::build(layout, volfmt, mode, me)?;

        let mut file = None;
        if role.holds_file {
            let own = match volfmt {
                VolumeFormat::SingleFile => first_file(storage, path, master)?,
                _ => volume_path(path, volfmt, me),
            };
            let mut reader = match master_file.take() {
                Some((opened, reader)) if opened == own => reader,
                _ => {
                    let mut reader = RecordReader::open(storage, &own)?;
                    reader.expect_record(PRIVATE_FILE_XML)?;
                    let text = String::from_utf8(reader.read_record_data()?)
                        .map_err(|_| LatticeError::bad_file_info("file info is not UTF-8"))?;
                    let mine = FileInfo::from_xml(&text)?;
                    if mine != file_info {
                        return Err(LatticeError::bad_file_info(format!(
                            "'{}' disagrees with the master's file info",
                            own.display()
                        )));
                    }
                    reader
                }
            };

            if volfmt.has_sitelist() {
                reader.expect_record(SITELIST)?;
                let decoded = SiteList::decode(&reader.read_record_data()?)?;
                sites.verify(&decoded)?;
            }
            reader.expect_record(FILE_XML)?;
            file = Some(reader);
        }

        let mut user = Vec::new();
        if me == master {
            if let Some(reader) = file.as_mut() {
                user = reader.read_record_data()?;
            }
        }
        broadcast_bytes(transport, &mut user, master)?;
        let user_file_xml = utf8(user, "user file XML")?;

        if me == master && config.logging.verbosity >= Verbosity::Low {
            info!(
                path = %path.display(),
                format = %volfmt,
                mode = ?mode,
                nodes = transport.number_of_nodes(),
                "opened lattice file for reading"
            );
        }

        Ok(Self {
            layout,
            transport,
            config: config.clone(),
            file_info,
            user_file_xml,
            mode,
            role,
            sites,
            file,
            state: RecordState::AwaitingRecordInfo,
            pending: None,
            records: 0,
        })
    }

    /// Reads only the private file info of `path`.
    pub fn discover(
        storage: &dyn StorageBackend,
        path: &Path,
        transport: &dyn Transport,
        config: &IoConfig,
    ) -> Result<FileInfo> {
        let layout = ScalarLayout::unset();
        let reader = QioReader::open(storage, path, &layout, transport, ReaderOptions::default(), config)?;
        Ok(reader.file_info)
    }

    pub fn file_info(&self) -> &FileInfo {
        &self.file_info
    }

    pub fn dims(&self) -> &[usize] {
        &self.file_info.dims
    }

    pub fn volfmt(&self) -> VolumeFormat {
        self.file_info.volfmt
    }

    pub fn user_file_xml(&self) -> &str {
        &self.user_file_xml
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    /// Reads the metadata of the next record. `None` once every record has
    /// been read.
    pub fn read_record_info(&mut self) -> Result<Option<(RecordInfo, String)>> {
        match self.state {
            RecordState::AwaitingRecordInfo => {}
            RecordState::Eof => return Ok(None),
            state => {
                return Err(LatticeError::usage(format!(
                    "record info requested while {state:?}"
                )))
            }
        }
        let me = self.transport.this_node();
        let master = self.layout.master_io_node();

        let mut local = None;
        if let Some(file) = self.file.as_mut() {
            if let Some(header) = file.next_record()? {
                if header.record_type != PRIVATE_RECORD_XML {
                    return Err(LatticeError::storage(
                        file.path(),
                        format!("expected a record, found '{}'", header.record_type),
                    ));
                }
                let private = file.read_record_data()?;
                file.expect_record(RECORD_XML)?;
                let user = file.read_record_data()?;
                local = Some((private, user));
            }
        }

        let (mut private, mut user) = match (me == master, &local) {
            (true, Some((p, u))) => (p.clone(), u.clone()),
            _ => (Vec::new(), Vec::new()),
        };
        broadcast_bytes(self.transport, &mut private, master)?;
        broadcast_bytes(self.transport, &mut user, master)?;

        if private.is_empty() {
            if local.is_some() {
                warn!(node = me, "file has records past the master's end of file");
            }
            self.state = RecordState::Eof;
            return Ok(None);
        }
        if let (Some(file), None) = (self.file.as_ref(), &local) {
            return Err(LatticeError::storage(
                file.path(),
                "file ended before the master's",
            ));
        }

        let info = RecordInfo::from_xml(&utf8(private, "record info")?)?;
        let user = utf8(user, "user record XML")?;
        self.pending = Some(info.clone());
        self.state = RecordState::AwaitingData;
        Ok(Some((info, user)))
    }

    /// Reads the data of the record whose info was just read. Returns the
    /// checksum, which has been checked against the one stored in the file.
    pub fn read_record_data(&mut self, accessor: &mut dyn SiteAccessor) -> Result<Checksum> {
        let info = match (self.state, self.pending.take()) {
            (RecordState::AwaitingData, Some(info)) => info,
            (state, _) => {
                return Err(LatticeError::usage(format!(
                    "record data requested while {state:?}"
                )))
            }
        };
        self.state = RecordState::AwaitingRecordInfo;

        let shape = DatumShape::try_from(&info)?;
        let me = self.transport.this_node();
        let master = self.layout.master_io_node();
        let volfmt = self.file_info.volfmt;

        let (file_bytes, expected_total) = if info.globaldata {
            (shape.size as u64, shape.size as u64)
        } else {
            let volume = self.layout.volume();
            let local = match volfmt {
                VolumeFormat::SingleFile => volume,
                _ => self.sites.len(),
            };
            (shape.bytes(local)?, shape.bytes(volume)?)
        };

        if let Some(file) = self.file.as_mut() {
            let header = file.expect_record(BINARY_DATA)?;
            if header.data_length != file_bytes {
                return Err(LatticeError::BadReadBytes {
                    expected: file_bytes,
                    actual: header.data_length,
                });
            }
        }

        let summary = if info.globaldata {
            let source = if me == master {
                self.file.as_mut().map(|f| f as &mut dyn RecordSource)
            } else {
                None
            };
            read_global(
                self.transport,
                master,
                shape,
                accessor,
                source,
                self.config.transfer.broadcast_globals,
            )?
        } else {
            read_partition(
                self.layout,
                self.transport,
                self.role.io_node,
                &self.sites,
                shape,
                accessor,
                self.file.as_mut().map(|f| f as &mut dyn RecordSource),
                access_mode(volfmt, self.mode),
                self.config.transfer.buffer_budget_bytes,
            )?
        };

        let total = self.transport.global_sum(summary.bytes)?;
        if total != expected_total {
            return Err(LatticeError::BadReadBytes {
                expected: expected_total,
                actual: total,
            });
        }

        let mut checksum = summary.checksum;
        checksum.combine(self.transport)?;
        if let Some(file) = self.file.as_mut() {
            file.expect_record(CHECKSUM)?;
            let stored = ChecksumInfo::from_xml(&utf8(file.read_record_data()?, "checksum")?)?;
            stored.verify(&checksum)?;
        }

        self.records += 1;
        if me == master && self.config.logging.verbosity >= Verbosity::Regular {
            debug!(
                record = self.records,
                datatype = %info.datatype,
                global = info.globaldata,
                bytes = total,
                suma = checksum.suma,
                sumb = checksum.sumb,
                "read record"
            );
        }
        Ok(checksum)
    }

    /// Reads the next record, checking its info against `expected`. On a
    /// mismatch the record's data is still pending and can be skipped.
    pub fn read(
        &mut self,
        expected: &RecordInfo,
        accessor: &mut dyn SiteAccessor,
    ) -> Result<Option<(String, Checksum)>> {
        let Some((info, user)) = self.read_record_info()? else {
            return Ok(None);
        };
        info.compare(expected)?;
        let checksum = self.read_record_data(accessor)?;
        Ok(Some((user, checksum)))
    }

    /// Passes over the data of the record whose info was just read.
    pub fn skip_record_data(&mut self) -> Result<()> {
        if self.state != RecordState::AwaitingData {
            return Err(LatticeError::usage(format!(
                "skip requested while {:?}",
                self.state
            )));
        }
        if let Some(file) = self.file.as_mut() {
            file.expect_record(BINARY_DATA)?;
            file.expect_record(CHECKSUM)?;
        }
        self.pending = None;
        self.state = RecordState::AwaitingRecordInfo;
        Ok(())
    }

    /// Waits for every node and reports how many records were read.
    pub fn close(self) -> Result<usize> {
        if self.state != RecordState::Discovery {
            self.transport.barrier()?;
        }
        Ok(self.records)
    }
}
