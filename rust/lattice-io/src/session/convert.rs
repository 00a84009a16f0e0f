// rust/lattice-io/src/session/convert.rs

//! Host-side conversion between PARTFILE and SINGLEFILE.
//!
//! One process plays every I/O node in turn. [`IoNodeLayout`] puts each
//! partition on its I/O node, and [`ScalarLayout`] puts the whole lattice on
//! node 0 in lexicographic order. The whole field sits in one host buffer in
//! lexicographic order, so each side of the conversion is an ordinary
//! partition transfer with no messages ever sent.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::checksum::Checksum;
use crate::config::{IoConfig, Verbosity};
use crate::error::{LatticeError, Result};
use crate::layout::{lex_rank, validate_layout, IoNodeLayout, LatticeLayout, ScalarLayout};
use crate::metadata::{ChecksumInfo, FileInfo, RecordInfo};
use crate::record::{
    RecordHeader, RecordReader, RecordSink, RecordSource, RecordWriter, BINARY_DATA, CHECKSUM,
    FILE_XML, PRIVATE_FILE_XML, PRIVATE_RECORD_XML, RECORD_XML, SITELIST,
};
use crate::sitelist::SiteList;
use crate::storage::StorageBackend;
use crate::transfer::{
    read_global, read_partition, write_global, write_partition, AccessMode, DatumShape,
    SiteAccessor, SiteBuffer,
};
use crate::transport::SingleProcess;
use crate::volume::{volume_path, VolumeFormat};

/// What a conversion copied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    pub records: usize,
    /// Checksum of each record, in file order.
    pub checksums: Vec<Checksum>,
    /// Binary data bytes written, over every output file.
    pub bytes: u64,
}

/// Addresses a lexicographically ordered host buffer through the storage
/// order of one node of `layout`.
struct HostView<'h> {
    layout: &'h dyn LatticeLayout,
    node: usize,
    host: &'h mut SiteBuffer,
    coords: Vec<usize>,
}

impl<'h> HostView<'h> {
    fn new(layout: &'h dyn LatticeLayout, node: usize, host: &'h mut SiteBuffer) -> Self {
        Self {
            layout,
            node,
            host,
            coords: vec![0; layout.dims().len()],
        }
    }

    fn rank(&mut self, index: usize) -> usize {
        self.layout.get_coords(&mut self.coords, self.node, index);
        lex_rank(&self.coords, self.layout.dims()) as usize
    }
}

impl SiteAccessor for HostView<'_> {
    fn get(&mut self, buf: &mut [u8], index: usize, _count: usize) {
        let rank = self.rank(index);
        buf.copy_from_slice(self.host.site(rank));
    }

    fn put(&mut self, buf: &[u8], index: usize, _count: usize) {
        let rank = self.rank(index);
        self.host.site_mut(rank).copy_from_slice(buf);
    }
}

fn text(bytes: Vec<u8>, what: &str) -> Result<String> {
    String::from_utf8(bytes).map_err(|_| LatticeError::bad_record_info(format!("{what} is not UTF-8")))
}

/// Reads and checks a file's private file info.
fn read_file_info(
    file: &mut RecordReader,
    volfmt: VolumeFormat,
    layout: &dyn LatticeLayout,
) -> Result<()> {
    file.expect_record(PRIVATE_FILE_XML)?;
    let info = FileInfo::from_xml(&text(file.read_record_data()?, "file info")?)?;
    if info.volfmt != volfmt {
        return Err(LatticeError::bad_file_info(format!(
            "'{}' is {}, expected {volfmt}",
            file.path().display(),
            info.volfmt
        )));
    }
    info.validate(layout)
}

/// Reads the private and user XML of the next record. `None` at end of file.
fn next_record_info(file: &mut RecordReader) -> Result<Option<(RecordInfo, String)>> {
    let Some(header) = file.next_record()? else {
        return Ok(None);
    };
    if header.record_type != PRIVATE_RECORD_XML {
        return Err(LatticeError::storage(
            file.path(),
            format!("expected a record, found '{}'", header.record_type),
        ));
    }
    let info = RecordInfo::from_xml(&text(file.read_record_data()?, "record info")?)?;
    file.expect_record(RECORD_XML)?;
    let user = text(file.read_record_data()?, "user record XML")?;
    Ok(Some((info, user)))
}

/// Opens the binary data of the current record and checks its length.
fn expect_data(file: &mut RecordReader, bytes: u64) -> Result<()> {
    let header = file.expect_record(BINARY_DATA)?;
    if header.data_length != bytes {
        return Err(LatticeError::BadReadBytes {
            expected: bytes,
            actual: header.data_length,
        });
    }
    Ok(())
}

fn read_checksum(file: &mut RecordReader) -> Result<ChecksumInfo> {
    file.expect_record(CHECKSUM)?;
    ChecksumInfo::from_xml(&text(file.read_record_data()?, "checksum")?)
}

fn write_record_head(file: &mut RecordWriter, info: &RecordInfo, user: &str, bytes: u64) -> Result<()> {
    file.write_record(PRIVATE_RECORD_XML, info.to_xml()?.as_bytes())?;
    file.write_record(RECORD_XML, user.as_bytes())?;
    file.begin_record(&RecordHeader::new(BINARY_DATA, bytes))
}

fn write_checksum(file: &mut RecordWriter, checksum: Checksum) -> Result<()> {
    file.write_record(CHECKSUM, ChecksumInfo::from(checksum).to_xml()?.as_bytes())
}

/// The two synthetic layouts a conversion moves data between.
struct Plan {
    layout: Arc<dyn LatticeLayout>,
    io_layout: IoNodeLayout,
    scalar: ScalarLayout,
    partitions: Vec<usize>,
    budget: usize,
}

impl Plan {
    fn new(layout: Arc<dyn LatticeLayout>, config: &IoConfig) -> Result<Self> {
        config.validate()?;
        validate_layout(layout.as_ref())?;
        let io_layout = IoNodeLayout::new(Arc::clone(&layout));
        let scalar = ScalarLayout::new(layout.dims().to_vec());
        let partitions = io_layout.io_nodes();
        Ok(Self {
            layout,
            io_layout,
            scalar,
            partitions,
            budget: config.transfer.buffer_budget_bytes,
        })
    }

    fn volume(&self) -> u64 {
        self.scalar.volume()
    }

    fn partition_sites(&self, io_node: usize) -> Result<SiteList> {
        SiteList::for_partition(self.layout.as_ref(), io_node)
    }

    fn host_buffer(&self, shape: DatumShape) -> Result<SiteBuffer> {
        let sites = usize::try_from(self.volume())
            .map_err(|_| LatticeError::alloc(format!("host buffer of {} sites", self.volume())))?;
        SiteBuffer::new(sites, shape.size)
    }

    /// Reads partition `io_node`'s share of a field record into `host`.
    fn read_partition_into(
        &self,
        file: &mut RecordReader,
        io_node: usize,
        shape: DatumShape,
        host: &mut SiteBuffer,
    ) -> Result<(u64, Checksum)> {
        let sites = self.partition_sites(io_node)?;
        expect_data(file, shape.bytes(sites.len())?)?;
        let view_layout = self.io_layout.for_node(io_node);
        let transport = SingleProcess::acting_as(io_node);
        let mut view = HostView::new(&view_layout, io_node, host);
        let summary = read_partition(
            &view_layout,
            &transport,
            io_node,
            &sites,
            shape,
            &mut view,
            Some(&mut *file as &mut dyn RecordSource),
            AccessMode::Sequential,
            self.budget,
        )?;
        Ok((summary.bytes, summary.checksum))
    }

    /// Writes partition `io_node`'s share of `host` as the open binary record.
    fn write_partition_from(
        &self,
        file: &mut RecordWriter,
        io_node: usize,
        shape: DatumShape,
        host: &mut SiteBuffer,
    ) -> Result<(u64, Checksum)> {
        let sites = self.partition_sites(io_node)?;
        let view_layout = self.io_layout.for_node(io_node);
        let transport = SingleProcess::acting_as(io_node);
        let mut view = HostView::new(&view_layout, io_node, host);
        let summary = write_partition(
            &view_layout,
            &transport,
            io_node,
            &sites,
            shape,
            &mut view,
            Some(&mut *file as &mut dyn RecordSink),
            AccessMode::Sequential,
            self.budget,
        )?;
        file.end_record()?;
        Ok((summary.bytes, summary.checksum))
    }

    fn read_whole(&self, file: &mut RecordReader, shape: DatumShape, host: &mut SiteBuffer) -> Result<(u64, Checksum)> {
        expect_data(file, shape.bytes(self.volume())?)?;
        let summary = read_partition(
            &self.scalar,
            &SingleProcess::new(),
            0,
            &SiteList::implicit(self.volume()),
            shape,
            host,
            Some(&mut *file as &mut dyn RecordSource),
            AccessMode::Sequential,
            self.budget,
        )?;
        Ok((summary.bytes, summary.checksum))
    }

    fn write_whole(&self, file: &mut RecordWriter, shape: DatumShape, host: &mut SiteBuffer) -> Result<(u64, Checksum)> {
        let summary = write_partition(
            &self.scalar,
            &SingleProcess::new(),
            0,
            &SiteList::implicit(self.volume()),
            shape,
            host,
            Some(&mut *file as &mut dyn RecordSink),
            AccessMode::Sequential,
            self.budget,
        )?;
        file.end_record()?;
        Ok((summary.bytes, summary.checksum))
    }
}

fn check_bytes(expected: u64, actual: u64) -> Result<()> {
    if expected != actual {
        return Err(LatticeError::BadReadBytes { expected, actual });
    }
    Ok(())
}

/// Joins the partition files of `part_path` into one SINGLEFILE file.
///
/// `layout` is the layout the partition files were written with; its
/// `this_node` is irrelevant.
pub fn part_to_single(
    storage: &dyn StorageBackend,
    part_path: &Path,
    single_path: &Path,
    layout: Arc<dyn LatticeLayout>,
    config: &IoConfig,
) -> Result<ConvertSummary> {
    let plan = Plan::new(layout, config)?;

    let mut inputs = Vec::with_capacity(plan.partitions.len());
    let mut user_file_xml = String::new();
    for (i, &io_node) in plan.partitions.iter().enumerate() {
        let mut file = RecordReader::open(storage, &volume_path(part_path, VolumeFormat::PartFile, io_node))?;
        read_file_info(&mut file, VolumeFormat::PartFile, &plan.scalar)?;
        file.expect_record(SITELIST)?;
        plan.partition_sites(io_node)?
            .verify(&SiteList::decode(&file.read_record_data()?)?)?;
        file.expect_record(FILE_XML)?;
        let user = text(file.read_record_data()?, "user file XML")?;
        if i == 0 {
            user_file_xml = user;
        }
        inputs.push(file);
    }

    let mut output = RecordWriter::create(storage, single_path)?;
    let file_info = FileInfo::new(plan.layout.dims(), VolumeFormat::SingleFile);
    output.write_record(PRIVATE_FILE_XML, file_info.to_xml()?.as_bytes())?;
    output.write_record(FILE_XML, user_file_xml.as_bytes())?;

    let master = plan.layout.master_io_node();
    let mut summary = ConvertSummary::default();
    loop {
        let mut heads = Vec::with_capacity(inputs.len());
        for file in inputs.iter_mut() {
            heads.push(next_record_info(file)?);
        }
        let Some((info, user)) = heads[0].take() else {
            if let Some((i, _)) = heads.iter().enumerate().find(|(_, h)| h.is_some()) {
                return Err(LatticeError::storage(
                    inputs[i].path(),
                    "partition has records past the end of the first partition",
                ));
            }
            break;
        };
        for (file, head) in inputs.iter().zip(&heads).skip(1) {
            match head {
                Some((other, _)) => other.compare(&info)?,
                None => {
                    return Err(LatticeError::storage(file.path(), "partition ended early"));
                }
            }
        }

        let shape = DatumShape::try_from(&info)?;

        let checksum = if info.globaldata {
            let mut datum = SiteBuffer::new(1, shape.size)?;
            let position = plan.partitions.iter().position(|&p| p == master).unwrap_or(0);
            let mut read = Checksum::new();
            for (i, file) in inputs.iter_mut().enumerate() {
                expect_data(file, shape.size as u64)?;
                if i == position {
                    let got = read_global(
                        &SingleProcess::acting_as(master),
                        master,
                        shape,
                        &mut datum,
                        Some(&mut *file as &mut dyn RecordSource),
                        false,
                    )?;
                    check_bytes(shape.size as u64, got.bytes)?;
                    read = got.checksum;
                }
            }
            for file in inputs.iter_mut() {
                read_checksum(file)?.verify(&read)?;
            }

            write_record_head(&mut output, &info, &user, shape.size as u64)?;
            let written = write_global(
                &SingleProcess::new(),
                0,
                shape,
                &mut datum,
                Some(&mut output as &mut dyn RecordSink),
                false,
            )?;
            output.end_record()?;
            summary.bytes += written.bytes;
            written.checksum
        } else {
            let mut host = plan.host_buffer(shape)?;
            let mut merged = Checksum::new();
            let mut bytes = 0;
            for (file, &io_node) in inputs.iter_mut().zip(&plan.partitions) {
                let (got, checksum) = plan.read_partition_into(file, io_node, shape, &mut host)?;
                bytes += got;
                merged.merge(&checksum);
            }
            check_bytes(shape.bytes(plan.volume())?, bytes)?;
            for file in inputs.iter_mut() {
                read_checksum(file)?.verify(&merged)?;
            }

            write_record_head(&mut output, &info, &user, shape.bytes(plan.volume())?)?;
            let (bytes, written) = plan.write_whole(&mut output, shape, &mut host)?;
            summary.bytes += bytes;
            written
        };
        write_checksum(&mut output, checksum)?;

        summary.records += 1;
        summary.checksums.push(checksum);
        if config.logging.verbosity >= Verbosity::Regular {
            debug!(record = summary.records, datatype = %info.datatype, suma = checksum.suma, sumb = checksum.sumb, "converted record");
        }
    }
    output.finish()?;

    if config.logging.verbosity >= Verbosity::Low {
        info!(
            from = %part_path.display(),
            to = %single_path.display(),
            partitions = plan.partitions.len(),
            records = summary.records,
            "joined partition files"
        );
    }
    Ok(summary)
}

/// Splits a SINGLEFILE file into the partition files `layout` would write.
pub fn single_to_part(
    storage: &dyn StorageBackend,
    single_path: &Path,
    part_path: &Path,
    layout: Arc<dyn LatticeLayout>,
    config: &IoConfig,
) -> Result<ConvertSummary> {
    let plan = Plan::new(layout, config)?;

    let mut input = RecordReader::open(storage, single_path)?;
    read_file_info(&mut input, VolumeFormat::SingleFile, &plan.scalar)?;
    input.expect_record(FILE_XML)?;
    let user_file_xml = text(input.read_record_data()?, "user file XML")?;

    if part_path != single_path {
        storage.delete(part_path)?;
    }
    let file_info = FileInfo::new(plan.layout.dims(), VolumeFormat::PartFile);
    let file_xml = file_info.to_xml()?;
    let mut outputs = Vec::with_capacity(plan.partitions.len());
    for &io_node in &plan.partitions {
        let mut file = RecordWriter::create(storage, &volume_path(part_path, VolumeFormat::PartFile, io_node))?;
        file.write_record(PRIVATE_FILE_XML, file_xml.as_bytes())?;
        file.write_record(SITELIST, &plan.partition_sites(io_node)?.encode()?)?;
        file.write_record(FILE_XML, user_file_xml.as_bytes())?;
        outputs.push(file);
    }

    let mut summary = ConvertSummary::default();
    while let Some((info, user)) = next_record_info(&mut input)? {
        let shape = DatumShape::try_from(&info)?;

        let checksum = if info.globaldata {
            let mut datum = SiteBuffer::new(1, shape.size)?;
            expect_data(&mut input, shape.size as u64)?;
            let read = read_global(
                &SingleProcess::new(),
                0,
                shape,
                &mut datum,
                Some(&mut input as &mut dyn RecordSource),
                false,
            )?;
            check_bytes(shape.size as u64, read.bytes)?;
            read_checksum(&mut input)?.verify(&read.checksum)?;

            for (file, &io_node) in outputs.iter_mut().zip(&plan.partitions) {
                write_record_head(file, &info, &user, shape.size as u64)?;
                let written = write_global(
                    &SingleProcess::acting_as(io_node),
                    io_node,
                    shape,
                    &mut datum,
                    Some(&mut *file as &mut dyn RecordSink),
                    false,
                )?;
                file.end_record()?;
                summary.bytes += written.bytes;
            }
            read.checksum
        } else {
            let mut host = plan.host_buffer(shape)?;
            let (bytes, read) = plan.read_whole(&mut input, shape, &mut host)?;
            check_bytes(shape.bytes(plan.volume())?, bytes)?;
            read_checksum(&mut input)?.verify(&read)?;

            let mut merged = Checksum::new();
            for (file, &io_node) in outputs.iter_mut().zip(&plan.partitions) {
                let sites = plan.partition_sites(io_node)?.len();
                write_record_head(file, &info, &user, shape.bytes(sites)?)?;
                let (bytes, written) = plan.write_partition_from(file, io_node, shape, &mut host)?;
                summary.bytes += bytes;
                merged.merge(&written);
            }
            ChecksumInfo::from(read).verify(&merged)?;
            merged
        };
        for file in outputs.iter_mut() {
            write_checksum(file, checksum)?;
        }

        summary.records += 1;
        summary.checksums.push(checksum);
        if config.logging.verbosity >= Verbosity::Regular {
            debug!(record = summary.records, datatype = %info.datatype, suma = checksum.suma, sumb = checksum.sumb, "converted record");
        }
    }

    for file in outputs {
        file.finish()?;
    }
    if config.logging.verbosity >= Verbosity::Low {
        info!(
            from = %single_path.display(),
            to = %part_path.display(),
            partitions = plan.partitions.len(),
            records = summary.records,
            "split into partition files"
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::BlockLayout;
    use crate::session::testing::{config, field, run_nodes, storage, temp_storage};
    use crate::session::{QioReader, QioWriter, ReaderOptions, WriterOptions};
    use crate::transport::Transport;

    /// 4^4 lattice on 8 nodes in a [1,1,2,4] grid, two nodes per partition:
    /// four partitions of 64 sites each.
    fn scenario() -> BlockLayout {
        BlockLayout::new(vec![4, 4, 4, 4], vec![1, 1, 2, 4], 2, 0).unwrap()
    }

    fn field_info() -> RecordInfo {
        RecordInfo::field("Real", 'F', 4, 1)
    }

    /// The scenario field in lexicographic order on one host.
    fn lex_field(seed: u32) -> SiteBuffer {
        field(&ScalarLayout::new(vec![4, 4, 4, 4]), 0, seed)
    }

    #[test]
    fn test_partfile_to_singlefile_keeps_checksum() {
        let temp = tempfile::TempDir::new().unwrap();
        let layout = scenario();
        assert_eq!(layout.number_of_partitions(), 4);

        let written = run_nodes(8, |t| {
            let storage = storage(temp.path());
            let me = t.this_node();
            let layout = layout.for_node(me).unwrap();
            let mut writer = QioWriter::open(
                &storage, Path::new("cfg"), &layout, &t, "<ensemble/>",
                WriterOptions::new(VolumeFormat::PartFile), &config(),
            )
            .unwrap();
            let checksum = writer.write(&field_info(), "<plaq/>", &mut field(&layout, me, 7)).unwrap();
            assert_eq!(writer.bytes_written(), 1024);
            writer.close().unwrap();
            checksum
        });
        for node in [0, 2, 4, 6] {
            assert!(temp.path().join(format!("cfg.vol{node:04}")).exists());
        }

        let storage = storage(temp.path());
        let summary = part_to_single(
            &storage, Path::new("cfg"), Path::new("cfg.single"), Arc::new(scenario()), &config(),
        )
        .unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(summary.bytes, 1024);
        assert_eq!(summary.checksums[0], written[0]);

        let transport = SingleProcess::new();
        let scalar = ScalarLayout::new(vec![4, 4, 4, 4]);
        let mut reader = QioReader::open(
            &storage, Path::new("cfg.single"), &scalar, &transport, ReaderOptions::default(), &config(),
        )
        .unwrap();
        assert_eq!(reader.user_file_xml(), "<ensemble/>");
        let mut back = SiteBuffer::new(256, 4).unwrap();
        let (user, checksum) = reader.read(&field_info(), &mut back).unwrap().unwrap();
        assert_eq!(user, "<plaq/>");
        assert_eq!(checksum, written[0]);
        assert_eq!(back, lex_field(7));
    }

    #[test]
    fn test_singlefile_to_partfile_round_trip() {
        let (storage, temp) = temp_storage();
        let scalar = ScalarLayout::new(vec![4, 4, 4, 4]);
        let transport = SingleProcess::new();

        let mut writer = QioWriter::open(
            &storage, Path::new("host"), &scalar, &transport, "",
            WriterOptions::new(VolumeFormat::SingleFile), &config(),
        )
        .unwrap();
        let seed = 0x0bad_f00du64.to_ne_bytes().to_vec();
        let mut datum = SiteBuffer::from_bytes(8, seed.clone()).unwrap();
        let global = writer.write(&RecordInfo::global("Seed", 'D', 8, 1), "", &mut datum).unwrap();
        let field_sum = writer.write(&field_info(), "", &mut lex_field(3)).unwrap();
        writer.close().unwrap();

        let summary = single_to_part(
            &storage, Path::new("host"), Path::new("split"), Arc::new(scenario()), &config(),
        )
        .unwrap();
        assert_eq!(summary.checksums, vec![global, field_sum]);
        assert_eq!(summary.bytes, 4 * 8 + 1024);

        let layout = scenario();
        let results = run_nodes(8, |t| {
            let storage = crate::session::testing::storage(temp.path());
            let me = t.this_node();
            let layout = layout.for_node(me).unwrap();
            let mut reader = QioReader::open(
                &storage, Path::new("split"), &layout, &t, ReaderOptions::default(), &config(),
            )
            .unwrap();
            let mut seed_back = SiteBuffer::new(1, 8).unwrap();
            let (_, g) = reader
                .read(&RecordInfo::global("Seed", 'D', 8, 1), &mut seed_back)
                .unwrap()
                .unwrap();
            let mut back = SiteBuffer::new(layout.num_sites(me), 4).unwrap();
            let (_, f) = reader.read(&field_info(), &mut back).unwrap().unwrap();
            assert_eq!(back, field(&layout, me, 3));
            assert_eq!(seed_back.as_bytes(), seed.as_slice());
            (g, f)
        });
        for (g, f) in results {
            assert_eq!(g, global);
            assert_eq!(f, field_sum);
        }

        // And back again.
        let again = part_to_single(
            &storage, Path::new("split"), Path::new("joined"), Arc::new(scenario()), &config(),
        )
        .unwrap();
        assert_eq!(again.checksums, summary.checksums);
        let original = std::fs::read(temp.path().join("host")).unwrap();
        let joined = std::fs::read(temp.path().join("joined")).unwrap();
        assert_eq!(original.len(), joined.len());
    }

    #[test]
    fn test_wrong_layout_is_bad_sitelist() {
        let (storage, _temp) = temp_storage();
        let scalar = ScalarLayout::new(vec![4, 4, 4, 4]);
        let transport = SingleProcess::new();
        let mut writer = QioWriter::open(
            &storage, Path::new("host"), &scalar, &transport, "",
            WriterOptions::new(VolumeFormat::SingleFile), &config(),
        )
        .unwrap();
        writer.write(&field_info(), "", &mut lex_field(1)).unwrap();
        writer.close().unwrap();

        single_to_part(&storage, Path::new("host"), Path::new("split"), Arc::new(scenario()), &config())
            .unwrap();

        // Same partition count, different node grid.
        let other = BlockLayout::new(vec![4, 4, 4, 4], vec![2, 4, 1, 1], 2, 0).unwrap();
        assert!(matches!(
            part_to_single(&storage, Path::new("split"), Path::new("out"), Arc::new(other), &config()),
            Err(LatticeError::BadSitelist { .. })
        ));
    }

    #[test]
    fn test_singlefile_input_must_be_singlefile() {
        let (storage, _temp) = temp_storage();
        let layout = ScalarLayout::new(vec![2, 2]);
        let transport = SingleProcess::new();
        let mut writer = QioWriter::open(
            &storage, Path::new("multi"), &layout, &transport, "",
            WriterOptions::new(VolumeFormat::MultiFile), &config(),
        )
        .unwrap();
        writer.write(&field_info(), "", &mut field(&layout, 0, 0)).unwrap();
        writer.close().unwrap();

        assert!(matches!(
            single_to_part(
                &storage, Path::new("multi.vol0000"), Path::new("p"),
                Arc::new(ScalarLayout::new(vec![2, 2])), &config(),
            ),
            Err(LatticeError::BadFileInfo { .. })
        ));
    }
}
