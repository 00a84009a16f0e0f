// rust/lattice-io/src/transfer/partition.rs

//! The per-site protocol inside one I/O partition.
//!
//! Every node of the partition walks the same site list. For each site the
//! owner is looked up from the layout; whenever it changes, the I/O node and
//! the new owner exchange a clear-to-send token before any bytes flow, so
//! that the I/O node never has more than one owner's data in flight. Nodes
//! not involved in a site only track who the current owner is.
//!
//! The I/O node converts each datum to canonical byte order and folds it
//! into the checksum on the way to the file, and does the reverse on the way
//! back, so the checksum always covers the bytes exactly as stored.

use tracing::debug;

use super::buffer::{AccessMode, TransferBuffer};
use super::{DatumShape, SiteAccessor, TransferSummary};
use crate::checksum::Checksum;
use crate::endian::to_canonical;
use crate::error::{LatticeError, Result};
use crate::layout::{lex_coords, LatticeLayout};
use crate::record::{RecordSink, RecordSource};
use crate::sitelist::SiteList;
use crate::transport::Transport;

/// Which way the current site's bytes travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ToFile,
    FromFile,
}

/// State shared by the write and read sides.
struct Cursor<'a> {
    layout: &'a dyn LatticeLayout,
    transport: &'a dyn Transport,
    io_node: usize,
    shape: DatumShape,
    coords: Vec<usize>,
    current_node: usize,
    scratch: Vec<u8>,
    checksum: Checksum,
    sites_done: u64,
    sites_total: u64,
}

impl<'a> Cursor<'a> {
    fn new(
        layout: &'a dyn LatticeLayout,
        transport: &'a dyn Transport,
        io_node: usize,
        shape: DatumShape,
        sites_total: u64,
    ) -> Result<Self> {
        let scratch = shape.zeroed()?;

        Ok(Self {
            layout,
            transport,
            io_node,
            shape,
            coords: vec![0; layout.dims().len()],
            current_node: io_node,
            scratch,
            checksum: Checksum::new(),
            sites_done: 0,
            sites_total,
        })
    }

    fn this_node(&self) -> usize {
        self.transport.this_node()
    }

    fn is_io_node(&self) -> bool {
        self.this_node() == self.io_node
    }

    /// Finds the owner and local index of `rank`, handing off to the owner
    /// if it differs from the previous site's.
    fn locate(&mut self, rank: u64, direction: Direction) -> Result<(usize, usize)> {
        if self.sites_done >= self.sites_total {
            return Err(LatticeError::usage(format!(
                "site {rank} is beyond the {} sites of this transfer",
                self.sites_total
            )));
        }

        lex_coords(&mut self.coords, self.layout.dims(), rank);
        let owner = self.layout.node_number(&self.coords);
        let index = self.layout.node_index(&self.coords);

        if owner != self.current_node {
            let (receiver, sender) = match direction {
                Direction::ToFile => (self.io_node, owner),
                Direction::FromFile => (owner, self.io_node),
            };
            self.transport.clear_to_send(receiver, sender)?;
            self.current_node = owner;
        }
        Ok((owner, index))
    }

    fn summary(&self, bytes: u64) -> TransferSummary {
        TransferSummary {
            bytes,
            checksum: self.checksum,
        }
    }
}

/// Writes one partition's sites, one step at a time.
///
/// Every node of the partition opens a writer and calls [`step`] for the
/// same ranks in the same order. Only the I/O node holds a sink.
///
/// [`step`]: PartitionWriter::step
pub struct PartitionWriter<'a> {
    cursor: Cursor<'a>,
    buffer: Option<TransferBuffer>,
    sink: Option<&'a mut dyn RecordSink>,
}

impl<'a> PartitionWriter<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        layout: &'a dyn LatticeLayout,
        transport: &'a dyn Transport,
        io_node: usize,
        shape: DatumShape,
        sites_total: u64,
        sink: Option<&'a mut dyn RecordSink>,
        mode: AccessMode,
        budget_bytes: usize,
    ) -> Result<Self> {
        let cursor = Cursor::new(layout, transport, io_node, shape, sites_total)?;
        let buffer = if cursor.is_io_node() {
            if sink.is_none() {
                return Err(LatticeError::usage(format!(
                    "I/O node {io_node} opened a partition write without a file"
                )));
            }
            Some(TransferBuffer::new(shape.size, budget_bytes, mode)?)
        } else {
            None
        };

        Ok(Self {
            cursor,
            buffer,
            sink,
        })
    }

    /// Moves the datum of site `rank` from its owner into the file.
    pub fn step(&mut self, rank: u64, accessor: &mut dyn SiteAccessor) -> Result<()> {
        let c = &mut self.cursor;
        let (owner, index) = c.locate(rank, Direction::ToFile)?;
        let me = c.this_node();

        if me == owner {
            accessor.get(&mut c.scratch, index, c.shape.count);
        }
        if me == owner || me == c.io_node {
            c.transport.route(&mut c.scratch, owner, c.io_node)?;
        }

        c.sites_done += 1;
        if let (Some(buffer), Some(sink)) = (self.buffer.as_mut(), self.sink.as_deref_mut()) {
            to_canonical(&mut c.scratch, c.shape.word_size);
            c.checksum.accumulate(rank, &c.scratch);
            let last = c.sites_done == c.sites_total;
            buffer.push(sink, &c.scratch, rank, last)?;
        }
        Ok(())
    }

    /// Writes anything still buffered and reports what this node moved.
    pub fn close(mut self) -> Result<TransferSummary> {
        let bytes = match (self.buffer.as_mut(), self.sink.as_deref_mut()) {
            (Some(buffer), Some(sink)) => {
                buffer.flush(sink)?;
                debug!(
                    io_node = self.cursor.io_node,
                    sites = self.cursor.sites_done,
                    flushes = buffer.flushes(),
                    "partition written"
                );
                buffer.bytes()
            }
            _ => 0,
        };
        Ok(self.cursor.summary(bytes))
    }
}

/// Reads one partition's sites, one step at a time.
pub struct PartitionReader<'a> {
    cursor: Cursor<'a>,
    buffer: Option<TransferBuffer>,
    source: Option<&'a mut dyn RecordSource>,
}

impl<'a> PartitionReader<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        layout: &'a dyn LatticeLayout,
        transport: &'a dyn Transport,
        io_node: usize,
        shape: DatumShape,
        sites_total: u64,
        source: Option<&'a mut dyn RecordSource>,
        mode: AccessMode,
        budget_bytes: usize,
    ) -> Result<Self> {
        let cursor = Cursor::new(layout, transport, io_node, shape, sites_total)?;
        let buffer = if cursor.is_io_node() {
            if source.is_none() {
                return Err(LatticeError::usage(format!(
                    "I/O node {io_node} opened a partition read without a file"
                )));
            }
            Some(TransferBuffer::new(shape.size, budget_bytes, mode)?)
        } else {
            None
        };

        Ok(Self {
            cursor,
            buffer,
            source,
        })
    }

    /// Moves the datum of site `rank` from the file to its owner.
    pub fn step(&mut self, rank: u64, accessor: &mut dyn SiteAccessor) -> Result<()> {
        let c = &mut self.cursor;
        let (owner, index) = c.locate(rank, Direction::FromFile)?;
        let me = c.this_node();

        if let (Some(buffer), Some(source)) = (self.buffer.as_mut(), self.source.as_deref_mut()) {
            let remaining = c.sites_total - c.sites_done;
            buffer.pull(source, &mut c.scratch, rank, remaining)?;
            c.checksum.accumulate(rank, &c.scratch);
            to_canonical(&mut c.scratch, c.shape.word_size);
        }
        c.sites_done += 1;

        if me == owner || me == c.io_node {
            c.transport.route(&mut c.scratch, c.io_node, owner)?;
        }
        if me == owner {
            accessor.put(&c.scratch, index, c.shape.count);
        }
        Ok(())
    }

    pub fn close(self) -> Result<TransferSummary> {
        let bytes = match &self.buffer {
            Some(buffer) => {
                debug!(
                    io_node = self.cursor.io_node,
                    sites = self.cursor.sites_done,
                    refills = buffer.flushes(),
                    "partition read"
                );
                buffer.bytes()
            }
            None => 0,
        };
        Ok(self.cursor.summary(bytes))
    }
}

/// Writes a whole partition list through [`PartitionWriter`].
#[allow(clippy::too_many_arguments)]
pub fn write_partition<'a>(
    layout: &'a dyn LatticeLayout,
    transport: &'a dyn Transport,
    io_node: usize,
    sites: &SiteList,
    shape: DatumShape,
    accessor: &mut dyn SiteAccessor,
    sink: Option<&'a mut dyn RecordSink>,
    mode: AccessMode,
    budget_bytes: usize,
) -> Result<TransferSummary> {
    let mut writer = PartitionWriter::open(
        layout,
        transport,
        io_node,
        shape,
        sites.len(),
        sink,
        mode,
        budget_bytes,
    )?;
    for rank in sites.cursor() {
        writer.step(rank, accessor)?;
    }
    writer.close()
}

/// Reads a whole partition list through [`PartitionReader`].
#[allow(clippy::too_many_arguments)]
pub fn read_partition<'a>(
    layout: &'a dyn LatticeLayout,
    transport: &'a dyn Transport,
    io_node: usize,
    sites: &SiteList,
    shape: DatumShape,
    accessor: &mut dyn SiteAccessor,
    source: Option<&'a mut dyn RecordSource>,
    mode: AccessMode,
    budget_bytes: usize,
) -> Result<TransferSummary> {
    let mut reader = PartitionReader::open(
        layout,
        transport,
        io_node,
        shape,
        sites.len(),
        source,
        mode,
        budget_bytes,
    )?;
    for rank in sites.cursor() {
        reader.step(rank, accessor)?;
    }
    reader.close()
}
