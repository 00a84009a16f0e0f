// rust/lattice-io/src/transfer/global.rs

//! A single datum for the whole lattice.
//!
//! Only the master I/O node talks to the caller's accessor on write and
//! reads the datum from its file on read. The checksum treats the datum as
//! site 0.

use super::{DatumShape, SiteAccessor, TransferSummary};
use crate::checksum::Checksum;
use crate::endian::to_canonical;
use crate::error::{LatticeError, Result};
use crate::record::{RecordSink, RecordSource};
use crate::transport::Transport;

/// Writes the master's global datum.
///
/// With `share` set the master broadcasts the canonical bytes so every node
/// holding a `sink` writes the same record; every node must then call this
/// function. Without it only the master takes part.
pub fn write_global(
    transport: &dyn Transport,
    master: usize,
    shape: DatumShape,
    accessor: &mut dyn SiteAccessor,
    sink: Option<&mut dyn RecordSink>,
    share: bool,
) -> Result<TransferSummary> {
    let me = transport.this_node();
    let mut datum = shape.zeroed()?;
    let mut checksum = Checksum::new();

    if me == master {
        accessor.get(&mut datum, 0, shape.count);
        to_canonical(&mut datum, shape.word_size);
        checksum.accumulate(0, &datum);
    }
    if share {
        transport.broadcast(&mut datum, master)?;
    }

    let mut bytes = 0;
    if let Some(sink) = sink {
        let written = sink.write(&datum)?;
        if written != shape.size {
            return Err(LatticeError::BadWriteBytes {
                expected: shape.size as u64,
                actual: written as u64,
            });
        }
        if me == master {
            bytes = written as u64;
        }
    }

    Ok(TransferSummary { bytes, checksum })
}

/// Reads the global datum on the master and delivers it.
///
/// With `broadcast` set every node receives the datum through its accessor
/// and every node must call this function. Otherwise only the master's
/// accessor sees it.
pub fn read_global(
    transport: &dyn Transport,
    master: usize,
    shape: DatumShape,
    accessor: &mut dyn SiteAccessor,
    source: Option<&mut dyn RecordSource>,
    broadcast: bool,
) -> Result<TransferSummary> {
    let me = transport.this_node();
    let mut datum = shape.zeroed()?;
    let mut checksum = Checksum::new();
    let mut bytes = 0;

    if me == master {
        let source = source
            .ok_or_else(|| LatticeError::usage("master read a global record without a file"))?;
        let got = source.read(&mut datum)?;
        if got != shape.size {
            return Err(LatticeError::BadReadBytes {
                expected: shape.size as u64,
                actual: got as u64,
            });
        }
        bytes = got as u64;
        checksum.accumulate(0, &datum);
        to_canonical(&mut datum, shape.word_size);
    }

    if broadcast {
        transport.broadcast(&mut datum, master)?;
        accessor.put(&datum, 0, shape.count);
    } else if me == master {
        accessor.put(&datum, 0, shape.count);
    }

    Ok(TransferSummary { bytes, checksum })
}
