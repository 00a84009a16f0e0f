// rust/lattice-io/src/sitelist.rs

//! Which sites an I/O partition serializes, and in what order.
//!
//! A list holds global lexicographic ranks. Serial SINGLEFILE needs no
//! explicit list: the file holds every rank in order. MULTIFILE lists a
//! node's own sites in its storage order. PARTFILE and parallel SINGLEFILE
//! list a partition's sites in ascending rank.

use crate::error::{LatticeError, Result};
use crate::layout::{lex_rank, LatticeLayout};
use crate::volume::{IoMode, VolumeFormat};

/// Bytes per encoded rank in a sitelist record.
pub const SITE_RANK_BYTES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteList {
    ranks: Option<Vec<u64>>,
    count: u64,
}

impl SiteList {
    /// Every rank in `[0, volume)`, with no list stored.
    pub fn implicit(volume: u64) -> Self {
        Self {
            ranks: None,
            count: volume,
        }
    }

    pub fn explicit(ranks: Vec<u64>) -> Self {
        Self {
            count: ranks.len() as u64,
            ranks: Some(ranks),
        }
    }

    /// `node`'s sites in its storage order.
    pub fn for_node(layout: &dyn LatticeLayout, node: usize) -> Result<Self> {
        let mut ranks = reserve(layout.num_sites(node))?;
        push_node_ranks(layout, node, &mut ranks);
        Ok(Self::explicit(ranks))
    }

    /// Sites of every node whose I/O node is `io_node`, ascending.
    pub fn for_partition(layout: &dyn LatticeLayout, io_node: usize) -> Result<Self> {
        let members: Vec<usize> = (0..layout.number_of_nodes())
            .filter(|&n| layout.io_node(n) == io_node)
            .collect();
        let count = members.iter().map(|&n| layout.num_sites(n)).sum();

        let mut ranks = reserve(count)?;
        for node in members {
            push_node_ranks(layout, node, &mut ranks);
        }
        ranks.sort_unstable();
        Ok(Self::explicit(ranks))
    }

    /// The list `node` iterates when moving a field record.
    pub fn build(
        layout: &dyn LatticeLayout,
        volfmt: VolumeFormat,
        mode: IoMode,
        node: usize,
    ) -> Result<Self> {
        match (volfmt, mode) {
            (VolumeFormat::SingleFile, IoMode::Serial) => Ok(Self::implicit(layout.volume())),
            (VolumeFormat::MultiFile, _) => Self::for_node(layout, node),
            (VolumeFormat::SingleFile, IoMode::Parallel) | (VolumeFormat::PartFile, _) => {
                Self::for_partition(layout, layout.io_node(node))
            }
        }
    }

    /// Number of sites.
    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn uses_explicit_list(&self) -> bool {
        self.ranks.is_some()
    }

    /// Rank of the `index`-th site.
    pub fn rank(&self, index: u64) -> u64 {
        match &self.ranks {
            Some(ranks) => ranks[index as usize],
            None => index,
        }
    }

    pub fn cursor(&self) -> SiteCursor<'_> {
        SiteCursor {
            list: self,
            current_index: 0,
            current_rank: None,
        }
    }

    /// Big-endian 32-bit ranks, as stored in a sitelist record.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.try_reserve_exact(self.count as usize * SITE_RANK_BYTES)
            .map_err(|e| LatticeError::alloc(format!("sitelist of {} sites: {e}", self.count)))?;

        for rank in self.cursor() {
            let rank = u32::try_from(rank).map_err(|_| {
                LatticeError::bad_sitelist(format!("rank {rank} does not fit a sitelist record"))
            })?;
            out.extend_from_slice(&rank.to_be_bytes());
        }
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Vec<u64>> {
        if bytes.len() % SITE_RANK_BYTES != 0 {
            return Err(LatticeError::bad_sitelist(format!(
                "record of {} bytes is not a whole number of ranks",
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(SITE_RANK_BYTES)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]) as u64)
            .collect())
    }

    /// Compares ranks read from a file against this list.
    pub fn verify(&self, decoded: &[u64]) -> Result<()> {
        if decoded.len() as u64 != self.count {
            return Err(LatticeError::bad_sitelist(format!(
                "file lists {} sites, expected {}",
                decoded.len(),
                self.count
            )));
        }
        for (index, (&found, expected)) in decoded.iter().zip(self.cursor()).enumerate() {
            if found != expected {
                return Err(LatticeError::bad_sitelist(format!(
                    "entry {index} is rank {found}, expected {expected}"
                )));
            }
        }
        Ok(())
    }
}

/// Walks a [`SiteList`] in order.
#[derive(Debug, Clone)]
pub struct SiteCursor<'a> {
    list: &'a SiteList,
    current_index: u64,
    current_rank: Option<u64>,
}

impl SiteCursor<'_> {
    /// Index of the next site to be returned.
    pub fn current_index(&self) -> u64 {
        self.current_index
    }

    /// Rank most recently returned.
    pub fn current_rank(&self) -> Option<u64> {
        self.current_rank
    }

    /// Whether the most recently returned site is the last one.
    pub fn at_last(&self) -> bool {
        self.current_index == self.list.count
    }
}

impl Iterator for SiteCursor<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.current_index >= self.list.count {
            return None;
        }
        let rank = self.list.rank(self.current_index);
        self.current_index += 1;
        self.current_rank = Some(rank);
        Some(rank)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.list.count - self.current_index) as usize;
        (left, Some(left))
    }
}

fn reserve(count: usize) -> Result<Vec<u64>> {
    let mut ranks = Vec::new();
    ranks
        .try_reserve_exact(count)
        .map_err(|e| LatticeError::alloc(format!("sitelist of {count} sites: {e}")))?;
    Ok(ranks)
}

fn push_node_ranks(layout: &dyn LatticeLayout, node: usize, ranks: &mut Vec<u64>) {
    let dims = layout.dims();
    let mut coords = vec![0; dims.len()];
    for index in 0..layout.num_sites(node) {
        layout.get_coords(&mut coords, node, index);
        ranks.push(lex_rank(&coords, dims));
    }
}
