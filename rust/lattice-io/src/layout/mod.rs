// rust/lattice-io/src/layout/mod.rs

//! Lattice layouts: which node owns which site.
//!
//! A layout is a bijection between global coordinates and
//! `(node, local index)` pairs, plus the grouping of nodes into I/O
//! partitions. The local index enumerates a node's sites in its storage
//! order, which is also the order a caller's [`SiteAccessor`] sees.
//!
//! Three layouts are provided:
//!
//! - [`BlockLayout`]: a hypercubic block decomposition over a node grid.
//! - [`ScalarLayout`]: one node owning the whole lattice in file order.
//! - [`IoNodeLayout`]: wraps another layout so that each I/O node owns the
//!   union of its partition's sites. Used by the host-side converter.
//!
//! [`SiteAccessor`]: crate::transfer::SiteAccessor

mod block;
mod ionode;
mod scalar;

pub use block::BlockLayout;
pub use ionode::IoNodeLayout;
pub use scalar::ScalarLayout;

use crate::error::{LatticeError, Result};

/// Mapping between lattice coordinates and node-local storage.
pub trait LatticeLayout: Send + Sync {
    /// Lattice extent along each axis. Empty when the dimensions are not yet
    /// known and are to be discovered from a file.
    fn dims(&self) -> &[usize];

    /// Total number of sites.
    fn volume(&self) -> u64 {
        self.dims().iter().map(|&d| d as u64).product()
    }

    fn this_node(&self) -> usize;

    fn number_of_nodes(&self) -> usize;

    /// Node that owns the site at `coords`.
    fn node_number(&self, coords: &[usize]) -> usize;

    /// Position of `coords` in its owner's storage order.
    fn node_index(&self, coords: &[usize]) -> usize;

    /// Writes the coordinates of `node`'s `index`-th site into `coords`.
    fn get_coords(&self, coords: &mut [usize], node: usize, index: usize);

    /// Number of sites owned by `node`.
    fn num_sites(&self, node: usize) -> usize;

    /// The I/O node of `node`'s partition. A partition is identified by its
    /// I/O node's number.
    fn io_node(&self, node: usize) -> usize;

    /// The I/O node that writes shared headers and global data.
    fn master_io_node(&self) -> usize {
        0
    }
}

/// Lexicographic rank of `coords`, first axis fastest.
pub fn lex_rank(coords: &[usize], dims: &[usize]) -> u64 {
    coords
        .iter()
        .zip(dims)
        .rev()
        .fold(0u64, |rank, (&c, &d)| rank * d as u64 + c as u64)
}

/// Inverse of [`lex_rank`]: writes the coordinates of `rank` into `coords`.
pub fn lex_coords(coords: &mut [usize], dims: &[usize], rank: u64) {
    let mut rem = rank;
    for (c, &d) in coords.iter_mut().zip(dims) {
        let d = d as u64;
        *c = (rem % d) as usize;
        rem /= d;
    }
}

/// Checks the invariants every session relies on: the nodes' site counts
/// add up to the volume and the master is the I/O node of its own
/// partition.
pub fn validate_layout(layout: &dyn LatticeLayout) -> Result<()> {
    let master = layout.master_io_node();
    if master >= layout.number_of_nodes() {
        return Err(LatticeError::BadIoNode {
            master,
            io_node: master,
        });
    }
    let io_node = layout.io_node(master);
    if io_node != master {
        return Err(LatticeError::BadIoNode { master, io_node });
    }

    let total: u64 = (0..layout.number_of_nodes())
        .map(|n| layout.num_sites(n) as u64)
        .sum();
    if total != layout.volume() {
        return Err(LatticeError::config(format!(
            "layout nodes own {total} sites but the lattice has {}",
            layout.volume()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_rank_first_axis_fastest() {
        let dims = [4, 3, 2];
        assert_eq!(lex_rank(&[0, 0, 0], &dims), 0);
        assert_eq!(lex_rank(&[1, 0, 0], &dims), 1);
        assert_eq!(lex_rank(&[0, 1, 0], &dims), 4);
        assert_eq!(lex_rank(&[0, 0, 1], &dims), 12);
        assert_eq!(lex_rank(&[3, 2, 1], &dims), 23);
    }

    #[test]
    fn test_lex_round_trip() {
        let dims = [4, 4, 4, 4];
        let volume: u64 = 256;
        let mut coords = [0usize; 4];
        for rank in 0..volume {
            lex_coords(&mut coords, &dims, rank);
            assert!(coords.iter().zip(&dims).all(|(c, d)| c < d));
            assert_eq!(lex_rank(&coords, &dims), rank);
        }
    }

    #[test]
    fn test_validate_layout_accepts_block_layout() {
        let layout = BlockLayout::new(vec![4, 4], vec![2, 2], 2, 0).unwrap();
        validate_layout(&layout).unwrap();
    }

    #[test]
    fn test_validate_layout_rejects_master_off_io_node() {
        struct Skewed(ScalarLayout);

        impl LatticeLayout for Skewed {
            fn dims(&self) -> &[usize] {
                self.0.dims()
            }
            fn this_node(&self) -> usize {
                0
            }
            fn number_of_nodes(&self) -> usize {
                2
            }
            fn node_number(&self, coords: &[usize]) -> usize {
                self.0.node_number(coords)
            }
            fn node_index(&self, coords: &[usize]) -> usize {
                self.0.node_index(coords)
            }
            fn get_coords(&self, coords: &mut [usize], node: usize, index: usize) {
                self.0.get_coords(coords, node, index)
            }
            fn num_sites(&self, node: usize) -> usize {
                self.0.num_sites(node)
            }
            fn io_node(&self, _node: usize) -> usize {
                1
            }
        }

        let layout = Skewed(ScalarLayout::new(vec![2, 2]));
        assert!(matches!(
            validate_layout(&layout),
            Err(LatticeError::BadIoNode {
                master: 0,
                io_node: 1
            })
        ));
    }
}
