// rust/lattice-io/src/layout/block.rs

use super::{lex_coords, lex_rank, LatticeLayout};
use crate::error::{LatticeError, Result};

/// Hypercubic block decomposition.
///
/// The lattice is cut into equal blocks, one per node, arranged on a node
/// grid. Nodes are numbered lexicographically on the grid and sites are
/// stored lexicographically inside each block, first axis fastest in both
/// cases. Consecutive runs of `nodes_per_partition` nodes form an I/O
/// partition whose first node does the I/O.
#[derive(Debug, Clone)]
pub struct BlockLayout {
    dims: Vec<usize>,
    node_grid: Vec<usize>,
    block: Vec<usize>,
    sites_per_node: usize,
    number_of_nodes: usize,
    nodes_per_partition: usize,
    this_node: usize,
}

impl BlockLayout {
    pub fn new(
        dims: Vec<usize>,
        node_grid: Vec<usize>,
        nodes_per_partition: usize,
        this_node: usize,
    ) -> Result<Self> {
        if dims.is_empty() || dims.len() != node_grid.len() {
            return Err(LatticeError::config(format!(
                "node grid {node_grid:?} does not match lattice {dims:?}"
            )));
        }

        let mut block = Vec::with_capacity(dims.len());
        for (&d, &n) in dims.iter().zip(&node_grid) {
            if d == 0 || n == 0 || d % n != 0 {
                return Err(LatticeError::config(format!(
                    "node grid {node_grid:?} does not divide lattice {dims:?}"
                )));
            }
            block.push(d / n);
        }

        let number_of_nodes: usize = node_grid.iter().product();
        if nodes_per_partition == 0 || number_of_nodes % nodes_per_partition != 0 {
            return Err(LatticeError::config(format!(
                "{nodes_per_partition} nodes per partition does not divide {number_of_nodes} nodes"
            )));
        }
        if this_node >= number_of_nodes {
            return Err(LatticeError::config(format!(
                "node {this_node} is outside a grid of {number_of_nodes} nodes"
            )));
        }

        Ok(Self {
            sites_per_node: block.iter().product(),
            dims,
            node_grid,
            block,
            number_of_nodes,
            nodes_per_partition,
            this_node,
        })
    }

    /// Same decomposition seen from another node.
    pub fn for_node(&self, node: usize) -> Result<Self> {
        if node >= self.number_of_nodes {
            return Err(LatticeError::config(format!(
                "node {node} is outside a grid of {} nodes",
                self.number_of_nodes
            )));
        }
        Ok(Self {
            this_node: node,
            ..self.clone()
        })
    }

    pub fn nodes_per_partition(&self) -> usize {
        self.nodes_per_partition
    }

    pub fn number_of_partitions(&self) -> usize {
        self.number_of_nodes / self.nodes_per_partition
    }
}

impl LatticeLayout for BlockLayout {
    fn dims(&self) -> &[usize] {
        &self.dims
    }

    fn this_node(&self) -> usize {
        self.this_node
    }

    fn number_of_nodes(&self) -> usize {
        self.number_of_nodes
    }

    fn node_number(&self, coords: &[usize]) -> usize {
        let grid: Vec<usize> = coords.iter().zip(&self.block).map(|(c, b)| c / b).collect();
        lex_rank(&grid, &self.node_grid) as usize
    }

    fn node_index(&self, coords: &[usize]) -> usize {
        let local: Vec<usize> = coords.iter().zip(&self.block).map(|(c, b)| c % b).collect();
        lex_rank(&local, &self.block) as usize
    }

    fn get_coords(&self, coords: &mut [usize], node: usize, index: usize) {
        let mut grid = vec![0; self.dims.len()];
        lex_coords(&mut grid, &self.node_grid, node as u64);
        lex_coords(coords, &self.block, index as u64);
        for ((c, g), b) in coords.iter_mut().zip(&grid).zip(&self.block) {
            *c += g * b;
        }
    }

    fn num_sites(&self, node: usize) -> usize {
        if node < self.number_of_nodes {
            self.sites_per_node
        } else {
            0
        }
    }

    fn io_node(&self, node: usize) -> usize {
        node - node % self.nodes_per_partition
    }
}
