// rust/lattice-io/src/layout/scalar.rs

use super::{lex_coords, lex_rank, LatticeLayout};

/// The whole lattice on a single node, stored in lexicographic order.
///
/// A scalar layout with no dimensions stands for a lattice whose shape is
/// not known yet; readers opened with it take the shape from the file.
#[derive(Debug, Clone)]
pub struct ScalarLayout {
    dims: Vec<usize>,
}

impl ScalarLayout {
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    pub fn unset() -> Self {
        Self { dims: Vec::new() }
    }
}

impl LatticeLayout for ScalarLayout {
    fn dims(&self) -> &[usize] {
        &self.dims
    }

    fn this_node(&self) -> usize {
        0
    }

    fn number_of_nodes(&self) -> usize {
        1
    }

    fn node_number(&self, _coords: &[usize]) -> usize {
        0
    }

    fn node_index(&self, coords: &[usize]) -> usize {
        lex_rank(coords, &self.dims) as usize
    }

    fn get_coords(&self, coords: &mut [usize], _node: usize, index: usize) {
        lex_coords(coords, &self.dims, index as u64);
    }

    fn num_sites(&self, node: usize) -> usize {
        if node == 0 && !self.dims.is_empty() {
            self.volume() as usize
        } else {
            0
        }
    }

    fn io_node(&self, _node: usize) -> usize {
        0
    }
}
