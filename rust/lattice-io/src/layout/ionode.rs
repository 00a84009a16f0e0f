// rust/lattice-io/src/layout/ionode.rs

use std::sync::Arc;

use super::LatticeLayout;

/// Per-node offsets of a base layout's sites within their I/O partition.
#[derive(Debug)]
struct OffsetTables {
    /// Where each node's block starts inside its partition.
    offsets: Vec<usize>,
    /// Sites held by each I/O node; zero for other nodes.
    partition_sites: Vec<usize>,
    /// Members of each partition in ascending node order, keyed by I/O node.
    members: Vec<Vec<usize>>,
}

/// Gathers each I/O partition of a base layout onto its I/O node.
///
/// An I/O node's storage order is the concatenation of its members' storage
/// orders, members taken in ascending node number. Only I/O nodes own
/// sites. This is the order partition files are written in, so a host buffer
/// laid out this way can be written or read as a single process.
#[derive(Clone)]
pub struct IoNodeLayout {
    base: Arc<dyn LatticeLayout>,
    tables: Arc<OffsetTables>,
    this_node: usize,
}

impl IoNodeLayout {
    pub fn new(base: Arc<dyn LatticeLayout>) -> Self {
        let nodes = base.number_of_nodes();
        let mut offsets = vec![0; nodes];
        let mut partition_sites = vec![0; nodes];
        let mut members = vec![Vec::new(); nodes];

        for node in 0..nodes {
            let io = base.io_node(node);
            offsets[node] = partition_sites[io];
            partition_sites[io] += base.num_sites(node);
            members[io].push(node);
        }

        let this_node = base.io_node(base.this_node());
        Self {
            base,
            tables: Arc::new(OffsetTables {
                offsets,
                partition_sites,
                members,
            }),
            this_node,
        }
    }

    /// Same layout seen from another node.
    pub fn for_node(&self, node: usize) -> Self {
        Self {
            this_node: node,
            ..self.clone()
        }
    }

    pub fn base(&self) -> &dyn LatticeLayout {
        self.base.as_ref()
    }

    /// I/O nodes of the base layout in ascending order.
    pub fn io_nodes(&self) -> Vec<usize> {
        (0..self.base.number_of_nodes())
            .filter(|&n| self.base.io_node(n) == n)
            .collect()
    }
}

impl LatticeLayout for IoNodeLayout {
    fn dims(&self) -> &[usize] {
        self.base.dims()
    }

    fn volume(&self) -> u64 {
        self.base.volume()
    }

    fn this_node(&self) -> usize {
        self.this_node
    }

    fn number_of_nodes(&self) -> usize {
        self.base.number_of_nodes()
    }

    fn node_number(&self, coords: &[usize]) -> usize {
        self.base.io_node(self.base.node_number(coords))
    }

    fn node_index(&self, coords: &[usize]) -> usize {
        let node = self.base.node_number(coords);
        self.tables.offsets[node] + self.base.node_index(coords)
    }

    fn get_coords(&self, coords: &mut [usize], node: usize, index: usize) {
        let members = &self.tables.members[node];
        let pos = members
            .partition_point(|&m| self.tables.offsets[m] <= index)
            .saturating_sub(1);
        let member = members[pos];
        self.base
            .get_coords(coords, member, index - self.tables.offsets[member]);
    }

    fn num_sites(&self, node: usize) -> usize {
        self.tables.partition_sites.get(node).copied().unwrap_or(0)
    }

    fn io_node(&self, node: usize) -> usize {
        self.base.io_node(node)
    }

    fn master_io_node(&self) -> usize {
        self.base.master_io_node()
    }
}
