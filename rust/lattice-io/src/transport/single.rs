// rust/lattice-io/src/transport/single.rs

use super::Transport;
use crate::error::{LatticeError, Result};

/// A machine of exactly one node.
///
/// Collectives return their input. Any attempt to talk to another node is a
/// protocol error, since there is nobody to answer.
///
/// A host-side program that stands in for a larger machine can take on
/// another node's number with [`acting_as`](SingleProcess::acting_as), as
/// long as it only ever moves data between that node and itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleProcess {
    node: usize,
}

impl SingleProcess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acting_as(node: usize) -> Self {
        Self { node }
    }
}

impl Transport for SingleProcess {
    fn this_node(&self) -> usize {
        self.node
    }

    fn number_of_nodes(&self) -> usize {
        1
    }

    fn send(&self, _buf: &[u8], dst: usize) -> Result<()> {
        Err(LatticeError::transport(
            self.node,
            format!("single-process transport cannot send to node {dst}"),
        ))
    }

    fn receive(&self, _buf: &mut [u8], src: usize) -> Result<()> {
        Err(LatticeError::transport(
            self.node,
            format!("single-process transport cannot receive from node {src}"),
        ))
    }

    fn broadcast(&self, _buf: &mut [u8], _from: usize) -> Result<()> {
        Ok(())
    }

    fn global_xor(&self, value: u32) -> Result<u32> {
        Ok(value)
    }

    fn global_sum(&self, value: u64) -> Result<u64> {
        Ok(value)
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collectives_are_identities() {
        let t = SingleProcess::new();
        assert_eq!(t.global_xor(0xdead_beef).unwrap(), 0xdead_beef);
        assert_eq!(t.global_sum(42).unwrap(), 42);
        t.barrier().unwrap();
    }

    #[test]
    fn test_peer_traffic_is_an_error() {
        let t = SingleProcess::new();
        assert!(matches!(
            t.send(b"x", 1),
            Err(LatticeError::Transport { .. })
        ));
        let mut buf = [0u8; 4];
        assert!(t.route(&mut buf, 1, 0).is_err());
    }

    #[test]
    fn test_acting_as_another_node() {
        let t = SingleProcess::acting_as(6);
        assert_eq!(t.this_node(), 6);
        let mut buf = [1u8; 4];
        t.clear_to_send(6, 6).unwrap();
        t.route(&mut buf, 6, 6).unwrap();
        assert!(matches!(
            t.receive(&mut buf, 0),
            Err(LatticeError::Transport { node: 6, .. })
        ));
    }
}
