// rust/lattice-io/src/transport/mod.rs

//! Message passing between lattice nodes.
//!
//! One process (or, in tests, one thread) runs per node. Every call blocks
//! until its local half completes; there are no timeouts. Nodes must issue
//! collective calls (`broadcast`, `global_xor`, `global_sum`, `barrier`) in
//! the same order.
//!
//! - [`SingleProcess`]: a one-node machine, used by serial programs and the
//!   host-side format converter.
//! - [`ChannelMesh`]: an in-process mesh of nodes joined by channels.

mod mesh;
mod single;

pub use mesh::{ChannelMesh, MeshTransport};
pub use single::SingleProcess;

use crate::error::{LatticeError, Result};

/// Size of the clear-to-send token.
pub const CTS_TOKEN_BYTES: usize = 4;

/// Point-to-point and collective primitives.
pub trait Transport: Send + Sync {
    /// This node's number.
    fn this_node(&self) -> usize;

    /// Number of nodes taking part.
    fn number_of_nodes(&self) -> usize;

    /// Sends `buf` to `dst`.
    fn send(&self, buf: &[u8], dst: usize) -> Result<()>;

    /// Receives exactly `buf.len()` bytes from `src`.
    fn receive(&self, buf: &mut [u8], src: usize) -> Result<()>;

    /// Copies `buf` on node `from` into `buf` on every other node.
    fn broadcast(&self, buf: &mut [u8], from: usize) -> Result<()>;

    /// XOR of `value` over all nodes.
    fn global_xor(&self, value: u32) -> Result<u32>;

    /// Sum of `value` over all nodes.
    fn global_sum(&self, value: u64) -> Result<u64>;

    fn barrier(&self) -> Result<()>;

    /// Moves `buf` from `src` to `dst`. Only those two nodes act; a route
    /// from a node to itself moves nothing.
    fn route(&self, buf: &mut [u8], src: usize, dst: usize) -> Result<()> {
        if src == dst {
            return Ok(());
        }
        let me = self.this_node();
        if me == src {
            self.send(buf, dst)
        } else if me == dst {
            self.receive(buf, src)
        } else {
            Ok(())
        }
    }

    /// Tells `sender` that `receiver` is ready for its bytes. The sender
    /// blocks until the token arrives.
    fn clear_to_send(&self, receiver: usize, sender: usize) -> Result<()> {
        if receiver == sender {
            return Ok(());
        }
        let me = self.this_node();
        let mut token = [0u8; CTS_TOKEN_BYTES];
        if me == receiver {
            self.send(&token, sender)
        } else if me == sender {
            self.receive(&mut token, receiver)
        } else {
            Ok(())
        }
    }
}

/// Broadcasts a variable-length payload: its length first, then the bytes.
pub fn broadcast_bytes(transport: &dyn Transport, bytes: &mut Vec<u8>, from: usize) -> Result<()> {
    let mut len = (bytes.len() as u64).to_be_bytes();
    transport.broadcast(&mut len, from)?;

    let len = u64::from_be_bytes(len);
    let len = usize::try_from(len).map_err(|_| {
        LatticeError::transport(transport.this_node(), format!("broadcast length {len} overflows"))
    })?;
    bytes.resize(len, 0);
    transport.broadcast(bytes, from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_bytes_over_mesh() {
        let mesh = ChannelMesh::new(3);
        let results: Vec<Vec<u8>> = std::thread::scope(|s| {
            let handles: Vec<_> = mesh
                .into_iter()
                .map(|transport| {
                    s.spawn(move || {
                        let mut bytes = if transport.this_node() == 1 {
                            b"<scidacFile/>".to_vec()
                        } else {
                            Vec::new()
                        };
                        broadcast_bytes(&transport, &mut bytes, 1).unwrap();
                        bytes
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for bytes in results {
            assert_eq!(bytes, b"<scidacFile/>");
        }
    }

    #[test]
    fn test_route_to_self_is_noop() {
        let transport = SingleProcess::new();
        let mut buf = [1u8, 2, 3];
        transport.route(&mut buf, 0, 0).unwrap();
        transport.clear_to_send(0, 0).unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }
}
