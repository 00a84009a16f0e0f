// rust/lattice-io/src/transport/mesh.rs

//! In-process node mesh.
//!
//! Every ordered pair of nodes gets its own unbounded FIFO channel, so
//! messages between two nodes arrive in the order they were sent. Each
//! message carries its kind; a receive that finds a different kind at the
//! head of the queue means the two sides disagree about the protocol and is
//! reported instead of silently misinterpreting bytes.

use crossbeam::channel::{self, Receiver, Sender};

use super::Transport;
use crate::error::{LatticeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    Data,
    ClearToSend,
    Broadcast,
    Reduce,
    Barrier,
}

#[derive(Debug)]
struct Envelope {
    kind: MessageKind,
    payload: Vec<u8>,
}

/// A set of connected nodes, one [`MeshTransport`] per node.
///
/// Hand each transport to its own thread. When a node's transport is
/// dropped, peers blocked on it get a `Transport` error rather than
/// waiting forever.
pub struct ChannelMesh {
    nodes: Vec<MeshTransport>,
}

impl ChannelMesh {
    pub fn new(number_of_nodes: usize) -> Self {
        // links[src][dst]
        let mut senders: Vec<Vec<Sender<Envelope>>> = vec![Vec::new(); number_of_nodes];
        let mut receivers: Vec<Vec<Receiver<Envelope>>> =
            (0..number_of_nodes).map(|_| Vec::new()).collect();

        for src_senders in senders.iter_mut() {
            for dst_receivers in receivers.iter_mut() {
                let (tx, rx) = channel::unbounded();
                src_senders.push(tx);
                dst_receivers.push(rx);
            }
        }

        let nodes = senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(node, (senders, receivers))| MeshTransport {
                node,
                senders,
                receivers,
            })
            .collect();

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl IntoIterator for ChannelMesh {
    type Item = MeshTransport;
    type IntoIter = std::vec::IntoIter<MeshTransport>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

/// One node's endpoint in a [`ChannelMesh`].
pub struct MeshTransport {
    node: usize,
    /// Indexed by destination node.
    senders: Vec<Sender<Envelope>>,
    /// Indexed by source node.
    receivers: Vec<Receiver<Envelope>>,
}

impl MeshTransport {
    fn check_peer(&self, peer: usize) -> Result<()> {
        if peer >= self.senders.len() {
            return Err(LatticeError::transport(
                self.node,
                format!("node {peer} is outside a mesh of {}", self.senders.len()),
            ));
        }
        Ok(())
    }

    fn post(&self, kind: MessageKind, payload: Vec<u8>, dst: usize) -> Result<()> {
        self.check_peer(dst)?;
        self.senders[dst]
            .send(Envelope { kind, payload })
            .map_err(|_| LatticeError::transport(self.node, format!("node {dst} hung up")))
    }

    fn take(&self, kind: MessageKind, src: usize) -> Result<Vec<u8>> {
        self.check_peer(src)?;
        let envelope = self.receivers[src]
            .recv()
            .map_err(|_| LatticeError::transport(self.node, format!("node {src} hung up")))?;

        if envelope.kind != kind {
            return Err(LatticeError::transport(
                self.node,
                format!(
                    "expected {kind:?} from node {src}, got {:?}",
                    envelope.kind
                ),
            ));
        }
        Ok(envelope.payload)
    }

    fn take_into(&self, kind: MessageKind, buf: &mut [u8], src: usize) -> Result<()> {
        let payload = self.take(kind, src)?;
        if payload.len() != buf.len() {
            return Err(LatticeError::transport(
                self.node,
                format!(
                    "expected {} bytes from node {src}, got {}",
                    buf.len(),
                    payload.len()
                ),
            ));
        }
        buf.copy_from_slice(&payload);
        Ok(())
    }

    fn peers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.senders.len()).filter(move |&n| n != self.node)
    }

    /// All-to-all exchange of one value, reduced locally in node order.
    fn all_reduce<const N: usize>(
        &self,
        value: [u8; N],
        fold: impl Fn([u8; N], [u8; N]) -> [u8; N],
    ) -> Result<[u8; N]> {
        for peer in self.peers() {
            self.post(MessageKind::Reduce, value.to_vec(), peer)?;
        }

        let mut acc = value;
        for peer in self.peers() {
            let mut theirs = [0u8; N];
            self.take_into(MessageKind::Reduce, &mut theirs, peer)?;
            acc = fold(acc, theirs);
        }
        Ok(acc)
    }
}

impl Transport for MeshTransport {
    fn this_node(&self) -> usize {
        self.node
    }

    fn number_of_nodes(&self) -> usize {
        self.senders.len()
    }

    fn send(&self, buf: &[u8], dst: usize) -> Result<()> {
        self.post(MessageKind::Data, buf.to_vec(), dst)
    }

    fn receive(&self, buf: &mut [u8], src: usize) -> Result<()> {
        self.take_into(MessageKind::Data, buf, src)
    }

    fn broadcast(&self, buf: &mut [u8], from: usize) -> Result<()> {
        self.check_peer(from)?;
        if self.node == from {
            for peer in self.peers() {
                self.post(MessageKind::Broadcast, buf.to_vec(), peer)?;
            }
            Ok(())
        } else {
            self.take_into(MessageKind::Broadcast, buf, from)
        }
    }

    fn global_xor(&self, value: u32) -> Result<u32> {
        let out = self.all_reduce(value.to_be_bytes(), |a, b| {
            (u32::from_be_bytes(a) ^ u32::from_be_bytes(b)).to_be_bytes()
        })?;
        Ok(u32::from_be_bytes(out))
    }

    fn global_sum(&self, value: u64) -> Result<u64> {
        let out = self.all_reduce(value.to_be_bytes(), |a, b| {
            u64::from_be_bytes(a)
                .wrapping_add(u64::from_be_bytes(b))
                .to_be_bytes()
        })?;
        Ok(u64::from_be_bytes(out))
    }

    fn barrier(&self) -> Result<()> {
        for peer in self.peers() {
            self.post(MessageKind::Barrier, Vec::new(), peer)?;
        }
        for peer in self.peers() {
            self.take(MessageKind::Barrier, peer)?;
        }
        Ok(())
    }

    fn clear_to_send(&self, receiver: usize, sender: usize) -> Result<()> {
        if receiver == sender {
            return Ok(());
        }
        if self.node == receiver {
            self.post(MessageKind::ClearToSend, vec![0; super::CTS_TOKEN_BYTES], sender)
        } else if self.node == sender {
            self.take(MessageKind::ClearToSend, receiver).map(|_| ())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_mesh<T: Send>(
        nodes: usize,
        body: impl Fn(MeshTransport) -> T + Sync,
    ) -> Vec<T> {
        let mesh = ChannelMesh::new(nodes);
        std::thread::scope(|s| {
            let body = &body;
            let handles: Vec<_> = mesh
                .into_iter()
                .map(|transport| s.spawn(move || body(transport)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_send_receive_preserves_order() {
        let results = run_mesh(2, |t| {
            if t.this_node() == 0 {
                for i in 0..5u8 {
                    t.send(&[i; 3], 1).unwrap();
                }
                Vec::new()
            } else {
                (0..5)
                    .map(|_| {
                        let mut buf = [0u8; 3];
                        t.receive(&mut buf, 0).unwrap();
                        buf[0]
                    })
                    .collect()
            }
        });
        assert_eq!(results[1], vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_collectives() {
        let results = run_mesh(4, |t| {
            let node = t.this_node() as u64;
            let sum = t.global_sum(node + 1).unwrap();
            let xor = t.global_xor(1 << node).unwrap();
            t.barrier().unwrap();
            (sum, xor)
        });
        for (sum, xor) in results {
            assert_eq!(sum, 10);
            assert_eq!(xor, 0b1111);
        }
    }

    #[test]
    fn test_clear_to_send_then_route() {
        let results = run_mesh(3, |t| {
            let mut buf = if t.this_node() == 2 { *b"site" } else { [0u8; 4] };
            t.clear_to_send(0, 2).unwrap();
            t.route(&mut buf, 2, 0).unwrap();
            buf
        });
        assert_eq!(&results[0], b"site");
        assert_eq!(results[1], [0u8; 4]);
    }

    #[test]
    fn test_kind_mismatch_is_reported() {
        let results = run_mesh(2, |t| {
            if t.this_node() == 0 {
                t.send(b"data", 1).map(|_| ())
            } else {
                t.clear_to_send(0, 1)
            }
        });
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(LatticeError::Transport { node: 1, .. })));
    }

    #[test]
    fn test_size_mismatch_is_reported() {
        let results = run_mesh(2, |t| {
            if t.this_node() == 0 {
                t.send(b"abc", 1)
            } else {
                let mut buf = [0u8; 8];
                t.receive(&mut buf, 0)
            }
        });
        assert!(results[1].is_err());
    }

    #[test]
    fn test_dropped_peer_unblocks_receiver() {
        let results = run_mesh(2, |t| {
            if t.this_node() == 0 {
                drop(t);
                Ok(())
            } else {
                let mut buf = [0u8; 4];
                t.receive(&mut buf, 0)
            }
        });
        assert!(matches!(results[1], Err(LatticeError::Transport { .. })));
    }
}
