use dht_node::DataPlane;
use dht_types::{NodeHandle, NodeId};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Finger table size and ring bit-width.
pub const M: usize = 16;
/// Successor list size.
pub const S: usize = 4;

/// One Chord node: its ring position, routing state, and the shared
/// data-plane it owns. `successors[0]` is the authoritative clockwise
/// neighbor (C1); `finger_table[i]` should hold the owner of `id + 2^i`
/// (C2), refreshed by the maintenance tick since the join protocol only
/// seeds it once.
#[derive(Debug)]
pub struct ChordNode {
    pub id: NodeId,
    pub addr: SocketAddr,
    pub predecessor: Mutex<Option<NodeHandle>>,
    pub successors: Mutex<Vec<NodeHandle>>,
    pub finger_table: Mutex<[Option<NodeHandle>; M]>,
    pub running: AtomicBool,
    pub data: DataPlane,
    pub rpc_timeout: Option<Duration>,
}

impl ChordNode {
    pub fn new(id: NodeId, addr: SocketAddr, rpc_timeout: Option<Duration>) -> Self {
        ChordNode {
            id,
            addr,
            predecessor: Mutex::new(None),
            successors: Mutex::new(Vec::new()),
            finger_table: Mutex::new([None; M]),
            running: AtomicBool::new(true),
            data: DataPlane::new(rpc_timeout),
            rpc_timeout,
        }
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle { id: self.id, addr: self.addr }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub async fn first_successor(&self) -> Option<NodeHandle> {
        self.successors.lock().await.first().copied()
    }

    pub async fn set_first_successor(&self, successor: NodeHandle) {
        let mut successors = self.successors.lock().await;
        if successors.is_empty() {
            successors.push(successor);
        } else {
            successors[0] = successor;
        }
        successors.truncate(S);
    }

    pub async fn successor_list(&self) -> Vec<NodeHandle> {
        self.successors.lock().await.clone()
    }
}
