use dht_node::DataPlane;
use dht_types::{NodeHandle, NodeId, HEX_DIGITS};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Routing-table row width: `2^b` columns, one per hex digit value.
pub const B: usize = 4;
pub const COLUMNS: usize = 1 << B;
/// Leaf-set half-size; the full leaf set holds `2*R` ids.
pub const R: usize = 2;
pub const LEAF_SIZE: usize = 2 * R;
/// Neighborhood set size.
pub const NEIGHBORHOOD_SIZE: usize = R + 1;

pub type RoutingTable = [[Option<NodeHandle>; COLUMNS]; HEX_DIGITS];

/// Hex digit of `id` at `row`, used as a routing-table column index.
pub fn hex_digit(id: NodeId, row: usize) -> usize {
    let hex = id.to_hex();
    hex.chars().nth(row).and_then(|c| c.to_digit(16)).expect("to_hex always yields 4 valid hex digits") as usize
}

/// One Pastry node: its ring-independent id, synthetic proximity
/// `position`, prefix routing table (P1), leaf set (P2), neighborhood set
/// (P3), and the shared data-plane it owns.
#[derive(Debug)]
pub struct PastryNode {
    pub id: NodeId,
    pub addr: SocketAddr,
    pub position: f64,
    pub routing_table: Mutex<RoutingTable>,
    pub leaf_min: Mutex<Vec<NodeHandle>>,
    pub leaf_max: Mutex<Vec<NodeHandle>>,
    /// Paired with each peer's synthetic position so distance-based
    /// eviction (P3) doesn't need a second round trip to re-derive it.
    pub neighborhood_set: Mutex<Vec<(NodeHandle, f64)>>,
    pub running: AtomicBool,
    pub data: DataPlane,
    pub rpc_timeout: Option<Duration>,
}

impl PastryNode {
    pub fn new(id: NodeId, addr: SocketAddr, position: f64, rpc_timeout: Option<Duration>) -> Self {
        PastryNode {
            id,
            addr,
            position,
            routing_table: Mutex::new([[None; COLUMNS]; HEX_DIGITS]),
            leaf_min: Mutex::new(Vec::new()),
            leaf_max: Mutex::new(Vec::new()),
            neighborhood_set: Mutex::new(Vec::new()),
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

    /// All non-empty routing-table entries, flattened - the snapshot shape
    /// handed out over the wire for `GetRoutingTable`.
    pub async fn routing_table_entries(&self) -> Vec<NodeHandle> {
        self.routing_table.lock().await.iter().flatten().filter_map(|slot| *slot).collect()
    }

    pub async fn leaf_set_entries(&self) -> Vec<NodeHandle> {
        let mut entries = self.leaf_min.lock().await.clone();
        entries.extend(self.leaf_max.lock().await.iter().copied());
        entries
    }

    pub async fn neighborhood_entries(&self) -> Vec<NodeHandle> {
        self.neighborhood_set.lock().await.iter().map(|(handle, _)| *handle).collect()
    }

    /// Inserts `candidate` into the unique routing-table cell it belongs
    /// in (P1), if that cell is empty. No-op for `self` or an already
    /// better-filled cell.
    pub async fn offer_routing_candidate(&self, candidate: NodeHandle) {
        if candidate.id == self.id {
            return;
        }
        let row = self.id.common_prefix_len(candidate.id);
        if row >= HEX_DIGITS {
            return;
        }
        let column = hex_digit(candidate.id, row);
        let mut table = self.routing_table.lock().await;
        if table[row][column].is_none() {
            table[row][column] = Some(candidate);
        }
    }

    pub async fn clear_routing_candidate(&self, dead: NodeId) {
        let mut table = self.routing_table.lock().await;
        for row in table.iter_mut() {
            for slot in row.iter_mut() {
                if slot.map(|h| h.id) == Some(dead) {
                    *slot = None;
                }
            }
        }
    }

    /// Offers `candidate` to the leaf set, keeping at most `R` ids below
    /// and `R` above self by numeric (hex) distance, evicting the
    /// farthest when a side is full (P2). `hex_cmp` decides the side;
    /// `ring_distance` (forward distance on the ring) ranks within it,
    /// since "below"/"above" both wrap.
    pub async fn offer_leaf_candidate(&self, candidate: NodeHandle) {
        if candidate.id == self.id {
            return;
        }
        if candidate.id.hex_cmp(self.id, false) {
            let mut side = self.leaf_max.lock().await;
            if side.iter().any(|h| h.id == candidate.id) {
                return;
            }
            side.push(candidate);
            side.sort_by_key(|h| self.id.ring_distance(h.id));
            side.truncate(R);
        } else {
            let mut side = self.leaf_min.lock().await;
            if side.iter().any(|h| h.id == candidate.id) {
                return;
            }
            side.push(candidate);
            side.sort_by_key(|h| h.id.ring_distance(self.id));
            side.truncate(R);
        }
    }

    pub async fn remove_leaf_candidate(&self, dead: NodeId) {
        self.leaf_min.lock().await.retain(|h| h.id != dead);
        self.leaf_max.lock().await.retain(|h| h.id != dead);
    }

    /// Offers `candidate`, already known to be `distance` away in position
    /// space (`|candidate.position - self.position|`, learned via
    /// `PositionDistance`), to the neighborhood set, keeping the `R + 1`
    /// closest (P3).
    pub async fn offer_neighborhood_candidate(&self, candidate: NodeHandle, distance: f64) {
        if candidate.id == self.id {
            return;
        }
        let mut set = self.neighborhood_set.lock().await;
        if set.iter().any(|(h, _)| h.id == candidate.id) {
            return;
        }
        set.push((candidate, distance));
        set.sort_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        set.truncate(NEIGHBORHOOD_SIZE);
    }

    pub async fn remove_neighborhood_candidate(&self, dead: NodeId) {
        self.neighborhood_set.lock().await.retain(|(h, _)| h.id != dead);
    }
}
