use crate::identifier::NodeId;
use crate::record::{Criteria, RangeQuery, Record, RecordUpdate};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// A node's address as advertised to peers: its ring id plus the loopback
/// socket address workers accept connections on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHandle {
    pub id: NodeId,
    pub addr: SocketAddr,
}

/// A Chord finger/successor-list entry, or a Pastry routing/leaf/neighborhood
/// slot, is always just a `NodeHandle` — the overlay-specific structure lives
/// in `dht_chord`/`dht_pastry`, not in the wire type.
pub type NodeStatus = Vec<NodeHandle>;

/// Every request a node can receive, spanning ring maintenance (shared
/// vocabulary used by both overlays, though each overlay only emits the
/// subset it needs) and key-value data operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Chord: locate the successor of `id`.
    FindSuccessor { id: NodeId },
    /// Pastry: locate the node that owns `id` by prefix routing.
    FindOwner { id: NodeId },
    SetSuccessor { successor: NodeHandle },
    SetPredecessor { predecessor: Option<NodeHandle> },
    GetSuccessor,
    GetPredecessor,
    /// Returns the responder's view of its own ring neighbourhood, used by
    /// `GET_STATUS` health probes during stabilization.
    GetStatus,
    /// Successor list for Chord or leaf set for Pastry.
    GetNeighbors,
    /// Tells the target to drop keys no longer in its range after a
    /// successor/leaf change.
    DeleteSuccessorKeys { from_exclusive: NodeId, to_inclusive: NodeId },
    /// Pushes `records` (drawn from the sender's backup copy of a now-dead
    /// neighbor) into the target's primary tree, merging ownership of the
    /// `(from_exclusive, to_inclusive]` range after a successor/leaf fails.
    Restoration { from_exclusive: NodeId, to_inclusive: NodeId, records: Vec<Record> },
    /// Pushes the full backup snapshot that `target` should hold on behalf
    /// of `primary`.
    SetBackup { primary: NodeId, records: Vec<Record> },
    /// Repoints the responder's replication target after a ring membership
    /// change, e.g. when its successor changes during a neighbor's join or
    /// leave.
    SetBackupTarget { target: Option<NodeHandle> },

    /// Pastry: every populated routing-table cell, flattened. The caller
    /// recomputes each candidate's correct row/column from its own id, so
    /// no row/column indices need to travel on the wire.
    GetRoutingTable,
    /// Pastry: the current leaf set (both below and above self), flattened.
    GetLeafSet,
    /// Pastry: the current neighborhood set.
    GetNeighborhoodSet,
    /// Pastry join step 4: tells the responder that `node` now exists, so
    /// it can adopt it into any matching empty routing-table cell, or into
    /// its leaf/neighborhood set if `node` belongs there.
    UpdatePresence { node: NodeHandle },
    /// Pastry join step 5: the responder moves out and returns every
    /// record for which `new_id` is now a strictly better owner than
    /// itself by `abs_hex_distance`.
    GetKeys { new_id: NodeId },
    /// Pastry: asks the responder for its distance, in synthetic position
    /// space, to `position` - used to rank neighborhood-set candidates
    /// without exposing raw positions on the wire.
    PositionDistance { position: f64 },
    NodeJoin { joining: NodeHandle },
    NodeLeave { leaving: NodeHandle },
    Distance { id: NodeId },
    /// Join step 4: the receiver moves every category it no longer owns
    /// once `new_id` has joined between it and its predecessor, removing
    /// them from its own primary tree and returning them to the caller.
    TransferKeys { new_id: NodeId },
    /// Join step 5: returns a full snapshot of the responder's primary
    /// tree, used by a newly joined node to seed its backup from its
    /// predecessor.
    SnapshotPrimary,

    InsertKey { record: Record, apply_to_backup: bool },
    /// Removes every record in `category_key`; matches nothing silently.
    DeleteKey { category_key: NodeId, apply_to_backup: bool },
    /// Updates every record in `category_key` matching the optional
    /// equality `criteria`; matches nothing silently.
    UpdateKey { category_key: NodeId, criteria: Option<Criteria>, update: RecordUpdate, apply_to_backup: bool },
    /// The single read-only data-plane operation: a category-scoped,
    /// bounded `range_search` followed by LSH similarity ranking over the
    /// resulting reviews, truncated to the top `n`.
    Lookup { query: RangeQuery, n: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Node(NodeHandle),
    OptionalNode(Option<NodeHandle>),
    Neighbors(NodeStatus),
    Status { id: NodeId, predecessor: Option<NodeHandle>, successors: NodeStatus },
    Records(Vec<Record>),
    /// Number of records a bulk `DeleteKey`/`UpdateKey` touched.
    Count(usize),
    Distance(u32),
    PositionDistance(f64),
    Ack,
    Error(String),
}

impl Response {
    pub fn from_error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }
}
