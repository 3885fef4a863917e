use dht_chord::ChordNode;
use dht_pastry::PastryNode;
use dht_types::{NodeHandle, NodeId};
use std::sync::Arc;

/// Which overlay protocol a `Network` runs - chosen once at `build()` time,
/// every node in a single network runs the same one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Chord,
    Pastry,
}

/// A started node, whichever overlay it belongs to. The registry only ever
/// needs the handful of operations shared by both (`id`, `handle`,
/// `is_running`) plus overlay-specific joins/leaves/inserts, which
/// `Network` matches on explicitly rather than forcing a shared trait that
/// would paper over join/leave's genuinely different shapes (§4.6 vs §4.7).
#[derive(Debug, Clone)]
pub enum OverlayNode {
    Chord(Arc<ChordNode>),
    Pastry(Arc<PastryNode>),
}

impl OverlayNode {
    pub fn id(&self) -> NodeId {
        match self {
            OverlayNode::Chord(node) => node.id,
            OverlayNode::Pastry(node) => node.id,
        }
    }

    pub fn handle(&self) -> NodeHandle {
        match self {
            OverlayNode::Chord(node) => node.handle(),
            OverlayNode::Pastry(node) => node.handle(),
        }
    }

    pub fn is_running(&self) -> bool {
        match self {
            OverlayNode::Chord(node) => node.is_running(),
            OverlayNode::Pastry(node) => node.is_running(),
        }
    }
}
