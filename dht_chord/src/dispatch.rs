use crate::state::ChordNode;
use async_trait::async_trait;
use dht_node::server::Dispatcher;
use dht_types::{Request, Response};
use std::sync::Arc;

/// Wraps a joined `ChordNode` as the full RPC table `dht_node::server::serve`
/// dispatches into. A thin newtype rather than `impl Dispatcher for
/// Arc<ChordNode>` because several handlers (`find_successor`, `join`,
/// the maintenance ticks) need `Arc<Self>` to recurse/spawn, and `serve`
/// itself already wraps its dispatcher argument in an `Arc`.
#[derive(Debug, Clone)]
pub struct ChordDispatcher(pub Arc<ChordNode>);

#[async_trait]
impl Dispatcher for ChordDispatcher {
    #[tracing::instrument(skip(self, request))]
    async fn dispatch(&self, request: Request) -> Response {
        let node = &self.0;
        if !node.is_running() {
            return Response::from_error(format!("node {} has stopped running", node.id));
        }
        match request {
            Request::FindSuccessor { id } => match node.find_successor(id).await {
                Ok(handle) => Response::Node(handle),
                Err(error) => Response::from_error(error.to_string()),
            },
            Request::FindOwner { .. } => Response::from_error("find_owner is a Pastry-only operation"),

            Request::SetSuccessor { successor } => {
                node.set_first_successor(successor).await;
                Response::Ack
            }
            Request::SetPredecessor { predecessor } => {
                *node.predecessor.lock().await = predecessor;
                Response::Ack
            }
            Request::GetSuccessor => Response::OptionalNode(node.first_successor().await),
            Request::GetPredecessor => Response::OptionalNode(*node.predecessor.lock().await),
            Request::GetStatus => Response::Status {
                id: node.id,
                predecessor: *node.predecessor.lock().await,
                successors: node.successor_list().await,
            },
            Request::GetNeighbors => Response::Neighbors(node.successor_list().await),

            Request::DeleteSuccessorKeys { from_exclusive, to_inclusive } => {
                let mut primary = node.data.primary().lock().await;
                for category in primary.category_keys() {
                    if category.in_ring_range(from_exclusive, to_inclusive, false, true) {
                        primary.delete(category);
                    }
                }
                Response::Ack
            }
            Request::Restoration { records, .. } => {
                let mut primary = node.data.primary().lock().await;
                for record in records {
                    node.data.backup().apply_insert(record.clone());
                    primary.add(record);
                }
                Response::Ack
            }
            Request::SetBackup { records, .. } => {
                node.data.backup().restore(records);
                Response::Ack
            }
            Request::SetBackupTarget { target } => {
                node.data.set_backup_target(target).await;
                Response::Ack
            }

            Request::NodeJoin { .. } => Response::from_error("node_join is driven by the joining node itself in Chord"),
            Request::NodeLeave { .. } => Response::from_error("node_leave broadcast is a Pastry-only operation"),
            Request::Distance { id } => Response::Distance(node.id.ring_distance(id)),

            Request::TransferKeys { new_id } => {
                let mut primary = node.data.primary().lock().await;
                let categories: Vec<_> = primary
                    .category_keys()
                    .into_iter()
                    .filter(|k| new_id.ring_distance(*k) > node.id.ring_distance(*k))
                    .collect();
                let mut moved = Vec::new();
                for category in categories {
                    moved.extend(primary.records_for_category(category));
                    primary.delete(category);
                }
                Response::Records(moved)
            }
            Request::SnapshotPrimary => Response::Records(node.data.primary().lock().await.records().to_vec()),

            Request::InsertKey { record, apply_to_backup } => node.data.insert(record, apply_to_backup).await,
            Request::DeleteKey { category_key, apply_to_backup } => node.data.delete(category_key, apply_to_backup).await,
            Request::UpdateKey { category_key, criteria, update, apply_to_backup } => node.data.update(category_key, criteria, update, apply_to_backup).await,
            Request::Lookup { query, n } => node.data.lookup(query, n).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dht_types::{NodeId, Point, Record};
    use pretty_assertions::assert_eq;
    use std::net::SocketAddr;

    fn addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn dispatch_find_successor_returns_self_when_alone() {
        let node = Arc::new(ChordNode::new(NodeId::from_u16(0x1000), addr(), None));
        node.set_first_successor(node.handle()).await;
        let dispatcher = ChordDispatcher(node.clone());
        let response = dispatcher.dispatch(Request::FindSuccessor { id: NodeId::from_u16(0x1000) }).await;
        match response {
            Response::Node(handle) => assert_eq!(handle.id, node.id),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatch_transfer_keys_moves_only_records_closer_to_new_id() {
        let node = Arc::new(ChordNode::new(NodeId::from_u16(0x1000), addr(), None));
        let record = Record::new(Point::new(2015.0, 90.0, 4.0), "Kenya", "bright");
        node.data.insert(record.clone(), true).await;

        let kenya_key = NodeId::from_hash("Kenya");
        let closer = if NodeId::from_u16(0x1000).ring_distance(kenya_key) > NodeId::from_u16(0x0fff).ring_distance(kenya_key) {
            NodeId::from_u16(0x0fff)
        } else {
            NodeId::from_u16(0x1001)
        };

        let dispatcher = ChordDispatcher(node.clone());
        let response = dispatcher.dispatch(Request::TransferKeys { new_id: closer }).await;
        match response {
            Response::Records(records) => assert_eq!(records.len(), 1),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatch_node_join_is_rejected_for_chord() {
        let node = Arc::new(ChordNode::new(NodeId::from_u16(0x1000), addr(), None));
        let dispatcher = ChordDispatcher(node.clone());
        let response = dispatcher.dispatch(Request::NodeJoin { joining: node.handle() }).await;
        assert!(matches!(response, Response::Error(_)));
    }
}
