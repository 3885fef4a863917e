use crate::routing::closer_abs_hex;
use crate::state::PastryNode;
use async_trait::async_trait;
use dht_node::server::Dispatcher;
use dht_types::{Request, Response};
use std::sync::Arc;

/// Wraps a running `PastryNode` as the full RPC table `dht_node::server::serve`
/// dispatches into, mirroring `dht_chord::dispatch::ChordDispatcher`: routing
/// and membership handlers need `Arc<Self>` to recurse into further hops.
#[derive(Debug, Clone)]
pub struct PastryDispatcher(pub Arc<PastryNode>);

#[async_trait]
impl Dispatcher for PastryDispatcher {
    #[tracing::instrument(skip(self, request))]
    async fn dispatch(&self, request: Request) -> Response {
        let node = &self.0;
        if !node.is_running() {
            return Response::from_error(format!("node {} has stopped running", node.id));
        }
        match request {
            Request::FindSuccessor { .. } => Response::from_error("find_successor is a Chord-only operation"),
            Request::FindOwner { id } => match node.find_owner(id).await {
                Ok(handle) => Response::Node(handle),
                Err(error) => Response::from_error(error.to_string()),
            },

            Request::SetSuccessor { .. } => Response::from_error("set_successor is a Chord-only operation"),
            Request::SetPredecessor { .. } => Response::from_error("set_predecessor is a Chord-only operation"),
            Request::GetSuccessor => Response::from_error("get_successor is a Chord-only operation"),
            Request::GetPredecessor => Response::from_error("get_predecessor is a Chord-only operation"),
            Request::GetStatus => Response::Status { id: node.id, predecessor: None, successors: node.leaf_set_entries().await },
            Request::GetNeighbors => Response::Neighbors(node.leaf_set_entries().await),

            Request::DeleteSuccessorKeys { .. } => Response::from_error("delete_successor_keys is a Chord-only operation"),
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

            Request::GetRoutingTable => Response::Neighbors(node.routing_table_entries().await),
            Request::GetLeafSet => Response::Neighbors(node.leaf_set_entries().await),
            Request::GetNeighborhoodSet => Response::Neighbors(node.neighborhood_entries().await),
            Request::UpdatePresence { node: peer } => {
                node.handle_presence(peer).await;
                Response::Ack
            }
            Request::GetKeys { new_id } => {
                let mut primary = node.data.primary().lock().await;
                let categories: Vec<_> = primary
                    .category_keys()
                    .into_iter()
                    .filter(|k| closer_abs_hex(new_id.abs_hex_distance(*k), node.id.abs_hex_distance(*k)) == std::cmp::Ordering::Less)
                    .collect();
                let mut moved = Vec::new();
                for category in categories {
                    moved.extend(primary.records_for_category(category));
                    primary.delete(category);
                }
                Response::Records(moved)
            }
            Request::PositionDistance { position } => Response::PositionDistance((node.position - position).abs()),

            Request::NodeJoin { .. } => Response::from_error("node_join is driven by the joining node itself in Pastry"),
            Request::NodeLeave { leaving } => {
                node.forget(leaving.id).await;
                Response::Ack
            }
            Request::Distance { id } => Response::Distance(node.id.abs_hex_distance(id).1),

            Request::TransferKeys { .. } => Response::from_error("transfer_keys is a Chord-only operation"),
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
    async fn dispatch_find_owner_returns_self_when_alone() {
        let node = Arc::new(PastryNode::new(NodeId::from_u16(0x1000), addr(), 0.5, None));
        let dispatcher = PastryDispatcher(node.clone());
        let response = dispatcher.dispatch(Request::FindOwner { id: NodeId::from_u16(0x1000) }).await;
        match response {
            Response::Node(handle) => assert_eq!(handle.id, node.id),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatch_position_distance_computes_absolute_difference() {
        let node = Arc::new(PastryNode::new(NodeId::from_u16(0x1000), addr(), 0.75, None));
        let dispatcher = PastryDispatcher(node.clone());
        let response = dispatcher.dispatch(Request::PositionDistance { position: 0.25 }).await;
        match response {
            Response::PositionDistance(d) => assert!((d - 0.5).abs() < 1e-9),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatch_find_successor_is_rejected_for_pastry() {
        let node = Arc::new(PastryNode::new(NodeId::from_u16(0x1000), addr(), 0.5, None));
        let dispatcher = PastryDispatcher(node.clone());
        let response = dispatcher.dispatch(Request::FindSuccessor { id: NodeId::from_u16(0x1000) }).await;
        assert!(matches!(response, Response::Error(_)));
    }
}
