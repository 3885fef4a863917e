use crate::error::PastryError;
use crate::state::PastryNode;
use dht_client::send_request;
use dht_types::{NodeHandle, Request, Response};
use std::sync::Arc;

impl PastryNode {
    async fn position_distance_to(&self, peer: NodeHandle) -> Result<f64, PastryError> {
        match send_request(peer.addr, &Request::PositionDistance { position: self.position }, self.rpc_timeout).await {
            Ok(Response::PositionDistance(distance)) => Ok(distance),
            Ok(other) => Err(PastryError::UnexpectedResponse(format!("{other:?}"))),
            Err(error) => Err(PastryError::Unreachable(peer.id.to_string(), error.to_string())),
        }
    }

    async fn adopt_neighborhood_candidate(&self, candidate: NodeHandle) {
        match self.position_distance_to(candidate).await {
            Ok(distance) => self.offer_neighborhood_candidate(candidate, distance).await,
            Err(error) => tracing::debug!(peer = %candidate.id, %error, "could not learn position distance, skipping neighborhood candidate"),
        }
    }

    /// Five-step join against bootstrap `a`, already the topologically
    /// closest known node (the registry picks it that way per spec §4.8):
    /// 1. seed the neighborhood set from `a`'s, 2. route to the terminal
    /// owner `z` of our own id, 3. fill the routing table from `a` and
    /// `z`'s tables and take `z`'s leaf set, 4. broadcast presence to
    /// everything we now know about, 5. pull the keys that are now ours
    /// from `a` and `z`.
    pub async fn join(self: &Arc<Self>, a: NodeHandle) -> Result<(), PastryError> {
        match send_request(a.addr, &Request::GetNeighborhoodSet, self.rpc_timeout).await {
            Ok(Response::Neighbors(entries)) => {
                for entry in entries {
                    self.adopt_neighborhood_candidate(entry).await;
                }
            }
            Ok(other) => return Err(PastryError::UnexpectedResponse(format!("{other:?}"))),
            Err(error) => return Err(PastryError::Unreachable(a.id.to_string(), error.to_string())),
        }
        self.adopt_neighborhood_candidate(a).await;

        let z = match send_request(a.addr, &Request::FindOwner { id: self.id }, self.rpc_timeout).await {
            Ok(Response::Node(handle)) => handle,
            Ok(other) => return Err(PastryError::UnexpectedResponse(format!("{other:?}"))),
            Err(error) => return Err(PastryError::Unreachable(a.id.to_string(), error.to_string())),
        };

        for contact in [a, z] {
            match send_request(contact.addr, &Request::GetRoutingTable, self.rpc_timeout).await {
                Ok(Response::Neighbors(entries)) => {
                    for entry in entries {
                        self.offer_routing_candidate(entry).await;
                    }
                }
                Ok(other) => return Err(PastryError::UnexpectedResponse(format!("{other:?}"))),
                Err(error) => return Err(PastryError::Unreachable(contact.id.to_string(), error.to_string())),
            }
            self.offer_routing_candidate(contact).await;
        }

        match send_request(z.addr, &Request::GetLeafSet, self.rpc_timeout).await {
            Ok(Response::Neighbors(entries)) => {
                for entry in entries {
                    self.offer_leaf_candidate(entry).await;
                }
            }
            Ok(other) => return Err(PastryError::UnexpectedResponse(format!("{other:?}"))),
            Err(error) => return Err(PastryError::Unreachable(z.id.to_string(), error.to_string())),
        }
        self.offer_leaf_candidate(a).await;
        self.offer_leaf_candidate(z).await;

        let mut known = self.routing_table_entries().await;
        known.extend(self.leaf_set_entries().await);
        known.extend(self.neighborhood_entries().await);
        known.sort_by_key(|h| h.id);
        known.dedup_by_key(|h| h.id);
        for peer in known {
            if let Err(error) = send_request(peer.addr, &Request::UpdatePresence { node: self.handle() }, self.rpc_timeout).await {
                tracing::debug!(peer = %peer.id, %error, "could not announce presence, will only be reachable through repair");
            }
        }

        for contact in [a, z] {
            match send_request(contact.addr, &Request::GetKeys { new_id: self.id }, self.rpc_timeout).await {
                Ok(Response::Records(records)) => {
                    let mut primary = self.data.primary().lock().await;
                    for record in records {
                        primary.add(record);
                    }
                }
                Ok(other) => return Err(PastryError::UnexpectedResponse(format!("{other:?}"))),
                Err(error) => return Err(PastryError::Unreachable(contact.id.to_string(), error.to_string())),
            }
        }

        Ok(())
    }

    /// Graceful leave (spec §4.7): stop, then redistribute every record we
    /// hold by reinserting it through the network via whichever live
    /// contact we still know, letting ordinary routing place it with its
    /// new closest owner. Peers still holding stale references to us
    /// repair lazily on their next failed routing hop.
    pub async fn leave(self: &Arc<Self>) -> Result<Vec<dht_types::Record>, PastryError> {
        self.stop();
        let records = self.data.primary().lock().await.records().to_vec();
        Ok(records)
    }

    /// Applies an `UPDATE_PRESENCE`/`NODE_LEAVE` style membership event
    /// locally: adopt `node` into routing table and leaf set, and into
    /// the neighborhood set if we can still learn its distance.
    pub async fn handle_presence(self: &Arc<Self>, node: NodeHandle) {
        self.offer_routing_candidate(node).await;
        self.offer_leaf_candidate(node).await;
        self.adopt_neighborhood_candidate(node).await;
    }

    /// Drops every reference to `dead` from routing table, leaf set, and
    /// neighborhood set - used for both the `NODE_LEAVE` broadcast and
    /// lazy repair on a failed routing hop.
    pub async fn forget(&self, dead: dht_types::NodeId) {
        self.clear_routing_candidate(dead).await;
        self.remove_leaf_candidate(dead).await;
        self.remove_neighborhood_candidate(dead).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dht_types::NodeId;
    use pretty_assertions::assert_eq;
    use std::net::SocketAddr;

    fn addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn leave_returns_primary_snapshot_and_stops() {
        let node = Arc::new(PastryNode::new(NodeId::from_u16(0x1000), addr(), 0.5, None));
        let record = dht_types::Record::new(dht_types::Point::new(2015.0, 90.0, 4.0), "Kenya", "bright");
        node.data.insert(record, true).await;

        let records = node.leave().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(!node.is_running());
    }

    #[tokio::test]
    async fn handle_presence_adds_to_leaf_set() {
        let node = Arc::new(PastryNode::new(NodeId::from_u16(0x1000), addr(), 0.5, None));
        let peer = NodeHandle { id: NodeId::from_u16(0x1100), addr: addr() };
        node.handle_presence(peer).await;
        assert!(node.leaf_set_entries().await.iter().any(|h| h.id == peer.id));
    }
}
