use crate::state::{hex_digit, PastryNode};
use dht_client::send_request;
use dht_types::{NodeHandle, NodeId, Request, Response};
use std::sync::Arc;

/// Ranks candidates by the Pastry proximity metric: a longer shared prefix
/// wins first, then a smaller numeric suffix difference. Exposed crate-wide
/// (dispatch's `GetKeys`) and to `dht_network`, which needs the same
/// ranking to redistribute a leaving node's records onto their new closest
/// owner (spec §4.7).
pub fn closer_abs_hex(a: (usize, u32), b: (usize, u32)) -> std::cmp::Ordering {
    b.0.cmp(&a.0).then(a.1.cmp(&b.1))
}

impl PastryNode {
    /// `find_owner(k)`, routing entirely by the responder's own local
    /// state at each hop (no node reaches into a peer's tables): first
    /// check whether `k` already falls within this node's leaf set range,
    /// then fall back to prefix routing, then to the best-matching known
    /// id across leaf set, neighborhood set, and routing table.
    pub async fn find_owner(self: &Arc<Self>, k: NodeId) -> Result<NodeHandle, crate::error::PastryError> {
        self.find_owner_hop(k, 0).await
    }

    fn find_owner_hop<'a>(
        self: &'a Arc<Self>,
        k: NodeId,
        hop: usize,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<NodeHandle, crate::error::PastryError>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(owner) = self.owner_within_leaf_set(k).await {
                return Ok(owner);
            }

            let row = self.id.common_prefix_len(k);
            if row < dht_types::HEX_DIGITS {
                let column = hex_digit(k, row);
                let candidate = { self.routing_table.lock().await[row][column] };
                if let Some(candidate) = candidate {
                    return self.forward(candidate, k, hop).await;
                }
            }

            let self_distance = self.id.abs_hex_distance(k);
            let mut best: Option<NodeHandle> = None;
            let mut best_distance = self_distance;
            for candidate in self.all_known_candidates().await {
                if candidate.id == self.id {
                    continue;
                }
                let candidate_prefix = candidate.id.common_prefix_len(k);
                let candidate_distance = candidate.id.abs_hex_distance(k);
                if candidate_prefix >= row && closer_abs_hex(candidate_distance, best_distance) == std::cmp::Ordering::Less {
                    best = Some(candidate);
                    best_distance = candidate_distance;
                }
            }

            match best {
                Some(candidate) => self.forward(candidate, k, hop).await,
                None => Ok(self.handle()),
            }
        })
    }

    async fn forward(self: &Arc<Self>, candidate: NodeHandle, k: NodeId, hop: usize) -> Result<NodeHandle, crate::error::PastryError> {
        tracing::debug!(hop, target = %candidate.id, key = %k, "forwarding find_owner");
        match send_request(candidate.addr, &Request::FindOwner { id: k }, self.rpc_timeout).await {
            Ok(Response::Node(handle)) => Ok(handle),
            Ok(other) => Err(crate::error::PastryError::UnexpectedResponse(format!("{other:?}"))),
            Err(error) => {
                tracing::warn!(target = %candidate.id, %error, "find_owner hop unreachable, repairing and falling back to self");
                self.clear_routing_candidate(candidate.id).await;
                self.remove_leaf_candidate(candidate.id).await;
                self.remove_neighborhood_candidate(candidate.id).await;
                Ok(self.handle())
            }
        }
    }

    /// Whether `k` falls within the numeric span of `leaf_min ∪ leaf_max ∪
    /// {self}`, and if so, the member with the smallest `abs_hex_distance`
    /// to it.
    async fn owner_within_leaf_set(&self, k: NodeId) -> Option<NodeHandle> {
        let mut candidates: Vec<NodeHandle> = self.leaf_min.lock().await.clone();
        candidates.extend(self.leaf_max.lock().await.iter().copied());
        candidates.push(self.handle());

        let min_id = candidates.iter().map(|h| h.id).min()?;
        let max_id = candidates.iter().map(|h| h.id).max()?;
        if k < min_id || k > max_id {
            return None;
        }

        candidates.into_iter().min_by(|a, b| closer_abs_hex(a.id.abs_hex_distance(k), b.id.abs_hex_distance(k)))
    }

    async fn all_known_candidates(&self) -> Vec<NodeHandle> {
        let mut candidates = self.leaf_set_entries().await;
        candidates.extend(self.neighborhood_entries().await);
        candidates.extend(self.routing_table_entries().await);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::SocketAddr;

    fn addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn find_owner_returns_self_when_alone() {
        let node = Arc::new(PastryNode::new(NodeId::from_u16(0x1000), addr(), 0.5, None));
        let found = node.find_owner(NodeId::from_u16(0x1000)).await.unwrap();
        assert_eq!(found.id, node.id);
    }

    #[tokio::test]
    async fn find_owner_picks_closest_leaf_when_key_in_range() {
        let node = Arc::new(PastryNode::new(NodeId::from_u16(0x1000), addr(), 0.5, None));
        let below = NodeHandle { id: NodeId::from_u16(0x0f00), addr: addr() };
        let above = NodeHandle { id: NodeId::from_u16(0x1100), addr: addr() };
        node.offer_leaf_candidate(below).await;
        node.offer_leaf_candidate(above).await;

        let found = node.find_owner(NodeId::from_u16(0x1080)).await.unwrap();
        assert_eq!(found.id, node.id);
    }
}
