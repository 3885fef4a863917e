use crate::error::ChordError;
use crate::state::ChordNode;
use dht_client::send_request;
use dht_types::{Criteria, NodeId, RangeQuery, Record, RecordUpdate, Request, Response};
use std::sync::Arc;

/// The public entry point any node accepts a client operation on: resolve
/// the owner of `key` via `find_successor`, then either apply locally or
/// forward the already-routed `InsertKey`/`DeleteKey`/etc. request to it.
/// Separate from the RPC dispatch table, which only ever applies at the
/// node it lands on - this is the "any node" half of the control flow in
/// spec §3, the dispatch table is the "owner applies it" half.
impl ChordNode {
    async fn route(self: &Arc<Self>, key: NodeId, request: Request) -> Result<Response, ChordError> {
        let owner = self.find_successor(key).await?;
        if owner.id == self.id {
            return Ok(self.dispatch_locally(request).await);
        }
        send_request(owner.addr, &request, self.rpc_timeout)
            .await
            .map_err(|error| ChordError::Unreachable(owner.id.to_string(), error.to_string()))
    }

    async fn dispatch_locally(&self, request: Request) -> Response {
        match request {
            Request::InsertKey { record, apply_to_backup } => self.data.insert(record, apply_to_backup).await,
            Request::DeleteKey { category_key, apply_to_backup } => self.data.delete(category_key, apply_to_backup).await,
            Request::UpdateKey { category_key, criteria, update, apply_to_backup } => self.data.update(category_key, criteria, update, apply_to_backup).await,
            Request::Lookup { query, n } => self.data.lookup(query, n).await,
            other => Response::from_error(format!("{other:?} is not a routable client operation")),
        }
    }

    pub async fn insert(self: &Arc<Self>, record: Record) -> Result<Response, ChordError> {
        let key = record.category_key;
        self.route(key, Request::InsertKey { record, apply_to_backup: true }).await
    }

    pub async fn delete(self: &Arc<Self>, category_key: NodeId) -> Result<Response, ChordError> {
        self.route(category_key, Request::DeleteKey { category_key, apply_to_backup: true }).await
    }

    pub async fn update(self: &Arc<Self>, category_key: NodeId, criteria: Option<Criteria>, update: RecordUpdate) -> Result<Response, ChordError> {
        self.route(category_key, Request::UpdateKey { category_key, criteria, update, apply_to_backup: true }).await
    }

    /// Runs the category-scoped, bounded range search plus LSH similarity
    /// ranking at whichever node owns `query.category_key`, returning up to
    /// `n` results.
    pub async fn lookup(self: &Arc<Self>, query: RangeQuery, n: usize) -> Result<Response, ChordError> {
        let key = query.category_key;
        self.route(key, Request::Lookup { query, n }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dht_types::Point;
    use pretty_assertions::assert_eq;
    use std::net::SocketAddr;

    fn addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn insert_and_lookup_round_trip_on_a_singleton_ring() {
        let node = Arc::new(ChordNode::new(NodeId::from_u16(0x1000), addr(), None));
        node.set_first_successor(node.handle()).await;

        let record = Record::new(Point::new(2018.0, 94.0, 5.5), "United States", "delicate");
        let category_key = record.category_key;
        node.insert(record.clone()).await.unwrap();

        let query = RangeQuery { category_key, ..Default::default() };
        let response = node.lookup(query, 5).await.unwrap();
        match response {
            Response::Records(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].review, "delicate");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
