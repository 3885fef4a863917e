use crate::error::PastryError;
use crate::state::PastryNode;
use dht_client::send_request;
use dht_types::{Criteria, NodeId, RangeQuery, Record, RecordUpdate, Request, Response};
use std::sync::Arc;

/// Mirrors `dht_chord::client_ops`: resolves `key`'s owner via `find_owner`
/// then applies locally or forwards the routed request, separating the
/// "any node" half of spec §3's control flow from the "owner applies it"
/// dispatch table.
impl PastryNode {
    async fn route(self: &Arc<Self>, key: NodeId, request: Request) -> Result<Response, PastryError> {
        let owner = self.find_owner(key).await?;
        if owner.id == self.id {
            return Ok(self.dispatch_locally(request).await);
        }
        send_request(owner.addr, &request, self.rpc_timeout)
            .await
            .map_err(|error| PastryError::Unreachable(owner.id.to_string(), error.to_string()))
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

    pub async fn insert(self: &Arc<Self>, record: Record) -> Result<Response, PastryError> {
        let key = record.category_key;
        self.route(key, Request::InsertKey { record, apply_to_backup: true }).await
    }

    pub async fn delete(self: &Arc<Self>, category_key: NodeId) -> Result<Response, PastryError> {
        self.route(category_key, Request::DeleteKey { category_key, apply_to_backup: true }).await
    }

    pub async fn update(self: &Arc<Self>, category_key: NodeId, criteria: Option<Criteria>, update: RecordUpdate) -> Result<Response, PastryError> {
        self.route(category_key, Request::UpdateKey { category_key, criteria, update, apply_to_backup: true }).await
    }

    /// Runs the category-scoped, bounded range search plus LSH similarity
    /// ranking at whichever node owns `query.category_key`, returning up to
    /// `n` results.
    pub async fn lookup(self: &Arc<Self>, query: RangeQuery, n: usize) -> Result<Response, PastryError> {
        let key = query.category_key;
        self.route(key, Request::Lookup { query, n }).await
    }
}
