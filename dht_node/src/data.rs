use dht_client::send_request;
use dht_index::kdtree::KdTree;
use dht_index::similarity::SimilarityIndex;
use dht_replication::BackupStore;
use dht_types::{NodeHandle, NodeId, RangeQuery, Record, RecordUpdate, Request, Response};
use std::time::Duration;
use tokio::sync::Mutex;

/// The data-plane half of a node: the mutex-guarded primary KD-tree, the
/// backup mirror this node holds on behalf of its predecessor/neighbor, and
/// the handle of whichever peer holds *this* node's backup. Shared verbatim
/// by `dht_chord` and `dht_pastry`, which each wrap it with their own
/// routing state and own the full RPC dispatch table.
#[derive(Debug)]
pub struct DataPlane {
    primary: Mutex<KdTree>,
    backup: BackupStore,
    backup_target: Mutex<Option<NodeHandle>>,
    rpc_timeout: Option<Duration>,
}

impl DataPlane {
    pub fn new(rpc_timeout: Option<Duration>) -> Self {
        DataPlane {
            primary: Mutex::new(KdTree::new()),
            backup: BackupStore::new(),
            backup_target: Mutex::new(None),
            rpc_timeout,
        }
    }

    pub async fn set_backup_target(&self, target: Option<NodeHandle>) {
        *self.backup_target.lock().await = target;
    }

    pub async fn backup_target(&self) -> Option<NodeHandle> {
        *self.backup_target.lock().await
    }

    pub fn backup(&self) -> &BackupStore {
        &self.backup
    }

    /// Forwards `request` to this node's backup target, under the primary's
    /// mutex per the spec's single exception to "never hold the mutex across
    /// an RPC". Failure is logged and swallowed: replication lag is repaired
    /// by the next restoration, not retried here.
    async fn replicate(&self, request: Request) {
        let Some(target) = self.backup_target().await else {
            return;
        };
        if let Err(error) = send_request(target.addr, &request, self.rpc_timeout).await {
            tracing::warn!(backup = %target.id, %error, "replication to backup failed, will repair on next restoration");
        }
    }

    #[tracing::instrument(skip(self, record))]
    pub async fn insert(&self, record: Record, apply_to_backup: bool) -> Response {
        if apply_to_backup {
            {
                let mut primary = self.primary.lock().await;
                primary.add(record.clone());
                self.replicate(Request::InsertKey { record, apply_to_backup: false }).await;
            }
        } else {
            self.backup.apply_insert(record);
        }
        Response::Ack
    }

    /// Removes every record in `category_key`. Matches nothing silently
    /// (count 0) rather than erroring, per spec §4.2.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, category_key: NodeId, apply_to_backup: bool) -> Response {
        if apply_to_backup {
            let count = {
                let mut primary = self.primary.lock().await;
                let count = primary.delete(category_key);
                if count > 0 {
                    self.replicate(Request::DeleteKey { category_key, apply_to_backup: false }).await;
                }
                count
            };
            Response::Count(count)
        } else {
            Response::Count(self.backup.apply_delete(category_key))
        }
    }

    /// Updates every record in `category_key` matching the optional
    /// `criteria`. Returns the count touched; 0 when nothing matches.
    #[tracing::instrument(skip(self, update))]
    pub async fn update(&self, category_key: NodeId, criteria: Option<dht_types::Criteria>, update: RecordUpdate, apply_to_backup: bool) -> Response {
        if apply_to_backup {
            let count = {
                let mut primary = self.primary.lock().await;
                let count = primary.update(category_key, criteria, update.clone());
                if count > 0 {
                    self.replicate(Request::UpdateKey { category_key, criteria, update, apply_to_backup: false }).await;
                }
                count
            };
            Response::Count(count)
        } else {
            Response::Count(self.backup.apply_update(category_key, criteria, update))
        }
    }

    /// The data-plane's sole read operation (spec §4.5/§6): a category-scoped
    /// range search, then LSH similarity ranking over the resulting reviews,
    /// truncated to the top `n`. A bound-less, empty-category, or zero-`n`
    /// query returns an empty result rather than an error.
    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, query: RangeQuery, n: usize) -> Response {
        if n == 0 {
            return Response::Records(vec![]);
        }
        let records = {
            let primary = self.primary.lock().await;
            primary.range_search(&query)
        };
        if records.is_empty() {
            return Response::Records(vec![]);
        }

        let index = SimilarityIndex::build(&records);
        let top = index.top_similar(n);
        if top.is_empty() {
            // Fewer than two reviews means no LSH candidate pairs exist;
            // still surface the range-search hits directly, capped at n.
            let mut records = records;
            records.truncate(n);
            return Response::Records(records);
        }
        Response::Records(top.into_iter().filter_map(|i| records.get(i).cloned()).collect())
    }

    /// Direct access to the primary tree for overlay-layer bookkeeping that
    /// falls outside the RPC dispatch table: join transfer, leave
    /// redistribution, and restoration all need to read/mutate it without
    /// going through the wire-request replication path.
    pub fn primary(&self) -> &Mutex<KdTree> {
        &self.primary
    }
}
