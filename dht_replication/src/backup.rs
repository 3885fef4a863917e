use dht_types::{Criteria, NodeId, Record, RecordUpdate};
use flurry::HashMap as ConcurrentHashMap;

/// The mirror a successor keeps of its predecessor's primary records,
/// bucketed by category_key exactly like the primary KD-tree (many records
/// share a category). A node applies every mutating operation here whenever
/// it is acting as someone else's backup (`apply_to_backup = true` on the
/// wire request becomes `false` downstream), giving chain replication of
/// length two: one primary copy, one backup copy, no consensus round.
#[derive(Debug, Default)]
pub struct BackupStore {
    categories: ConcurrentHashMap<NodeId, Vec<Record>>,
}

impl BackupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_insert(&self, record: Record) {
        let pinned = self.categories.pin();
        let mut bucket = pinned.get(&record.category_key).cloned().unwrap_or_default();
        bucket.push(record.clone());
        pinned.insert(record.category_key, bucket);
    }

    /// Removes every record in `category_key`, returning the count removed.
    pub fn apply_delete(&self, category_key: NodeId) -> usize {
        let pinned = self.categories.pin();
        pinned.remove(&category_key).map_or(0, |bucket| bucket.len())
    }

    /// Updates every record in `category_key` matching `criteria`,
    /// returning the count updated.
    pub fn apply_update(&self, category_key: NodeId, criteria: Option<Criteria>, update: RecordUpdate) -> usize {
        let pinned = self.categories.pin();
        let Some(mut bucket) = pinned.get(&category_key).cloned() else {
            return 0;
        };
        let mut applied = 0;
        for record in bucket.iter_mut() {
            if criteria.map_or(true, |c| c.matches(&record.point)) {
                if let Some(point) = update.point {
                    record.point = point;
                }
                update.attributes.apply(&mut record.point);
                if let Some(review) = update.review.as_ref() {
                    record.review = review.clone();
                }
                applied += 1;
            }
        }
        if applied > 0 {
            pinned.insert(category_key, bucket);
        }
        applied
    }

    pub fn records_for_category(&self, category_key: NodeId) -> Vec<Record> {
        self.categories.pin().get(&category_key).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.categories.pin().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full snapshot, used to seed a successor's backup via `SetBackup`
    /// after a ring membership change.
    pub fn snapshot(&self) -> Vec<Record> {
        self.categories.pin().values().flat_map(|bucket| bucket.iter().cloned()).collect()
    }

    /// Replaces the whole backup contents, used by the receiving end of
    /// `SetBackup`.
    pub fn restore(&self, records: Vec<Record>) {
        let pinned = self.categories.pin();
        pinned.clear();
        for record in records {
            let mut bucket = pinned.get(&record.category_key).cloned().unwrap_or_default();
            bucket.push(record.clone());
            pinned.insert(record.category_key, bucket);
        }
    }
}
