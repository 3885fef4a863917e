use dht_types::{Axis, Criteria, NodeId, Point, RangeQuery, Record, RecordUpdate};
use tracing::instrument;

struct KdNode {
    index: usize,
    left: Option<Box<KdNode>>,
    right: Option<Box<KdNode>>,
}

/// Range-queryable 3-D index over `Record`s (year, rating, price). Mirrors
/// the Python original's use of a balanced tree rebuilt from scratch after
/// every mutation rather than an incrementally-rebalanced structure - cheap
/// enough given the per-node record counts this system expects, and it
/// keeps query pruning correct without rotation logic.
#[derive(Default)]
pub struct KdTree {
    records: Vec<Record>,
    root: Option<Box<KdNode>>,
}

impl KdTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<Record>) -> Self {
        let mut tree = KdTree { records, root: None };
        tree.rebuild();
        tree
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[instrument(skip_all)]
    pub fn add(&mut self, record: Record) {
        self.records.push(record);
        self.rebuild();
    }

    /// Removes every record in `category_key`, returning the count removed.
    /// Matches nothing silently (returns 0) rather than erroring, per the
    /// spec's "fails silently when absent" contract.
    #[instrument(skip_all)]
    pub fn delete(&mut self, category_key: NodeId) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.category_key != category_key);
        let removed = before - self.records.len();
        if removed > 0 {
            self.rebuild();
        }
        removed
    }

    /// Updates every record in `category_key` that matches the optional
    /// equality `criteria`, returning the count updated. Rebuilds the tree
    /// only when the update actually touches a point coordinate.
    #[instrument(skip(self, update))]
    pub fn update(&mut self, category_key: NodeId, criteria: Option<Criteria>, update: RecordUpdate) -> usize {
        let mut applied = 0;
        for record in self.records.iter_mut().filter(|r| r.category_key == category_key) {
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
        if applied > 0 && update.touches_point() {
            self.rebuild();
        }
        applied
    }

    /// Distinct category keys currently held, used when a node needs to know
    /// which categories it owns (join transfer, leave redistribution).
    pub fn category_keys(&self) -> Vec<NodeId> {
        let mut keys: Vec<NodeId> = self.records.iter().map(|r| r.category_key).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn records_for_category(&self, category_key: NodeId) -> Vec<Record> {
        self.records.iter().filter(|r| r.category_key == category_key).cloned().collect()
    }

    fn rebuild(&mut self) {
        let indices: Vec<usize> = (0..self.records.len()).collect();
        self.root = Self::build(&self.records, indices, 0);
    }

    fn build(records: &[Record], mut indices: Vec<usize>, depth: usize) -> Option<Box<KdNode>> {
        if indices.is_empty() {
            return None;
        }
        let axis = Axis::from_index(depth);
        indices.sort_by(|&a, &b| {
            records[a]
                .point
                .axis(axis)
                .partial_cmp(&records[b].point.axis(axis))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mid = indices.len() / 2;
        let median_index = indices[mid];
        let right_indices = indices.split_off(mid + 1);
        let mut left_indices = indices;
        left_indices.pop();

        Some(Box::new(KdNode {
            index: median_index,
            left: Self::build(records, left_indices, depth + 1),
            right: Self::build(records, right_indices, depth + 1),
        }))
    }

    /// Observed min/max for `axis` across all stored records, used to
    /// default unbounded axes in a range query.
    fn observed_bounds(&self, axis: Axis) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for record in &self.records {
            let v = record.point.axis(axis);
            min = min.min(v);
            max = max.max(v);
        }
        (min, max)
    }

    #[instrument(skip(self))]
    pub fn range_search(&self, query: &RangeQuery) -> Vec<Record> {
        if self.records.is_empty() {
            return vec![];
        }
        let year_bounds = self.resolve_bounds(Axis::Year, query.year.lower, query.year.upper);
        let rating_bounds = self.resolve_bounds(Axis::Rating, query.rating.lower, query.rating.upper);
        let price_bounds = self.resolve_bounds(Axis::Price, query.price.lower, query.price.upper);

        let mut matches = Vec::new();
        Self::search_recursive(
            &self.root,
            &self.records,
            0,
            &[year_bounds, rating_bounds, price_bounds],
            query.category_key,
            &mut matches,
        );
        matches
    }

    fn resolve_bounds(&self, axis: Axis, lower: Option<f64>, upper: Option<f64>) -> (f64, f64) {
        match (lower, upper) {
            (Some(l), Some(u)) => (l, u),
            _ => self.observed_bounds(axis),
        }
    }

    fn search_recursive(
        node: &Option<Box<KdNode>>,
        records: &[Record],
        depth: usize,
        bounds: &[(f64, f64); 3],
        category_key: dht_types::NodeId,
        out: &mut Vec<Record>,
    ) {
        let Some(node) = node else { return };
        let record = &records[node.index];
        let axis = Axis::from_index(depth);
        let value = record.point.axis(axis);

        if record.category_key == category_key
            && (0..3).all(|i| {
                let axis = Axis::from_index(i);
                let v = record.point.axis(axis);
                bounds[i].0 <= v && v <= bounds[i].1
            })
        {
            out.push(record.clone());
        }

        let (lower, upper) = bounds[axis.index()];
        if value >= lower {
            Self::search_recursive(&node.left, records, depth + 1, bounds, category_key, out);
        }
        if value <= upper {
            Self::search_recursive(&node.right, records, depth + 1, bounds, category_key, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dht_types::NodeId;
    use pretty_assertions::assert_eq;

    fn kenya_record(year: f64, rating: f64, price: f64) -> Record {
        Record::new(Point::new(year, rating, price), "Kenya", "bright, floral")
    }

    #[test]
    fn range_search_filters_by_category_and_bounds() {
        let mut tree = KdTree::new();
        tree.add(kenya_record(2015.0, 90.0, 4.0));
        tree.add(kenya_record(2018.0, 95.0, 6.0));
        tree.add(Record::new(Point::new(2016.0, 91.0, 5.0), "Ethiopia", "berry"));

        let query = RangeQuery {
            category_key: NodeId::from_hash("Kenya"),
            year: dht_types::AxisBounds { lower: Some(2017.0), upper: None },
            ..Default::default()
        };
        let results = tree.range_search(&query);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].point.year, 2018.0);
    }

    #[test]
    fn delete_removes_every_record_in_category() {
        let mut tree = KdTree::new();
        tree.add(kenya_record(2015.0, 90.0, 4.0));
        tree.add(kenya_record(2016.0, 91.0, 4.5));
        tree.add(Record::new(Point::new(2016.0, 91.0, 5.0), "Ethiopia", "berry"));
        assert_eq!(tree.len(), 3);

        let removed = tree.delete(NodeId::from_hash("Kenya"));
        assert_eq!(removed, 2);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.delete(NodeId::from_hash("Kenya")), 0);
    }

    #[test]
    fn update_applies_partial_fields_across_matching_records() {
        let mut tree = KdTree::new();
        tree.add(kenya_record(2015.0, 90.0, 4.0));
        tree.add(kenya_record(2016.0, 91.0, 4.5));

        let applied = tree.update(
            NodeId::from_hash("Kenya"),
            None,
            RecordUpdate { review: Some("revised".into()), ..Default::default() },
        );
        assert_eq!(applied, 2);
        assert!(tree.records().iter().all(|r| r.review == "revised"));
    }

    #[test]
    fn update_with_criteria_touches_only_matching_records() {
        let mut tree = KdTree::new();
        tree.add(kenya_record(2015.0, 90.0, 4.0));
        tree.add(kenya_record(2016.0, 91.0, 4.5));

        let criteria = Criteria { year: Some(2016.0), ..Default::default() };
        let applied = tree.update(NodeId::from_hash("Kenya"), Some(criteria), RecordUpdate { review: Some("revised".into()), ..Default::default() });
        assert_eq!(applied, 1);
        assert_eq!(tree.records().iter().filter(|r| r.review == "revised").count(), 1);
    }

    #[test]
    fn update_unmatched_criteria_returns_zero() {
        let mut tree = KdTree::new();
        tree.add(kenya_record(2015.0, 90.0, 4.0));

        let criteria = Criteria { year: Some(1999.0), ..Default::default() };
        let applied = tree.update(NodeId::from_hash("Kenya"), Some(criteria), RecordUpdate { review: Some("revised".into()), ..Default::default() });
        assert_eq!(applied, 0);
        assert_eq!(tree.records()[0].review, "bright, floral");
    }

    #[test]
    fn category_keys_and_records_for_category_group_by_country() {
        let mut tree = KdTree::new();
        tree.add(kenya_record(2015.0, 90.0, 4.0));
        tree.add(kenya_record(2016.0, 91.0, 4.5));
        tree.add(Record::new(Point::new(2016.0, 91.0, 5.0), "Ethiopia", "berry"));

        let kenya_key = NodeId::from_hash("Kenya");
        assert_eq!(tree.category_keys().len(), 2);
        assert_eq!(tree.records_for_category(kenya_key).len(), 2);
    }
}
