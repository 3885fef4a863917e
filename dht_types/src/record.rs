use crate::identifier::NodeId;
use serde::{Deserialize, Serialize};

/// The three KD-tree axes, in the order they appear in [`Point`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Year,
    Rating,
    Price,
}

impl Axis {
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        match self {
            Axis::Year => 0,
            Axis::Rating => 1,
            Axis::Price => 2,
        }
    }

    pub fn from_index(index: usize) -> Axis {
        match index % Self::COUNT {
            0 => Axis::Year,
            1 => Axis::Rating,
            _ => Axis::Price,
        }
    }
}

/// A coffee review's coordinates in the KD-tree: review year, score out of
/// 100, and price per unit. Stored as `f64` so arithmetic (midpoints,
/// distances) never loses precision regardless of the source column types.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub year: f64,
    pub rating: f64,
    pub price: f64,
}

impl Point {
    pub fn new(year: f64, rating: f64, price: f64) -> Self {
        Point { year, rating, price }
    }

    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Year => self.year,
            Axis::Rating => self.rating,
            Axis::Price => self.price,
        }
    }

    pub fn set_axis(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::Year => self.year = value,
            Axis::Rating => self.rating = value,
            Axis::Price => self.price = value,
        }
    }

    pub fn squared_distance(&self, other: &Point) -> f64 {
        let dy = self.year - other.year;
        let dr = self.rating - other.rating;
        let dp = self.price - other.price;
        dy * dy + dr * dr + dp * dp
    }
}

/// The unit of storage replicated across the ring: one coffee review. Its
/// identity is `{category_key, country}` — there is no separate per-record
/// key, matching the Python original where every operation addresses
/// records by `hash_key(country)` alone. Many records share a category_key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub point: Point,
    pub category_key: NodeId,
    pub country: String,
    pub review: String,
}

impl Record {
    pub fn new(point: Point, country: impl Into<String>, review: impl Into<String>) -> Self {
        let country = country.into();
        let category_key = NodeId::from_hash(&country);
        Record { point, category_key, country, review: review.into() }
    }
}

/// Inclusive bounds for a single KD-tree axis. `None` leaves that axis
/// unconstrained, defaulting to the observed min/max at query time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisBounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// A range query restricted to one category (country) with optional
/// per-axis bounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub category_key: NodeId,
    pub year: AxisBounds,
    pub rating: AxisBounds,
    pub price: AxisBounds,
}

/// An optional equality filter over any subset of a record's point axes,
/// used by `update` to narrow which records within a category are touched.
/// Omitted axes impose no constraint; an empty `Criteria` (or `None`)
/// matches every record in the category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    pub year: Option<f64>,
    pub rating: Option<f64>,
    pub price: Option<f64>,
}

impl Criteria {
    pub fn matches(&self, point: &Point) -> bool {
        self.year.map_or(true, |v| v == point.year) && self.rating.map_or(true, |v| v == point.rating) && self.price.map_or(true, |v| v == point.price)
    }
}

/// Per-attribute overrides applied on top of (or instead of) a full `point`
/// replacement in a `RecordUpdate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisOverrides {
    pub year: Option<f64>,
    pub rating: Option<f64>,
    pub price: Option<f64>,
}

impl AxisOverrides {
    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.rating.is_none() && self.price.is_none()
    }

    pub fn apply(&self, point: &mut Point) {
        if let Some(v) = self.year {
            point.year = v;
        }
        if let Some(v) = self.rating {
            point.rating = v;
        }
        if let Some(v) = self.price {
            point.price = v;
        }
    }
}

/// The mutation half of `update`: any field left at its default leaves the
/// corresponding record state unchanged. `point` is a full coordinate
/// replacement; `attributes` overrides individual axes on top of whatever
/// `point` left in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub point: Option<Point>,
    pub attributes: AxisOverrides,
    pub review: Option<String>,
}

impl RecordUpdate {
    /// Whether this update touches the KD-tree coordinate, meaning the tree
    /// must be rebuilt after applying it.
    pub fn touches_point(&self) -> bool {
        self.point.is_some() || !self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_category_key_is_derived_from_country() {
        let r = Record::new(Point::new(2015.0, 92.0, 4.5), "Kenya", "bright and floral");
        assert_eq!(r.category_key, NodeId::from_hash("Kenya"));
    }

    #[test]
    fn axis_accessors_round_trip() {
        let mut p = Point::new(2015.0, 92.0, 4.5);
        p.set_axis(Axis::Price, 5.0);
        assert_eq!(p.axis(Axis::Price), 5.0);
    }

    #[test]
    fn criteria_matches_only_constrained_axes() {
        let point = Point::new(2015.0, 92.0, 4.5);
        let criteria = Criteria { rating: Some(92.0), ..Default::default() };
        assert!(criteria.matches(&point));
        let mismatched = Criteria { rating: Some(10.0), ..Default::default() };
        assert!(!mismatched.matches(&point));
    }

    #[test]
    fn axis_overrides_apply_only_set_fields() {
        let mut point = Point::new(2015.0, 92.0, 4.5);
        let overrides = AxisOverrides { price: Some(6.0), ..Default::default() };
        overrides.apply(&mut point);
        assert_eq!(point.price, 6.0);
        assert_eq!(point.year, 2015.0);
    }
}
