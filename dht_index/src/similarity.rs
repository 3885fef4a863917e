use crate::lsh::{Lsh, DEFAULT_BANDS, DEFAULT_ROWS};
use crate::tfidf::TfidfVectorizer;
use dht_types::Record;

/// Ties the TF-IDF vectorizer and LSH bucket index to a node's current set
/// of review texts, rebuilt whenever the underlying record set changes -
/// same rebuild-on-mutation posture as the KD-tree index.
pub struct SimilarityIndex {
    lsh: Lsh,
}

impl SimilarityIndex {
    pub fn build(records: &[Record]) -> Self {
        let texts: Vec<String> = records.iter().map(|r| r.review.clone()).collect();
        let (_, vectors) = TfidfVectorizer::fit_transform(&texts);
        let mut lsh = Lsh::new(DEFAULT_BANDS, DEFAULT_ROWS);
        for vector in vectors {
            lsh.add_document(vector);
        }
        SimilarityIndex { lsh }
    }

    /// Returns, in descending similarity order, the indices (into the slice
    /// `build` was called with) of up to `top_n` reviews judged similar to
    /// each other via LSH candidate pairs.
    pub fn top_similar(&self, top_n: usize) -> Vec<usize> {
        if self.lsh.is_empty() || top_n == 0 {
            return vec![];
        }
        let pairs = self.lsh.find_similar_pairs(top_n);
        Lsh::similar_doc_indices(&pairs, top_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dht_types::Point;
    use pretty_assertions::assert_eq;

    #[test]
    fn top_similar_returns_known_indices() {
        let records = vec![
            Record::new(Point::new(2015.0, 90.0, 4.0), "Kenya", "bright floral citrus notes"),
            Record::new(Point::new(2016.0, 91.0, 4.5), "Kenya", "floral citrus and bright acidity"),
            Record::new(Point::new(2017.0, 80.0, 3.0), "Brazil", "heavy earthy mushroom body"),
        ];
        let index = SimilarityIndex::build(&records);
        let top = index.top_similar(2);
        assert!(top.iter().all(|&i| i < records.len()));
    }
}
