use md5::{Digest, Md5};
use ndarray::Array1;
use std::collections::{HashMap, HashSet};

use crate::tfidf::cosine_similarity;

pub const DEFAULT_BANDS: usize = 4;
pub const DEFAULT_ROWS: usize = 5;

/// Banded LSH over TF-IDF vectors: each vector is sliced into `num_bands`
/// bands of `num_rows` rows, each band hashed with MD5, and documents
/// sharing a band hash in any table become candidate similar pairs.
pub struct Lsh {
    num_bands: usize,
    num_rows: usize,
    hash_tables: Vec<HashMap<String, Vec<usize>>>,
    documents: Vec<Array1<f64>>,
}

impl Lsh {
    pub fn new(num_bands: usize, num_rows: usize) -> Self {
        Lsh {
            num_bands,
            num_rows,
            hash_tables: (0..num_bands).map(|_| HashMap::new()).collect(),
            documents: Vec::new(),
        }
    }

    fn hash_bands(&self, vector: &Array1<f64>) -> Vec<String> {
        (0..self.num_bands)
            .map(|band| {
                let start = band * self.num_rows;
                let end = (start + self.num_rows).min(vector.len());
                let mut hasher = Md5::new();
                if start < vector.len() {
                    for value in &vector.as_slice().unwrap()[start..end] {
                        hasher.update(value.to_le_bytes());
                    }
                }
                format!("{:x}", hasher.finalize())
            })
            .collect()
    }

    pub fn add_document(&mut self, vector: Array1<f64>) {
        let band_hashes = self.hash_bands(&vector);
        let doc_index = self.documents.len();
        self.documents.push(vector);
        for (table, hash) in self.hash_tables.iter_mut().zip(band_hashes) {
            table.entry(hash).or_default().push(doc_index);
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns up to `top_n` pairs of document indices, ranked by cosine
    /// similarity, restricted to pairs that shared at least one LSH bucket.
    pub fn find_similar_pairs(&self, top_n: usize) -> Vec<(usize, usize, f64)> {
        let mut seen_pairs: HashSet<(usize, usize)> = HashSet::new();
        for table in &self.hash_tables {
            for bucket in table.values() {
                if bucket.len() < 2 {
                    continue;
                }
                for i in 0..bucket.len() {
                    for j in (i + 1)..bucket.len() {
                        let pair = (bucket[i].min(bucket[j]), bucket[i].max(bucket[j]));
                        seen_pairs.insert(pair);
                    }
                }
            }
        }

        let mut similarities: Vec<(usize, usize, f64)> = seen_pairs
            .into_iter()
            .map(|(a, b)| (a, b, cosine_similarity(&self.documents[a], &self.documents[b])))
            .collect();
        similarities.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        similarities.truncate(top_n);
        similarities
    }

    /// Collapses a ranked pair list into a list of unique document indices,
    /// preserving the descending similarity order the pairs were found in.
    pub fn similar_doc_indices(pairs: &[(usize, usize, f64)], top_n: usize) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for &(a, b, _) in pairs {
            for idx in [a, b] {
                if seen.insert(idx) {
                    ordered.push(idx);
                }
            }
            if ordered.len() >= top_n {
                break;
            }
        }
        ordered.truncate(top_n);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tfidf::TfidfVectorizer;
    use pretty_assertions::assert_eq;

    #[test]
    fn similar_documents_cluster_into_shared_buckets() {
        let docs = vec![
            "bright floral citrus notes with a clean finish".to_string(),
            "floral citrus notes and a bright clean finish".to_string(),
            "heavy earthy mushroom body with low acidity".to_string(),
        ];
        let (_, vectors) = TfidfVectorizer::fit_transform(&docs);
        let mut lsh = Lsh::new(DEFAULT_BANDS, DEFAULT_ROWS);
        for v in vectors {
            lsh.add_document(v);
        }
        let pairs = lsh.find_similar_pairs(5);
        assert!(pairs.iter().any(|&(a, b, _)| (a, b) == (0, 1)));
    }

    #[test]
    fn similar_doc_indices_deduplicates_in_rank_order() {
        let pairs = vec![(0, 1, 0.9), (1, 2, 0.8), (0, 2, 0.5)];
        let indices = Lsh::similar_doc_indices(&pairs, 3);
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
