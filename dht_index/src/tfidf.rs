use ndarray::Array1;
use std::collections::{HashMap, HashSet};

/// Minimal TF-IDF vectorizer: fits a vocabulary across a corpus of review
/// texts, then emits one dense vector per document in vocabulary order.
pub struct TfidfVectorizer {
    vocabulary: Vec<String>,
    idf: HashMap<String, f64>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

impl TfidfVectorizer {
    /// Builds the vocabulary and inverse-document-frequency table from a
    /// corpus. Vocabulary order is sorted for determinism across runs.
    pub fn fit(documents: &[String]) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for document in documents {
            let seen: HashSet<String> = tokenize(document).into_iter().collect();
            for term in seen {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }
        let n = documents.len().max(1) as f64;
        let idf: HashMap<String, f64> = doc_freq
            .iter()
            .map(|(term, df)| (term.clone(), (n / *df as f64).ln() + 1.0))
            .collect();
        let mut vocabulary: Vec<String> = doc_freq.into_keys().collect();
        vocabulary.sort();
        TfidfVectorizer { vocabulary, idf }
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Vectorizes `text` against the fitted vocabulary: term frequency times
    /// inverse document frequency per vocabulary term, zero for out-of-vocab
    /// terms.
    pub fn transform(&self, text: &str) -> Array1<f64> {
        let tokens = tokenize(text);
        let total = tokens.len().max(1) as f64;
        let mut term_counts: HashMap<String, usize> = HashMap::new();
        for token in &tokens {
            *term_counts.entry(token.clone()).or_insert(0) += 1;
        }
        let mut vector = Array1::zeros(self.vocabulary.len());
        for (i, term) in self.vocabulary.iter().enumerate() {
            if let Some(&count) = term_counts.get(term) {
                let tf = count as f64 / total;
                vector[i] = tf * self.idf.get(term).copied().unwrap_or(0.0);
            }
        }
        vector
    }

    pub fn fit_transform(documents: &[String]) -> (Self, Vec<Array1<f64>>) {
        let vectorizer = Self::fit(documents);
        let vectors = documents.iter().map(|d| vectorizer.transform(d)).collect();
        (vectorizer, vectors)
    }
}

pub fn cosine_similarity(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_documents_have_similarity_one() {
        let docs = vec!["bright floral citrus".to_string(), "dark chocolate earthy".to_string()];
        let (vectorizer, vectors) = TfidfVectorizer::fit_transform(&docs);
        let reencoded = vectorizer.transform(&docs[0]);
        assert!((cosine_similarity(&vectors[0], &reencoded) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unrelated_documents_score_lower_than_similar_ones() {
        let docs = vec![
            "bright floral citrus notes".to_string(),
            "floral citrus and bright acidity".to_string(),
            "heavy earthy mushroom body".to_string(),
        ];
        let (vectorizer, _) = TfidfVectorizer::fit_transform(&docs);
        let a = vectorizer.transform(&docs[0]);
        let b = vectorizer.transform(&docs[1]);
        let c = vectorizer.transform(&docs[2]);
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }
}
