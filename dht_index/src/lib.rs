pub mod kdtree;
pub mod lsh;
pub mod similarity;
pub mod tfidf;

pub use kdtree::KdTree;
pub use lsh::Lsh;
pub use similarity::SimilarityIndex;
pub use tfidf::TfidfVectorizer;
