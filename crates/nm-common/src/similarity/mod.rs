pub mod cache;
pub mod embedding;
pub mod retriever;
pub mod vector;

pub use cache::{CachedSimilarity, SimilarityCache};
pub use embedding::Embedding;
pub use retriever::{RetrievalOutcome, SimilarityRetriever};
pub use vector::{cosine_similarity, similarity_to_score};
