pub mod embeddings;
pub mod similarity;

pub use embeddings::{parse_embedding, EmbeddingLookup};
pub use similarity::{cosine_similarity, max_similarity};
