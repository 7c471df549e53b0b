use crate::error::MentorResult;

/// Nearest-neighbor lookup over the corpus.
pub trait Retriever: Send + Sync {
    /// Up to `k + 2` document contents ordered by similarity, most similar
    /// first. No similarity threshold is applied.
    fn retrieve(&self, query: &str, k: usize) -> MentorResult<Vec<String>>;
}
