use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::debug;

use crate::embedder::{Embedder, SentenceModel};
use crate::error::{MentorError, MentorResult};

fn backend_model(model: SentenceModel) -> EmbeddingModel {
    match model {
        SentenceModel::AllMinilmL6V2 => EmbeddingModel::AllMiniLML6V2,
        SentenceModel::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
        SentenceModel::BgeBaseEnV15 => EmbeddingModel::BGEBaseENV15,
    }
}

/// Sentence embeddings from a fastembed model, downloaded and loaded on
/// first use.
pub struct FastEmbedder {
    choice: SentenceModel,
    cache_dir: Option<PathBuf>,
    loaded: OnceLock<TextEmbedding>,
    loading: Mutex<()>,
}

impl FastEmbedder {
    pub fn new(choice: SentenceModel) -> Self {
        Self {
            choice,
            cache_dir: None,
            loaded: OnceLock::new(),
            loading: Mutex::new(()),
        }
    }

    /// Store downloaded model files under `dir` instead of fastembed's default.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn choice(&self) -> SentenceModel {
        self.choice
    }

    fn model(&self) -> MentorResult<&TextEmbedding> {
        if let Some(m) = self.loaded.get() {
            return Ok(m);
        }
        let _guard = self
            .loading
            .lock()
            .map_err(|_| MentorError::Embedding("model loading lock poisoned".into()))?;
        if self.loaded.get().is_none() {
            let mut options =
                InitOptions::new(backend_model(self.choice)).with_show_download_progress(true);
            if let Some(dir) = &self.cache_dir {
                options = options.with_cache_dir(dir.clone());
            }
            debug!(model = %self.choice, "loading sentence model");
            let model = TextEmbedding::try_new(options).map_err(|e| {
                MentorError::Embedding(format!("failed to load {}: {e}", self.choice))
            })?;
            let _ = self.loaded.set(model);
        }
        self.loaded
            .get()
            .ok_or_else(|| MentorError::Embedding(format!("{} unavailable", self.choice)))
    }

    fn run(&self, texts: Vec<String>) -> MentorResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        let vectors = self
            .model()?
            .embed(texts, None)
            .map_err(|e| MentorError::Embedding(e.to_string()))?;
        if vectors.len() != expected {
            return Err(MentorError::Embedding(format!(
                "{} returned {} vectors for {expected} texts",
                self.choice,
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    fn single(&self, text: String) -> MentorResult<Vec<f32>> {
        self.run(vec![text])?
            .pop()
            .ok_or_else(|| MentorError::Embedding("empty embedding result".into()))
    }
}

impl Default for FastEmbedder {
    fn default() -> Self {
        Self::new(SentenceModel::default())
    }
}

impl Embedder for FastEmbedder {
    fn embed(&self, text: &str) -> MentorResult<Vec<f32>> {
        self.single(text.to_string())
    }

    fn embed_batch(&self, texts: &[&str]) -> MentorResult<Vec<Vec<f32>>> {
        self.run(texts.iter().map(|t| t.to_string()).collect())
    }

    fn dimensions(&self) -> usize {
        self.choice.dimensions()
    }

    fn embed_query(&self, text: &str) -> MentorResult<Vec<f32>> {
        match self.choice.query_prefix() {
            Some(prefix) => self.single(format!("{prefix}{text}")),
            None => self.single(text.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_follow_the_chosen_model() {
        for choice in SentenceModel::ALL {
            let embedder = FastEmbedder::new(choice).with_cache_dir("/nonexistent");
            assert_eq!(embedder.dimensions(), choice.dimensions());
            assert_eq!(embedder.choice(), choice);
        }
    }

    #[test]
    fn test_empty_batch_skips_model_load() {
        let embedder = FastEmbedder::new(SentenceModel::BgeBaseEnV15).with_cache_dir("/nonexistent");
        assert!(embedder.embed_batch(&[]).unwrap().is_empty());
        assert!(embedder.loaded.get().is_none());
    }
}
