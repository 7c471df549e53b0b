use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MentorResult;

/// Text-to-vector capability. The same instance must be used for indexing
/// and querying.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> MentorResult<Vec<f32>>;
    fn embed_batch(&self, texts: &[&str]) -> MentorResult<Vec<Vec<f32>>>;
    fn dimensions(&self) -> usize;

    /// Embed a search query. Models trained with a query instruction
    /// override this; documents always go through `embed_batch`.
    fn embed_query(&self, text: &str) -> MentorResult<Vec<f32>> {
        self.embed(text)
    }
}

/// Sentence models the fastembed backend can load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentenceModel {
    #[default]
    #[serde(rename = "all-minilm-l6-v2")]
    AllMinilmL6V2,
    #[serde(rename = "bge-small-en-v1.5")]
    BgeSmallEnV15,
    #[serde(rename = "bge-base-en-v1.5")]
    BgeBaseEnV15,
}

impl SentenceModel {
    pub const ALL: [SentenceModel; 3] = [
        SentenceModel::AllMinilmL6V2,
        SentenceModel::BgeSmallEnV15,
        SentenceModel::BgeBaseEnV15,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::AllMinilmL6V2 => "all-minilm-l6-v2",
            Self::BgeSmallEnV15 => "bge-small-en-v1.5",
            Self::BgeBaseEnV15 => "bge-base-en-v1.5",
        }
    }

    pub fn dimensions(self) -> usize {
        match self {
            Self::AllMinilmL6V2 | Self::BgeSmallEnV15 => 384,
            Self::BgeBaseEnV15 => 768,
        }
    }

    /// Instruction the BGE models expect in front of retrieval queries.
    pub fn query_prefix(self) -> Option<&'static str> {
        match self {
            Self::AllMinilmL6V2 => None,
            Self::BgeSmallEnV15 | Self::BgeBaseEnV15 => {
                Some("Represent this sentence for searching relevant passages: ")
            }
        }
    }
}

impl fmt::Display for SentenceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SentenceModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| format!("unknown sentence model: {s}"))
    }
}
