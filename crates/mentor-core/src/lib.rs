pub mod corpus;
pub mod embedder;
pub mod error;
pub mod execution;
#[cfg(feature = "embeddings")]
pub mod fastembed_embedder;
pub mod hash_embedder;
pub mod inference;
pub mod memory;
pub mod problem;
pub mod retriever;
pub mod topic;

pub use corpus::{chunk_text, CorpusDocument, DocMetadata, DocSource};
pub use embedder::{Embedder, SentenceModel};
pub use error::{MentorError, MentorResult};
pub use execution::{Capabilities, CodeRunner, ExecutionResult};
#[cfg(feature = "embeddings")]
pub use fastembed_embedder::FastEmbedder;
pub use hash_embedder::HashEmbedder;
pub use inference::{ChatInference, ChatSettings, Inference, Offline};
pub use memory::{Feedback, MemoryEntry};
pub use problem::{ProblemRecord, SolutionArtifact, Tier};
pub use retriever::Retriever;
pub use topic::Topic;
