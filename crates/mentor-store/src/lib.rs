pub mod index;
pub mod memory_log;
pub mod schema;

pub use index::{CorpusIndex, IndexSettings, IndexStats};
pub use memory_log::MemoryLog;
