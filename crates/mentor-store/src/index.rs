//! Vector index over the knowledge base and the memory log.
//!
//! The index is derived data. [`CorpusIndex::initialize`] deletes whatever
//! is on disk and rebuilds it from the knowledge-base file plus the full
//! memory log, so it always matches the current log.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};
use zerocopy::IntoBytes;

use mentor_core::{
    chunk_text, CorpusDocument, DocMetadata, DocSource, Embedder, MentorError, MentorResult,
    Retriever,
};

use crate::memory_log::MemoryLog;
use crate::schema::{get_meta, init_index, register_vec_extension, set_meta};

const INDEX_FILE: &str = "index.db";
const EMBED_BATCH: usize = 32;

/// Where the corpus comes from and how it is chunked.
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub index_dir: PathBuf,
    pub knowledge_base: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl IndexSettings {
    pub fn new(index_dir: impl Into<PathBuf>, knowledge_base: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            knowledge_base: knowledge_base.into(),
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub total_documents: usize,
    pub textbook_documents: usize,
    pub memory_documents: usize,
    pub dimensions: usize,
    pub built_at: Option<String>,
}

pub struct CorpusIndex {
    conn: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
}

impl CorpusIndex {
    /// Rebuild the on-disk index from scratch and return a handle to it.
    pub fn initialize(
        settings: &IndexSettings,
        log: &MemoryLog,
        embedder: Arc<dyn Embedder>,
    ) -> MentorResult<Self> {
        std::fs::create_dir_all(&settings.index_dir)?;
        let db_path = settings.index_dir.join(INDEX_FILE);
        remove_index_files(&db_path)?;

        let index = Self::open_at(&db_path, embedder)?;
        let documents = gather_documents(settings, log);
        let indexed = index.index_documents(&documents)?;
        info!(
            documents = indexed,
            dir = %settings.index_dir.display(),
            "retrieval index rebuilt"
        );
        Ok(index)
    }

    pub fn in_memory(embedder: Arc<dyn Embedder>) -> MentorResult<Self> {
        register_vec_extension();
        let conn = Connection::open_in_memory()
            .map_err(|e| MentorError::Database(format!("cannot open in-memory db: {e}")))?;
        init_index(&conn, embedder.dimensions())?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    fn open_at(db_path: &Path, embedder: Arc<dyn Embedder>) -> MentorResult<Self> {
        register_vec_extension();
        let conn = Connection::open(db_path)
            .map_err(|e| MentorError::Database(format!("cannot open index: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| MentorError::Database(e.to_string()))?;
        init_index(&conn, embedder.dimensions())?;

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    fn conn(&self) -> MentorResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| MentorError::Database("index connection lock poisoned".into()))
    }

    /// Embed and insert documents. Returns how many were indexed.
    pub fn index_documents(&self, documents: &[CorpusDocument]) -> MentorResult<usize> {
        let dims = self.embedder.dimensions();
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| MentorError::Database(e.to_string()))?;

        for batch in documents.chunks(EMBED_BATCH) {
            let texts: Vec<&str> = batch.iter().map(|d| d.content.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts)?;
            if embeddings.len() != batch.len() {
                return Err(MentorError::Embedding(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            for (doc, embedding) in batch.iter().zip(embeddings) {
                if embedding.len() != dims {
                    return Err(MentorError::Embedding(format!(
                        "embedding has {} dimensions, index expects {dims}",
                        embedding.len()
                    )));
                }
                tx.execute(
                    "INSERT INTO documents (content, source, kind, feedback)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        doc.content,
                        doc.metadata.source.to_string(),
                        doc.metadata.kind,
                        doc.metadata.feedback.map(|f| f.to_string()),
                    ],
                )
                .map_err(|e| MentorError::Database(e.to_string()))?;
                let id = tx.last_insert_rowid();
                tx.execute(
                    "INSERT INTO vec_documents (document_id, embedding) VALUES (?1, ?2)",
                    params![id, embedding.as_slice().as_bytes()],
                )
                .map_err(|e| MentorError::Database(e.to_string()))?;
            }
        }

        set_meta(&tx, "built_at", &Utc::now().to_rfc3339())?;
        tx.commit()
            .map_err(|e| MentorError::Database(e.to_string()))?;
        Ok(documents.len())
    }

    /// Contents of the `k + 2` nearest documents, most similar first.
    pub fn query(&self, text: &str, k: usize) -> MentorResult<Vec<String>> {
        Ok(self
            .query_scored(text, k + 2)?
            .into_iter()
            .map(|(doc, _)| doc.content)
            .collect())
    }

    /// The `limit` nearest documents with their cosine distance.
    pub fn query_scored(
        &self,
        text: &str,
        limit: usize,
    ) -> MentorResult<Vec<(CorpusDocument, f32)>> {
        if text.trim().is_empty() || limit == 0 || self.count()? == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed_query(text)?;

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "WITH knn AS (
                     SELECT document_id, distance FROM vec_documents
                     WHERE embedding MATCH ?1 AND k = ?2
                 )
                 SELECT d.content, d.source, d.kind, d.feedback, knn.distance
                 FROM knn JOIN documents d ON d.id = knn.document_id
                 ORDER BY knn.distance",
            )
            .map_err(|e| MentorError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![embedding.as_slice().as_bytes(), limit as i64],
                row_to_scored,
            )
            .map_err(|e| MentorError::Database(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| MentorError::Database(e.to_string()))?);
        }
        debug!(hits = results.len(), limit, "corpus query");
        Ok(results)
    }

    pub fn count(&self) -> MentorResult<usize> {
        self.conn()?
            .query_row("SELECT COUNT(*) FROM documents", [], |row| {
                row.get::<_, usize>(0)
            })
            .map_err(|e| MentorError::Database(e.to_string()))
    }

    pub fn stats(&self) -> MentorResult<IndexStats> {
        let conn = self.conn()?;
        let count_source = |source: DocSource| -> MentorResult<usize> {
            conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE source = ?1",
                params![source.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| MentorError::Database(e.to_string()))
        };
        let textbook_documents = count_source(DocSource::Textbook)?;
        let memory_documents = count_source(DocSource::Memory)?;

        Ok(IndexStats {
            total_documents: textbook_documents + memory_documents,
            textbook_documents,
            memory_documents,
            dimensions: self.embedder.dimensions(),
            built_at: get_meta(&conn, "built_at")?,
        })
    }
}

impl Retriever for CorpusIndex {
    fn retrieve(&self, query: &str, k: usize) -> MentorResult<Vec<String>> {
        self.query(query, k)
    }
}

fn row_to_scored(row: &rusqlite::Row) -> rusqlite::Result<(CorpusDocument, f32)> {
    let source_str: String = row.get(1)?;
    let feedback_str: Option<String> = row.get(3)?;
    let doc = CorpusDocument {
        content: row.get(0)?,
        metadata: DocMetadata {
            source: source_str.parse().unwrap_or(DocSource::Textbook),
            kind: row.get(2)?,
            feedback: feedback_str.and_then(|f| f.parse().ok()),
        },
    };
    Ok((doc, row.get::<_, f64>(4)? as f32))
}

/// Knowledge-base chunks followed by one synthetic document per memory entry.
pub fn gather_documents(settings: &IndexSettings, log: &MemoryLog) -> Vec<CorpusDocument> {
    let mut documents = Vec::new();

    match std::fs::read_to_string(&settings.knowledge_base) {
        Ok(text) => {
            documents.extend(
                chunk_text(&text, settings.chunk_size, settings.chunk_overlap)
                    .into_iter()
                    .map(CorpusDocument::rule),
            );
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %settings.knowledge_base.display(), "no knowledge base file");
        }
        Err(e) => {
            warn!(path = %settings.knowledge_base.display(), "knowledge base unreadable: {e}");
        }
    }

    documents.extend(log.load().iter().map(CorpusDocument::from_memory));
    documents
}

fn remove_index_files(db_path: &Path) -> MentorResult<()> {
    for suffix in ["", "-wal", "-shm"] {
        let mut name = db_path.as_os_str().to_owned();
        name.push(suffix);
        match std::fs::remove_file(PathBuf::from(name)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(MentorError::Io(e)),
        }
    }
    Ok(())
}
