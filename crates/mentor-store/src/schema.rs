use std::sync::Once;

use rusqlite::{params, Connection, OptionalExtension};

use mentor_core::{MentorError, MentorResult};

static VEC_INIT: Once = Once::new();

/// Register sqlite-vec for every connection opened afterwards.
#[allow(clippy::missing_transmute_annotations)]
pub fn register_vec_extension() {
    VEC_INIT.call_once(|| {
        // SAFETY: sqlite3_vec_init has the signature sqlite expects for an
        // auto-extension entry point.
        unsafe {
            rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
                sqlite_vec::sqlite3_vec_init as *const (),
            )));
        }
    });
}

pub fn init_index(conn: &Connection, dimensions: usize) -> MentorResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY,
            content TEXT NOT NULL,
            source TEXT NOT NULL,   -- textbook | memory
            kind TEXT NOT NULL,     -- rule | solved_example
            feedback TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source);

        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )
    .map_err(|e| MentorError::Database(e.to_string()))?;

    let vec_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='vec_documents'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MentorError::Database(e.to_string()))?;

    if !vec_exists {
        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE vec_documents USING vec0(
                document_id INTEGER PRIMARY KEY,
                embedding float[{dimensions}] distance_metric=cosine
            )"
        ))
        .map_err(|e| MentorError::Database(e.to_string()))?;

        set_meta(conn, "dimensions", &dimensions.to_string())?;
    }

    Ok(())
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> MentorResult<()> {
    conn.execute(
        "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .map_err(|e| MentorError::Database(e.to_string()))?;
    Ok(())
}

pub fn get_meta(conn: &Connection, key: &str) -> MentorResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM index_meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| MentorError::Database(e.to_string()))
}
