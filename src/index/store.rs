//! SQLite persistence for the composite index.
//!
//! The index lives in `<persist_directory>/index.sqlite`. Saving writes a
//! complete copy to a staging file in the same directory and renames it over
//! the index file, so readers see either the old index or the new one.

use super::{IndexEntry, VectorIndex};
use crate::chunking::{Chunk, Metadata};
use crate::error::{AifaqError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// File name of the persisted index inside the persist directory.
pub const INDEX_FILE: &str = "index.sqlite";

const FORMAT_VERSION: &str = "1";

const SCHEMA: &str = r#"
CREATE TABLE meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE entries (
    position INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    text TEXT NOT NULL,
    metadata TEXT NOT NULL,
    char_offset INTEGER NOT NULL,
    ordinal INTEGER NOT NULL,
    document_index INTEGER NOT NULL,
    embedding BLOB NOT NULL
);
"#;

/// Path of the index file inside `dir`.
pub fn index_file(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE)
}

/// Serialize embedding to bytes.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize embedding from bytes.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
            f32::from_le_bytes(arr)
        })
        .collect()
}

/// Unique staging path for a new index file inside `dir`.
fn staging_file(dir: &Path) -> PathBuf {
    dir.join(format!(".{}.{}", INDEX_FILE, uuid::Uuid::new_v4()))
}

fn write_index(index: &VectorIndex, path: &Path) -> Result<()> {
    let mut conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;

    let tx = conn.transaction()?;
    {
        let mut meta = tx.prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")?;
        meta.execute(params!["format_version", FORMAT_VERSION])?;
        meta.execute(params!["embedding_model", index.embedding_model()])?;
        meta.execute(params!["dimensions", index.dimensions().to_string()])?;
        meta.execute(params!["created_at", index.created_at().to_rfc3339()])?;

        let mut insert = tx.prepare(
            r#"
            INSERT INTO entries
            (position, id, text, metadata, char_offset, ordinal, document_index, embedding)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;
        for (position, entry) in index.entries().iter().enumerate() {
            insert.execute(params![
                position as i64,
                entry.id,
                entry.chunk.text,
                serde_json::to_string(&entry.chunk.metadata)?,
                entry.chunk.offset as i64,
                entry.chunk.ordinal as i64,
                entry.chunk.document_index as i64,
                embedding_to_bytes(&entry.embedding),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Persist `index` to `dir`, replacing any previous index there.
#[instrument(skip(index), fields(entries = index.len()))]
pub fn save_index(index: &VectorIndex, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let staging = staging_file(dir);
    let written = write_index(index, &staging)
        .and_then(|()| std::fs::rename(&staging, index_file(dir)).map_err(AifaqError::from));
    if let Err(e) = written {
        if let Err(cleanup) = std::fs::remove_file(&staging) {
            debug!("Could not remove staging file {:?}: {}", staging, cleanup);
        }
        return Err(e);
    }

    info!("Saved index with {} entries to {:?}", index.len(), dir);
    Ok(())
}

fn read_meta(conn: &Connection, key: &str) -> Result<String> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?
        .ok_or_else(|| AifaqError::Index(format!("Index metadata is missing '{}'", key)))
}

/// Load the index stored in `dir`.
///
/// Fails with [`AifaqError::IndexNotFound`] when nothing was ever saved there,
/// and with [`AifaqError::EmbeddingModelMismatch`] when `expected_model` is
/// given and differs from the model the index was built with.
#[instrument]
pub fn load_index(dir: &Path, expected_model: Option<&str>) -> Result<VectorIndex> {
    let path = index_file(dir);
    if !path.is_file() {
        return Err(AifaqError::IndexNotFound(dir.to_path_buf()));
    }

    let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let version = read_meta(&conn, "format_version")?;
    if version != FORMAT_VERSION {
        return Err(AifaqError::Index(format!(
            "Unsupported index format version {}",
            version
        )));
    }

    let embedding_model = read_meta(&conn, "embedding_model")?;
    if let Some(expected) = expected_model {
        if expected != embedding_model {
            return Err(AifaqError::EmbeddingModelMismatch {
                index: embedding_model,
                configured: expected.to_string(),
            });
        }
    }

    let dimensions: usize = read_meta(&conn, "dimensions")?
        .parse()
        .map_err(|e| AifaqError::Index(format!("Invalid dimensions: {}", e)))?;
    let created_at = DateTime::parse_from_rfc3339(&read_meta(&conn, "created_at")?)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    let mut stmt = conn.prepare(
        r#"
        SELECT id, text, metadata, char_offset, ordinal, document_index, embedding
        FROM entries
        ORDER BY position
        "#,
    )?;

    let rows = stmt.query_map([], |row| {
        let metadata_json: String = row.get(2)?;
        let embedding_bytes: Vec<u8> = row.get(6)?;
        let offset: i64 = row.get(3)?;
        let ordinal: i64 = row.get(4)?;
        let document_index: i64 = row.get(5)?;
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            metadata_json,
            offset as usize,
            ordinal as usize,
            document_index as usize,
            bytes_to_embedding(&embedding_bytes),
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, text, metadata_json, offset, ordinal, document_index, embedding) = row?;
        let metadata: Metadata = serde_json::from_str(&metadata_json)?;
        if embedding.len() != dimensions {
            return Err(AifaqError::Index(format!(
                "Entry {} has {} dimensions, index declares {}",
                id,
                embedding.len(),
                dimensions
            )));
        }
        entries.push(IndexEntry {
            id,
            chunk: Chunk {
                text,
                metadata,
                offset,
                ordinal,
                document_index,
            },
            embedding,
        });
    }

    debug!("Loaded {} entries from {:?}", entries.len(), path);
    Ok(VectorIndex::from_parts(embedding_model, dimensions, created_at, entries))
}
