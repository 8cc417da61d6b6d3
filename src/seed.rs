//! Bootstraps `default_library` from a JSON embeddings file the first time the store
//! comes up with nothing on disk, mirroring `_initialize_from_embeddings_file` in the
//! source this was distilled from (spec §9 supplement).

use std::path::Path;

use serde::Deserialize;
use serde_json::Map;
use tracing::info;

use crate::api::{ChunkCreate, DocumentCreate, LibraryCreate};
use crate::store::VectorStore;

const DEFAULT_LIBRARY_ID: &str = "default_library";

#[derive(Debug, Deserialize)]
struct SeedEntry {
    text: String,
    embedding: Vec<f32>,
    #[serde(default)]
    metadata: Map<String, serde_json::Value>,
}

/// Reads `path` as a JSON array of `{text, embedding, metadata}` entries, groups them
/// by `metadata.document_title`, and loads them into `default_library`. Does nothing
/// (and returns `Ok(0)`) if `path` doesn't exist.
pub fn seed_from_file(store: &VectorStore, path: &Path) -> crate::errors::StoreResult<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let bytes = std::fs::read(path)?;
    let entries: Vec<SeedEntry> = serde_json::from_slice(&bytes)?;
    if entries.is_empty() {
        return Ok(0);
    }

    store.create_library(LibraryCreate {
        library_id: DEFAULT_LIBRARY_ID.into(),
        metadata: Map::new(),
    });

    let mut by_title: Vec<(String, Vec<SeedEntry>)> = Vec::new();
    for entry in entries {
        let title = entry
            .metadata
            .get("document_title")
            .and_then(|v| v.as_str())
            .unwrap_or("Untitled")
            .to_string();
        match by_title.iter_mut().find(|(t, _)| *t == title) {
            Some((_, bucket)) => bucket.push(entry),
            None => by_title.push((title, vec![entry])),
        }
    }

    let mut total = 0usize;
    for (title, chunks) in by_title {
        let mut metadata = Map::new();
        metadata.insert(
            "document_title".into(),
            serde_json::Value::String(title.clone()),
        );
        let document = store.add_document(DocumentCreate {
            library_id: DEFAULT_LIBRARY_ID.into(),
            document_title: title.clone(),
            chunks: Vec::new(),
            metadata,
        });
        let Some(document) = document else { continue };

        for chunk in chunks {
            let inserted = store.add_chunk(ChunkCreate {
                library_id: DEFAULT_LIBRARY_ID.into(),
                document_id: Some(document.id.clone()),
                text: chunk.text,
                embedding: chunk.embedding,
                metadata: chunk.metadata,
            })?;
            if inserted.is_some() {
                total += 1;
            }
        }
    }

    store.index_library(DEFAULT_LIBRARY_ID);
    info!(count = total, "seeded default_library from file");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    #[test]
    fn missing_file_seeds_nothing() {
        let store = VectorStore::new(&StoreConfig {
            embedding_dimension: 3,
            ..Default::default()
        });
        let n = seed_from_file(&store, Path::new("/nonexistent/path.json")).unwrap();
        assert_eq!(n, 0);
        assert!(store.get_library(DEFAULT_LIBRARY_ID).is_none());
    }

    #[test]
    fn groups_entries_by_document_title_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("embeddings.json");
        std::fs::write(
            &file,
            r#"[
                {"text": "a", "embedding": [1.0, 0.0, 0.0], "metadata": {"document_title": "Doc1"}},
                {"text": "b", "embedding": [0.0, 1.0, 0.0], "metadata": {"document_title": "Doc1"}},
                {"text": "c", "embedding": [0.0, 0.0, 1.0], "metadata": {"document_title": "Doc2"}}
            ]"#,
        )
        .unwrap();

        let store = VectorStore::new(&StoreConfig {
            embedding_dimension: 3,
            ..Default::default()
        });
        let n = seed_from_file(&store, &file).unwrap();
        assert_eq!(n, 3);
        let library = store.get_library(DEFAULT_LIBRARY_ID).unwrap();
        assert!(library.is_indexed);
        assert_eq!(library.documents.len(), 2);
        assert_eq!(store.get_chunk_count(DEFAULT_LIBRARY_ID), 3);
    }
}
