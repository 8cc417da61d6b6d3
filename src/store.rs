use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::ReentrantMutex;
use tracing::{debug, info, warn};

use crate::api::{
    ChunkCreate, ChunkUpdate, DocumentCreate, DocumentUpdate, LibraryCreate, LibraryUpdate,
    SearchQuery,
};
use crate::config::StoreConfig;
use crate::errors::{validate_embedding, StoreResult};
use crate::index::{build_index, IndexKind, LshParams, VectorIndex};
use crate::model::{Chunk, Document, FixedIdSource, IdSource, Library, SystemIdSource};

/// The serializable slice of store state a snapshot needs (spec §4.5/§6): libraries
/// (each carrying its own index class + parameters) and the store's dimension.
/// Index structures themselves are never serialized.
pub(crate) struct StoreInner {
    pub libraries: HashMap<String, Library>,
    indices: HashMap<String, Box<dyn VectorIndex>>,
    pub embedding_dimension: usize,
    /// Index class used for newly created libraries that don't specify one; not
    /// authoritative for any library that already exists (each tracks its own in
    /// `Library::index_kind`, see `switch_index_algorithm`).
    pub default_index_kind: IndexKind,
    pub default_lsh_params: LshParams,
    pub dirty: bool,
    pub last_save: DateTime<Utc>,
    id_source: Arc<dyn IdSource>,
}

impl StoreInner {
    fn new_index_for(&self, library: &Library) -> Box<dyn VectorIndex> {
        build_index(library.index_kind, self.embedding_dimension, library.lsh_params)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// Thread-safe hierarchical store: `library_id -> Library` plus one index per library
/// (spec §4.4). All public operations acquire a single reentrant lock for their
/// duration; composite operations (e.g. `add_document` inserting its initial chunks)
/// re-enter it by calling the same public methods recursively.
pub struct VectorStore {
    inner: ReentrantMutex<RefCell<StoreInner>>,
}

impl VectorStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_id_source(config, Arc::new(SystemIdSource))
    }

    /// Builds a store with an injectable id source, for reproducible tests (spec §9).
    pub fn with_id_source(config: &StoreConfig, id_source: Arc<dyn IdSource>) -> Self {
        let inner = StoreInner {
            libraries: HashMap::new(),
            indices: HashMap::new(),
            embedding_dimension: config.embedding_dimension,
            default_index_kind: config.index_class,
            default_lsh_params: config.lsh_params,
            dirty: false,
            last_save: Utc::now(),
            id_source,
        };
        Self {
            inner: ReentrantMutex::new(RefCell::new(inner)),
        }
    }

    /// Test-only constructor with a fixed id sequence.
    #[cfg(test)]
    pub fn with_fixed_ids(config: &StoreConfig, ids: impl IntoIterator<Item = &'static str>) -> Self {
        Self::with_id_source(config, Arc::new(FixedIdSource::new(ids)))
    }

    pub fn embedding_dimension(&self) -> usize {
        self.inner.lock().borrow().embedding_dimension
    }

    fn next_id(&self) -> String {
        self.inner.lock().borrow().id_source.next_id()
    }

    /// Copies out the state a snapshot needs without holding the lock during file I/O
    /// (spec §9, "Snapshot under lock").
    pub(crate) fn snapshot_view(&self) -> crate::snapshot::SnapshotData {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        crate::snapshot::SnapshotData {
            libraries: inner.libraries.clone(),
            embedding_dimension: inner.embedding_dimension,
            default_index_kind: inner.default_index_kind,
            default_lsh_params: inner.default_lsh_params,
        }
    }

    pub(crate) fn is_dirty_and_due(&self, save_interval: chrono::Duration) -> bool {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner.dirty && Utc::now() - inner.last_save >= save_interval
    }

    pub(crate) fn mark_saved(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        inner.dirty = false;
        inner.last_save = Utc::now();
    }

    /// Restores from a loaded snapshot and rebuilds every library's index from its
    /// own restored class + parameters (spec §4.5: "Indexes are NOT serialized").
    /// Each library's index class travels with the library itself, so a store with
    /// libraries on different algorithms round-trips them independently.
    pub fn restore(&self, data: crate::snapshot::SnapshotData) {
        {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            inner.embedding_dimension = data.embedding_dimension;
            inner.default_index_kind = data.default_index_kind;
            inner.default_lsh_params = data.default_lsh_params;
            inner.libraries = data.libraries;
            inner.indices.clear();
            let ids: Vec<String> = inner.libraries.keys().cloned().collect();
            for id in ids {
                let library = &inner.libraries[&id];
                let fresh = inner.new_index_for(library);
                inner.indices.insert(id, fresh);
            }
        }
        let ids: Vec<String> = {
            let guard = self.inner.lock();
            guard.borrow().libraries.keys().cloned().collect()
        };
        for id in ids {
            self.index_library(&id);
        }
        info!(count = self.inner.lock().borrow().libraries.len(), "restored store from snapshot");
    }

    // --- Library management ---

    pub fn create_library(&self, req: LibraryCreate) -> Library {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let library = Library::new(
            req.library_id.clone(),
            req.metadata,
            inner.default_index_kind,
            inner.default_lsh_params,
        );
        let fresh = inner.new_index_for(&library);
        inner.indices.insert(req.library_id.clone(), fresh);
        inner.libraries.insert(req.library_id.clone(), library.clone());
        inner.mark_dirty();
        info!(library_id = %req.library_id, "created library");
        library
    }

    pub fn get_library(&self, library_id: &str) -> Option<Library> {
        let guard = self.inner.lock();
        guard.borrow().libraries.get(library_id).cloned()
    }

    pub fn update_library(&self, req: LibraryUpdate) -> Option<Library> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let library = inner.libraries.get_mut(&req.library_id)?;
        if let Some(metadata) = req.metadata {
            library.metadata.extend(metadata);
        }
        library.touch();
        let result = library.clone();
        inner.mark_dirty();
        debug!(library_id = %req.library_id, "updated library");
        Some(result)
    }

    pub fn delete_library(&self, library_id: &str) -> bool {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let removed = inner.libraries.remove(library_id).is_some();
        inner.indices.remove(library_id);
        if removed {
            inner.mark_dirty();
            info!(library_id, "deleted library");
        } else {
            warn!(library_id, "delete_library: not found");
        }
        removed
    }

    /// Clears and rebuilds `library_id`'s index from the chunks currently reachable
    /// through its documents, then marks it indexed. Idempotent (spec §8).
    pub fn index_library(&self, library_id: &str) -> bool {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if !inner.libraries.contains_key(library_id) {
            warn!(library_id, "index_library: not found");
            return false;
        }

        let chunks: Vec<Arc<Chunk>> = inner.libraries[library_id]
            .documents
            .iter()
            .flat_map(|d| d.chunks.iter())
            .map(|c| Arc::new(c.clone()))
            .collect();

        if !inner.indices.contains_key(library_id) {
            let fresh = inner.new_index_for(&inner.libraries[library_id]);
            inner.indices.insert(library_id.to_string(), fresh);
        }
        let index = inner.indices.get(library_id).unwrap();
        index.clear();
        for chunk in chunks {
            index.insert(chunk);
        }

        let library = inner.libraries.get_mut(library_id).unwrap();
        library.is_indexed = true;
        library.touch();
        inner.mark_dirty();
        info!(library_id, "indexed library");
        true
    }

    /// Replaces `library_id`'s index with a freshly constructed, empty one of `kind`.
    /// Only this library's algorithm changes; every other library, and any library
    /// created afterward, is unaffected (spec §9: index class is tracked per library,
    /// not store-wide). The caller must call [`Self::index_library`] again to
    /// repopulate it.
    pub fn switch_index_algorithm(&self, library_id: &str, kind: IndexKind) -> bool {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if !inner.libraries.contains_key(library_id) {
            warn!(library_id, "switch_index_algorithm: not found");
            return false;
        }
        let lsh_params = inner.libraries[library_id].lsh_params;
        let fresh = build_index(kind, inner.embedding_dimension, lsh_params);
        inner.indices.insert(library_id.to_string(), fresh);
        if let Some(library) = inner.libraries.get_mut(library_id) {
            library.index_kind = kind;
            library.is_indexed = false;
            library.touch();
        }
        inner.mark_dirty();
        info!(library_id, index = kind.as_str(), "switched index algorithm");
        true
    }

    pub fn get_chunk_count(&self, library_id: &str) -> usize {
        let guard = self.inner.lock();
        guard
            .borrow()
            .libraries
            .get(library_id)
            .map(|l| l.chunk_count())
            .unwrap_or(0)
    }

    /// Spec §4.4 search algorithm: lookup -> indexed check -> validation -> index
    /// search -> post-filter by metadata (applied after k-NN selection).
    pub fn search(&self, query: SearchQuery) -> StoreResult<Vec<(f32, Chunk)>> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        let Some(library) = inner.libraries.get(&query.library_id) else {
            debug!(library_id = %query.library_id, "search: library not found");
            return Ok(Vec::new());
        };
        if !library.is_indexed {
            debug!(library_id = %query.library_id, "search: library not indexed");
            return Ok(Vec::new());
        }
        validate_embedding(&query.embedding, inner.embedding_dimension)?;

        let index = inner
            .indices
            .get(&query.library_id)
            .expect("indexed library must have an index");
        let results = index.search(&query.embedding, query.k)?;

        let filtered: Vec<(f32, Chunk)> = results
            .into_iter()
            .filter(|(_, chunk)| {
                query.metadata_filter.as_ref().map_or(true, |filter| {
                    filter
                        .iter()
                        .all(|(k, v)| chunk.metadata.get(k) == Some(v))
                })
            })
            .map(|(dist, chunk)| (dist, (*chunk).clone()))
            .collect();
        Ok(filtered)
    }

    // --- Document management ---

    pub fn add_document(&self, mut req: DocumentCreate) -> Option<Document> {
        let title = if req.document_title.is_empty() {
            req.metadata
                .get("document_title")
                .and_then(|v| v.as_str())
                .unwrap_or("Untitled")
                .to_string()
        } else {
            req.document_title.clone()
        };
        req.metadata
            .insert("document_title".into(), serde_json::Value::String(title.clone()));

        let document_id = self.next_id();
        {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            let library = inner.libraries.get_mut(&req.library_id)?;
            let document = Document::new(document_id.clone(), title.clone(), req.metadata.clone());
            library.documents.push(document);
            library.touch();
            inner.mark_dirty();
        }
        info!(library_id = %req.library_id, document_id = %document_id, "added document");

        for chunk_req in req.chunks {
            let _ = self.add_chunk(ChunkCreate {
                library_id: req.library_id.clone(),
                document_id: Some(document_id.clone()),
                text: chunk_req.text,
                embedding: chunk_req.embedding,
                metadata: chunk_req.metadata,
            });
        }

        self.get_document(&req.library_id, &document_id)
    }

    pub fn get_document(&self, library_id: &str, document_id: &str) -> Option<Document> {
        let guard = self.inner.lock();
        guard
            .borrow()
            .libraries
            .get(library_id)?
            .documents
            .iter()
            .find(|d| d.id == document_id)
            .cloned()
    }

    /// Updates a document's title and/or metadata. A title change is re-stamped into
    /// every owned chunk's `metadata["document_title"]` (spec §3 invariant 5), and, if
    /// the library is indexed, the index is rebuilt so the stale title doesn't linger
    /// there either.
    pub fn update_document(&self, req: DocumentUpdate) -> Option<Document> {
        let (needs_reindex, result) = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            let library = inner.libraries.get_mut(&req.library_id)?;
            let is_indexed = library.is_indexed;
            let document = library.documents.iter_mut().find(|d| d.id == req.document_id)?;

            let mut title_changed = false;
            if let Some(title) = req.document_title {
                document.document_title = title.clone();
                document
                    .metadata
                    .insert("document_title".into(), serde_json::Value::String(title));
                title_changed = true;
            }
            if let Some(metadata) = req.metadata {
                if let Some(title) = metadata.get("document_title").and_then(|v| v.as_str()) {
                    document.document_title = title.to_string();
                    title_changed = true;
                }
                document.metadata.extend(metadata);
            }

            if title_changed {
                let document_id = document.id.clone();
                let title = document.document_title.clone();
                for chunk in document.chunks.iter_mut() {
                    chunk.stamp_document(&document_id, &title);
                }
            }

            document.touch();
            let result = document.clone();
            inner.mark_dirty();
            (title_changed && is_indexed, result)
        };

        if needs_reindex {
            self.index_library(&req.library_id);
        }
        debug!(library_id = %req.library_id, document_id = %req.document_id, "updated document");
        Some(result)
    }

    /// Deletes a document and, if the library is indexed, rebuilds the index so its
    /// chunks no longer appear in search results (spec §9's required correction over
    /// the source's behavior, which left stale chunks in the index).
    pub fn delete_document(&self, library_id: &str, document_id: &str) -> bool {
        let needs_reindex = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            let Some(library) = inner.libraries.get_mut(library_id) else {
                warn!(library_id, document_id, "delete_document: library not found");
                return false;
            };
            let before = library.documents.len();
            library.documents.retain(|d| d.id != document_id);
            if library.documents.len() == before {
                warn!(library_id, document_id, "delete_document: document not found");
                return false;
            }
            library.touch();
            inner.mark_dirty();
            library.is_indexed
        };
        info!(library_id, document_id, "deleted document");
        if needs_reindex {
            self.index_library(library_id);
        }
        true
    }

    // --- Chunk management ---

    pub fn add_chunk(&self, req: ChunkCreate) -> StoreResult<Option<Chunk>> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let dimension = inner.embedding_dimension;
        validate_embedding(&req.embedding, dimension)?;

        let Some(document_id) = req.document_id.clone() else {
            return Ok(None);
        };
        let Some(library) = inner.libraries.get_mut(&req.library_id) else {
            warn!(library_id = %req.library_id, "add_chunk: library not found");
            return Ok(None);
        };
        let Some(document) = library.documents.iter_mut().find(|d| d.id == document_id) else {
            warn!(document_id, "add_chunk: document not found");
            return Ok(None);
        };

        let chunk_id = inner.id_source.next_id();
        let mut chunk = Chunk::new(chunk_id.clone(), req.text, req.embedding, req.metadata);
        chunk.stamp_document(&document.id, &document.document_title);
        if document.metadata.get("document_title").is_none() {
            document
                .metadata
                .insert("document_title".into(), serde_json::Value::String(document.document_title.clone()));
        }
        document.chunks.push(chunk.clone());
        document.touch();

        let is_indexed = library.is_indexed;
        if is_indexed {
            if let Some(index) = inner.indices.get(&req.library_id) {
                index.insert(Arc::new(chunk.clone()));
            }
        }
        inner.mark_dirty();
        debug!(library_id = %req.library_id, chunk_id = %chunk_id, "added chunk");
        Ok(Some(chunk))
    }

    /// Bulk ingest: each chunk is attempted independently and failures don't abort
    /// the batch (spec §7: "a failed chunk insert during bulk ingest fails that
    /// chunk; other chunks are still attempted").
    pub fn add_chunks_bulk(&self, requests: Vec<ChunkCreate>) -> Vec<StoreResult<Option<Chunk>>> {
        requests.into_iter().map(|req| self.add_chunk(req)).collect()
    }

    pub fn get_chunk(&self, library_id: &str, document_id: &str, chunk_id: &str) -> Option<Chunk> {
        let guard = self.inner.lock();
        guard
            .borrow()
            .libraries
            .get(library_id)?
            .documents
            .iter()
            .find(|d| d.id == document_id)?
            .chunks
            .iter()
            .find(|c| c.id == chunk_id)
            .cloned()
    }

    /// Updates a chunk in place; if the owning library is indexed, rebuilds the whole
    /// index afterward (spec §4.4/§9: most indexes cannot update a single entry).
    pub fn update_chunk(&self, req: ChunkUpdate) -> StoreResult<Option<Chunk>> {
        let (needs_reindex, updated) = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            if let Some(embedding) = &req.embedding {
                let dimension = inner.embedding_dimension;
                validate_embedding(embedding, dimension)?;
            }
            let Some(library) = inner.libraries.get_mut(&req.library_id) else {
                return Ok(None);
            };
            let Some(document) = library.documents.iter_mut().find(|d| d.id == req.document_id) else {
                return Ok(None);
            };
            let document_id = document.id.clone();
            let document_title = document.document_title.clone();
            let Some(chunk) = document.chunks.iter_mut().find(|c| c.id == req.chunk_id) else {
                return Ok(None);
            };
            if let Some(text) = req.text {
                chunk.text = text;
            }
            if let Some(embedding) = req.embedding {
                chunk.embedding = embedding;
            }
            if let Some(metadata) = req.metadata {
                chunk.metadata.extend(metadata);
            }
            // Caller-supplied metadata must never clobber the keys that identify the
            // owning document (spec §3 invariant 5).
            chunk.stamp_document(&document_id, &document_title);
            chunk.updated_at = crate::model::now();
            let updated = chunk.clone();
            document.touch();
            inner.mark_dirty();
            (library.is_indexed, updated)
        };

        if needs_reindex {
            self.index_library(&req.library_id);
        }
        info!(library_id = %req.library_id, chunk_id = %req.chunk_id, "updated chunk");
        Ok(Some(updated))
    }

    /// Deletes a chunk; if the owning library is indexed, rebuilds the whole index.
    pub fn delete_chunk(&self, library_id: &str, document_id: &str, chunk_id: &str) -> bool {
        let needs_reindex = {
            let guard = self.inner.lock();
            let mut inner = guard.borrow_mut();
            let Some(library) = inner.libraries.get_mut(library_id) else {
                return false;
            };
            let Some(document) = library.documents.iter_mut().find(|d| d.id == document_id) else {
                return false;
            };
            let before = document.chunks.len();
            document.chunks.retain(|c| c.id != chunk_id);
            if document.chunks.len() == before {
                return false;
            }
            document.touch();
            inner.mark_dirty();
            library.is_indexed
        };
        if needs_reindex {
            self.index_library(library_id);
        }
        info!(library_id, document_id, chunk_id, "deleted chunk");
        true
    }
}

