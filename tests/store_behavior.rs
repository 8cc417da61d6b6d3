use serde_json::Map;
use vectordb::{ChunkCreate, DocumentCreate, IndexKind, LibraryCreate, SearchQuery, StoreConfig, StoreError, VectorStore};

fn store() -> VectorStore {
    VectorStore::new(&StoreConfig {
        embedding_dimension: 3,
        index_class: IndexKind::Exact,
        ..Default::default()
    })
}

/// Spec §8 scenario 6: an embedding of the wrong dimension is rejected with
/// `DimensionMismatch`, not silently truncated or padded.
#[test]
fn add_chunk_rejects_mismatched_dimension() {
    let store = store();
    store.create_library(LibraryCreate {
        library_id: "lib".into(),
        metadata: Map::new(),
    });
    let document = store
        .add_document(DocumentCreate {
            library_id: "lib".into(),
            document_title: "Doc".into(),
            chunks: Vec::new(),
            metadata: Map::new(),
        })
        .unwrap();

    let err = store
        .add_chunk(ChunkCreate {
            library_id: "lib".into(),
            document_id: Some(document.id),
            text: "bad".into(),
            embedding: vec![1.0, 0.0],
            metadata: Map::new(),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::DimensionMismatch { expected: 3, actual: 2 }
    ));
}

/// Spec §9's corrected behavior: deleting a document removes its chunks from future
/// search results, rather than leaving them stale in the index.
#[test]
fn delete_document_removes_its_chunks_from_search() {
    let store = store();
    store.create_library(LibraryCreate {
        library_id: "lib".into(),
        metadata: Map::new(),
    });
    let doc_a = store
        .add_document(DocumentCreate {
            library_id: "lib".into(),
            document_title: "A".into(),
            chunks: Vec::new(),
            metadata: Map::new(),
        })
        .unwrap();
    let doc_b = store
        .add_document(DocumentCreate {
            library_id: "lib".into(),
            document_title: "B".into(),
            chunks: Vec::new(),
            metadata: Map::new(),
        })
        .unwrap();
    store
        .add_chunk(ChunkCreate {
            library_id: "lib".into(),
            document_id: Some(doc_a.id.clone()),
            text: "from a".into(),
            embedding: vec![1.0, 0.0, 0.0],
            metadata: Map::new(),
        })
        .unwrap();
    store
        .add_chunk(ChunkCreate {
            library_id: "lib".into(),
            document_id: Some(doc_b.id.clone()),
            text: "from b".into(),
            embedding: vec![0.0, 1.0, 0.0],
            metadata: Map::new(),
        })
        .unwrap();
    store.index_library("lib");

    assert!(store.delete_document("lib", &doc_a.id));

    let results = store
        .search(SearchQuery {
            library_id: "lib".into(),
            embedding: vec![1.0, 0.0, 0.0],
            k: 10,
            metadata_filter: None,
        })
        .unwrap();
    assert!(results.iter().all(|(_, chunk)| chunk.text != "from a"));
    assert_eq!(store.get_chunk_count("lib"), 1);
}

/// Metadata filtering is applied after k-NN selection, not as a pre-filter (spec §4.4).
#[test]
fn search_filters_by_metadata_after_knn_selection() {
    let store = store();
    store.create_library(LibraryCreate {
        library_id: "lib".into(),
        metadata: Map::new(),
    });
    let document = store
        .add_document(DocumentCreate {
            library_id: "lib".into(),
            document_title: "Doc".into(),
            chunks: Vec::new(),
            metadata: Map::new(),
        })
        .unwrap();

    let mut meta_keep = Map::new();
    meta_keep.insert("tag".into(), serde_json::Value::String("keep".into()));
    store
        .add_chunk(ChunkCreate {
            library_id: "lib".into(),
            document_id: Some(document.id.clone()),
            text: "keep me".into(),
            embedding: vec![1.0, 0.0, 0.0],
            metadata: meta_keep,
        })
        .unwrap();

    let mut meta_drop = Map::new();
    meta_drop.insert("tag".into(), serde_json::Value::String("drop".into()));
    store
        .add_chunk(ChunkCreate {
            library_id: "lib".into(),
            document_id: Some(document.id),
            text: "drop me".into(),
            embedding: vec![0.99, 0.01, 0.0],
            metadata: meta_drop,
        })
        .unwrap();
    store.index_library("lib");

    let mut filter = Map::new();
    filter.insert("tag".into(), serde_json::Value::String("keep".into()));
    let results = store
        .search(SearchQuery {
            library_id: "lib".into(),
            embedding: vec![1.0, 0.0, 0.0],
            k: 2,
            metadata_filter: Some(filter),
        })
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].1.text, "keep me");
}

/// An unindexed library returns no results rather than erroring (spec §3 invariant).
#[test]
fn search_on_unindexed_library_returns_empty() {
    let store = store();
    store.create_library(LibraryCreate {
        library_id: "lib".into(),
        metadata: Map::new(),
    });
    let results = store
        .search(SearchQuery {
            library_id: "lib".into(),
            embedding: vec![1.0, 0.0, 0.0],
            k: 5,
            metadata_filter: None,
        })
        .unwrap();
    assert!(results.is_empty());
}
