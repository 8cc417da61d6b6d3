use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::index::{IndexKind, LshParams};

/// Supplies the two ingredients of a generated id: a clock and a disambiguator.
///
/// Production code uses [`SystemIdSource`]; tests can substitute a fixed source so
/// generated ids are reproducible (spec §9, "ID generation").
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Millisecond-timestamp-prefixed id with a UUIDv4 suffix, mirroring the source's
/// `{timestamp_ms}_{random}` scheme while using the teacher's id-generation crate
/// instead of a source of randomness it lacks.
pub struct SystemIdSource;

impl IdSource for SystemIdSource {
    fn next_id(&self) -> String {
        let millis = Utc::now().timestamp_millis();
        format!("{millis}_{}", Uuid::new_v4())
    }
}

/// An [`IdSource`] that always returns ids from a fixed, caller-supplied sequence.
/// Used by tests that need reproducible ids.
pub struct FixedIdSource {
    ids: parking_lot::Mutex<std::collections::VecDeque<String>>,
}

impl FixedIdSource {
    pub fn new(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ids: parking_lot::Mutex::new(ids.into_iter().map(Into::into).collect()),
        }
    }
}

impl IdSource for FixedIdSource {
    fn next_id(&self) -> String {
        self.ids
            .lock()
            .pop_front()
            .expect("FixedIdSource exhausted")
    }
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// The smallest indexed unit: a piece of text plus its precomputed embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl Chunk {
    pub fn new(id: String, text: String, embedding: Vec<f32>, metadata: Map<String, Value>) -> Self {
        let ts = now();
        Self {
            id,
            metadata,
            created_at: ts,
            updated_at: ts,
            text,
            embedding,
        }
    }

    /// Stamps `document_id`/`document_title` into this chunk's metadata, overwriting
    /// any caller-supplied values for those keys (spec §3 invariant 5).
    pub fn stamp_document(&mut self, document_id: &str, document_title: &str) {
        self.metadata
            .insert("document_id".into(), Value::String(document_id.to_string()));
        self.metadata.insert(
            "document_title".into(),
            Value::String(document_title.to_string()),
        );
    }
}

/// An ordered collection of chunks sharing a title and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub document_title: String,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

impl Document {
    pub fn new(id: String, document_title: String, mut metadata: Map<String, Value>) -> Self {
        let ts = now();
        metadata.insert(
            "document_title".into(),
            Value::String(document_title.clone()),
        );
        Self {
            id,
            metadata,
            created_at: ts,
            updated_at: ts,
            document_title,
            chunks: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now();
    }
}

/// A named, independently indexed collection of documents; the unit of search.
///
/// Carries its own index class and LSH parameters, so each library can run a
/// different ANN strategy and that choice survives a snapshot round-trip
/// independently of every other library's (spec §9, `switch_index_algorithm`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub id: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub library_id: String,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub is_indexed: bool,
    pub index_kind: IndexKind,
    pub lsh_params: LshParams,
}

impl Library {
    pub fn new(
        library_id: String,
        metadata: Map<String, Value>,
        index_kind: IndexKind,
        lsh_params: LshParams,
    ) -> Self {
        let ts = now();
        Self {
            id: library_id.clone(),
            metadata,
            created_at: ts,
            updated_at: ts,
            library_id,
            documents: Vec::new(),
            is_indexed: false,
            index_kind,
            lsh_params,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now();
    }

    pub fn chunk_count(&self) -> usize {
        self.documents.iter().map(|d| d.chunks.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_title_is_mirrored_in_metadata() {
        let doc = Document::new("d1".into(), "Title".into(), Map::new());
        assert_eq!(
            doc.metadata.get("document_title"),
            Some(&Value::String("Title".into()))
        );
    }

    #[test]
    fn stamp_document_overwrites_caller_metadata() {
        let mut meta = Map::new();
        meta.insert("document_id".into(), Value::String("bogus".into()));
        let mut chunk = Chunk::new("c1".into(), "hi".into(), vec![0.0], meta);
        chunk.stamp_document("d1", "Title");
        assert_eq!(
            chunk.metadata.get("document_id"),
            Some(&Value::String("d1".into()))
        );
        assert_eq!(
            chunk.metadata.get("document_title"),
            Some(&Value::String("Title".into()))
        );
    }

    #[test]
    fn fixed_id_source_yields_sequence() {
        let src = FixedIdSource::new(["a", "b"]);
        assert_eq!(src.next_id(), "a");
        assert_eq!(src.next_id(), "b");
    }

    #[test]
    fn system_id_source_is_time_prefixed_and_unique() {
        let src = SystemIdSource;
        let a = src.next_id();
        let b = src.next_id();
        assert_ne!(a, b);
        assert!(a.contains('_'));
    }
}
