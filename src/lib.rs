//! In-memory vector search engine: libraries of documents of chunks, each library
//! independently indexed by a pluggable nearest-neighbor strategy, with periodic
//! snapshotting to a single JSON file.

pub mod api;
pub mod config;
pub mod errors;
pub mod index;
pub mod model;
pub mod seed;
pub mod snapshot;
pub mod store;

pub use api::{
    ChunkCreate, ChunkUpdate, DocumentCreate, DocumentUpdate, LibraryCreate, LibraryUpdate,
    SearchQuery, SearchResponse,
};
pub use config::StoreConfig;
pub use errors::{StoreError, StoreResult};
pub use index::{IndexKind, LshParams, VectorIndex};
pub use model::{Chunk, Document, IdSource, Library};
pub use store::VectorStore;
