//! Request/response shapes at the store boundary (spec §6), separate from the entity
//! model in [`crate::model`] the way the source keeps `api_schemas.py` apart from
//! `schemas.py`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::Chunk;

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryCreate {
    pub library_id: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryUpdate {
    pub library_id: String,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkCreate {
    pub library_id: String,
    pub document_id: Option<String>,
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkUpdate {
    pub library_id: String,
    pub document_id: String,
    pub chunk_id: String,
    pub text: Option<String>,
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentCreate {
    pub library_id: String,
    pub document_title: String,
    #[serde(default)]
    pub chunks: Vec<ChunkCreate>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUpdate {
    pub library_id: String,
    pub document_id: String,
    pub document_title: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub library_id: String,
    pub embedding: Vec<f32>,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub metadata_filter: Option<Map<String, Value>>,
}

fn default_k() -> usize {
    1
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub distance: f32,
    pub chunk: Chunk,
}
