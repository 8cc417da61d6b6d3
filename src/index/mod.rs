mod exact;
mod lsh;

pub use exact::ExactIndex;
pub use lsh::LshIndex;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::StoreResult;
use crate::model::Chunk;

/// Which concrete index backs a library. Carried in snapshots and the store config
/// (spec §6: "the selected index class... and its configured parameters").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Exact,
    Lsh,
}

impl IndexKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexKind::Exact => "exact",
            IndexKind::Lsh => "lsh",
        }
    }

    /// Parses an index class identifier, falling back to `default` for anything
    /// unrecognized (spec §6: "any unknown index identifier falls back to a
    /// configurable default").
    pub fn parse_or(value: &str, default: IndexKind) -> Self {
        match value {
            "exact" | "vector" => IndexKind::Exact,
            "lsh" => IndexKind::Lsh,
            _ => default,
        }
    }
}

/// Parameters for [`IndexKind::Lsh`]; defaults match spec §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LshParams {
    pub n_planes: usize,
    pub n_tables: usize,
    pub random_seed: u64,
}

impl Default for LshParams {
    fn default() -> Self {
        Self {
            n_planes: 8,
            n_tables: 4,
            random_seed: 42,
        }
    }
}

/// A polymorphic per-library vector index (spec §4.1).
///
/// Each concrete index owns its own lock internally so it remains safely callable
/// both from under the store's lock and, in principle, from a future streaming path
/// that reaches it directly (spec §5).
pub trait VectorIndex: Send + Sync {
    /// Adds a chunk's vector to the index. The index holds a shared reference so the
    /// chunk can be returned directly from `search` without re-fetching it.
    fn insert(&self, chunk: Arc<Chunk>);

    /// Returns at most `k` results ordered by ascending cosine distance. Returns fewer
    /// than `k` (including zero) when there are fewer candidates; never errors on an
    /// empty index.
    fn search(&self, query: &[f32], k: usize) -> StoreResult<Vec<(f32, Arc<Chunk>)>>;

    /// Removes all entries. Dimension remains fixed.
    fn clear(&self);

    fn dimension(&self) -> usize;

    fn kind(&self) -> IndexKind;
}

/// Builds a fresh, empty index for `dimension` using `kind`'s strategy and `lsh_params`.
pub fn build_index(
    kind: IndexKind,
    dimension: usize,
    lsh_params: LshParams,
) -> Box<dyn VectorIndex> {
    match kind {
        IndexKind::Exact => Box::new(ExactIndex::new(dimension)),
        IndexKind::Lsh => Box::new(LshIndex::new(dimension, lsh_params)),
    }
}

pub(crate) const EPS: f32 = 1e-10;

/// Normalizes `v` to unit length, guarding the all-zero case with `EPS` (spec §4.3).
pub(crate) fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / (norm + EPS)).collect()
}

/// Cosine distance `1 - cos(a, b)`, the shared metric for both index strategies.
/// Each vector is normalized on its own, matching spec §4.2/§4.3's "normalized on the
/// fly" wording so an all-zero input yields similarity 0 rather than a division panic.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let a_n = normalize(a);
    let b_n = normalize(b);
    let cos: f32 = a_n.iter().zip(&b_n).map(|(x, y)| x * y).sum();
    1.0 - cos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_kind_parse_or_falls_back_to_default() {
        assert_eq!(IndexKind::parse_or("lsh", IndexKind::Exact), IndexKind::Lsh);
        assert_eq!(
            IndexKind::parse_or("bogus", IndexKind::Exact),
            IndexKind::Exact
        );
    }

    #[test]
    fn cosine_distance_of_identical_unit_vectors_is_zero() {
        let d = cosine_distance(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn cosine_distance_of_orthogonal_vectors_is_one() {
        let d = cosine_distance(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!((d - 1.0).abs() < 1e-6);
    }
}
