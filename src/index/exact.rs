use std::sync::Arc;

use parking_lot::RwLock;

use super::{cosine_distance, IndexKind, VectorIndex};
use crate::errors::StoreResult;
use crate::model::Chunk;

/// Linear-scan cosine index. Reference correctness baseline (spec §4.2): O(N·d) per
/// query, exact distances, ties broken by insertion order.
pub struct ExactIndex {
    dimension: usize,
    chunks: RwLock<Vec<Arc<Chunk>>>,
}

impl ExactIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            chunks: RwLock::new(Vec::new()),
        }
    }
}

impl VectorIndex for ExactIndex {
    fn insert(&self, chunk: Arc<Chunk>) {
        self.chunks.write().push(chunk);
    }

    fn search(&self, query: &[f32], k: usize) -> StoreResult<Vec<(f32, Arc<Chunk>)>> {
        let chunks = self.chunks.read();
        if k == 0 || chunks.is_empty() {
            return Ok(Vec::new());
        }

        // Stable sort by ascending distance keeps insertion order on ties.
        let mut scored: Vec<(f32, Arc<Chunk>)> = chunks
            .iter()
            .map(|c| (cosine_distance(query, &c.embedding), Arc::clone(c)))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn clear(&self) {
        self.chunks.write().clear();
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Exact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn chunk(id: &str, embedding: Vec<f32>) -> Arc<Chunk> {
        Arc::new(Chunk::new(id.into(), id.into(), embedding, Map::new()))
    }

    #[test]
    fn empty_index_search_returns_empty() {
        let idx = ExactIndex::new(3);
        assert!(idx.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn k_zero_returns_empty() {
        let idx = ExactIndex::new(3);
        idx.insert(chunk("a", vec![1.0, 0.0, 0.0]));
        assert!(idx.search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    /// Spec §8 scenario 1: A=(1,0,0), B=(0,1,0), C=(1,1,0); search (1,0,0), k=2
    /// returns [(0.0, A), (~0.293, C)].
    #[test]
    fn scenario_exact_search() {
        let idx = ExactIndex::new(3);
        idx.insert(chunk("A", vec![1.0, 0.0, 0.0]));
        idx.insert(chunk("B", vec![0.0, 1.0, 0.0]));
        idx.insert(chunk("C", vec![1.0, 1.0, 0.0]));

        let results = idx.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1.id, "A");
        assert!(results[0].0.abs() < 1e-6);
        assert_eq!(results[1].1.id, "C");
        assert!((results[1].0 - 0.2929).abs() < 1e-3);
    }

    #[test]
    fn k_larger_than_candidates_returns_all_no_padding() {
        let idx = ExactIndex::new(3);
        idx.insert(chunk("A", vec![1.0, 0.0, 0.0]));
        idx.insert(chunk("B", vec![0.0, 1.0, 0.0]));
        let results = idx.search(&[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn all_zero_query_orders_by_insertion_tie_break() {
        let idx = ExactIndex::new(3);
        idx.insert(chunk("A", vec![1.0, 0.0, 0.0]));
        idx.insert(chunk("B", vec![0.0, 1.0, 0.0]));
        let results = idx.search(&[0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1.id, "A");
        assert_eq!(results[1].1.id, "B");
        for (dist, _) in &results {
            assert!((dist - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn distances_are_within_expected_range() {
        let idx = ExactIndex::new(3);
        idx.insert(chunk("A", vec![1.0, 0.0, 0.0]));
        idx.insert(chunk("B", vec![-1.0, 0.0, 0.0]));
        let results = idx.search(&[1.0, 0.0, 0.0], 2).unwrap();
        for (dist, _) in results {
            assert!((0.0..=2.0).contains(&dist));
        }
    }
}
