use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

use super::{cosine_distance, normalize, IndexKind, LshParams, VectorIndex};
use crate::errors::StoreResult;
use crate::model::Chunk;

/// Random-hyperplane locality-sensitive hashing index (spec §4.3).
///
/// Hamming distance over a sign-projection bit-string approximates angular distance;
/// candidates collected across `n_tables` buckets are exact-reranked by true cosine
/// distance, so reported distances are never approximations, only the candidate set
/// (recall) is.
pub struct LshIndex {
    dimension: usize,
    params: LshParams,
    /// `n_tables` x `n_planes` x `dimension`, each plane row-normalized to unit length.
    planes: Vec<Vec<Vec<f32>>>,
    tables: Vec<RwLock<HashMap<String, Vec<Arc<Chunk>>>>>,
}

impl LshIndex {
    pub fn new(dimension: usize, params: LshParams) -> Self {
        let mut rng = rand::rngs::StdRng::seed_from_u64(params.random_seed);
        let planes = (0..params.n_tables)
            .map(|_| {
                (0..params.n_planes)
                    .map(|_| {
                        let raw: Vec<f32> = (0..dimension)
                            .map(|_| StandardNormal.sample(&mut rng))
                            .collect();
                        normalize(&raw)
                    })
                    .collect()
            })
            .collect();

        let tables = (0..params.n_tables).map(|_| RwLock::new(HashMap::new())).collect();

        Self {
            dimension,
            params,
            planes,
            tables,
        }
    }

    /// Computes the bit-string hash of `vector` under `table_idx`'s hyperplanes.
    /// Ties (projection exactly zero) fall to `'0'` (spec §4.3).
    fn hash(&self, vector: &[f32], table_idx: usize) -> String {
        let normed = normalize(vector);
        self.planes[table_idx]
            .iter()
            .map(|plane| {
                let proj: f32 = plane.iter().zip(&normed).map(|(p, v)| p * v).sum();
                if proj > 0.0 {
                    '1'
                } else {
                    '0'
                }
            })
            .collect()
    }
}

impl VectorIndex for LshIndex {
    fn insert(&self, chunk: Arc<Chunk>) {
        for table_idx in 0..self.params.n_tables {
            let key = self.hash(&chunk.embedding, table_idx);
            self.tables[table_idx]
                .write()
                .entry(key)
                .or_default()
                .push(Arc::clone(&chunk));
        }
    }

    fn search(&self, query: &[f32], k: usize) -> StoreResult<Vec<(f32, Arc<Chunk>)>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut candidates: HashMap<String, Arc<Chunk>> = HashMap::new();
        for table_idx in 0..self.params.n_tables {
            let key = self.hash(query, table_idx);
            if let Some(bucket) = self.tables[table_idx].read().get(&key) {
                for chunk in bucket {
                    candidates.entry(chunk.id.clone()).or_insert_with(|| Arc::clone(chunk));
                }
            }
        }

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, Arc<Chunk>)> = candidates
            .into_values()
            .map(|c| (cosine_distance(query, &c.embedding), c))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn clear(&self) {
        for table in &self.tables {
            table.write().clear();
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Lsh
    }
}
