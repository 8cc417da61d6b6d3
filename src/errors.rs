use thiserror::Error;

/// The error taxonomy for all store and index operations (see spec §7).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("internal invariant violated: {0}")]
    IntegrityError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Validates that `embedding` has the expected length and contains only finite values.
pub fn validate_embedding(embedding: &[f32], expected_dim: usize) -> StoreResult<()> {
    if embedding.len() != expected_dim {
        return Err(StoreError::DimensionMismatch {
            expected: expected_dim,
            actual: embedding.len(),
        });
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(StoreError::InvalidEmbedding(
            "embedding contains NaN or infinite values".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_dimension() {
        let err = validate_embedding(&[1.0, 2.0], 3).unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[test]
    fn rejects_non_finite() {
        let err = validate_embedding(&[1.0, f32::NAN, 0.0], 3).unwrap_err();
        assert!(matches!(err, StoreError::InvalidEmbedding(_)));
    }

    #[test]
    fn accepts_valid() {
        assert!(validate_embedding(&[1.0, 0.0, -1.0], 3).is_ok());
    }
}
