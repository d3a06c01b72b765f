//! The persisted voice sample record.

use serde::{Deserialize, Serialize};
use voicematch_embeddings::{Candidate, Embedding};

use crate::error::{Result, StoreError};

/// One stored voice sample.
///
/// Records are immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSampleRecord {
    /// Logical path or name; unique within a store.
    pub identifier: String,

    /// Length of the sample in seconds.
    pub duration_seconds: f64,

    /// Speaker embedding.
    pub embedding: Embedding,
}

impl VoiceSampleRecord {
    /// Create a new record.
    pub fn new(identifier: impl Into<String>, duration_seconds: f64, embedding: Embedding) -> Self {
        Self {
            identifier: identifier.into(),
            duration_seconds,
            embedding,
        }
    }

    /// Dimension of the embedding.
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }

    /// Check the record can be written to a store of `dimension`.
    pub fn validate(&self, dimension: usize) -> Result<()> {
        if self.identifier.trim().is_empty() {
            return Err(StoreError::InvalidRecord(
                "identifier must not be empty".to_string(),
            ));
        }
        if !self.duration_seconds.is_finite() || self.duration_seconds <= 0.0 {
            return Err(StoreError::InvalidRecord(format!(
                "{}: duration must be positive, got {}",
                self.identifier, self.duration_seconds
            )));
        }
        if self.embedding.len() != dimension {
            return Err(StoreError::DimensionMismatch {
                expected: dimension,
                actual: self.embedding.len(),
            });
        }
        if self.embedding.iter().any(|x| !x.is_finite()) {
            return Err(StoreError::InvalidRecord(format!(
                "{}: embedding contains non-finite values",
                self.identifier
            )));
        }
        Ok(())
    }
}

impl Candidate for VoiceSampleRecord {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_well_formed_record() {
        let record = VoiceSampleRecord::new("a.wav", 2.5, vec![0.1, 0.2, 0.3]);
        assert!(record.validate(3).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_records() {
        assert!(matches!(
            VoiceSampleRecord::new("  ", 1.0, vec![1.0]).validate(1),
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(matches!(
            VoiceSampleRecord::new("a", 0.0, vec![1.0]).validate(1),
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(matches!(
            VoiceSampleRecord::new("a", f64::NAN, vec![1.0]).validate(1),
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(matches!(
            VoiceSampleRecord::new("a", 1.0, vec![1.0, 2.0]).validate(1),
            Err(StoreError::DimensionMismatch {
                expected: 1,
                actual: 2
            })
        ));
        assert!(matches!(
            VoiceSampleRecord::new("a", 1.0, vec![f32::INFINITY]).validate(1),
            Err(StoreError::InvalidRecord(_))
        ));
    }
}
