//! Similarity computation and top-k ranking for embeddings.
//!
//! Everything here is pure: no I/O, no shared state. Ranking is a linear
//! scan over the whole corpus.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimilarityError};

/// Something that can be ranked against a query embedding.
pub trait Candidate {
    /// Identifier used for tie-breaking and reporting.
    fn identifier(&self) -> &str;

    /// Duration of the underlying sample, copied into the match.
    fn duration_seconds(&self) -> f64;

    /// The candidate's embedding.
    fn embedding(&self) -> &[f32];
}

impl<T: Candidate + ?Sized> Candidate for &T {
    fn identifier(&self) -> &str {
        (**self).identifier()
    }

    fn duration_seconds(&self) -> f64 {
        (**self).duration_seconds()
    }

    fn embedding(&self) -> &[f32] {
        (**self).embedding()
    }
}

/// A ranked match for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Identifier of the matched sample.
    pub identifier: String,

    /// Duration of the matched sample in seconds.
    pub duration_seconds: f64,

    /// Cosine similarity to the query, in [-1, 1].
    pub similarity: f32,

    /// 0-based position in the ranking.
    pub rank: usize,
}

/// Output of [`top_k`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedMatches {
    /// Matches, best first.
    pub results: Vec<MatchResult>,

    /// Candidates skipped because their dimension differs from the query.
    pub skipped_mismatches: usize,

    /// Candidates skipped because their embedding has zero norm or
    /// non-finite values.
    pub skipped_degenerate: usize,
}

impl RankedMatches {
    /// Total number of candidates excluded from the ranking.
    pub fn skipped(&self) -> usize {
        self.skipped_mismatches + self.skipped_degenerate
    }
}

/// Compute the dot product between two embeddings.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    ensure_same_dimension(a, b)?;
    Ok(dot(a, b) as f32)
}

/// Euclidean norm of an embedding.
pub fn l2_norm(v: &[f32]) -> f32 {
    norm(v) as f32
}

/// Normalize an embedding to unit length in place.
///
/// Fails with [`SimilarityError::DegenerateVector`] when the vector cannot be
/// normalized; the input is left untouched in that case.
pub fn normalize(embedding: &mut [f32]) -> Result<(), SimilarityError> {
    let norm = checked_norm(embedding)?;
    for x in embedding.iter_mut() {
        *x = (f64::from(*x) / norm) as f32;
    }
    Ok(())
}

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// Zero-norm or non-finite inputs fail with
/// [`SimilarityError::DegenerateVector`] instead of producing NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    ensure_same_dimension(a, b)?;
    let norm_a = checked_norm(a)?;
    cosine_with_norm(a, norm_a, b)
}

/// Rank `candidates` against `query` and keep the best `k`.
///
/// Candidates whose dimension differs from the query, or whose embedding is
/// degenerate, are skipped and counted rather than failing the call. Results
/// are ordered by similarity descending, then identifier ascending, so the
/// ordering is total and deterministic. A degenerate query is an error.
pub fn top_k<C: Candidate>(
    query: &[f32],
    candidates: &[C],
    k: usize,
) -> Result<RankedMatches, SimilarityError> {
    let query_norm = checked_norm(query)?;

    let mut ranked = RankedMatches::default();
    let mut scored: Vec<(OrderedFloat<f32>, &C)> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let embedding = candidate.embedding();
        if embedding.len() != query.len() {
            ranked.skipped_mismatches += 1;
            continue;
        }
        match cosine_with_norm(query, query_norm, embedding) {
            Ok(score) => scored.push((OrderedFloat(score), candidate)),
            Err(_) => ranked.skipped_degenerate += 1,
        }
    }

    if k == 0 {
        return Ok(ranked);
    }

    scored.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.identifier().cmp(b.1.identifier()))
    });

    ranked.results = scored
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(rank, (score, candidate))| MatchResult {
            identifier: candidate.identifier().to_string(),
            duration_seconds: candidate.duration_seconds(),
            similarity: score.0,
            rank,
        })
        .collect();

    Ok(ranked)
}

fn ensure_same_dimension(a: &[f32], b: &[f32]) -> Result<(), SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

// Sums run in f64 so finite f32 inputs cannot overflow or underflow to a
// zero or infinite norm.
fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt()
}

/// Norm of `v`, or `DegenerateVector` if it is zero or not finite.
fn checked_norm(v: &[f32]) -> Result<f64, SimilarityError> {
    let norm = norm(v);
    if norm == 0.0 || !norm.is_finite() {
        return Err(SimilarityError::DegenerateVector);
    }
    Ok(norm)
}

fn cosine_with_norm(a: &[f32], norm_a: f64, b: &[f32]) -> Result<f32, SimilarityError> {
    let norm_b = checked_norm(b)?;
    let score = dot(a, b) / norm_a / norm_b;
    if !score.is_finite() {
        return Err(SimilarityError::DegenerateVector);
    }
    Ok(score.clamp(-1.0, 1.0) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Sample {
        id: &'static str,
        duration: f64,
        embedding: Vec<f32>,
    }

    impl Sample {
        fn new(id: &'static str, embedding: Vec<f32>) -> Self {
            Self {
                id,
                duration: 1.5,
                embedding,
            }
        }
    }

    impl Candidate for Sample {
        fn identifier(&self) -> &str {
            self.id
        }

        fn duration_seconds(&self) -> f64 {
            self.duration
        }

        fn embedding(&self) -> &[f32] {
            &self.embedding
        }
    }

    fn ids(ranked: &RankedMatches) -> Vec<&str> {
        ranked.results.iter().map(|r| r.identifier.as_str()).collect()
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![0.3, -1.2, 4.5, 0.01];
        let sim = cosine_similarity(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-1.0, -2.0, -3.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(
            cosine_similarity(&a, &b),
            Err(SimilarityError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_zero_vector_is_degenerate() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(
            cosine_similarity(&a, &b),
            Err(SimilarityError::DegenerateVector)
        );
        assert_eq!(
            cosine_similarity(&b, &a),
            Err(SimilarityError::DegenerateVector)
        );
    }

    #[test]
    fn test_nan_is_degenerate() {
        let a = vec![f32::NAN, 1.0];
        let b = vec![1.0, 0.0];
        assert_eq!(
            cosine_similarity(&a, &b),
            Err(SimilarityError::DegenerateVector)
        );
    }

    #[test]
    fn test_tiny_vector_is_not_degenerate() {
        let a = vec![1e-30, 0.0];
        let sim = cosine_similarity(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);

        let mut v = a;
        normalize(&mut v).unwrap();
        assert!((v[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_huge_vector_is_not_degenerate() {
        let a = vec![3e19, 0.0];
        let b = vec![1.0, 0.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
        assert!((l2_norm(&a) - 3e19).abs() / 3e19 < 1e-6);

        let ranked = top_k(&b, &[Sample::new("loud", a)], 1).unwrap();
        assert_eq!(ranked.skipped_degenerate, 0);
        assert_eq!(ids(&ranked), vec!["loud"]);
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        assert!(normalize(&mut zero).is_err());
    }

    #[test]
    fn test_top_k_ranks_closest_first() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            Sample::new("X", vec![1.0, 0.0]),
            Sample::new("Y", vec![0.0, 1.0]),
            Sample::new("Z", vec![0.7, 0.7]),
        ];

        let ranked = top_k(&query, &candidates, 2).unwrap();
        assert_eq!(ids(&ranked), vec!["X", "Z"]);
        assert!((ranked.results[0].similarity - 1.0).abs() < 1e-6);
        assert!((ranked.results[1].similarity - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4);
        assert_eq!(ranked.results[0].rank, 0);
        assert_eq!(ranked.results[1].rank, 1);
        assert_eq!(ranked.results[1].duration_seconds, 1.5);
        assert_eq!(ranked.skipped(), 0);
    }

    #[test]
    fn test_top_k_zero_returns_empty() {
        let query = vec![1.0, 0.0];
        let candidates = vec![Sample::new("a", vec![1.0, 0.0])];
        let ranked = top_k(&query, &candidates, 0).unwrap();
        assert!(ranked.results.is_empty());
    }

    #[test]
    fn test_top_k_fewer_candidates_than_k() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            Sample::new("low", vec![-1.0, 0.2]),
            Sample::new("high", vec![0.9, 0.1]),
        ];
        let ranked = top_k(&query, &candidates, 10).unwrap();
        assert_eq!(ids(&ranked), vec!["high", "low"]);
    }

    #[test]
    fn test_top_k_breaks_ties_by_identifier() {
        let query = vec![1.0, 1.0];
        let candidates = vec![
            Sample::new("charlie", vec![0.6, 0.8]),
            Sample::new("delta", vec![0.0, -1.0]),
            Sample::new("alpha", vec![0.6, 0.8]),
            Sample::new("bravo", vec![0.6, 0.8]),
        ];
        let ranked = top_k(&query, &candidates, 4).unwrap();
        assert_eq!(ids(&ranked), vec!["alpha", "bravo", "charlie", "delta"]);
    }

    #[test]
    fn test_top_k_skips_mismatched_dimensions() {
        let query = vec![1.0; 192];
        let mut legacy = vec![0.0; 256];
        legacy[0] = 1.0;
        let candidates = vec![
            Sample::new("legacy", legacy),
            Sample::new("current", vec![0.5; 192]),
            Sample::new("other", vec![-0.5; 192]),
        ];

        let ranked = top_k(&query, &candidates, 5).unwrap();
        assert_eq!(ranked.skipped_mismatches, 1);
        assert_eq!(ids(&ranked), vec!["current", "other"]);
    }

    #[test]
    fn test_top_k_skips_degenerate_candidates() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            Sample::new("zero", vec![0.0, 0.0]),
            Sample::new("ok", vec![1.0, 0.0]),
        ];
        let ranked = top_k(&query, &candidates, 2).unwrap();
        assert_eq!(ranked.skipped_degenerate, 1);
        assert_eq!(ids(&ranked), vec!["ok"]);
    }

    #[test]
    fn test_top_k_degenerate_query_fails() {
        let candidates = vec![Sample::new("a", vec![1.0, 0.0])];
        assert_eq!(
            top_k(&[0.0, 0.0], &candidates, 1),
            Err(SimilarityError::DegenerateVector)
        );
    }
}
