//! Vector validation kernel.
//!
//! Every embedding entering or leaving the engine satisfies one contract:
//! exactly 1536 single-precision values, all finite, L2 norm within
//! `NORM_TOLERANCE` of 1. The checks run at every insertion and search
//! boundary, so downstream code can treat cosine as a plain dot product
//! and skip re-validation.

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Embedding dimensionality accepted by the engine.
pub const EMBEDDING_DIMENSION: usize = 1536;

/// Allowed deviation of the L2 norm from 1.
pub const NORM_TOLERANCE: f64 = 1e-6;

/// L2 norm of a vector, accumulated in f64.
pub fn l2_norm(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|v| {
            let v = *v as f64;
            v * v
        })
        .sum::<f64>()
        .sqrt()
}

/// True when the L2 norm is within `tolerance` of 1.
pub fn is_l2_normalised(values: &[f32], tolerance: f64) -> bool {
    (l2_norm(values) - 1.0).abs() <= tolerance
}

/// Full boundary check: dimension, element finiteness (first offending
/// position reported), then norm.
pub fn assert_dimensions(values: &[f32], dim: usize, context: &str) -> Result<(), ValidationError> {
    assert_dimensions_only(values, dim, context)?;
    let norm = l2_norm(values);
    if (norm - 1.0).abs() > NORM_TOLERANCE {
        return Err(ValidationError::NotNormalised {
            norm,
            context: context.to_string(),
        });
    }
    Ok(())
}

/// Dimension and finiteness only; skips the norm check. Used where the
/// caller is about to normalise anyway.
pub fn assert_dimensions_only(
    values: &[f32],
    dim: usize,
    context: &str,
) -> Result<(), ValidationError> {
    if values.len() != dim {
        return Err(ValidationError::DimensionMismatch {
            expected: dim,
            actual: values.len(),
            context: context.to_string(),
        });
    }
    for (index, value) in values.iter().enumerate() {
        if !value.is_finite() {
            return Err(ValidationError::InvalidValue {
                index,
                value: *value,
                context: context.to_string(),
            });
        }
    }
    Ok(())
}

/// Returns an L2-normalised copy. Fails on the zero vector.
pub fn l2_normalize(values: &[f32], context: &str) -> Result<Vec<f32>, ValidationError> {
    let mut out = values.to_vec();
    l2_normalize_in_place(&mut out, context)?;
    Ok(out)
}

/// Normalises in place. Fails on the zero vector.
pub fn l2_normalize_in_place(values: &mut [f32], context: &str) -> Result<(), ValidationError> {
    let norm = l2_norm(values);
    if norm == 0.0 {
        return Err(ValidationError::ZeroVector {
            context: context.to_string(),
        });
    }
    for v in values.iter_mut() {
        *v = (*v as f64 / norm) as f32;
    }
    Ok(())
}

/// Cosine similarity with dimension validation on both operands.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, ValidationError> {
    assert_dimensions_only(a, a.len(), "cosine_similarity.a")?;
    assert_dimensions_only(b, a.len(), "cosine_similarity.b")?;
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        na += *x as f64 * *x as f64;
        nb += *y as f64 * *y as f64;
    }
    if na == 0.0 || nb == 0.0 {
        return Err(ValidationError::ZeroVector {
            context: "cosine_similarity".to_string(),
        });
    }
    Ok((dot / (na.sqrt() * nb.sqrt())) as f32)
}

/// Euclidean distance with dimension validation on both operands.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32, ValidationError> {
    assert_dimensions_only(a, a.len(), "euclidean_distance.a")?;
    assert_dimensions_only(b, a.len(), "euclidean_distance.b")?;
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum();
    Ok(sum.sqrt() as f32)
}

/// A validated 1536-dimensional embedding.
///
/// The wrapper is proof the contract held at construction time. Contents
/// are copied in and copied out; the engine never hands out aliases to
/// stored vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Validates `values` as-is: dimension, finiteness, norm.
    pub fn new(values: Vec<f32>) -> Result<Self, ValidationError> {
        assert_dimensions(&values, EMBEDDING_DIMENSION, "Embedding::new")?;
        Ok(Self(values))
    }

    /// Converts an arbitrary numeric sequence into a validated embedding:
    /// checks dimension and finiteness, normalises, then asserts.
    pub fn normalized(mut values: Vec<f32>) -> Result<Self, ValidationError> {
        assert_dimensions_only(&values, EMBEDDING_DIMENSION, "Embedding::normalized")?;
        l2_normalize_in_place(&mut values, "Embedding::normalized")?;
        assert_dimensions(&values, EMBEDDING_DIMENSION, "Embedding::normalized")?;
        Ok(Self(values))
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIMENSION];
        v[axis] = 1.0;
        v
    }

    #[test]
    fn accepts_unit_vector() {
        assert!(assert_dimensions(&unit(0), EMBEDDING_DIMENSION, "t").is_ok());
    }

    #[test]
    fn rejects_short_and_long_vectors() {
        let short = vec![0.0; EMBEDDING_DIMENSION - 1];
        let long = vec![0.0; EMBEDDING_DIMENSION + 1];
        assert!(matches!(
            assert_dimensions(&short, EMBEDDING_DIMENSION, "t"),
            Err(ValidationError::DimensionMismatch {
                expected: EMBEDDING_DIMENSION,
                actual, ..
            }) if actual == EMBEDDING_DIMENSION - 1
        ));
        assert!(matches!(
            assert_dimensions(&long, EMBEDDING_DIMENSION, "t"),
            Err(ValidationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn rejects_zero_vector_as_not_normalised() {
        let zero = vec![0.0; EMBEDDING_DIMENSION];
        assert!(matches!(
            assert_dimensions(&zero, EMBEDDING_DIMENSION, "t"),
            Err(ValidationError::NotNormalised { .. })
        ));
    }

    #[test]
    fn reports_first_non_finite_position() {
        for pos in [0, EMBEDDING_DIMENSION - 1] {
            let mut v = unit(0);
            v[pos] = f32::NAN;
            match assert_dimensions(&v, EMBEDDING_DIMENSION, "t") {
                Err(ValidationError::InvalidValue { index, .. }) => assert_eq!(index, pos),
                other => panic!("expected InvalidValue, got {other:?}"),
            }
        }
        let mut v = unit(3);
        v[7] = f32::INFINITY;
        v[9] = f32::NEG_INFINITY;
        match assert_dimensions(&v, EMBEDDING_DIMENSION, "t") {
            Err(ValidationError::InvalidValue { index, .. }) => assert_eq!(index, 7),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        let zero = vec![0.0; EMBEDDING_DIMENSION];
        assert!(matches!(
            l2_normalize(&zero, "t"),
            Err(ValidationError::ZeroVector { .. })
        ));
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw: Vec<f32> = (0..EMBEDDING_DIMENSION).map(|i| (i as f32).sin()).collect();
        let once = l2_normalize(&raw, "t").unwrap();
        let twice = l2_normalize(&once, "t").unwrap();
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        assert!(is_l2_normalised(&once, NORM_TOLERANCE));
    }

    #[test]
    fn cosine_of_self_is_one() {
        let v = l2_normalize(&(0..EMBEDDING_DIMENSION).map(|i| (i as f32).cos()).collect::<Vec<_>>(), "t")
            .unwrap();
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_of_orthogonal_and_antipodal_units() {
        let a = unit(0);
        let b = unit(1);
        assert!(cosine_similarity(&a, &b).unwrap().abs() < 1e-5);
        let neg: Vec<f32> = a.iter().map(|v| -v).collect();
        assert!((cosine_similarity(&a, &neg).unwrap() + 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_equals_dot_for_normalised_inputs() {
        let a = l2_normalize(&(0..EMBEDDING_DIMENSION).map(|i| (i as f32 * 0.1).sin()).collect::<Vec<_>>(), "t").unwrap();
        let b = l2_normalize(&(0..EMBEDDING_DIMENSION).map(|i| (i as f32 * 0.3).cos()).collect::<Vec<_>>(), "t").unwrap();
        let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| *x as f64 * *y as f64).sum();
        let cos = cosine_similarity(&a, &b).unwrap() as f64;
        assert!((dot - cos).abs() <= 1e-6);
    }

    #[test]
    fn embedding_new_requires_normalised_input() {
        let raw: Vec<f32> = vec![2.0; EMBEDDING_DIMENSION];
        assert!(Embedding::new(raw.clone()).is_err());
        let embedding = Embedding::normalized(raw).unwrap();
        assert_eq!(embedding.dimension(), EMBEDDING_DIMENSION);
        assert!(is_l2_normalised(embedding.as_slice(), NORM_TOLERANCE));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn finite_vec() -> impl Strategy<Value = Vec<f32>> {
            prop::collection::vec(-1000.0f32..1000.0, EMBEDDING_DIMENSION..=EMBEDDING_DIMENSION)
        }

        proptest! {
            #[test]
            fn prop_normalized_embedding_passes_boundary_check(v in finite_vec()) {
                prop_assume!(l2_norm(&v) > 1e-3);
                let e = Embedding::normalized(v).unwrap();
                prop_assert!(assert_dimensions(e.as_slice(), EMBEDDING_DIMENSION, "p").is_ok());
            }

            #[test]
            fn prop_euclidean_triangle_inequality(
                a in finite_vec(),
                b in finite_vec(),
                c in finite_vec(),
            ) {
                let ab = euclidean_distance(&a, &b).unwrap() as f64;
                let bc = euclidean_distance(&b, &c).unwrap() as f64;
                let ac = euclidean_distance(&a, &c).unwrap() as f64;
                prop_assert!(ac <= ab + bc + 1e-3);
            }
        }
    }
}
