//! Distance kernels for the supported metrics.
//!
//! These routines sit on the hot path of every traversal. Dimension and
//! finiteness validation happens once at the API boundary (ingestion or query
//! preparation), so the kernels themselves assume equal-length, finite inputs
//! and stay branch-free apart from the closed metric dispatch resolved at the
//! start of each build or search.

use crate::config::DistanceKind;

/// Squared Euclidean distance. The square root is skipped because only the
/// relative order of results matters.
#[inline]
pub(crate) fn squared_l2(left: &[f32], right: &[f32]) -> f32 {
    debug_assert_eq!(left.len(), right.len());
    left.iter()
        .zip(right.iter())
        .map(|(&l, &r)| {
            let diff = l - r;
            diff * diff
        })
        .sum()
}

/// Inner product of two vectors.
#[inline]
pub(crate) fn dot(left: &[f32], right: &[f32]) -> f32 {
    debug_assert_eq!(left.len(), right.len());
    left.iter().zip(right.iter()).map(|(&l, &r)| l * r).sum()
}

/// `1 - cosine_similarity`, using pre-computed L2 norms so magnitude is never
/// recomputed per comparison. Numerical noise can push the similarity just
/// outside `[-1, 1]`, so it is clamped before the subtraction.
#[inline]
pub(crate) fn angular(left: &[f32], right: &[f32], left_norm: f32, right_norm: f32) -> f32 {
    let similarity = (dot(left, right) / (left_norm * right_norm)).clamp(-1.0, 1.0);
    1.0 - similarity
}

/// Computes the L2 norm of a vector, accumulating in `f64` for stability.
#[inline]
pub(crate) fn l2_norm(values: &[f32]) -> f32 {
    let sum: f64 = values.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
    sum.sqrt() as f32
}

/// Evaluates the configured metric for a pair of vectors with their cached
/// norms. Norms are ignored for every metric except [`DistanceKind::Angular`].
#[inline]
pub(crate) fn evaluate(
    kind: DistanceKind,
    left: &[f32],
    right: &[f32],
    left_norm: f32,
    right_norm: f32,
) -> f32 {
    match kind {
        DistanceKind::L2 => squared_l2(left, right),
        DistanceKind::Angular => angular(left, right, left_norm, right_norm),
        DistanceKind::Dot => -dot(left, right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const TOLERANCE: f32 = 1e-6;

    #[test]
    fn squared_l2_matches_hand_computation() {
        let d = squared_l2(&[1.0, 2.0, 3.0], &[4.0, 6.0, 8.0]);
        assert!((d - 50.0).abs() < TOLERANCE);
    }

    #[test]
    fn squared_l2_is_zero_on_identical_inputs() {
        let v = [0.25, -1.5, 3.0];
        assert!(squared_l2(&v, &v).abs() < TOLERANCE);
    }

    #[test]
    fn angular_self_distance_is_zero_for_unit_vectors() {
        let v = [0.6, 0.8];
        let norm = l2_norm(&v);
        assert!((norm - 1.0).abs() < TOLERANCE);
        assert!(angular(&v, &v, norm, norm).abs() < TOLERANCE);
    }

    #[test]
    fn angular_orthogonal_vectors_are_at_distance_one() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        let d = angular(&a, &b, l2_norm(&a), l2_norm(&b));
        assert!((d - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn dot_distance_decreases_as_inner_product_increases() {
        let query = [1.0, 1.0];
        let weak = [0.1, 0.1];
        let strong = [2.0, 2.0];
        let d_weak = evaluate(DistanceKind::Dot, &query, &weak, 0.0, 0.0);
        let d_strong = evaluate(DistanceKind::Dot, &query, &strong, 0.0, 0.0);
        assert!(
            d_strong < d_weak,
            "larger inner product must produce a smaller (more negative) distance"
        );
    }

    #[rstest]
    #[case(DistanceKind::L2)]
    #[case(DistanceKind::Angular)]
    fn evaluated_metrics_are_symmetric(#[case] kind: DistanceKind) {
        let a = [0.3, -0.7, 0.2];
        let b = [1.1, 0.4, -0.9];
        let (na, nb) = (l2_norm(&a), l2_norm(&b));
        let ab = evaluate(kind, &a, &b, na, nb);
        let ba = evaluate(kind, &b, &a, nb, na);
        assert!((ab - ba).abs() < TOLERANCE);
    }
}
