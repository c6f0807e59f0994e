//! Vector storage backing the index.
//!
//! Owns the raw vector data exactly once in a flat `f32` arena; every graph
//! node refers to its vector by dense integer id. Angular indexes cache one
//! L2 norm per vector at ingestion so magnitudes are never recomputed during
//! traversal.

use crate::{
    config::DistanceKind,
    distance,
    error::{IndexError, Result},
};

/// Flat arena of fixed-dimension vectors plus cached norms.
#[derive(Clone, Debug)]
pub(crate) struct VectorStore {
    kind: DistanceKind,
    dim: usize,
    data: Vec<f32>,
    norms: Vec<f32>,
}

impl VectorStore {
    pub(crate) fn new(dim: usize, kind: DistanceKind) -> Result<Self> {
        if dim == 0 {
            return Err(IndexError::InvalidConfig {
                reason: "vector dimension must be greater than zero".into(),
            });
        }
        Ok(Self {
            kind,
            dim,
            data: Vec::new(),
            norms: Vec::new(),
        })
    }

    /// Validates and appends a vector, returning its dense id.
    ///
    /// Rejects wrong-dimension and non-finite input before any mutation, and
    /// zero-magnitude vectors when the metric is angular.
    pub(crate) fn push(&mut self, values: &[f32]) -> Result<usize> {
        validate_vector(values, self.dim)?;
        let norm = distance::l2_norm(values);
        if self.kind == DistanceKind::Angular && norm == 0.0 {
            return Err(IndexError::ZeroMagnitude);
        }
        let id = self.len();
        self.data.extend_from_slice(values);
        self.norms.push(norm);
        Ok(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len() / self.dim.max(1)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn dim(&self) -> usize {
        self.dim
    }

    pub(crate) fn kind(&self) -> DistanceKind {
        self.kind
    }

    pub(crate) fn vector(&self, id: usize) -> &[f32] {
        let start = id * self.dim;
        &self.data[start..start + self.dim]
    }

    pub(crate) fn norm(&self, id: usize) -> f32 {
        self.norms[id]
    }

    pub(crate) fn raw_data(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn raw_norms(&self) -> &[f32] {
        &self.norms
    }

    /// Distance between two stored vectors under the configured metric.
    #[inline]
    pub(crate) fn distance(&self, left: usize, right: usize) -> f32 {
        distance::evaluate(
            self.kind,
            self.vector(left),
            self.vector(right),
            self.norm(left),
            self.norm(right),
        )
    }

    /// Distance from an external prepared query to a stored vector.
    #[inline]
    pub(crate) fn distance_to(&self, query: &PreparedQuery<'_>, id: usize) -> f32 {
        distance::evaluate(
            self.kind,
            query.values,
            self.vector(id),
            query.norm,
            self.norm(id),
        )
    }

    /// Validates an external query against the index dimension and computes
    /// its norm once.
    pub(crate) fn prepare_query<'q>(&self, values: &'q [f32]) -> Result<PreparedQuery<'q>> {
        prepare_query(values, self.dim)
    }
}

/// Query vector validated against the index dimension, with its norm computed
/// exactly once.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PreparedQuery<'q> {
    pub(crate) values: &'q [f32],
    pub(crate) norm: f32,
}

pub(crate) fn prepare_query<'q>(values: &'q [f32], dim: usize) -> Result<PreparedQuery<'q>> {
    validate_vector(values, dim)?;
    Ok(PreparedQuery {
        values,
        norm: distance::l2_norm(values),
    })
}

fn validate_vector(values: &[f32], dim: usize) -> Result<()> {
    if values.len() != dim {
        return Err(IndexError::DimensionMismatch {
            expected: dim,
            got: values.len(),
        });
    }
    for (component, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            return Err(IndexError::NonFiniteValue { component, value });
        }
    }
    Ok(())
}
