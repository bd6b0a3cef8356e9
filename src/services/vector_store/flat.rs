//! Exact inner-product index over a dense row-major matrix.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::VectorStoreError;

/// Vectors stored as rows of an `n x d` matrix, searched by brute-force dot
/// product. Callers normalize rows and queries, making the score a cosine.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    vectors: Array2<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: Array2::zeros((0, dimension)),
        }
    }

    /// Rebuild from row-major data as read back from disk.
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self, VectorStoreError> {
        if dimension == 0 {
            return Err(VectorStoreError::CorruptIndex(
                "index dimension is zero".to_string(),
            ));
        }
        if data.len() % dimension != 0 {
            return Err(VectorStoreError::CorruptIndex(format!(
                "vector data length {} is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }
        let rows = data.len() / dimension;
        let vectors = Array2::from_shape_vec((rows, dimension), data)
            .map_err(|e| VectorStoreError::CorruptIndex(e.to_string()))?;
        Ok(Self { vectors })
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major copy of every stored value.
    pub fn to_raw(&self) -> Vec<f32> {
        self.vectors.iter().copied().collect()
    }

    /// Append rows to the end of the index.
    pub fn add(&mut self, batch: ArrayView2<'_, f32>) -> Result<(), VectorStoreError> {
        if batch.ncols() != self.dimension() {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension(),
                actual: batch.ncols(),
            });
        }
        self.vectors
            .append(Axis(0), batch)
            .map_err(|e| VectorStoreError::InvalidInput(e.to_string()))
    }

    /// Keep only rows whose flag in `keep` is true, preserving order.
    pub fn retain(&mut self, keep: &[bool]) {
        let rows: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();
        self.vectors = self.vectors.select(Axis(0), &rows);
    }

    /// The `k` rows with the highest dot product against `query`, best first.
    /// Ties are broken by insertion order.
    pub fn search(&self, query: ArrayView1<'_, f32>, k: usize) -> Vec<(usize, f32)> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }

        let scores = self.vectors.dot(&query);
        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();

        let by_score = |a: &(usize, f32), b: &(usize, f32)| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0));
        if k < ranked.len() {
            ranked.select_nth_unstable_by(k, by_score);
            ranked.truncate(k);
        }
        ranked.sort_by(by_score);
        ranked
    }
}
