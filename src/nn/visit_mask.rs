//! Cumulative visit mask for pointer-network decoding.

use crate::error::{Error, Result};
use numr::dtype::DType;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Source positions that may no longer be pointed at.
///
/// Layout: `[batch, rows, source_len]`, matching the score tensor it masks.
/// `rows` is 1 for one-step decoding and `target_len` in full-sequence mode.
///
/// The mask is a value: [`VisitMask::visit`] returns a new mask and never
/// modifies `self`, so a decoder threads the returned mask into the next
/// step. Positions only ever go from unmasked to masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitMask {
    batch: usize,
    rows: usize,
    source_len: usize,
    visited: Vec<bool>,
}

impl VisitMask {
    /// All-false mask of shape `[batch, rows, source_len]`.
    pub fn new(batch: usize, rows: usize, source_len: usize) -> Self {
        Self {
            batch,
            rows,
            source_len,
            visited: vec![false; batch * rows * source_len],
        }
    }

    /// All-false mask matching a 3D score shape.
    pub fn for_scores(shape: &[usize]) -> Result<Self> {
        match shape {
            [b, r, s] => Ok(Self::new(*b, *r, *s)),
            _ => Err(Error::InvalidArgument {
                arg: "scores",
                reason: format!("expected 3D [B, T, S], got {}D", shape.len()),
            }),
        }
    }

    /// `[batch, rows, source_len]`
    pub fn shape(&self) -> [usize; 3] {
        [self.batch, self.rows, self.source_len]
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Mark `prev_idxs[b]` as visited in every row of batch element `b`.
    pub fn visit(&self, prev_idxs: &[usize]) -> Result<Self> {
        if prev_idxs.len() != self.batch {
            return Err(Error::InvalidArgument {
                arg: "prev_idxs",
                reason: format!(
                    "expected {} indices (one per batch element), got {}",
                    self.batch,
                    prev_idxs.len()
                ),
            });
        }
        if let Some(&idx) = prev_idxs.iter().find(|&&i| i >= self.source_len) {
            return Err(Error::InvalidArgument {
                arg: "prev_idxs",
                reason: format!("index {idx} out of range for source_len {}", self.source_len),
            });
        }

        let mut next = self.clone();
        for (b, &idx) in prev_idxs.iter().enumerate() {
            for r in 0..self.rows {
                next.visited[self.offset(b, r, idx)] = true;
            }
        }
        Ok(next)
    }

    pub fn is_masked(&self, batch: usize, row: usize, pos: usize) -> bool {
        self.visited[self.offset(batch, row, pos)]
    }

    /// Masked positions in row 0 of batch element `batch`.
    pub fn masked_positions(&self, batch: usize) -> Vec<usize> {
        (0..self.source_len)
            .filter(|&s| self.is_masked(batch, 0, s))
            .collect()
    }

    /// Number of masked positions in row 0 of batch element `batch`.
    pub fn masked_count(&self, batch: usize) -> usize {
        self.masked_positions(batch).len()
    }

    /// True if some row has no position left to point at.
    pub fn has_exhausted_row(&self) -> bool {
        self.source_len > 0
            && self
                .visited
                .chunks(self.source_len)
                .any(|row| row.iter().all(|&v| v))
    }

    /// Additive form in `dtype`: `0.0` for open positions, `-inf` for masked ones.
    ///
    /// Only F32 and F64 are supported, since `-inf` has no integer form.
    pub fn to_additive<R: Runtime<DType = DType>>(
        &self,
        dtype: DType,
        device: &R::Device,
    ) -> Result<Tensor<R>> {
        let shape = self.shape();
        match dtype {
            DType::F32 => {
                let data: Vec<f32> = self
                    .visited
                    .iter()
                    .map(|&v| if v { f32::NEG_INFINITY } else { 0.0 })
                    .collect();
                Ok(Tensor::<R>::from_slice(&data, &shape, device))
            }
            DType::F64 => {
                let data: Vec<f64> = self
                    .visited
                    .iter()
                    .map(|&v| if v { f64::NEG_INFINITY } else { 0.0 })
                    .collect();
                Ok(Tensor::<R>::from_slice(&data, &shape, device))
            }
            other => Err(Error::InvalidArgument {
                arg: "scores",
                reason: format!("visit masks support F32 and F64 scores, got {other:?}"),
            }),
        }
    }

    fn offset(&self, batch: usize, row: usize, pos: usize) -> usize {
        (batch * self.rows + row) * self.source_len + pos
    }
}
