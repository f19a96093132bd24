//! Pointer-network attention operations trait

use crate::error::Result;
use crate::nn::VisitMask;
use numr::autograd::Var;
use numr::runtime::Runtime;

/// Scoring and masking primitives for pointer-network attention.
///
/// Composite ops composed from numr primitives. Uses `Var<R>` so the same
/// code path serves training and inference.
///
/// # Layout contract
///
/// - `target` / `query`: `[B, T, D]`
/// - `source` / `reference`: `[B, S, D]`
/// - scores: `[B, T, S]`
/// - `v`: `[D]`
pub trait PointerAttentionOps<R: Runtime> {
    /// Bilinear score: `target @ source^T` → `[B, T, S]`
    fn bilinear_score(&self, target: &Var<R>, source: &Var<R>) -> Result<Var<R>>;

    /// Additive (Bello) score: `u = v · tanh(query + reference)` → `[B, T, S]`
    ///
    /// `query` and `reference` are already projected. With `clip = Some(c)`
    /// and `c != 0` the result is `c * tanh(u)`, bounded to `[-c, c]`.
    fn additive_score(
        &self,
        query: &Var<R>,
        reference: &Var<R>,
        v: &Var<R>,
        clip: Option<f64>,
    ) -> Result<Var<R>>;

    /// Mark `prev_idxs` as visited and push visited positions to `-inf`.
    ///
    /// Starts from an all-open mask when `mask` is `None`. Returns the masked
    /// scores together with the updated mask; `mask` itself is not modified.
    fn apply_visit_mask(
        &self,
        scores: &Var<R>,
        mask: Option<&VisitMask>,
        prev_idxs: Option<&[usize]>,
    ) -> Result<(Var<R>, VisitMask)>;
}
