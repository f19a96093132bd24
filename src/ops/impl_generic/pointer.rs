//! Generic pointer-network attention implementation
//!
//! Shared by every backend.
//! Composes numr autograd primitives: matmul, broadcast, tanh, add, reshape.

use crate::error::{Error, Result};
use crate::nn::VisitMask;
use crate::ops::autograd_pointer::{var_contiguous, var_reshape_contiguous, var_tanh};
use numr::autograd::{Var, var_add, var_broadcast_to, var_matmul, var_mul_scalar, var_transpose};
use numr::dtype::DType;
use numr::ops::{ReduceOps, ScalarOps, TensorOps};
use numr::runtime::{Runtime, RuntimeClient};

fn check_3d(arg: &'static str, shape: &[usize]) -> Result<()> {
    if shape.len() != 3 {
        return Err(Error::InvalidArgument {
            arg,
            reason: format!("expected 3D [B, L, D], got {}D", shape.len()),
        });
    }
    Ok(())
}

fn check_pair(target: &[usize], source: &[usize]) -> Result<()> {
    check_3d("target", target)?;
    check_3d("source", source)?;
    if target[0] != source[0] || target[2] != source[2] {
        return Err(Error::InvalidArgument {
            arg: "source",
            reason: format!(
                "target is {:?} but source is {:?} (B and D must match)",
                target, source
            ),
        });
    }
    Ok(())
}

/// Bilinear score: `target @ source^T`
///
/// - `target`: `[B, T, D]`
/// - `source`: `[B, S, D]`
/// - Output: `[B, T, S]`
pub fn bilinear_score_impl<R, C>(client: &C, target: &Var<R>, source: &Var<R>) -> Result<Var<R>>
where
    R: Runtime,
    C: RuntimeClient<R> + TensorOps<R>,
    R::Client: TensorOps<R>,
{
    check_pair(target.shape(), source.shape())?;

    let source_t = var_transpose(source).map_err(Error::Numr)?;
    var_matmul(target, &source_t, client).map_err(Error::Numr)
}

/// Additive score: `u[b, t, s] = v · tanh(query[b, t] + reference[b, s])`
///
/// - `query`: `[B, T, D]` (already `W_q`-projected)
/// - `reference`: `[B, S, D]` (already `W_ref`-projected)
/// - `v`: `[D]`
/// - Output: `[B, T, S]`, or `clip * tanh(u)` when `clip` is non-zero
pub fn additive_score_impl<R, C>(
    client: &C,
    query: &Var<R>,
    reference: &Var<R>,
    v: &Var<R>,
    clip: Option<f64>,
) -> Result<Var<R>>
where
    R: Runtime<DType = DType>,
    C: RuntimeClient<R> + TensorOps<R> + ScalarOps<R>,
    R::Client: TensorOps<R> + ScalarOps<R> + ReduceOps<R>,
{
    check_pair(query.shape(), reference.shape())?;
    let (batch, tgt_len, dim) = (query.shape()[0], query.shape()[1], query.shape()[2]);
    let src_len = reference.shape()[1];

    if v.shape() != [dim].as_slice() {
        return Err(Error::InvalidArgument {
            arg: "v",
            reason: format!("expected [{dim}], got {:?}", v.shape()),
        });
    }

    // [B, T, 1, D] and [B, 1, S, D] → [B, T, S, D]
    let full = [batch, tgt_len, src_len, dim];
    let q = var_reshape_contiguous(query, &[batch, tgt_len, 1, dim])?;
    let q = var_broadcast_to(&q, &full).map_err(Error::Numr)?;
    let r = var_reshape_contiguous(reference, &[batch, 1, src_len, dim])?;
    let r = var_broadcast_to(&r, &full).map_err(Error::Numr)?;

    let hidden = var_add(&var_contiguous(&q), &var_contiguous(&r), client).map_err(Error::Numr)?;
    let hidden = var_tanh(&hidden, client)?;

    // [B, T*S, D] @ [D, 1] → [B, T*S, 1]
    let hidden = var_reshape_contiguous(&hidden, &[batch, tgt_len * src_len, dim])?;
    let v_col = var_reshape_contiguous(v, &[dim, 1])?;
    let u = var_matmul(&hidden, &v_col, client).map_err(Error::Numr)?;
    let u = var_reshape_contiguous(&u, &[batch, tgt_len, src_len])?;

    match clip {
        Some(c) if c != 0.0 => {
            let bounded = var_tanh(&u, client)?;
            var_mul_scalar(&bounded, c, client).map_err(Error::Numr)
        }
        _ => Ok(u),
    }
}

/// Pointer-network masking.
///
/// - `scores`: `[B, T, S]`
/// - `mask`: `[B, T, S]` or `None` (all open)
/// - `prev_idxs`: `[B]` positions chosen at the previous step
///
/// Returns the scores with every visited position at `-inf` and the
/// updated mask. The additive mask is built in the scores' dtype.
pub fn apply_visit_mask_impl<R, C>(
    client: &C,
    scores: &Var<R>,
    mask: Option<&VisitMask>,
    prev_idxs: Option<&[usize]>,
) -> Result<(Var<R>, VisitMask)>
where
    R: Runtime<DType = DType>,
    C: RuntimeClient<R> + TensorOps<R>,
    R::Client: TensorOps<R>,
{
    let shape = scores.shape();
    let base = match mask {
        Some(m) => {
            if m.shape().as_slice() != shape {
                return Err(Error::InvalidArgument {
                    arg: "mask",
                    reason: format!("mask is {:?} but scores are {:?}", m.shape(), shape),
                });
            }
            m.clone()
        }
        None => VisitMask::for_scores(shape)?,
    };
    let updated = match prev_idxs {
        Some(idxs) => base.visit(idxs)?,
        None => base,
    };

    let additive = updated.to_additive::<R>(scores.tensor().dtype(), scores.tensor().device())?;
    let additive = Var::new(additive, false);
    let masked = var_add(scores, &additive, client).map_err(Error::Numr)?;
    Ok((masked, updated))
}
