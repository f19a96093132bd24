//! Pointer-network attention layer.
//!
//! Scores a target (decoder state) against every source position, masks
//! positions that were already pointed at, and normalizes with a softmax
//! over the source axis. Three scoring functions are supported:
//!
//! - `dot`: `target @ source^T`
//! - `general`: `W_g(target) @ source^T`
//! - `RL`: `v · tanh(W_q(target) + W_ref(source))`, optionally clipped to
//!   `C * tanh(u)`
//!
//! A rank-2 target `[B, D]` is a single decoding step; a rank-3 target
//! `[B, T, D]` attends for every target row at once.

use crate::error::{Error, Result};
use crate::model::config::{AttentionConfig, AttentionKind, AttentionMode};
use crate::nn::conv1d::Conv1d;
use crate::nn::linear::Linear;
use crate::nn::module::{Module, StateDict};
use crate::nn::var_builder::VarBuilder;
use crate::nn::varmap::Init;
use crate::nn::visit_mask::VisitMask;
use crate::ops::autograd_pointer::var_reshape_contiguous;
use crate::ops::traits::PointerAttentionOps;
use numr::autograd::{Var, var_cat, var_matmul, var_softmax, var_transpose};
use numr::dtype::DType;
use numr::ops::{ConvOps, PaddingMode, RandomOps, ReduceOps, ScalarOps, TensorOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;
use std::collections::HashMap;

/// Result of one attention call.
pub struct AttentionOutput<R: Runtime> {
    /// `linear_out([weights @ source; target])`: `[B, D]` for one step,
    /// `[B, T, D]` for a full sequence. `None` for `RL` attention.
    pub context: Option<Var<R>>,
    /// `conv_proj(source^T)`: `[B, D, S]`. Only produced for a full sequence.
    pub source_projection: Option<Var<R>>,
    /// Attention weights: `[B, S]` for one step, `[B, T, S]` for a full sequence.
    pub weights: Var<R>,
    /// Mask to thread into the next step. In unmasked mode this is the
    /// incoming mask, untouched.
    pub mask: Option<VisitMask>,
}

impl<R: Runtime> AttentionOutput<R> {
    /// Primary hidden output: the source projection for a full sequence,
    /// otherwise the context.
    pub fn hidden(&self) -> Option<&Var<R>> {
        self.source_projection.as_ref().or(self.context.as_ref())
    }

    pub fn is_one_step(&self) -> bool {
        self.weights.shape().len() == 2
    }
}

enum Scorer<R: Runtime> {
    Dot,
    General {
        linear: Linear<R>,
    },
    Additive {
        w_ref: Linear<R>,
        w_q: Linear<R>,
        v: Var<R>,
    },
}

/// Pointer-network attention.
///
/// Parameters (by state-dict name):
/// - `linear_out.weight`: `[D, 2D]`
/// - `conv_proj.weight` / `conv_proj.bias`: `[D, D, 1]` / `[D]`
/// - `general`: `linear.weight` `[D, D]`
/// - `RL`: `W_ref.weight`, `W_q.weight` `[D, D]` and `v` `[D]`
pub struct Attention<R: Runtime> {
    kind: AttentionKind,
    dim: usize,
    batch_size: Option<usize>,
    clip: Option<f64>,
    scorer: Scorer<R>,
    linear_out: Linear<R>,
    conv_proj: Conv1d<R>,
}

impl<R: Runtime<DType = DType>> Attention<R> {
    /// Build a freshly initialized layer.
    ///
    /// Linear and convolution parameters are `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`;
    /// `v` is `U(-1/sqrt(dim), 1/sqrt(dim))`. Fails with
    /// [`Error::UnsupportedAttention`] for an unknown `attn_type`.
    pub fn new<C>(client: &C, device: &R::Device, config: &AttentionConfig) -> Result<Self>
    where
        C: RuntimeClient<R> + RandomOps<R> + ScalarOps<R>,
    {
        config.validate()?;
        let kind = config.kind()?;
        let dim = config.dim;
        let init = Init::PyTorchLinear;

        let scorer = match kind {
            AttentionKind::Dot => Scorer::Dot,
            AttentionKind::General => Scorer::General {
                linear: Linear::from_init(client, device, dim, dim, false, init)?,
            },
            AttentionKind::Rl => {
                let v_bound = 1.0 / (dim as f32).sqrt();
                let v = Init::Uniform(v_bound).materialize(client, device, &[dim], dim)?;
                Scorer::Additive {
                    w_ref: Linear::from_init(client, device, dim, dim, false, init)?,
                    w_q: Linear::from_init(client, device, dim, dim, false, init)?,
                    v: Var::new(v, true),
                }
            }
        };
        let linear_out = Linear::from_init(client, device, 2 * dim, dim, false, init)?;
        let conv_proj = Conv1d::pointwise(client, device, dim, dim, init)?;

        tracing::debug!(
            attn_type = %kind,
            dim,
            batch_size = ?config.batch_size,
            clip = ?config.effective_clip(),
            "built pointer attention"
        );

        Ok(Self {
            kind,
            dim,
            batch_size: config.batch_size,
            clip: config.effective_clip(),
            scorer,
            linear_out,
            conv_proj,
        })
    }

    /// Load a layer from named weights, validating every shape.
    pub fn from_varbuilder(
        vb: &mut VarBuilder<R>,
        config: &AttentionConfig,
        trainable: bool,
    ) -> Result<Self> {
        config.validate()?;
        let kind = config.kind()?;
        let dim = config.dim;

        let scorer = match kind {
            AttentionKind::Dot => Scorer::Dot,
            AttentionKind::General => Scorer::General {
                linear: Linear::new(
                    vb.take_with_shape("linear.weight", &[dim, dim])?,
                    None,
                    trainable,
                ),
            },
            AttentionKind::Rl => Scorer::Additive {
                w_ref: Linear::new(
                    vb.take_with_shape("W_ref.weight", &[dim, dim])?,
                    None,
                    trainable,
                ),
                w_q: Linear::new(
                    vb.take_with_shape("W_q.weight", &[dim, dim])?,
                    None,
                    trainable,
                ),
                v: Var::new(vb.take_with_shape("v", &[dim])?, trainable),
            },
        };
        let linear_out = Linear::new(
            vb.take_with_shape("linear_out.weight", &[dim, 2 * dim])?,
            None,
            trainable,
        );
        let conv_proj = Conv1d::new(
            vb.take_with_shape("conv_proj.weight", &[dim, dim, 1])?,
            Some(vb.take_with_shape("conv_proj.bias", &[dim])?),
            1,
            PaddingMode::Valid,
            1,
            1,
            trainable,
        );

        tracing::debug!(attn_type = %kind, dim, prefix = vb.prefix(), "loaded pointer attention");

        Ok(Self {
            kind,
            dim,
            batch_size: config.batch_size,
            clip: config.effective_clip(),
            scorer,
            linear_out,
            conv_proj,
        })
    }

    pub fn kind(&self) -> AttentionKind {
        self.kind
    }

    pub fn clip(&self) -> Option<f64> {
        self.clip
    }

    /// Alignment scores `[B, T, S]` for source `[B, S, D]` and target `[B, T, D]`.
    pub fn score<C>(&self, client: &C, source: &Var<R>, target: &Var<R>) -> Result<Var<R>>
    where
        C: RuntimeClient<R> + TensorOps<R> + PointerAttentionOps<R>,
        R::Client: TensorOps<R>,
    {
        match &self.scorer {
            Scorer::Dot => client.bilinear_score(target, source),
            Scorer::General { linear } => {
                let projected = linear.forward(client, target)?;
                client.bilinear_score(&projected, source)
            }
            Scorer::Additive { w_ref, w_q, v } => {
                let query = w_q.forward(client, target)?;
                let reference = w_ref.forward(client, source)?;
                client.additive_score(&query, &reference, v, self.clip)
            }
        }
    }

    /// One attention call.
    ///
    /// - `source`: `[B, S, D]`
    /// - `target`: `[B, D]` (one decoding step) or `[B, T, D]` (full sequence)
    /// - `mask`: mask returned by the previous step, or `None` to start fresh
    /// - `prev_idxs`: position chosen per batch element at the previous step
    ///
    /// In [`AttentionMode::Masked`] every visited position gets weight 0.
    /// A row with every position visited yields NaN weights.
    ///
    /// One-step outputs are always `[B, S]` weights and a `[B, D]` context,
    /// including `B = 1` or `S = 1`. `target` may be a strided view, such as
    /// a broadcast start vector.
    pub fn forward<C>(
        &self,
        client: &C,
        source: &Var<R>,
        target: &Var<R>,
        mask: Option<&VisitMask>,
        prev_idxs: Option<&[usize]>,
        mode: AttentionMode,
    ) -> Result<AttentionOutput<R>>
    where
        C: RuntimeClient<R>
            + TensorOps<R>
            + ScalarOps<R>
            + ReduceOps<R>
            + ConvOps<R>
            + PointerAttentionOps<R>,
        R::Client: TensorOps<R> + ScalarOps<R> + ReduceOps<R> + ConvOps<R>,
    {
        let (batch, src_len) = self.check_source(source)?;
        if target.tensor().dtype() != source.tensor().dtype() {
            return Err(Error::InvalidArgument {
                arg: "target",
                reason: format!(
                    "dtype {:?} does not match source dtype {:?}",
                    target.tensor().dtype(),
                    source.tensor().dtype()
                ),
            });
        }
        let one_step = match target.shape() {
            [b, d] if *b == batch && *d == self.dim => true,
            [b, _, d] if *b == batch && *d == self.dim => false,
            shape => {
                return Err(Error::InvalidArgument {
                    arg: "target",
                    reason: format!(
                        "expected [{batch}, {dim}] or [{batch}, T, {dim}], got {shape:?}",
                        dim = self.dim
                    ),
                });
            }
        };
        let target = if one_step {
            var_reshape_contiguous(target, &[batch, 1, self.dim])?
        } else {
            target.clone()
        };
        let tgt_len = target.shape()[1];

        let scores = self.score(client, source, &target)?;
        let (scores, mask) = match mode {
            AttentionMode::Masked => {
                let (masked, updated) = client.apply_visit_mask(&scores, mask, prev_idxs)?;
                (masked, Some(updated))
            }
            AttentionMode::Unmasked => (scores, mask.cloned()),
        };
        let weights = var_softmax(&scores, -1, client).map_err(Error::Numr)?;

        let context = if self.kind.has_context() {
            // [B, T, S] @ [B, S, D] → [B, T, D]; concat with target → [B, T, 2D]
            let attended = var_matmul(&weights, source, client).map_err(Error::Numr)?;
            let combined = var_cat(&[&attended, &target], 2, client).map_err(Error::Numr)?;
            Some(self.linear_out.forward(client, &combined)?)
        } else {
            None
        };

        tracing::trace!(
            attn_type = %self.kind,
            batch,
            src_len,
            tgt_len,
            ?mode,
            masked = ?mask.as_ref().map(|m| (0..batch).map(|b| m.masked_count(b)).sum::<usize>()),
            "pointer attention step"
        );

        if one_step {
            let weights = var_reshape_contiguous(&weights, &[batch, src_len])?;
            let context = context
                .map(|c| var_reshape_contiguous(&c, &[batch, self.dim]))
                .transpose()?;
            Ok(AttentionOutput {
                context,
                source_projection: None,
                weights,
                mask,
            })
        } else {
            let source_t = var_transpose(source).map_err(Error::Numr)?;
            let projection = self.conv_proj.forward(client, &source_t)?;
            Ok(AttentionOutput {
                context,
                source_projection: Some(projection),
                weights,
                mask,
            })
        }
    }

    fn check_source(&self, source: &Var<R>) -> Result<(usize, usize)> {
        let (batch, src_len) = match source.shape() {
            [b, s, d] if *d == self.dim => (*b, *s),
            shape => {
                return Err(Error::InvalidArgument {
                    arg: "source",
                    reason: format!("expected [B, S, {}], got {:?}", self.dim, shape),
                });
            }
        };
        if let Some(expected) = self.batch_size {
            if batch != expected {
                return Err(Error::InvalidArgument {
                    arg: "source",
                    reason: format!("layer configured for batch_size={expected}, got {batch}"),
                });
            }
        }
        Ok((batch, src_len))
    }
}

impl<R: Runtime> Attention<R> {
    pub fn dim(&self) -> usize {
        self.dim
    }
}

impl<R: Runtime> Module<R> for Attention<R> {
    fn parameters(&self) -> Vec<&Var<R>> {
        self.named_parameters().into_iter().map(|(_, v)| v).collect()
    }

    fn named_parameters(&self) -> Vec<(String, &Var<R>)> {
        let mut params = Vec::new();
        match &self.scorer {
            Scorer::Dot => {}
            Scorer::General { linear } => {
                params.push(("linear.weight".to_string(), linear.weight()));
            }
            Scorer::Additive { w_ref, w_q, v } => {
                params.push(("W_ref.weight".to_string(), w_ref.weight()));
                params.push(("W_q.weight".to_string(), w_q.weight()));
                params.push(("v".to_string(), v));
            }
        }
        params.push(("linear_out.weight".to_string(), self.linear_out.weight()));
        params.push(("conv_proj.weight".to_string(), self.conv_proj.weight()));
        if let Some(bias) = self.conv_proj.bias() {
            params.push(("conv_proj.bias".to_string(), bias));
        }
        params
    }
}

impl<R: Runtime> StateDict<R> for Attention<R> {
    fn load_state_dict(&mut self, state: &HashMap<String, Tensor<R>>) -> Result<()> {
        let dim = self.dim;
        let lookup = |name: &str, shape: &[usize]| -> Result<Tensor<R>> {
            let t = state.get(name).ok_or_else(|| Error::ModelError {
                reason: format!("missing key '{name}' in attention state"),
            })?;
            if t.shape() != shape {
                return Err(Error::ModelError {
                    reason: format!(
                        "shape mismatch for '{name}': expected {shape:?}, got {:?}",
                        t.shape()
                    ),
                });
            }
            Ok(t.clone())
        };

        let trainable = self.linear_out.weight().requires_grad();
        let scorer = match &self.scorer {
            Scorer::Dot => Scorer::Dot,
            Scorer::General { .. } => Scorer::General {
                linear: Linear::new(lookup("linear.weight", &[dim, dim])?, None, trainable),
            },
            Scorer::Additive { .. } => Scorer::Additive {
                w_ref: Linear::new(lookup("W_ref.weight", &[dim, dim])?, None, trainable),
                w_q: Linear::new(lookup("W_q.weight", &[dim, dim])?, None, trainable),
                v: Var::new(lookup("v", &[dim])?, trainable),
            },
        };
        let linear_out = Linear::new(lookup("linear_out.weight", &[dim, 2 * dim])?, None, trainable);
        let conv_proj = Conv1d::new(
            lookup("conv_proj.weight", &[dim, dim, 1])?,
            Some(lookup("conv_proj.bias", &[dim])?),
            1,
            PaddingMode::Valid,
            1,
            1,
            trainable,
        );

        self.scorer = scorer;
        self.linear_out = linear_out;
        self.conv_proj = conv_proj;
        Ok(())
    }
}
