//! Greedy pointer decoding.
//!
//! Runs the attention layer one step at a time. Each step points at the
//! most probable unvisited source position, feeds that position's encoding
//! back as the next target and masks it for every later step.

use crate::error::{Error, Result};
use crate::model::config::{AttentionConfig, AttentionMode};
use crate::model::traits::PointerClient;
use crate::nn::{Attention, Init, Module, StateDict, VarBuilder, VisitMask};
use crate::ops::autograd_pointer::{var_contiguous, var_reshape_contiguous};
use numr::autograd::{Var, var_broadcast_to, var_gather};
use numr::dtype::DType;
use numr::ops::{RandomOps, ScalarOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;
use std::collections::HashMap;

/// Result of [`PointerDecoder::greedy_decode`].
pub struct DecodeOutput<R: Runtime> {
    /// Chosen source positions, one sequence per batch element.
    pub tours: Vec<Vec<usize>>,
    /// Attention weights `[B, S]` of every step, in order.
    pub step_weights: Vec<Var<R>>,
    /// Mask with every chosen position visited.
    pub mask: VisitMask,
}

impl<R: Runtime<DType = DType>> DecodeOutput<R> {
    /// Probability assigned to each choice: `[batch][step]`.
    pub fn selected_probs(&self) -> Result<Vec<Vec<f64>>> {
        let mut probs = vec![Vec::with_capacity(self.step_weights.len()); self.tours.len()];
        for (step, weights) in self.step_weights.iter().enumerate() {
            let src_len = weights.shape()[1];
            let data = host_values(weights.tensor())?;
            for (b, tour) in self.tours.iter().enumerate() {
                probs[b].push(data[b * src_len + tour[step]]);
            }
        }
        Ok(probs)
    }

    pub fn steps(&self) -> usize {
        self.step_weights.len()
    }
}

/// Attention layer plus a learned start vector `[D]` used as the first target.
pub struct PointerDecoder<R: Runtime> {
    attention: Attention<R>,
    start: Var<R>,
}

impl<R: Runtime<DType = DType>> PointerDecoder<R> {
    /// Freshly initialized decoder; `start` is `U(-1/sqrt(dim), 1/sqrt(dim))`.
    pub fn new<C>(client: &C, device: &R::Device, config: &AttentionConfig) -> Result<Self>
    where
        C: RuntimeClient<R> + RandomOps<R> + ScalarOps<R>,
    {
        let attention = Attention::new(client, device, config)?;
        let start = Init::PyTorchLinear.materialize(client, device, &[config.dim], config.dim)?;
        Self::from_parts(attention, start, true)
    }

    /// Assemble from an attention layer and a `[dim]` start vector.
    pub fn from_parts(attention: Attention<R>, start: Tensor<R>, trainable: bool) -> Result<Self> {
        if start.shape() != [attention.dim()].as_slice() {
            return Err(Error::ModelError {
                reason: format!(
                    "start vector must be [{}], got {:?}",
                    attention.dim(),
                    start.shape()
                ),
            });
        }
        Ok(Self {
            attention,
            start: Var::new(start, trainable),
        })
    }

    /// Decode `steps` positions greedily.
    ///
    /// - `source`: `[B, S, D]` encoder outputs, same dtype as the parameters
    /// - `steps`: number of positions to choose, `1..=S`
    pub fn greedy_decode<C>(
        &self,
        client: &C,
        source: &Var<R>,
        steps: usize,
    ) -> Result<DecodeOutput<R>>
    where
        C: PointerClient<R>,
        R::Client: PointerClient<R>,
    {
        let dim = self.attention.dim();
        let (batch, src_len) = match source.shape() {
            [b, s, d] if *d == dim => (*b, *s),
            shape => {
                return Err(Error::InvalidArgument {
                    arg: "source",
                    reason: format!("expected [B, S, {dim}], got {shape:?}"),
                });
            }
        };
        if steps == 0 || steps > src_len {
            return Err(Error::InvalidArgument {
                arg: "steps",
                reason: format!("must be in 1..={src_len}, got {steps}"),
            });
        }

        tracing::debug!(batch, src_len, steps, attn_type = %self.attention.kind(), "greedy decode");

        let start = var_reshape_contiguous(&self.start, &[1, dim])?;
        let start = var_broadcast_to(&start, &[batch, dim]).map_err(Error::Numr)?;
        let mut target = var_contiguous(&start);
        let mut mask: Option<VisitMask> = None;
        let mut prev: Option<Vec<usize>> = None;
        let mut tours = vec![Vec::with_capacity(steps); batch];
        let mut step_weights = Vec::with_capacity(steps);

        for step in 0..steps {
            let out = self.attention.forward(
                client,
                source,
                &target,
                mask.as_ref(),
                prev.as_deref(),
                AttentionMode::Masked,
            )?;
            let updated = out.mask.ok_or_else(|| Error::ModelError {
                reason: "masked attention returned no mask".into(),
            })?;

            let probs = host_values(out.weights.tensor())?;
            let chosen = (0..batch)
                .map(|b| pick_open(&probs[b * src_len..(b + 1) * src_len], &updated, b))
                .collect::<Result<Vec<usize>>>()?;
            tracing::trace!(step, ?chosen, "pointer step");

            for (tour, &idx) in tours.iter_mut().zip(chosen.iter()) {
                tour.push(idx);
            }
            target = gather_rows(client, source, &chosen)?;
            step_weights.push(out.weights);
            mask = Some(updated);
            prev = Some(chosen);
        }

        let mask = match (mask, prev) {
            (Some(m), Some(last)) => m.visit(&last)?,
            _ => VisitMask::new(batch, 1, src_len),
        };

        Ok(DecodeOutput {
            tours,
            step_weights,
            mask,
        })
    }

    /// Load `start` and `attention.*` weights.
    pub fn from_varbuilder(
        vb: &mut VarBuilder<R>,
        config: &AttentionConfig,
        trainable: bool,
    ) -> Result<Self> {
        let start = vb.take_with_shape("start", &[config.dim])?;
        let attention = {
            let mut sub = vb.pp("attention");
            Attention::from_varbuilder(&mut sub, config, trainable)?
        };
        Self::from_parts(attention, start, trainable)
    }

    pub fn attention(&self) -> &Attention<R> {
        &self.attention
    }

    pub fn start(&self) -> &Var<R> {
        &self.start
    }
}

/// Host copy of a float tensor, widened to f64.
fn host_values<R: Runtime<DType = DType>>(t: &Tensor<R>) -> Result<Vec<f64>> {
    let t = t.contiguous();
    match t.dtype() {
        DType::F32 => Ok(t.to_vec::<f32>().into_iter().map(f64::from).collect()),
        DType::F64 => Ok(t.to_vec::<f64>()),
        other => Err(Error::InvalidArgument {
            arg: "weights",
            reason: format!("expected F32 or F64 attention weights, got {other:?}"),
        }),
    }
}

/// Most probable position of `row` that is still open in `mask`.
fn pick_open(row: &[f64], mask: &VisitMask, batch: usize) -> Result<usize> {
    row.iter()
        .enumerate()
        .filter(|&(s, p)| !mask.is_masked(batch, 0, s) && !p.is_nan())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(s, _)| s)
        .ok_or_else(|| Error::ModelError {
            reason: format!("batch element {batch} has no unvisited position left"),
        })
}

/// `source[b, idxs[b], :]` for every `b` → `[B, D]`
fn gather_rows<R, C>(client: &C, source: &Var<R>, idxs: &[usize]) -> Result<Var<R>>
where
    R: Runtime<DType = DType>,
    C: PointerClient<R>,
    R::Client: PointerClient<R>,
{
    let (batch, dim) = (source.shape()[0], source.shape()[2]);
    let data: Vec<i64> = idxs.iter().map(|&i| i as i64).collect();
    let index = Tensor::<R>::from_slice(&data, &[batch, 1, 1], source.tensor().device());
    let index = index
        .broadcast_to(&[batch, 1, dim])
        .map_err(Error::Numr)?
        .contiguous();

    let rows = var_gather(source, 1, &index, client).map_err(Error::Numr)?;
    var_reshape_contiguous(&rows, &[batch, dim])
}

impl<R: Runtime> Module<R> for PointerDecoder<R> {
    fn parameters(&self) -> Vec<&Var<R>> {
        self.named_parameters().into_iter().map(|(_, v)| v).collect()
    }

    fn named_parameters(&self) -> Vec<(String, &Var<R>)> {
        let mut params = vec![("start".to_string(), &self.start)];
        params.extend(
            self.attention
                .named_parameters()
                .into_iter()
                .map(|(name, v)| (format!("attention.{name}"), v)),
        );
        params
    }
}

impl<R: Runtime> StateDict<R> for PointerDecoder<R> {
    fn load_state_dict(&mut self, state: &HashMap<String, Tensor<R>>) -> Result<()> {
        let dim = self.attention.dim();
        let start = state.get("start").ok_or_else(|| Error::ModelError {
            reason: "missing key 'start' in decoder state".into(),
        })?;
        if start.shape() != [dim].as_slice() {
            return Err(Error::ModelError {
                reason: format!("shape mismatch for 'start': expected [{dim}], got {:?}", start.shape()),
            });
        }

        let attention_state: HashMap<String, Tensor<R>> = state
            .iter()
            .filter_map(|(name, t)| {
                name.strip_prefix("attention.")
                    .map(|rest| (rest.to_string(), t.clone()))
            })
            .collect();
        self.attention.load_state_dict(&attention_state)?;
        self.start = Var::new(start.clone(), self.start.requires_grad());
        Ok(())
    }
}
