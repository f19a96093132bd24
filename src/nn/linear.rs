//! Dense linear layer

use crate::error::{Error, Result};
use crate::nn::varmap::Init;
use numr::autograd::{Var, var_add, var_matmul, var_transpose};
use numr::dtype::DType;
use numr::ops::{RandomOps, ScalarOps, TensorOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Dense linear layer: output = input @ weight^T + bias
///
/// Uses `Var<R>` throughout: autograd works during training,
/// near-zero overhead during inference.
pub struct Linear<R: Runtime> {
    weight: Var<R>,
    bias: Option<Var<R>>,
}

impl<R: Runtime> Linear<R> {
    /// Create from loaded tensors. `trainable` controls gradient tracking.
    pub fn new(weight: Tensor<R>, bias: Option<Tensor<R>>, trainable: bool) -> Self {
        Self {
            weight: Var::new(weight, trainable),
            bias: bias.map(|b| Var::new(b, trainable)),
        }
    }

    /// Create a trainable `[out_features, in_features]` layer with weights
    /// (and bias, if requested) drawn from `init` with fan-in `in_features`.
    pub fn from_init<C>(
        client: &C,
        device: &R::Device,
        in_features: usize,
        out_features: usize,
        bias: bool,
        init: Init,
    ) -> Result<Self>
    where
        R: Runtime<DType = DType>,
        C: RuntimeClient<R> + RandomOps<R> + ScalarOps<R>,
    {
        let weight = init.materialize(client, device, &[out_features, in_features], in_features)?;
        let bias = if bias {
            Some(init.materialize(client, device, &[out_features], in_features)?)
        } else {
            None
        };
        Ok(Self::new(weight, bias, true))
    }

    /// Forward: input @ weight^T + bias
    ///
    /// input: `[..., in_features]`, output: `[..., out_features]`
    pub fn forward<C>(&self, client: &C, input: &Var<R>) -> Result<Var<R>>
    where
        C: RuntimeClient<R> + TensorOps<R>,
        R::Client: TensorOps<R>,
    {
        let w_t = var_transpose(&self.weight).map_err(Error::Numr)?;
        let output = var_matmul(input, &w_t, client).map_err(Error::Numr)?;
        match &self.bias {
            Some(bias) => var_add(&output, bias, client).map_err(Error::Numr),
            None => Ok(output),
        }
    }

    pub fn weight(&self) -> &Var<R> {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Var<R>> {
        self.bias.as_ref()
    }

    pub fn in_features(&self) -> usize {
        self.weight.shape()[1]
    }

    pub fn out_features(&self) -> usize {
        self.weight.shape()[0]
    }
}
