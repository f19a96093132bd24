//! VarMap: named collection of layer weights, plus initialization strategies.

use crate::error::{Error, Result};
use numr::dtype::DType;
use numr::ops::{RandomOps, ScalarOps};
use numr::runtime::{Device, Runtime, RuntimeClient};
use numr::tensor::Tensor;
use std::collections::HashMap;

/// Initialization strategy for new tensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Init {
    /// Uniform random in `[-bound, bound]`
    Uniform(f32),
    /// Kaiming uniform (PyTorch Linear/Conv default): U(-1/sqrt(fan_in), 1/sqrt(fan_in))
    PyTorchLinear,
}

impl Init {
    /// Uniform bound for a given fan-in.
    pub fn bound(&self, fan_in: usize) -> f32 {
        match self {
            Init::Uniform(b) => *b,
            Init::PyTorchLinear => 1.0 / (fan_in.max(1) as f32).sqrt(),
        }
    }

    /// Create an F32 tensor of `shape` on `device` following this strategy.
    ///
    /// Random draws come from the client's `RandomOps::rand` and stay on device;
    /// a client bound to another device is an error.
    pub fn materialize<R, C>(
        &self,
        client: &C,
        device: &R::Device,
        shape: &[usize],
        fan_in: usize,
    ) -> Result<Tensor<R>>
    where
        R: Runtime<DType = DType>,
        C: RuntimeClient<R> + RandomOps<R> + ScalarOps<R>,
    {
        let bound = self.bound(fan_in) as f64;
        // U[0, 1) → U[-bound, bound)
        let unit = client.rand(shape, DType::F32).map_err(Error::Numr)?;
        if !unit.device().is_same(device) {
            return Err(Error::ModelError {
                reason: format!("client draws on device {}, expected {}", unit.device().id(), device.id()),
            });
        }
        let scaled = client
            .mul_scalar(&unit, 2.0 * bound)
            .map_err(Error::Numr)?;
        client.add_scalar(&scaled, -bound).map_err(Error::Numr)
    }
}

/// Named collection of layer weights.
pub struct VarMap<R: Runtime> {
    data: HashMap<String, Tensor<R>>,
}

impl<R: Runtime> VarMap<R> {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Insert (or overwrite) a tensor.
    pub fn insert(&mut self, name: String, tensor: Tensor<R>) {
        self.data.insert(name, tensor);
    }

    /// Remove and return a tensor by name (zero-copy extraction).
    pub fn take(&mut self, name: &str) -> Result<Tensor<R>> {
        self.data.remove(name).ok_or_else(|| Error::ModelError {
            reason: format!("weight not found: {name}"),
        })
    }

    /// Whether empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<R: Runtime> Default for VarMap<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Runtime> From<HashMap<String, Tensor<R>>> for VarMap<R> {
    fn from(data: HashMap<String, Tensor<R>>) -> Self {
        Self { data }
    }
}
