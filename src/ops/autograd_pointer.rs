//! Autograd helpers for pointer attention
//!
//! Layout and activation wrappers that keep the computation graph intact, so
//! gradients reach every projection of the attention layer.

use crate::error::Result;
use numr::autograd::{GradFn, TensorId, Var, var_reshape};
use numr::dtype::DType;
use numr::ops::{ScalarOps, TensorOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;
use std::sync::Arc;

/// Backward for a contiguous copy: the gradient is the incoming gradient,
/// itself made contiguous for the ops upstream.
struct ContiguousBackward<R: Runtime> {
    input_id: [TensorId; 1],
    input_grad_fn: Option<Arc<dyn GradFn<R>>>,
}

impl<R: Runtime> GradFn<R> for ContiguousBackward<R> {
    fn backward(&self, grad_output: &Tensor<R>) -> numr::error::Result<Vec<Option<Tensor<R>>>> {
        Ok(vec![Some(grad_output.contiguous())])
    }

    fn backward_var(&self, grad_output: &Var<R>) -> numr::error::Result<Vec<Option<Var<R>>>> {
        Ok(vec![Some(var_contiguous(grad_output))])
    }

    fn inputs(&self) -> &[TensorId] {
        &self.input_id
    }

    fn input_grad_fns(&self) -> Vec<Option<Arc<dyn GradFn<R>>>> {
        vec![self.input_grad_fn.clone()]
    }

    fn name(&self) -> &'static str {
        "ContiguousBackward"
    }
}

/// Make a Var contiguous (copies data if non-contiguous).
///
/// Unlike a detached copy, the result stays attached to `v`'s graph.
pub fn var_contiguous<R: Runtime>(v: &Var<R>) -> Var<R> {
    let tensor = v.tensor().contiguous();
    if v.requires_grad() {
        let grad_fn = ContiguousBackward {
            input_id: [v.id()],
            input_grad_fn: v.grad_fn().cloned(),
        };
        Var::from_op(tensor, Arc::new(grad_fn))
    } else {
        Var::new(tensor, false)
    }
}

/// Reshape that accepts strided views.
///
/// The input is made contiguous before the reshape, and the output is
/// wrapped so the gradient reaching the reshape's backward is contiguous too.
pub fn var_reshape_contiguous<R: Runtime>(v: &Var<R>, shape: &[usize]) -> Result<Var<R>> {
    let reshaped = var_reshape(&var_contiguous(v), shape)?;
    Ok(var_contiguous(&reshaped))
}

/// Delegates to another backward while supplying the input's grad_fn, so
/// traversal continues past the op.
struct LinkedBackward<R: Runtime> {
    inner: Arc<dyn GradFn<R>>,
    input_grad_fn: Option<Arc<dyn GradFn<R>>>,
}

impl<R: Runtime> GradFn<R> for LinkedBackward<R> {
    fn backward(&self, grad_output: &Tensor<R>) -> numr::error::Result<Vec<Option<Tensor<R>>>> {
        self.inner.backward(grad_output)
    }

    fn backward_var(&self, grad_output: &Var<R>) -> numr::error::Result<Vec<Option<Var<R>>>> {
        self.inner.backward_var(grad_output)
    }

    fn inputs(&self) -> &[TensorId] {
        self.inner.inputs()
    }

    fn input_grad_fns(&self) -> Vec<Option<Arc<dyn GradFn<R>>>> {
        vec![self.input_grad_fn.clone()]
    }

    fn saved_tensors(&self) -> &[Tensor<R>] {
        self.inner.saved_tensors()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// `tanh(x)` via `numr::autograd::var_tanh`.
///
/// numr's tanh node does not record its input's grad_fn, which would make an
/// intermediate input look like a leaf during backward. The node is relinked
/// here so gradients flow through to the projections feeding `x`.
pub fn var_tanh<R, C>(x: &Var<R>, client: &C) -> Result<Var<R>>
where
    R: Runtime<DType = DType>,
    C: RuntimeClient<R> + TensorOps<R>,
    R::Client: TensorOps<R> + ScalarOps<R>,
{
    let out = numr::autograd::var_tanh(x, client)?;
    match (out.grad_fn(), x.grad_fn()) {
        (Some(inner), Some(input_grad_fn)) => {
            let grad_fn = LinkedBackward {
                inner: inner.clone(),
                input_grad_fn: Some(input_grad_fn.clone()),
            };
            Ok(Var::from_op(out.tensor().clone(), Arc::new(grad_fn)))
        }
        _ => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cpu_setup;
    use numr::autograd::{backward, var_broadcast_to, var_mul_scalar, var_sum};
    use numr::runtime::cpu::CpuRuntime;

    #[test]
    fn test_var_contiguous_allows_reshape_of_broadcast() {
        let (_client, device) = cpu_setup();
        let x = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0], &[1, 3], &device),
            false,
        );
        let wide = var_broadcast_to(&x, &[2, 3]).unwrap();
        assert!(var_reshape(&wide, &[6]).is_err());

        let flat = var_reshape_contiguous(&wide, &[6]).unwrap();
        let data: Vec<f32> = flat.tensor().to_vec();
        assert_eq!(data, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_var_contiguous_keeps_gradient_path() {
        let (client, device) = cpu_setup();
        let x = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0], &[1, 3], &device),
            true,
        );
        let wide = var_broadcast_to(&x, &[4, 3]).unwrap();
        let flat = var_reshape_contiguous(&wide, &[12]).unwrap();
        let loss = var_sum(&flat, &[0], false, &client).unwrap();

        let grads = backward(&loss, &client).unwrap();
        let grad: Vec<f32> = grads.get(x.id()).unwrap().contiguous().to_vec();
        assert_eq!(grad, vec![4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_var_tanh_matches_std() {
        let (client, device) = cpu_setup();
        let xs = [-3.0f32, -0.5, 0.0, 1e-4, 0.25, 2.0];
        let x = Var::new(Tensor::<CpuRuntime>::from_slice(&xs, &[6], &device), false);
        let out = var_tanh(&x, &client).unwrap();
        let data: Vec<f32> = out.tensor().to_vec();
        for (got, x) in data.iter().zip(xs.iter()) {
            assert!((got - x.tanh()).abs() <= 1e-6 * x.abs().max(1.0), "tanh({x}) = {got}");
        }
    }

    #[test]
    fn test_var_tanh_gradient_reaches_earlier_ops() {
        let (client, device) = cpu_setup();
        let xs = [-1.0f32, 0.0, 0.5];
        let x = Var::new(Tensor::<CpuRuntime>::from_slice(&xs, &[3], &device), true);
        // y = tanh(2x), dy/dx = 2 (1 - tanh²(2x))
        let doubled = var_mul_scalar(&x, 2.0, &client).unwrap();
        let y = var_tanh(&doubled, &client).unwrap();
        let loss = var_sum(&y, &[0], false, &client).unwrap();

        let grads = backward(&loss, &client).unwrap();
        let grad: Vec<f32> = grads.get(x.id()).unwrap().contiguous().to_vec();
        for (g, x) in grad.iter().zip(xs.iter()) {
            let t = (2.0 * x).tanh();
            assert!((g - 2.0 * (1.0 - t * t)).abs() < 1e-5, "d/dx at {x} = {g}");
        }
    }
}
