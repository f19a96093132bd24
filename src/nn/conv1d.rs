//! 1D convolution layer

use crate::error::{Error, Result};
use crate::nn::varmap::Init;
use crate::ops::autograd_pointer::var_contiguous;
use numr::autograd::{Var, var_conv1d};
use numr::dtype::DType;
use numr::ops::{BinaryOps, ConvOps, PaddingMode, RandomOps, ReduceOps, ScalarOps, TensorOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// 1D convolution layer: output = conv1d(input, weight) + bias
///
/// Weight: `[out_channels, in_channels/groups, kernel_size]`
/// Input:  `[batch, in_channels, length]`
/// Output: `[batch, out_channels, length_out]`
pub struct Conv1d<R: Runtime> {
    weight: Var<R>,
    bias: Option<Var<R>>,
    stride: usize,
    padding: PaddingMode,
    dilation: usize,
    groups: usize,
}

impl<R: Runtime> Conv1d<R> {
    pub fn new(
        weight: Tensor<R>,
        bias: Option<Tensor<R>>,
        stride: usize,
        padding: PaddingMode,
        dilation: usize,
        groups: usize,
        trainable: bool,
    ) -> Self {
        Self {
            weight: Var::new(weight, trainable),
            bias: bias.map(|b| Var::new(b, trainable)),
            stride,
            padding,
            dilation,
            groups,
        }
    }

    /// Trainable pointwise projection (`kernel_size = 1`, stride 1, with bias).
    ///
    /// Weight and bias are drawn from `init` with fan-in `in_channels`.
    pub fn pointwise<C>(
        client: &C,
        device: &R::Device,
        in_channels: usize,
        out_channels: usize,
        init: Init,
    ) -> Result<Self>
    where
        R: Runtime<DType = DType>,
        C: RuntimeClient<R> + RandomOps<R> + ScalarOps<R>,
    {
        let weight = init.materialize(client, device, &[out_channels, in_channels, 1], in_channels)?;
        let bias = init.materialize(client, device, &[out_channels], in_channels)?;
        Ok(Self::new(weight, Some(bias), 1, PaddingMode::Valid, 1, 1, true))
    }

    /// Forward pass with autograd support.
    ///
    /// Input: `[batch, in_channels, length]`, possibly a strided view
    /// Output: `[batch, out_channels, length_out]`
    pub fn forward<C>(&self, client: &C, input: &Var<R>) -> Result<Var<R>>
    where
        R: Runtime<DType = DType>,
        C: RuntimeClient<R> + ConvOps<R> + TensorOps<R> + ReduceOps<R> + BinaryOps<R> + ScalarOps<R>,
        R::Client: ConvOps<R> + TensorOps<R> + ReduceOps<R> + BinaryOps<R> + ScalarOps<R>,
    {
        var_conv1d(
            &var_contiguous(input),
            &self.weight,
            self.bias.as_ref(),
            self.stride,
            self.padding,
            self.dilation,
            self.groups,
            client,
        )
        .map_err(Error::Numr)
    }

    pub fn weight(&self) -> &Var<R> {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Var<R>> {
        self.bias.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cpu_setup;
    use numr::autograd::{backward, var_sum, var_transpose};
    use numr::runtime::cpu::{CpuDevice, CpuRuntime};

    fn input(data: &[f32], shape: &[usize], device: &CpuDevice) -> Var<CpuRuntime> {
        Var::new(Tensor::<CpuRuntime>::from_slice(data, shape, device), false)
    }

    #[test]
    fn test_conv1d_output_shape() {
        let (client, device) = cpu_setup();
        // weight: [out=4, in=3, kernel=3]
        let weight = Tensor::<CpuRuntime>::from_slice(&[0.1f32; 36], &[4, 3, 3], &device);
        let conv = Conv1d::new(weight, None, 1, PaddingMode::Valid, 1, 1, false);

        // input: [batch=2, channels=3, length=10]
        let out = conv.forward(&client, &input(&[0.1f32; 60], &[2, 3, 10], &device)).unwrap();
        // Valid padding: L_out = 10 - 3 + 1 = 8
        assert_eq!(out.shape(), &[2, 4, 8]);
    }

    #[test]
    fn test_conv1d_with_bias() {
        let (client, device) = cpu_setup();
        // Single in/out channel, kernel=1 → effectively a multiply+bias
        let weight = Tensor::<CpuRuntime>::from_slice(&[2.0f32], &[1, 1, 1], &device);
        let bias = Tensor::<CpuRuntime>::from_slice(&[10.0f32], &[1], &device);
        let conv = Conv1d::new(weight, Some(bias), 1, PaddingMode::Valid, 1, 1, false);

        let out = conv.forward(&client, &input(&[3.0, 5.0], &[1, 1, 2], &device)).unwrap();
        let data: Vec<f32> = out.tensor().to_vec();
        // 3*2+10=16, 5*2+10=20
        assert_eq!(data, vec![16.0, 20.0]);
    }

    #[test]
    fn test_pointwise_on_transposed_view() {
        let (client, device) = cpu_setup();
        // [out=3, in=2, 1]
        let w = [1.0f32, 2.0, -1.0, 0.5, 0.0, 3.0];
        let b = [0.1f32, 0.2, 0.3];
        let weight = Tensor::<CpuRuntime>::from_slice(&w, &[3, 2, 1], &device);
        let bias = Tensor::<CpuRuntime>::from_slice(&b, &[3], &device);
        let conv = Conv1d::new(weight, Some(bias), 1, PaddingMode::Valid, 1, 1, false);

        // source [batch=1, length=4, in=2], fed as its [1, 2, 4] transpose
        let data: Vec<f32> = (0..8).map(|i| (i as f32 * 0.3).sin()).collect();
        let source = input(&data, &[1, 4, 2], &device);
        let got = conv.forward(&client, &var_transpose(&source).unwrap()).unwrap();
        assert_eq!(got.shape(), &[1, 3, 4]);

        let got: Vec<f32> = got.tensor().contiguous().to_vec();
        for o in 0..3 {
            for l in 0..4 {
                let want = w[o * 2] * data[l * 2] + w[o * 2 + 1] * data[l * 2 + 1] + b[o];
                let g = got[o * 4 + l];
                assert!((g - want).abs() < 1e-5, "out[{o}, {l}] = {g}, want {want}");
            }
        }
    }

    #[test]
    fn test_conv1d_backward_reaches_weight_and_bias() {
        let (client, device) = cpu_setup();
        let conv = Conv1d::<CpuRuntime>::pointwise(&client, &device, 2, 2, Init::PyTorchLinear)
            .unwrap();
        let x = input(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[1, 2, 3], &device);

        let out = conv.forward(&client, &x).unwrap();
        let loss = var_sum(&out, &[0, 1, 2], false, &client).unwrap();
        let grads = backward(&loss, &client).unwrap();

        // d(sum)/d bias[o] = length
        let bias_grad: Vec<f32> = grads
            .get(conv.bias().unwrap().id())
            .unwrap()
            .contiguous()
            .to_vec();
        assert_eq!(bias_grad, vec![3.0, 3.0]);
        // d(sum)/d w[o, i] = sum over length of x[i, :]
        let weight_grad: Vec<f32> = grads.get(conv.weight().id()).unwrap().contiguous().to_vec();
        assert_eq!(weight_grad, vec![6.0, 15.0, 6.0, 15.0]);
    }

    #[test]
    fn test_pointwise_constructor() {
        let (client, device) = cpu_setup();
        let conv =
            Conv1d::<CpuRuntime>::pointwise(&client, &device, 4, 4, Init::PyTorchLinear).unwrap();
        assert_eq!(conv.weight().shape(), &[4, 4, 1]);
        assert_eq!(conv.bias().map(|b| b.shape().to_vec()), Some(vec![4]));
    }
}
