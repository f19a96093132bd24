//! Integration tests for pointer-network attention.
//!
//! Exercise the public layer API on the CPU backend: score shapes, masking
//! behavior across decoding steps, clipping and the full-sequence outputs.

use numr::autograd::Var;
use numr::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
use pointr::Tensor;
use pointr::error::Error;
use pointr::model::{AttentionConfig, AttentionMode};
use pointr::nn::{Attention, VisitMask};
use pointr::ops::traits::PointerAttentionOps;

fn setup() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuClient::new(device.clone());
    (client, device)
}

fn input(shape: &[usize], seed: f32, device: &CpuDevice) -> Var<CpuRuntime> {
    let n: usize = shape.iter().product();
    let data: Vec<f32> = (0..n).map(|i| ((i as f32 + seed) * 0.7).sin()).collect();
    Var::new(Tensor::<CpuRuntime>::from_slice(&data, shape, device), false)
}

fn layer(client: &CpuClient, device: &CpuDevice, config: AttentionConfig) -> Attention<CpuRuntime> {
    Attention::new(client, device, &config).unwrap()
}

fn values(v: &Var<CpuRuntime>) -> Vec<f32> {
    v.tensor().contiguous().to_vec()
}

#[test]
fn test_score_shapes() {
    let (client, device) = setup();
    let source = input(&[2, 5, 4], 0.0, &device);
    let target = input(&[2, 3, 4], 1.0, &device);
    for attn_type in ["dot", "general", "RL"] {
        let attn = layer(&client, &device, AttentionConfig::new(attn_type, 4));
        let scores = attn.score(&client, &source, &target).unwrap();
        assert_eq!(scores.shape(), &[2, 3, 5], "{attn_type}");
    }
}

#[test]
fn test_dot_one_step_scenario() {
    let (client, device) = setup();
    let attn = layer(&client, &device, AttentionConfig::new("dot", 4));
    let source = input(&[2, 3, 4], 0.0, &device);
    let target = input(&[2, 4], 2.0, &device);

    let out = attn
        .forward(&client, &source, &target, None, None, AttentionMode::Masked)
        .unwrap();
    assert_eq!(out.weights.shape(), &[2, 3]);
    assert_eq!(out.context.as_ref().unwrap().shape(), &[2, 4]);
    assert!(out.source_projection.is_none());

    let w = values(&out.weights);
    for row in w.chunks(3) {
        assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5, "{row:?}");
    }
    let mask = out.mask.unwrap();
    assert_eq!(mask.masked_count(0) + mask.masked_count(1), 0);
}

#[test]
fn test_rl_clip_bounds_scores() {
    let (client, device) = setup();
    let attn = layer(&client, &device, AttentionConfig::new("RL", 8).with_clip(10.0));
    // large inputs push the unclipped scores well past the clip constant
    let source = input(&[3, 6, 8], 0.0, &device);
    let source = Var::new(
        Tensor::<CpuRuntime>::from_slice(
            &values(&source).iter().map(|x| x * 100.0).collect::<Vec<_>>(),
            &[3, 6, 8],
            &device,
        ),
        false,
    );
    let target = input(&[3, 2, 8], 5.0, &device);

    let scores = values(&attn.score(&client, &source, &target).unwrap());
    assert!(scores.iter().all(|s| (-10.0..=10.0).contains(s)), "{scores:?}");
}

#[test]
fn test_masked_positions_get_zero_weight() {
    let (client, device) = setup();
    let attn = layer(&client, &device, AttentionConfig::new("general", 4));
    let source = input(&[2, 4, 4], 0.0, &device);
    let target = input(&[2, 4], 3.0, &device);
    let mask = VisitMask::new(2, 1, 4).visit(&[3, 1]).unwrap();

    let out = attn
        .forward(
            &client,
            &source,
            &target,
            Some(&mask),
            Some(&[0, 2][..]),
            AttentionMode::Masked,
        )
        .unwrap();
    let w = values(&out.weights);
    assert_eq!(w[0], 0.0);
    assert_eq!(w[3], 0.0);
    assert_eq!(w[4 + 1], 0.0);
    assert_eq!(w[4 + 2], 0.0);
    for row in w.chunks(4) {
        assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    let updated = out.mask.unwrap();
    assert_eq!(updated.masked_positions(0), vec![0, 3]);
    assert_eq!(updated.masked_positions(1), vec![1, 2]);
    // the incoming mask is left alone
    assert_eq!(mask.masked_positions(0), vec![3]);
}

#[test]
fn test_three_steps_exhaust_all_but_one() {
    let (client, device) = setup();
    let attn = layer(&client, &device, AttentionConfig::new("dot", 4));
    let source = input(&[1, 3, 4], 0.0, &device);
    let target = input(&[1, 4], 1.0, &device);

    let mut mask: Option<VisitMask> = None;
    let mut prev: Option<Vec<usize>> = None;
    let mut seen = Vec::new();
    let mut last = Vec::new();
    for chosen in [2usize, 0, 1] {
        let out = attn
            .forward(
                &client,
                &source,
                &target,
                mask.as_ref(),
                prev.as_deref(),
                AttentionMode::Masked,
            )
            .unwrap();
        let updated = out.mask.unwrap();
        // monotone: every earlier choice stays masked
        for &s in &seen {
            assert!(updated.is_masked(0, 0, s));
        }
        last = values(&out.weights);
        mask = Some(updated);
        prev = Some(vec![chosen]);
        seen.push(chosen);
    }

    let mask = mask.unwrap();
    assert_eq!(mask.masked_count(0), 2);
    assert_eq!(last[2], 0.0);
    assert_eq!(last[0], 0.0);
    assert!((last[1] - 1.0).abs() < 1e-5);
}

#[test]
fn test_fully_masked_row_is_nan() {
    let (client, device) = setup();
    let attn = layer(&client, &device, AttentionConfig::new("dot", 2));
    let source = input(&[1, 2, 2], 0.0, &device);
    let target = input(&[1, 2], 1.0, &device);
    let mask = VisitMask::new(1, 1, 2).visit(&[0]).unwrap();

    let out = attn
        .forward(
            &client,
            &source,
            &target,
            Some(&mask),
            Some(&[1][..]),
            AttentionMode::Masked,
        )
        .unwrap();
    assert!(out.mask.unwrap().has_exhausted_row());
    assert!(values(&out.weights).iter().all(|w| w.is_nan()));
}

#[test]
fn test_unmasked_mode_ignores_prev_idxs() {
    let (client, device) = setup();
    let attn = layer(&client, &device, AttentionConfig::new("dot", 4));
    let source = input(&[1, 3, 4], 0.0, &device);
    let target = input(&[1, 4], 1.0, &device);

    let mode = AttentionMode::from_selector("Glimpse");
    let out = attn
        .forward(&client, &source, &target, None, Some(&[0][..]), mode)
        .unwrap();
    assert!(out.mask.is_none());
    assert!(values(&out.weights).iter().all(|w| *w > 0.0));
}

#[test]
fn test_full_sequence_projection() {
    let (client, device) = setup();
    for attn_type in ["dot", "general", "RL"] {
        let attn = layer(&client, &device, AttentionConfig::new(attn_type, 4));
        let source = input(&[2, 6, 4], 0.0, &device);
        let target = input(&[2, 3, 4], 1.0, &device);

        let out = attn
            .forward(&client, &source, &target, None, None, AttentionMode::Masked)
            .unwrap();
        assert_eq!(out.weights.shape(), &[2, 3, 6]);
        let hidden = out.hidden().unwrap();
        assert_eq!(hidden.shape(), &[2, 4, 6], "{attn_type}");
        assert_eq!(out.context.is_some(), attn_type != "RL");
    }
}

#[test]
fn test_unsupported_type_is_construction_error() {
    let (client, device) = setup();
    let result = Attention::<CpuRuntime>::new(&client, &device, &AttentionConfig::new("mlp", 4));
    assert!(matches!(result, Err(Error::UnsupportedAttention { .. })));
}

#[test]
fn test_apply_visit_mask_rejects_out_of_range_index() {
    let (client, device) = setup();
    let scores = input(&[1, 1, 3], 0.0, &device);
    let result = client.apply_visit_mask(&scores, None, Some(&[3][..]));
    assert!(matches!(
        result,
        Err(Error::InvalidArgument { arg: "prev_idxs", .. })
    ));
}
