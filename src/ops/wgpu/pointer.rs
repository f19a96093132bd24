//! WebGPU implementation of PointerAttentionOps (delegates to impl_generic)

use crate::error::Result;
use crate::nn::VisitMask;
use crate::ops::impl_generic::pointer::{
    additive_score_impl, apply_visit_mask_impl, bilinear_score_impl,
};
use crate::ops::traits::PointerAttentionOps;
use numr::autograd::Var;
use numr::runtime::wgpu::{WgpuClient, WgpuRuntime};

impl PointerAttentionOps<WgpuRuntime> for WgpuClient {
    fn bilinear_score(
        &self,
        target: &Var<WgpuRuntime>,
        source: &Var<WgpuRuntime>,
    ) -> Result<Var<WgpuRuntime>> {
        bilinear_score_impl(self, target, source)
    }

    fn additive_score(
        &self,
        query: &Var<WgpuRuntime>,
        reference: &Var<WgpuRuntime>,
        v: &Var<WgpuRuntime>,
        clip: Option<f64>,
    ) -> Result<Var<WgpuRuntime>> {
        additive_score_impl(self, query, reference, v, clip)
    }

    fn apply_visit_mask(
        &self,
        scores: &Var<WgpuRuntime>,
        mask: Option<&VisitMask>,
        prev_idxs: Option<&[usize]>,
    ) -> Result<(Var<WgpuRuntime>, VisitMask)> {
        apply_visit_mask_impl(self, scores, mask, prev_idxs)
    }
}
