//! CPU implementation of PointerAttentionOps (delegates to impl_generic)

use crate::error::Result;
use crate::nn::VisitMask;
use crate::ops::impl_generic::pointer::{
    additive_score_impl, apply_visit_mask_impl, bilinear_score_impl,
};
use crate::ops::traits::PointerAttentionOps;
use numr::autograd::Var;
use numr::runtime::cpu::{CpuClient, CpuRuntime};

impl PointerAttentionOps<CpuRuntime> for CpuClient {
    fn bilinear_score(
        &self,
        target: &Var<CpuRuntime>,
        source: &Var<CpuRuntime>,
    ) -> Result<Var<CpuRuntime>> {
        bilinear_score_impl(self, target, source)
    }

    fn additive_score(
        &self,
        query: &Var<CpuRuntime>,
        reference: &Var<CpuRuntime>,
        v: &Var<CpuRuntime>,
        clip: Option<f64>,
    ) -> Result<Var<CpuRuntime>> {
        additive_score_impl(self, query, reference, v, clip)
    }

    fn apply_visit_mask(
        &self,
        scores: &Var<CpuRuntime>,
        mask: Option<&VisitMask>,
        prev_idxs: Option<&[usize]>,
    ) -> Result<(Var<CpuRuntime>, VisitMask)> {
        apply_visit_mask_impl(self, scores, mask, prev_idxs)
    }
}
