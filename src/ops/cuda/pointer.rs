//! CUDA implementation of PointerAttentionOps (delegates to impl_generic)

use crate::error::Result;
use crate::nn::VisitMask;
use crate::ops::impl_generic::pointer::{
    additive_score_impl, apply_visit_mask_impl, bilinear_score_impl,
};
use crate::ops::traits::PointerAttentionOps;
use numr::autograd::Var;
use numr::runtime::cuda::{CudaClient, CudaRuntime};

impl PointerAttentionOps<CudaRuntime> for CudaClient {
    fn bilinear_score(
        &self,
        target: &Var<CudaRuntime>,
        source: &Var<CudaRuntime>,
    ) -> Result<Var<CudaRuntime>> {
        bilinear_score_impl(self, target, source)
    }

    fn additive_score(
        &self,
        query: &Var<CudaRuntime>,
        reference: &Var<CudaRuntime>,
        v: &Var<CudaRuntime>,
        clip: Option<f64>,
    ) -> Result<Var<CudaRuntime>> {
        additive_score_impl(self, query, reference, v, clip)
    }

    fn apply_visit_mask(
        &self,
        scores: &Var<CudaRuntime>,
        mask: Option<&VisitMask>,
        prev_idxs: Option<&[usize]>,
    ) -> Result<(Var<CudaRuntime>, VisitMask)> {
        apply_visit_mask_impl(self, scores, mask, prev_idxs)
    }
}
