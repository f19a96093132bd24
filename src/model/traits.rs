//! Client trait alias for pointer models

use crate::ops::traits::PointerAttentionOps;
use numr::ops::{ConvOps, IndexingOps, ReduceOps, ScalarOps, TensorOps};
use numr::runtime::{Runtime, RuntimeClient};

/// Trait alias for the full set of client bounds required by pointer decoding.
pub trait PointerClient<R: Runtime>:
    RuntimeClient<R>
    + TensorOps<R>
    + ScalarOps<R>
    + ReduceOps<R>
    + ConvOps<R>
    + IndexingOps<R>
    + PointerAttentionOps<R>
{
}

impl<R, C> PointerClient<R> for C
where
    R: Runtime,
    C: RuntimeClient<R>
        + TensorOps<R>
        + ScalarOps<R>
        + ReduceOps<R>
        + ConvOps<R>
        + IndexingOps<R>
        + PointerAttentionOps<R>,
{
}
