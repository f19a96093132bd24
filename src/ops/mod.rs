pub mod autograd_pointer;
pub mod cpu;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod impl_generic;
pub mod traits;
#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use autograd_pointer::{var_contiguous, var_reshape_contiguous, var_tanh};
pub use traits::PointerAttentionOps;
