//! # pointr
//!
//! **Pointer-network attention built on numr.**
//!
//! pointr provides the attention layer of a pointer network: score a decoder
//! state against every encoder position, forbid positions that were already
//! chosen, and normalize into a distribution over the input. It uses numr's
//! runtime, tensors and autograd directly.
//!
//! ## Relationship to numr
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                        pointr                            │
//! │  (dot / general / RL attention, visit masks, decoding)   │
//! └──────────────────────────┬──────────────────────────────┘
//! │                      numr                                │
//! │     (tensors, ops, runtime, autograd)                    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design
//!
//! - **Extension traits**: `PointerAttentionOps` implemented on numr's clients
//! - **impl_generic**: scoring and masking composed from numr primitives, same on all backends
//! - **VisitMask**: immutable mask value threaded through decoding steps
//! - **Layers**: `Attention` and `PointerDecoder` hold `Var<R>` parameters for training

pub mod error;
pub mod model;
pub mod nn;
pub mod ops;

// Re-export primary pointr types
pub use error::{Error, Result};
pub use model::{AttentionConfig, AttentionKind, AttentionMode, PointerDecoder};
pub use nn::{Attention, AttentionOutput, VisitMask};
pub use ops::PointerAttentionOps;

// Re-export numr types that users will commonly need
pub use numr::dtype::DType;
pub use numr::error::{Error as NumrError, Result as NumrResult};
pub use numr::runtime::{Runtime, RuntimeClient};
pub use numr::tensor::Tensor;
