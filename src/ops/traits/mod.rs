pub mod pointer;

pub use pointer::PointerAttentionOps;
