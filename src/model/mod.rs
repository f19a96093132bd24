pub mod config;
pub mod pointer_decoder;
pub mod traits;

pub use config::{AttentionConfig, AttentionKind, AttentionMode};
pub use pointer_decoder::{DecodeOutput, PointerDecoder};
pub use traits::PointerClient;
