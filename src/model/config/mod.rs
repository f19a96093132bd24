pub mod attention;

pub use attention::{AttentionConfig, AttentionKind, AttentionMode};
