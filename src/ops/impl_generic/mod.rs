pub mod pointer;

pub use pointer::{additive_score_impl, apply_visit_mask_impl, bilinear_score_impl};
