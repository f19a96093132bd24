pub mod attention;
pub mod conv1d;
pub mod linear;
pub mod module;
pub mod var_builder;
pub mod varmap;
pub mod visit_mask;

pub use attention::{Attention, AttentionOutput};
pub use conv1d::Conv1d;
pub use linear::Linear;
pub use module::{Module, StateDict};
pub use var_builder::VarBuilder;
pub use varmap::{Init, VarMap};
pub use visit_mask::VisitMask;
