pub mod operator;
pub mod data_fidelity;

pub use operator::{ForwardOperator, Identity, Mask, adjointness_gap};
pub use data_fidelity::{DataFidelity, L2};
