//! Utility modules shared across the engine
//!
//! This module contains tensor helpers (norms, PSNR, shape checks) used
//! throughout the codebase.

pub mod tensor;

// Re-export commonly used items
pub use tensor::{
    Tensor,
    norm, squared_distance, relative_change, psnr,
    ensure_shape, all_finite,
    REL_EPS, PSNR_SENTINEL,
};
