// Thin re-export module: block structure, balance folding and chain validation
// live under `blockchain/core/`.

pub mod core;
pub use core::*;
