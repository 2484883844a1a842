//! Data models

pub mod drift;

pub use drift::*;
