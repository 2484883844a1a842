//! Drift Module - threshold cascade over classifier scores

pub mod engine;
pub mod rules;

#[cfg(test)]
pub use engine::detect;
pub use engine::{detect_with_thresholds, DriftRule, CASCADE};
pub use rules::*;
