//! Core decision logic

pub mod decoder;
pub mod drift;
pub mod model;
pub mod pipeline;
pub mod recommender;
pub mod strategy;
