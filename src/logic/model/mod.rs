//! Model Module - emotion classifier boundary

pub mod classifier;

pub use classifier::{EmotionClassifier, OnnxClassifier, UnavailableClassifier};
