//! Emotion Classifier - ONNX Runtime Integration
//!
//! Boundary to the pre-trained emotion model. Output is validated into a
//! ScoreVector before anything downstream sees it.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::{Mutex, MutexGuard};

use crate::error::ClassificationError;
use crate::logic::decoder::NormalizedImage;
use crate::models::ScoreVector;

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

/// Scores one normalized image. Implementations must be safe to call from
/// several blocking workers at once.
pub trait EmotionClassifier: Send + Sync {
    fn score(&self, image: &NormalizedImage) -> Result<ScoreVector, ClassificationError>;

    fn is_ready(&self) -> bool {
        true
    }
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

/// Pool of independent ONNX sessions over the same model file.
///
/// `Session::run` needs exclusive access, so each session sits behind its own
/// mutex and callers grab whichever one is free.
pub struct OnnxClassifier {
    sessions: Vec<Mutex<Session>>,
    output_name: String,
    next: AtomicUsize,
}

impl OnnxClassifier {
    /// Load `session_count` sessions from a model file
    pub fn load(model_path: &Path, session_count: usize) -> Result<Self, ClassificationError> {
        tracing::info!("Loading ONNX model from: {}", model_path.display());

        if !model_path.exists() {
            return Err(ClassificationError::Unavailable(format!(
                "Model not found: {}",
                model_path.display()
            )));
        }

        let mut sessions = Vec::with_capacity(session_count.max(1));
        for _ in 0..session_count.max(1) {
            let session = Session::builder()
                .map_err(|e| ClassificationError::Unavailable(format!("Failed to create session builder: {}", e)))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| ClassificationError::Unavailable(format!("Failed to set optimization: {}", e)))?
                .commit_from_file(model_path)
                .map_err(|e| ClassificationError::Unavailable(format!("Failed to load model: {}", e)))?;
            sessions.push(Mutex::new(session));
        }

        let output_name = sessions[0]
            .lock()
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| ClassificationError::Unavailable("No output defined".to_string()))?;

        tracing::info!(sessions = sessions.len(), output = %output_name, "ONNX model loaded successfully");

        Ok(Self {
            sessions,
            output_name,
            next: AtomicUsize::new(0),
        })
    }

    fn acquire(&self) -> MutexGuard<'_, Session> {
        let start = self.next.fetch_add(1, Ordering::Relaxed);
        let n = self.sessions.len();

        for i in 0..n {
            if let Some(guard) = self.sessions[(start + i) % n].try_lock() {
                return guard;
            }
        }

        // All busy, queue on our round-robin slot
        self.sessions[start % n].lock()
    }
}

impl EmotionClassifier for OnnxClassifier {
    fn score(&self, image: &NormalizedImage) -> Result<ScoreVector, ClassificationError> {
        let start_time = std::time::Instant::now();

        let input_tensor = Value::from_array(image.tensor.clone())
            .map_err(|e| ClassificationError::Inference(format!("Tensor error: {}", e)))?;

        let mut session = self.acquire();

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ClassificationError::Inference(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| ClassificationError::MalformedOutput("No output".to_string()))?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassificationError::MalformedOutput(format!("Extract error: {}", e)))?;

        let scores = ScoreVector::from_slice(data)?;

        let elapsed = start_time.elapsed().as_micros() as u64;
        tracing::debug!(latency_us = elapsed, ?scores, "Emotion scores computed");

        Ok(scores)
    }
}

// ============================================================================
// UNAVAILABLE CLASSIFIER
// ============================================================================

/// Stand-in when no model could be loaded
pub struct UnavailableClassifier {
    reason: String,
}

impl UnavailableClassifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl EmotionClassifier for UnavailableClassifier {
    fn score(&self, _image: &NormalizedImage) -> Result<ScoreVector, ClassificationError> {
        Err(ClassificationError::Unavailable(self.reason.clone()))
    }

    fn is_ready(&self) -> bool {
        false
    }
}
