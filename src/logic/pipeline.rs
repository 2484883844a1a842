//! Drift Pipeline
//!
//! Image bytes -> decoder -> classifier -> drift cascade -> renderer.
//! Decoding and scoring are CPU bound and run on the blocking pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::{ClassificationError, DecodeError, PipelineError};
use crate::logic::decoder::ImageDecoder;
use crate::logic::drift::{self, DriftThresholds};
use crate::logic::model::EmotionClassifier;
use crate::logic::strategy::{LabelRenderer, NO_DRIFT_MESSAGE};
use crate::models::{DriftLabel, ScoreVector};

pub struct DriftPipeline {
    decoder: ImageDecoder,
    classifier: Arc<dyn EmotionClassifier>,
    thresholds: DriftThresholds,
    classifier_timeout: Duration,
    /// One permit per scoring call still running on the blocking pool
    scoring_slots: Arc<Semaphore>,
}

impl DriftPipeline {
    pub fn new(
        decoder: ImageDecoder,
        classifier: Arc<dyn EmotionClassifier>,
        thresholds: DriftThresholds,
        classifier_timeout: Duration,
        max_in_flight: usize,
    ) -> Self {
        Self {
            decoder,
            classifier,
            thresholds,
            classifier_timeout,
            scoring_slots: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    pub fn classifier_ready(&self) -> bool {
        self.classifier.is_ready()
    }

    /// Decode and score one image
    pub async fn score(&self, body: Bytes, content_type: Option<String>) -> Result<ScoreVector, PipelineError> {
        let decoder = self.decoder;
        let image = tokio::task::spawn_blocking(move || decoder.decode(&body, content_type.as_deref()))
            .await
            .map_err(|e| DecodeError::Worker(e.to_string()))??;

        tracing::debug!(format = ?image.source_format, shape = ?image.tensor.shape(), "Image decoded");

        let classifier = Arc::clone(&self.classifier);
        let slots = Arc::clone(&self.scoring_slots);

        // The permit lives in the blocking call and is released only when it
        // returns, even after the timeout has fired.
        let scoring = async move {
            let permit = match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return Err(ClassificationError::Unavailable(e.to_string())),
            };

            let task = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                classifier.score(&image)
            });

            match task.await {
                Ok(result) => result,
                Err(e) => Err(ClassificationError::Inference(e.to_string())),
            }
        };

        let scores = tokio::time::timeout(self.classifier_timeout, scoring)
            .await
            .map_err(|_| ClassificationError::Timeout(self.classifier_timeout))??;

        Ok(scores)
    }

    /// Decode, score and run the cascade
    pub async fn detect(&self, body: Bytes, content_type: Option<String>) -> Result<Option<DriftLabel>, PipelineError> {
        let scores = self.score(body, content_type).await?;
        Ok(drift::detect_with_thresholds(&scores, &self.thresholds))
    }

    /// Full request: never fails, errors are rendered by the strategy
    pub async fn respond(&self, renderer: &dyn LabelRenderer, body: Bytes, content_type: Option<String>) -> String {
        let request_id = Uuid::new_v4();
        let started = Instant::now();

        match self.render(renderer, body, content_type, request_id).await {
            Ok(text) => {
                tracing::debug!(%request_id, elapsed_ms = started.elapsed().as_millis() as u64, "Analysis complete");
                text
            }
            Err(err) => Self::fail(renderer, request_id, err),
        }
    }

    /// Render a failure that happened before the pipeline could run,
    /// such as an unreadable request body
    pub fn reject(renderer: &dyn LabelRenderer, err: impl Into<PipelineError>) -> String {
        Self::fail(renderer, Uuid::new_v4(), err.into())
    }

    fn fail(renderer: &dyn LabelRenderer, request_id: Uuid, err: PipelineError) -> String {
        if matches!(err, PipelineError::Recommendation(_)) {
            tracing::error!(%request_id, stage = err.stage(), error = %err, "Analysis failed");
        } else {
            tracing::warn!(%request_id, stage = err.stage(), error = %err, "Analysis failed");
        }
        renderer.render_failure(&err)
    }

    async fn render(
        &self,
        renderer: &dyn LabelRenderer,
        body: Bytes,
        content_type: Option<String>,
        request_id: Uuid,
    ) -> Result<String, PipelineError> {
        match self.detect(body, content_type).await? {
            Some(label) => {
                tracing::info!(%request_id, strategy = renderer.name(), %label, "Cognitive drift detected");
                Ok(renderer.render(label).await?)
            }
            None => {
                tracing::info!(%request_id, strategy = renderer.name(), "No cognitive drift");
                Ok(NO_DRIFT_MESSAGE.to_string())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::logic::decoder::tests::encode_solid;
    use crate::logic::decoder::{NormalizedImage, TensorLayout};
    use crate::logic::strategy::{GenerativeRenderer, StaticRenderer};
    use crate::logic::recommender::Recommender;
    use crate::error::RecommendationError;
    use async_trait::async_trait;
    use image::ImageFormat;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Classifier returning fixed raw output
    pub(crate) struct FixedClassifier {
        pub raw: Vec<f32>,
        pub delay: Duration,
        pub calls: AtomicUsize,
    }

    impl FixedClassifier {
        pub(crate) fn new(raw: Vec<f32>) -> Self {
            Self { raw, delay: Duration::ZERO, calls: AtomicUsize::new(0) }
        }
    }

    impl EmotionClassifier for FixedClassifier {
        fn score(&self, _image: &NormalizedImage) -> Result<ScoreVector, ClassificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            ScoreVector::from_slice(&self.raw)
        }
    }

    /// Recommender echoing the label
    pub(crate) struct EchoRecommender;

    #[async_trait]
    impl Recommender for EchoRecommender {
        async fn recommend(&self, label: DriftLabel) -> Result<String, RecommendationError> {
            Ok(format!("generated for {}", label))
        }
    }

    pub(crate) fn pipeline(classifier: Arc<dyn EmotionClassifier>) -> DriftPipeline {
        DriftPipeline::new(
            ImageDecoder::new(8, TensorLayout::Nchw),
            classifier,
            DriftThresholds::default(),
            Duration::from_secs(5),
            2,
        )
    }

    fn jpeg() -> Bytes {
        Bytes::from(encode_solid(16, 16, [200, 10, 10], ImageFormat::Jpeg))
    }

    #[tokio::test]
    async fn test_detect_boredom() {
        let p = pipeline(Arc::new(FixedClassifier::new(vec![2.0, 0.1, 3.0, 0.1])));
        let label = p.detect(jpeg(), Some("image/jpeg".to_string())).await.unwrap();
        assert_eq!(label, Some(DriftLabel::Boredom));
    }

    #[tokio::test]
    async fn test_malformed_scores_never_reach_cascade() {
        let p = pipeline(Arc::new(FixedClassifier::new(vec![2.0, 0.1, 3.0])));
        let err = p.detect(jpeg(), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Classification(ClassificationError::MalformedOutput(_))));
    }

    #[tokio::test]
    async fn test_decode_failure_skips_classifier() {
        let classifier = Arc::new(FixedClassifier::new(vec![2.0, 0.1, 3.0, 0.1]));
        let p = pipeline(classifier.clone());

        let err = p.detect(Bytes::new(), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Decode(DecodeError::Empty)));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_classifier_timeout() {
        let classifier = FixedClassifier {
            delay: Duration::from_millis(500),
            ..FixedClassifier::new(vec![2.0, 0.1, 3.0, 0.1])
        };
        let p = DriftPipeline::new(
            ImageDecoder::new(8, TensorLayout::Nchw),
            Arc::new(classifier),
            DriftThresholds::default(),
            Duration::from_millis(50),
            2,
        );

        let err = p.detect(jpeg(), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Classification(ClassificationError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_hung_classifier_holds_its_slot() {
        let classifier = Arc::new(FixedClassifier {
            delay: Duration::from_millis(600),
            ..FixedClassifier::new(vec![2.0, 0.1, 3.0, 0.1])
        });
        let p = DriftPipeline::new(
            ImageDecoder::new(8, TensorLayout::Nchw),
            classifier.clone(),
            DriftThresholds::default(),
            Duration::from_millis(100),
            1,
        );

        let err = p.detect(jpeg(), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Classification(ClassificationError::Timeout(_))));

        // First call is still running: the second times out waiting for the
        // slot and never reaches the classifier
        let err = p.detect(jpeg(), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Classification(ClassificationError::Timeout(_))));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);

        // Slot is released once the blocking call returns
        tokio::time::sleep(Duration::from_millis(700)).await;
        let err = p.detect(jpeg(), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Classification(ClassificationError::Timeout(_))));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_respond_primary_and_backup() {
        let p = pipeline(Arc::new(FixedClassifier::new(vec![0.1, 0.1, 1.0, 0.1])));

        let primary = GenerativeRenderer::new(Arc::new(EchoRecommender));
        assert_eq!(p.respond(&primary, jpeg(), None).await, "generated for disengagement");

        assert_eq!(
            p.respond(&StaticRenderer, jpeg(), None).await,
            "Disengagement: careful, you're losing focus!"
        );
    }

    #[tokio::test]
    async fn test_respond_no_drift_is_shared() {
        let p = pipeline(Arc::new(FixedClassifier::new(vec![0.1, 0.1, 3.0, 0.1])));
        let primary = GenerativeRenderer::new(Arc::new(EchoRecommender));

        assert_eq!(p.respond(&primary, jpeg(), None).await, NO_DRIFT_MESSAGE);
        assert_eq!(p.respond(&StaticRenderer, jpeg(), None).await, NO_DRIFT_MESSAGE);
    }

    #[tokio::test]
    async fn test_respond_renders_failures() {
        let p = pipeline(Arc::new(FixedClassifier::new(vec![0.1, 0.1, 3.0, 0.1])));
        let primary = GenerativeRenderer::new(Arc::new(EchoRecommender));

        let text = p.respond(&primary, Bytes::from_static(b"not an image"), None).await;
        assert!(text.starts_with("Error in the process!"));
        assert!(text.contains("/backup"));

        let text = p.respond(&StaticRenderer, Bytes::from_static(b"not an image"), None).await;
        assert_eq!(text, "unsupported image format");
    }

    #[test]
    fn test_reject_renders_body_errors() {
        let primary = GenerativeRenderer::new(Arc::new(EchoRecommender));

        let text = DriftPipeline::reject(&primary, DecodeError::TooLarge(1024));
        assert!(text.contains("/backup"));
        assert!(text.ends_with("image payload exceeds 1024 bytes"));

        let text = DriftPipeline::reject(&StaticRenderer, DecodeError::TooLarge(1024));
        assert_eq!(text, "image payload exceeds 1024 bytes");
    }
}
