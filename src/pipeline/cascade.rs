//! Tiered recognition with graceful degradation.

use crate::core::traits::Recognizer;
use crate::domain::{
    Backend, BackendFailure, RasterImage, RawRecognition, RecognitionResult, RuleFallback,
    SourceTag,
};
use crate::pipeline::selector::BackendSelector;
use crate::processors::ReadableRenderer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Runs the selected tier off the async runtime and steps down one tier on
/// every failure. Never fails: the rule fallback closes the cascade.
#[derive(Debug, Clone)]
pub struct RecognitionCascade {
    selector: Arc<BackendSelector>,
    fallback: RuleFallback,
    renderer: ReadableRenderer,
    timeout: Duration,
}

impl RecognitionCascade {
    pub fn new(
        selector: Arc<BackendSelector>,
        renderer: ReadableRenderer,
        timeout: Duration,
    ) -> Self {
        Self {
            selector,
            fallback: RuleFallback::new(renderer.clone()),
            renderer,
            timeout,
        }
    }

    pub fn selector(&self) -> &Arc<BackendSelector> {
        &self.selector
    }

    pub async fn recognize(&self, image: &RasterImage) -> RecognitionResult {
        let mut next = self.resolve(None).await;
        while let Some((pos, backend)) = next {
            let tag = backend.tag();
            match self.run(backend, image).await {
                Ok(raw) => {
                    debug!(backend = %tag, "recognition succeeded");
                    return self.finish(raw, tag);
                }
                Err(failure) => {
                    warn!(
                        backend = %tag,
                        failure = failure.kind(),
                        error = %failure,
                        "recognition failed, trying next tier"
                    );
                    next = self.resolve(Some(pos + 1)).await;
                }
            }
        }
        let result = self.fallback.recognize(image);
        debug!(
            file = %image.file_name(),
            confidence = result.confidence(),
            "rule fallback used"
        );
        result
    }

    /// Tier loading may block (model files, process probes, HTTP client), so
    /// it runs on the blocking pool.
    async fn resolve(&self, from: Option<usize>) -> Option<(usize, Arc<Backend>)> {
        let selector = self.selector.clone();
        let joined = tokio::task::spawn_blocking(move || match from {
            None => selector.selected(),
            Some(pos) => selector.first_available_from(pos),
        })
        .await;
        match joined {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %err, "backend resolution task failed");
                None
            }
        }
    }

    async fn run(
        &self,
        backend: Arc<Backend>,
        image: &RasterImage,
    ) -> Result<RawRecognition, BackendFailure> {
        let image = image.clone();
        let task = tokio::task::spawn_blocking(move || backend.recognize(&image));
        let raw = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => return Err(BackendFailure::TimedOut(self.timeout.as_millis() as u64)),
            Ok(Err(join)) => return Err(BackendFailure::Join(join.to_string())),
            Ok(Ok(result)) => result?,
        };
        if raw.markup.trim().is_empty() {
            return Err(BackendFailure::MalformedOutput(
                "backend returned empty markup".to_string(),
            ));
        }
        Ok(raw)
    }

    /// Confidence is fixed per tier, never derived from the image.
    fn finish(&self, raw: RawRecognition, tag: SourceTag) -> RecognitionResult {
        let markup = raw.markup.trim().to_string();
        let text = raw
            .text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.renderer.render(&markup));
        RecognitionResult::new(markup, tag.tier_confidence(), tag, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::selector::BackendLoader;
    use crate::pipeline::selector::tests::{failing_loader, fixed_loader};
    use image::{DynamicImage, GrayImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Flaky {
        tag: SourceTag,
        failure: Option<BackendFailure>,
        delay: Duration,
        markup: &'static str,
    }

    impl Recognizer for Flaky {
        fn tag(&self) -> SourceTag {
            self.tag
        }

        fn recognize(&self, _image: &RasterImage) -> Result<RawRecognition, BackendFailure> {
            std::thread::sleep(self.delay);
            match &self.failure {
                Some(failure) => Err(failure.clone()),
                None => Ok(RawRecognition::markup(self.markup)),
            }
        }
    }

    fn flaky(
        tag: SourceTag,
        failure: Option<BackendFailure>,
        delay: Duration,
        markup: &'static str,
    ) -> (SourceTag, BackendLoader) {
        let loader: BackendLoader = Box::new(move || {
            Ok(Backend::External(Arc::new(Flaky {
                tag,
                failure: failure.clone(),
                delay,
                markup,
            })))
        });
        (tag, loader)
    }

    fn image(name: &str) -> RasterImage {
        RasterImage::from_image(
            format!("/tmp/{name}"),
            DynamicImage::ImageLuma8(GrayImage::new(4, 4)),
        )
    }

    fn cascade(loaders: Vec<(SourceTag, BackendLoader)>, timeout: Duration) -> RecognitionCascade {
        RecognitionCascade::new(
            Arc::new(BackendSelector::with_loaders(loaders)),
            ReadableRenderer::default(),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_selected_tier_result_carries_tier_confidence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cascade = cascade(
            vec![
                failing_loader(SourceTag::FormulaNet, calls.clone()),
                fixed_loader(SourceTag::Mathpix, r"\frac{1}{3}", calls.clone()),
            ],
            Duration::from_secs(5),
        );
        let result = cascade.recognize(&image("a.png")).await;
        assert_eq!(result.source, SourceTag::Mathpix);
        assert_eq!(result.markup, r"\frac{1}{3}");
        assert!((result.confidence() - 0.85).abs() < 1e-6);
        assert!(result.readable_text.contains("divided by"));
    }

    #[tokio::test]
    async fn test_runtime_failure_steps_down_one_tier() {
        let cascade = cascade(
            vec![
                flaky(
                    SourceTag::FormulaNet,
                    Some(BackendFailure::Runtime("boom".into())),
                    Duration::ZERO,
                    "",
                ),
                flaky(SourceTag::Tesseract, None, Duration::ZERO, "x + 1"),
            ],
            Duration::from_secs(5),
        );
        let result = cascade.recognize(&image("a.png")).await;
        assert_eq!(result.source, SourceTag::Tesseract);
        assert!((result.confidence() - 0.70).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_timeout_is_treated_as_failure() {
        let cascade = cascade(
            vec![
                flaky(SourceTag::FormulaNet, None, Duration::from_millis(500), "slow"),
                flaky(SourceTag::TextLine, None, Duration::ZERO, "y = 2"),
            ],
            Duration::from_millis(50),
        );
        let result = cascade.recognize(&image("a.png")).await;
        assert_eq!(result.source, SourceTag::TextLine);
        assert_eq!(result.markup, "y = 2");
    }

    #[tokio::test]
    async fn test_blank_output_is_malformed() {
        let cascade = cascade(
            vec![flaky(SourceTag::Mathpix, None, Duration::ZERO, "   ")],
            Duration::from_secs(5),
        );
        let result = cascade.recognize(&image("quadratic.png")).await;
        assert_eq!(result.source, SourceTag::RuleFallback);
        assert_eq!(result.markup, "x^2 + 5x + 6 = 0");
    }

    #[tokio::test]
    async fn test_exhausted_tiers_use_rule_fallback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cascade = cascade(
            vec![
                failing_loader(SourceTag::FormulaNet, calls.clone()),
                failing_loader(SourceTag::TextLine, calls.clone()),
            ],
            Duration::from_secs(5),
        );
        let first = cascade.recognize(&image("Fraction_01.PNG")).await;
        let second = cascade.recognize(&image("Fraction_01.PNG")).await;
        assert_eq!(first, second);
        assert_eq!(first.source, SourceTag::RuleFallback);
        assert!((first.confidence() - 0.75).abs() < 1e-6);
        assert!(first.readable_text.contains("three fourths"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
