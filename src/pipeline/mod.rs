//! End-to-end processing of photographed expressions.
//!
//! For one image: load, preprocess, recognize through the backend cascade,
//! repair garbled markup, normalize, then translate/analyze/solve and render
//! in parallel. Every recoverable problem degrades the outcome instead of
//! failing it; only an unreadable image yields an error field.

pub mod cascade;
pub mod config;
pub mod preprocess;
pub mod result;
pub mod selector;

pub use cascade::RecognitionCascade;
pub use config::{BackendConfig, PipelineConfig};
pub use preprocess::{ImagePreprocessor, PreprocessConfig, estimate_skew};
pub use result::{ImageOutcome, JobReport, RecognitionPayload, ValidationResult};
pub use selector::{BackendLoader, BackendSelector};

use crate::core::config::ConfigValidator;
use crate::core::errors::{MathError, ProcessingStage};
use crate::domain::{RasterImage, RecognitionResult, SourceTag};
use crate::processors::{GarbleDetector, MarkupNormalizer, ReadableRenderer, simplify_garbled};
use crate::symbolic::{
    AnalysisReport, SolveReport, SymbolicExpression, SymbolicTranslator, analyze, simplify,
    solve_equation,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Builder for [`MathPipeline`].
#[derive(Debug, Default)]
pub struct MathPipelineBuilder {
    config: PipelineConfig,
    selector: Option<Arc<BackendSelector>>,
}

impl MathPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share or replace the backend selector. Defaults to one built from
    /// the backend configuration.
    pub fn selector(mut self, selector: Arc<BackendSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn build(self) -> Result<MathPipeline, MathError> {
        self.config.validate()?;
        let config = self.config;
        let selector = self
            .selector
            .unwrap_or_else(|| Arc::new(BackendSelector::from_config(&config.backends)));
        let renderer = ReadableRenderer::new(config.readable.clone());
        let cascade =
            RecognitionCascade::new(selector, renderer.clone(), config.recognition_timeout());
        Ok(MathPipeline {
            preprocessor: ImagePreprocessor::new(config.preprocess.clone()),
            cascade,
            detector: GarbleDetector::new(config.garble.clone()),
            normalizer: MarkupNormalizer::new(),
            translator: SymbolicTranslator::new(config.translator.clone()),
            renderer,
            config,
        })
    }
}

/// Symbolic outcome for canonical markup.
struct Validation {
    result: ValidationResult,
    solution: Option<SolveReport>,
}

/// The full recognition and validation pipeline.
#[derive(Debug, Clone)]
pub struct MathPipeline {
    config: PipelineConfig,
    preprocessor: ImagePreprocessor,
    cascade: RecognitionCascade,
    detector: GarbleDetector,
    normalizer: MarkupNormalizer,
    translator: SymbolicTranslator,
    renderer: ReadableRenderer,
}

impl MathPipeline {
    pub fn builder() -> MathPipelineBuilder {
        MathPipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn selector(&self) -> &Arc<BackendSelector> {
        self.cascade.selector()
    }

    /// Process one image. Never fails; an unreadable image is reported in
    /// `validation.error`.
    pub async fn process_image(
        &self,
        path: impl AsRef<Path>,
        context: Option<&str>,
    ) -> ImageOutcome {
        let path = path.as_ref();
        let request_id = Uuid::new_v4();
        let context = context.map(str::to_string);

        let image = match self.load(path).await {
            Ok(image) => image,
            Err(err) => {
                warn!(%request_id, path = %path.display(), error = %err, "image unreadable");
                return ImageOutcome {
                    image_path: path.display().to_string(),
                    recognition: RecognitionPayload::empty(),
                    validation: ValidationResult::failed("", format!("image unreadable: {err}")),
                    solution: None,
                    context,
                };
            }
        };

        let recognized = self.cascade.recognize(&image).await;
        let recognized = self.repair_garbled(recognized, request_id);
        let canonical = self.normalizer.normalize(&recognized.markup);

        let (validation, rendered) = self.validate_and_render(&canonical, request_id).await;

        // Fallback wording is fixed per rule.
        let text = match rendered {
            Some(rendered) if recognized.source != SourceTag::RuleFallback => rendered,
            _ => recognized.readable_text.clone(),
        };

        info!(
            %request_id,
            path = %path.display(),
            backend = %recognized.source,
            confidence = recognized.confidence(),
            valid = validation.result.valid,
            "image processed"
        );

        ImageOutcome {
            image_path: path.display().to_string(),
            recognition: RecognitionPayload {
                latex: canonical,
                confidence: recognized.confidence(),
                text,
                source: recognized.source.to_string(),
            },
            validation: validation.result,
            solution: validation.solution,
            context,
        }
    }

    /// Process a job's images in order. One image never affects another.
    pub async fn process_job(
        &self,
        job_id: impl Into<String>,
        paths: &[PathBuf],
        context: Option<&str>,
    ) -> JobReport {
        let job_id = job_id.into();
        info!(job_id = %job_id, images = paths.len(), "job started");
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            outcomes.push(self.process_image(path, context).await);
        }
        let report = JobReport::new(job_id, outcomes);
        info!(
            job_id = %report.job_id,
            succeeded = report.succeeded,
            failed = report.failed,
            "job finished"
        );
        report
    }

    /// Decode and preprocess on the blocking pool.
    async fn load(&self, path: &Path) -> Result<RasterImage, MathError> {
        let path = path.to_path_buf();
        let preprocessor = self.preprocessor.clone();
        tokio::task::spawn_blocking(move || {
            let image = RasterImage::open(&path)?;
            preprocessor.preprocess(&image)
        })
        .await
        .map_err(|err| MathError::processing(ProcessingStage::Preprocess, "preprocess task", err))?
    }

    fn repair_garbled(&self, result: RecognitionResult, request_id: Uuid) -> RecognitionResult {
        let report = self.detector.detect(&result.markup);
        if !report.garbled {
            return result;
        }
        let markup = simplify_garbled(&result.markup);
        warn!(
            %request_id,
            backend = %result.source,
            score = report.score,
            triggered = ?report.triggered,
            simplified = %markup,
            "garbled markup simplified"
        );
        let text = self.renderer.render(&markup);
        let confidence = self.detector.thresholds().simplified_confidence;
        result.simplified(markup, confidence, text)
    }

    /// Symbolic validation and rendering share no data, so they run side by
    /// side on the blocking pool, away from the runtime's workers.
    async fn validate_and_render(
        &self,
        canonical: &str,
        request_id: Uuid,
    ) -> (Validation, Option<String>) {
        let translator = self.translator.clone();
        let renderer = self.renderer.clone();
        let markup = canonical.to_string();
        let joined = tokio::task::spawn_blocking(move || {
            let (validation, rendered) =
                rayon::join(|| validate(&translator, &markup), || renderer.render(&markup));
            (validation, Some(rendered))
        })
        .await;
        joined.unwrap_or_else(|err| {
            warn!(%request_id, error = %err, "validation task failed");
            let validation = Validation {
                result: ValidationResult::failed(canonical, format!("validation failed: {err}")),
                solution: None,
            };
            (validation, None)
        })
    }
}

fn validate(translator: &SymbolicTranslator, canonical: &str) -> Validation {
    let expression = translator.translate(canonical);
    if let SymbolicExpression::Unparseable(marker) = &expression {
        return Validation {
            result: ValidationResult {
                sympy_expression: Some(marker.to_string()),
                ..ValidationResult::failed(
                    canonical,
                    format!("expression could not be parsed ({marker})"),
                )
            },
            solution: None,
        };
    }

    let analysis: Option<AnalysisReport> = analyze(&expression);
    let solution = matches!(expression, SymbolicExpression::Equation { .. })
        .then(|| solve_equation(&expression));
    Validation {
        result: ValidationResult {
            valid: true,
            sympy_expression: Some(expression.to_string()),
            simplified: Some(simplified_form(&expression)),
            analysis,
            original_latex: canonical.to_string(),
            error: None,
        },
        solution,
    }
}

fn simplified_form(expression: &SymbolicExpression) -> String {
    match expression {
        SymbolicExpression::Expr(expr) => simplify(expr.clone()).to_string(),
        SymbolicExpression::Equation { lhs, rhs } => format!(
            "Eq({}, {})",
            simplify(lhs.clone()),
            simplify(rhs.clone())
        ),
        SymbolicExpression::Unparseable(marker) => marker.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::Recognizer;
    use crate::domain::{Backend, BackendFailure, RawRecognition};
    use crate::pipeline::selector::tests::fixed_loader;
    use crate::processors::TextMarkupPostProcessor;
    use crate::symbolic::Classification;
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::atomic::AtomicUsize;

    fn write_png(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut img = GrayImage::from_pixel(120, 60, Luma([250]));
        for x in 20..100 {
            for y in 25..35 {
                img.put_pixel(x, y, Luma([10]));
            }
        }
        DynamicImage::ImageLuma8(img).save(&path).unwrap();
        path
    }

    fn pipeline_with(selector: BackendSelector) -> MathPipeline {
        MathPipeline::builder()
            .config(PipelineConfig {
                backends: BackendConfig::rule_fallback_only(),
                ..PipelineConfig::default()
            })
            .selector(Arc::new(selector))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_fallback_quadratic_is_solved() {
        let pipeline = pipeline_with(BackendSelector::empty());
        let path = write_png("quadratic.png");
        let outcome = pipeline.process_image(&path, Some("homework")).await;

        assert_eq!(outcome.recognition.source, "rule_fallback");
        assert_eq!(outcome.recognition.latex, "x^{2} + 5x + 6 = 0");
        assert!(outcome.validation.valid);
        let analysis = outcome.validation.analysis.unwrap();
        assert_eq!(analysis.classification, Classification::Equation);
        assert_eq!(analysis.degree, Some(2));
        let solution = outcome.solution.unwrap();
        assert!(solution.solvable);
        assert_eq!(solution.solutions["x"], vec!["-3".to_string(), "-2".to_string()]);
        assert_eq!(outcome.context.as_deref(), Some("homework"));
    }

    #[tokio::test]
    async fn test_garbled_backend_output_is_simplified() {
        let garbled = r"\sum \frac{\frac{\frac{\frac{\frac{\frac{\frac{\frac{\frac{x}{1}}{2}}{3}}{4}}{5}}{6}}{7}}{8}}{9}";
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = pipeline_with(BackendSelector::with_loaders(vec![fixed_loader(
            SourceTag::FormulaNet,
            garbled,
            calls,
        )]));
        let path = write_png("scan.png");
        let outcome = pipeline.process_image(&path, None).await;

        assert_eq!(outcome.recognition.source, "formula_net");
        assert!((outcome.recognition.confidence - 0.4).abs() < 1e-6);
        assert_eq!(outcome.recognition.latex, r"\sum x");
    }

    /// Recognizes through the same post-processing the text-line and
    /// Tesseract adapters apply to their raw text.
    #[derive(Debug)]
    struct TextTier {
        tag: SourceTag,
        text: String,
    }

    impl Recognizer for TextTier {
        fn tag(&self) -> SourceTag {
            self.tag
        }

        fn recognize(&self, _image: &RasterImage) -> Result<RawRecognition, BackendFailure> {
            let markup = TextMarkupPostProcessor::new().process(&self.text);
            Ok(RawRecognition::markup(markup))
        }
    }

    fn text_tier(tag: SourceTag, text: String) -> BackendSelector {
        let loader: BackendLoader = Box::new(move || {
            Ok(Backend::External(Arc::new(TextTier {
                tag,
                text: text.clone(),
            })))
        });
        BackendSelector::with_loaders(vec![(tag, loader)])
    }

    #[tokio::test]
    async fn test_garbled_text_tier_output_lowers_confidence() {
        let garbled = format!("{}x 2{}", "{".repeat(21), "}".repeat(21));
        let pipeline = pipeline_with(text_tier(SourceTag::Tesseract, garbled));
        let outcome = pipeline.process_image(write_png("scan.png"), None).await;

        assert_eq!(outcome.recognition.source, "tesseract");
        assert_eq!(outcome.recognition.latex, "x^{2}");
        assert!((outcome.recognition.confidence - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_garble_thresholds_apply_to_text_tiers() {
        let garbled = format!("{}x 2{}", "{".repeat(21), "}".repeat(21));
        let mut config = PipelineConfig {
            backends: BackendConfig::rule_fallback_only(),
            ..PipelineConfig::default()
        };
        config.garble.simplified_confidence = 0.25;
        let pipeline = MathPipeline::builder()
            .config(config)
            .selector(Arc::new(text_tier(SourceTag::TextLine, garbled)))
            .build()
            .unwrap();
        let outcome = pipeline.process_image(write_png("scan.png"), None).await;

        assert_eq!(outcome.recognition.source, "text_line");
        assert!((outcome.recognition.confidence - 0.25).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_clean_text_tier_output_keeps_tier_confidence() {
        let pipeline = pipeline_with(text_tier(SourceTag::TextLine, "2 x + 3 = 7".into()));
        let outcome = pipeline.process_image(write_png("scan.png"), None).await;

        assert_eq!(outcome.recognition.latex, "2x + 3 = 7");
        assert!((outcome.recognition.confidence - 0.75).abs() < 1e-6);
        assert!(outcome.validation.valid);
    }

    #[tokio::test]
    async fn test_large_product_validates_without_expanding() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = pipeline_with(BackendSelector::with_loaders(vec![fixed_loader(
            SourceTag::Mathpix,
            "(x+y+z+t)^{8}(x+y+z-t)^{8}",
            calls,
        )]));
        let outcome = pipeline.process_image(write_png("scan.png"), None).await;

        assert!(outcome.validation.valid, "{:?}", outcome.validation);
        let simplified = outcome.validation.simplified.unwrap();
        assert!(simplified.contains("**8"), "{simplified}");
    }

    #[tokio::test]
    async fn test_unparseable_markup_is_invalid_but_rendered() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = pipeline_with(BackendSelector::with_loaders(vec![fixed_loader(
            SourceTag::Tesseract,
            r"x + \frac{1}{3} +",
            calls,
        )]));
        let outcome = pipeline.process_image(write_png("a.png"), None).await;
        assert!(!outcome.validation.valid);
        assert_eq!(
            outcome.validation.sympy_expression.as_deref(),
            Some("unparseable_expression")
        );
        assert!(outcome.recognition.text.contains("divided by"));
    }

    #[tokio::test]
    async fn test_missing_image_does_not_affect_siblings() {
        let pipeline = pipeline_with(BackendSelector::empty());
        let paths = vec![
            PathBuf::from("/nonexistent/equation.png"),
            write_png("equation.png"),
        ];
        let report = pipeline.process_job("job-1", &paths, None).await;
        assert_eq!(report.images.len(), 2);
        assert_eq!((report.succeeded, report.failed), (1, 1));

        let missing = &report.images[0];
        assert_eq!(missing.recognition.source, "none");
        assert_eq!(missing.recognition.confidence, 0.0);
        assert!(missing.validation.error.as_deref().unwrap().contains("unreadable"));
        assert!(report.images[1].validation.valid);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = MathPipeline::builder()
            .config(PipelineConfig {
                recognition_timeout_ms: 0,
                ..PipelineConfig::default()
            })
            .build();
        assert!(matches!(result, Err(MathError::ConfigError { .. })));
    }
}
