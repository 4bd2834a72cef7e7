use crate::{
    algorithms::{ExternalContourExtractor, MeasurementExtractor},
    config::{AnalyzerConfig, CleanupConfig, EnhancementConfig},
    pipeline::{LivestockAnalyzer, MaskPostProcessor},
    traits::{ContourExtractor, ImageEnhancer, LivestockDetector, MaskCleaner},
};

/// Builder for [`MaskPostProcessor`] with a fluent API
pub struct MaskPostProcessorBuilder {
    cleaners: Vec<Box<dyn MaskCleaner>>,
    contour_extractor: Option<Box<dyn ContourExtractor>>,
}

impl MaskPostProcessorBuilder {
    pub fn new() -> Self {
        Self {
            cleaners: Vec::new(),
            contour_extractor: None,
        }
    }

    /// Append a clean-up step; steps run in insertion order
    pub fn add_cleaner<C>(mut self, cleaner: C) -> Self
    where
        C: MaskCleaner + 'static,
    {
        self.cleaners.push(Box::new(cleaner));
        self
    }

    /// Binarize, drop small components and fill holes
    pub fn with_default_cleanup(mut self) -> Self {
        self.cleaners.extend(CleanupConfig::default().cleaners());
        self
    }

    /// Set the contour extractor (replaces any existing one)
    pub fn set_contour_extractor<E>(mut self, extractor: E) -> Self
    where
        E: ContourExtractor + 'static,
    {
        self.contour_extractor = Some(Box::new(extractor));
        self
    }

    pub fn build(self) -> MaskPostProcessor {
        let contour_extractor = self
            .contour_extractor
            .unwrap_or_else(|| Box::new(ExternalContourExtractor::default()));
        MaskPostProcessor::new(self.cleaners, contour_extractor)
    }
}

impl Default for MaskPostProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`LivestockAnalyzer`]; unset parts fall back to the defaults
pub struct AnalyzerBuilder<D: LivestockDetector> {
    detector: D,
    enhancers: Option<Vec<Box<dyn ImageEnhancer>>>,
    post_processor: Option<MaskPostProcessor>,
    measurement: MeasurementExtractor,
    confidence_threshold: f32,
}

impl<D: LivestockDetector> AnalyzerBuilder<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            enhancers: None,
            post_processor: None,
            measurement: MeasurementExtractor::default(),
            confidence_threshold: AnalyzerConfig::default().confidence_threshold,
        }
    }

    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Replace the whole enhancement chain
    pub fn enhancers(mut self, enhancers: Vec<Box<dyn ImageEnhancer>>) -> Self {
        self.enhancers = Some(enhancers);
        self
    }

    pub fn add_enhancer<E>(mut self, enhancer: E) -> Self
    where
        E: ImageEnhancer + 'static,
    {
        self.enhancers.get_or_insert_with(Vec::new).push(Box::new(enhancer));
        self
    }

    /// Feed the photo to the detector unchanged
    pub fn without_enhancement(self) -> Self {
        self.enhancers(Vec::new())
    }

    pub fn post_processor(mut self, post_processor: MaskPostProcessor) -> Self {
        self.post_processor = Some(post_processor);
        self
    }

    pub fn measurement(mut self, measurement: MeasurementExtractor) -> Self {
        self.measurement = measurement;
        self
    }

    pub fn build(self) -> LivestockAnalyzer<D> {
        LivestockAnalyzer {
            detector: self.detector,
            enhancers: self
                .enhancers
                .unwrap_or_else(|| EnhancementConfig::default().enhancers()),
            post_processor: self.post_processor.unwrap_or_default(),
            measurement: self.measurement,
            confidence_threshold: self.confidence_threshold,
        }
    }
}
