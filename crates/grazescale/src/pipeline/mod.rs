pub mod builder;

use std::path::Path;

use image::{GrayImage, RgbImage};
use tracing::{debug, info, warn};

use crate::{
    algorithms::{largest_contour, ExternalContourExtractor, MeasurementExtractor},
    config::{AnalyzerConfig, CleanupConfig},
    detection::{Detection, Species},
    error::{GrazeError, Result},
    traits::{ContourExtractor, ImageEnhancer, LivestockDetector, MaskCleaner},
    types::{Analysis, Contour, MeasurementFailure, ReferenceArea},
};

pub use builder::{AnalyzerBuilder, MaskPostProcessorBuilder};

/// Turns a raw segmentation mask into the single contour to be measured.
///
/// Runs the clean-up steps in order, extracts the outer contours and keeps
/// the one with the largest area.
pub struct MaskPostProcessor {
    cleaners: Vec<Box<dyn MaskCleaner>>,
    contour_extractor: Box<dyn ContourExtractor>,
}

impl MaskPostProcessor {
    pub fn builder() -> MaskPostProcessorBuilder {
        MaskPostProcessorBuilder::new()
    }

    pub fn new(cleaners: Vec<Box<dyn MaskCleaner>>, contour_extractor: Box<dyn ContourExtractor>) -> Self {
        Self {
            cleaners,
            contour_extractor,
        }
    }

    /// Apply the clean-up steps only
    pub fn clean(&self, mask: &GrayImage) -> Result<GrayImage> {
        let mut cleaned = mask.clone();
        for cleaner in &self.cleaners {
            cleaned = cleaner.clean(&cleaned)?;
        }
        Ok(cleaned)
    }

    /// Largest outer contour of the cleaned mask, or `None` when nothing survives clean-up
    pub fn process(&self, mask: &GrayImage) -> Result<Option<Contour>> {
        let cleaned = self.clean(mask)?;
        let contours = self.contour_extractor.extract_contours(&cleaned)?;
        let candidates = contours.len();

        let contour = largest_contour(contours).filter(|c| !c.is_empty());
        if let Some(c) = &contour {
            debug!(candidates, points = c.len(), area = c.area(), "selected largest contour");
        }
        Ok(contour)
    }

    pub fn info(&self) -> String {
        format!("MaskPostProcessor: {} clean-up steps, 1 contour extractor", self.cleaners.len())
    }
}

impl Default for MaskPostProcessor {
    fn default() -> Self {
        Self::new(
            CleanupConfig::default().cleaners(),
            Box::new(ExternalContourExtractor::default()),
        )
    }
}

/// Result of one analysis together with what it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub analysis: Analysis,
    pub species: Option<Species>,
    pub confidence: Option<f32>,
    pub contour: Option<Contour>,
    pub image_width: u32,
    pub image_height: u32,
}

impl AnalysisReport {
    fn failed(failure: MeasurementFailure, image: &RgbImage) -> Self {
        Self {
            analysis: Analysis::failed(failure),
            species: None,
            confidence: None,
            contour: None,
            image_width: image.width(),
            image_height: image.height(),
        }
    }
}

/// End-to-end livestock measurement: enhancement, detection, mask
/// post-processing and measurement, with the detector supplied by the caller.
pub struct LivestockAnalyzer<D: LivestockDetector> {
    detector: D,
    enhancers: Vec<Box<dyn ImageEnhancer>>,
    post_processor: MaskPostProcessor,
    measurement: MeasurementExtractor,
    confidence_threshold: f32,
}

impl<D: LivestockDetector> LivestockAnalyzer<D> {
    /// Analyzer with the default enhancement, clean-up and threshold
    pub fn new(detector: D) -> Self {
        Self::from_config(detector, &AnalyzerConfig::default())
    }

    pub fn from_config(detector: D, config: &AnalyzerConfig) -> Self {
        Self::builder(detector)
            .confidence_threshold(config.confidence_threshold)
            .enhancers(config.enhancement.enhancers())
            .post_processor(MaskPostProcessor::new(
                config.cleanup.cleaners(),
                Box::new(config.contour_extractor()),
            ))
            .build()
    }

    pub fn builder(detector: D) -> AnalyzerBuilder<D> {
        AnalyzerBuilder::new(detector)
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Run the enhancement chain; the output keeps the input dimensions
    pub fn enhance(&self, image: &RgbImage) -> Result<RgbImage> {
        let mut enhanced = image.clone();
        for enhancer in &self.enhancers {
            enhanced = enhancer.enhance(&enhanced)?;
        }
        Ok(enhanced)
    }

    pub fn analyze(&self, image: &RgbImage, reference: Option<ReferenceArea>) -> Result<Analysis> {
        Ok(self.analyze_detailed(image, reference)?.analysis)
    }

    /// Decode an image file and analyze it
    pub fn analyze_file<P: AsRef<Path>>(&self, path: P, reference: Option<ReferenceArea>) -> Result<Analysis> {
        Ok(self.analyze_file_detailed(path, reference)?.analysis)
    }

    pub fn analyze_file_detailed<P: AsRef<Path>>(&self, path: P, reference: Option<ReferenceArea>) -> Result<AnalysisReport> {
        let image = image::open(path.as_ref())?.to_rgb8();
        debug!(path = %path.as_ref().display(), width = image.width(), height = image.height(), "decoded image");
        self.analyze_detailed(&image, reference)
    }

    pub fn analyze_detailed(&self, image: &RgbImage, reference: Option<ReferenceArea>) -> Result<AnalysisReport> {
        let enhanced = self.enhance(image)?;
        let detections = self.detector.detect(&enhanced, self.confidence_threshold)?;
        let candidates = detections.len();

        let Some(detection) = detections.into_iter().next() else {
            info!("no livestock detected");
            return Ok(AnalysisReport::failed(MeasurementFailure::NoDetection, image));
        };
        info!(
            species = %detection.species,
            confidence = detection.confidence,
            candidates,
            "selected detection"
        );

        if detection.mask.dimensions() != image.dimensions() {
            return Err(GrazeError::MaskDimensionMismatch {
                mask_width: detection.mask.width(),
                mask_height: detection.mask.height(),
                image_width: image.width(),
                image_height: image.height(),
            });
        }

        let (analysis, contour) = self.measure_mask(&detection.mask, reference)?;
        Ok(AnalysisReport {
            analysis,
            species: Some(detection.species),
            confidence: Some(detection.confidence),
            contour,
            image_width: image.width(),
            image_height: image.height(),
        })
    }

    /// Post-process and measure an already available detection
    pub fn analyze_detection(&self, detection: &Detection, reference: Option<ReferenceArea>) -> Result<Analysis> {
        Ok(self.measure_mask(&detection.mask, reference)?.0)
    }

    fn measure_mask(&self, mask: &GrayImage, reference: Option<ReferenceArea>) -> Result<(Analysis, Option<Contour>)> {
        let Some(contour) = self.post_processor.process(mask)? else {
            warn!("mask has no usable contour after clean-up");
            return Ok((Analysis::failed(MeasurementFailure::NoContour), None));
        };

        let analysis = match self.measurement.extract(&contour, reference) {
            Some(features) => {
                if reference.is_some() && !features.is_calibrated() {
                    warn!("body length is zero, skipping calibration");
                }
                Analysis::Measured(features)
            }
            None => Analysis::failed(MeasurementFailure::NoContour),
        };
        Ok((analysis, Some(contour)))
    }
}
