use image::{GrayImage, RgbImage};
use crate::{
    detection::Detection,
    error::Result,
    types::Contour,
};

/// Trait for photo enhancement steps run before detection
pub trait ImageEnhancer: Send + Sync {
    /// Enhance the image; implementations must keep its dimensions
    fn enhance(&self, image: &RgbImage) -> Result<RgbImage>;
}

/// Trait for binary mask clean-up steps
pub trait MaskCleaner: Send + Sync {
    /// Clean a binary mask (non-zero = foreground)
    fn clean(&self, mask: &GrayImage) -> Result<GrayImage>;
}

/// Trait for contour extraction algorithms
pub trait ContourExtractor: Send + Sync {
    /// Extract the outer contours of a binary mask
    fn extract_contours(&self, mask: &GrayImage) -> Result<Vec<Contour>>;
}

/// The detection/segmentation collaborator.
///
/// Returns the livestock instances found in `image` whose score is at least
/// `confidence_threshold`. An empty vector means nothing was detected.
pub trait LivestockDetector: Send + Sync {
    fn detect(&self, image: &RgbImage, confidence_threshold: f32) -> Result<Vec<Detection>>;
}

impl<D: LivestockDetector + ?Sized> LivestockDetector for Box<D> {
    fn detect(&self, image: &RgbImage, confidence_threshold: f32) -> Result<Vec<Detection>> {
        (**self).detect(image, confidence_threshold)
    }
}
