#[cfg(feature = "onnx")]
pub mod onnx;

use std::path::Path;

use image::{GrayImage, RgbImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};
use tracing::{debug, warn};

use crate::{
    error::{GrazeError, Result},
    traits::LivestockDetector,
};

#[cfg(feature = "onnx")]
pub use onnx::YoloSegDetector;

/// Animal classes the analyzer accepts, with their COCO class ids
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Species {
    Cat,
    Dog,
    Horse,
    Sheep,
    Cow,
    Elephant,
    Bear,
    Zebra,
    Giraffe,
}

impl Species {
    /// Map a COCO class id to a species; ids outside 15..=23 are not livestock
    pub fn from_coco_class(class_id: usize) -> Option<Self> {
        Some(match class_id {
            15 => Self::Cat,
            16 => Self::Dog,
            17 => Self::Horse,
            18 => Self::Sheep,
            19 => Self::Cow,
            20 => Self::Elephant,
            21 => Self::Bear,
            22 => Self::Zebra,
            23 => Self::Giraffe,
            _ => return None,
        })
    }

    pub fn coco_class(self) -> usize {
        match self {
            Self::Cat => 15,
            Self::Dog => 16,
            Self::Horse => 17,
            Self::Sheep => 18,
            Self::Cow => 19,
            Self::Elephant => 20,
            Self::Bear => 21,
            Self::Zebra => 22,
            Self::Giraffe => 23,
        }
    }

    pub fn names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    /// Parse a user-supplied name, reporting unknown names as errors
    pub fn parse(name: &str) -> Result<Self> {
        name.trim()
            .parse()
            .map_err(|_| GrazeError::UnknownSpecies(name.to_string()))
    }
}

/// One animal instance found in an image.
///
/// The mask has the dimensions of the image it was detected in; non-zero
/// pixels belong to the animal.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub species: Species,
    pub confidence: f32,
    pub mask: GrayImage,
}

impl Detection {
    pub fn new(species: Species, confidence: f32, mask: GrayImage) -> Self {
        Self {
            species,
            confidence,
            mask,
        }
    }
}

/// Inference settings for the YOLOv8-seg detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct YoloSegConfig {
    /// Square model input size in pixels
    pub input_size: u32,
    pub iou_threshold: f32,
    /// Prototype mask probability above which a pixel is foreground
    pub mask_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloSegConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            iou_threshold: 0.45,
            mask_threshold: 0.5,
            max_detections: 100,
        }
    }
}

/// Serves a segmentation mask produced ahead of time as a single detection
#[derive(Debug, Clone)]
pub struct PrecomputedMaskDetector {
    detection: Detection,
}

impl PrecomputedMaskDetector {
    pub fn new(mask: GrayImage, species: Species, confidence: f32) -> Self {
        Self {
            detection: Detection::new(species, confidence, mask),
        }
    }

    /// Load the mask from an image file; colour images are converted to luma
    pub fn from_path<P: AsRef<Path>>(path: P, species: Species, confidence: f32) -> Result<Self> {
        let mask = image::open(path.as_ref())?.to_luma8();
        debug!(
            path = %path.as_ref().display(),
            width = mask.width(),
            height = mask.height(),
            "loaded precomputed mask"
        );
        Ok(Self::new(mask, species, confidence))
    }
}

impl LivestockDetector for PrecomputedMaskDetector {
    fn detect(&self, _image: &RgbImage, confidence_threshold: f32) -> Result<Vec<Detection>> {
        if self.detection.confidence < confidence_threshold {
            warn!(
                confidence = self.detection.confidence,
                threshold = confidence_threshold,
                "precomputed mask is below the confidence threshold"
            );
            return Ok(Vec::new());
        }
        Ok(vec![self.detection.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use strum::IntoEnumIterator;

    #[test]
    fn test_coco_mapping_covers_allow_list() {
        for species in Species::iter() {
            assert_eq!(Species::from_coco_class(species.coco_class()), Some(species));
        }
        assert_eq!(Species::from_coco_class(19), Some(Species::Cow));
        assert_eq!(Species::from_coco_class(0), None); // person
        assert_eq!(Species::from_coco_class(14), None); // bird
        assert_eq!(Species::from_coco_class(24), None); // backpack
    }

    #[test]
    fn test_species_names() {
        assert_eq!(Species::names().len(), 9);
        assert_eq!(Species::Giraffe.to_string(), "giraffe");
        assert_eq!(Species::parse("Cow").expect("Should parse"), Species::Cow);
        assert!(matches!(
            Species::parse("unicorn"),
            Err(GrazeError::UnknownSpecies(name)) if name == "unicorn"
        ));
        assert_eq!(
            serde_json::to_value(Species::Sheep).expect("Should serialize"),
            serde_json::json!("sheep")
        );
    }

    #[test]
    fn test_precomputed_detector_respects_threshold() {
        let mask = GrayImage::from_pixel(8, 8, Luma([255]));
        let image = RgbImage::new(8, 8);
        let detector = PrecomputedMaskDetector::new(mask, Species::Cow, 0.6);

        let detections = detector.detect(&image, 0.25).expect("Should detect");
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].species, Species::Cow);

        assert!(detector.detect(&image, 0.7).expect("Should detect").is_empty());
    }

    #[test]
    fn test_precomputed_detector_from_file() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let path = dir.path().join("mask.png");
        GrayImage::from_fn(12, 6, |x, _| Luma([if x < 6 { 255 } else { 0 }]))
            .save(&path)
            .expect("Should save mask");

        let detector =
            PrecomputedMaskDetector::from_path(&path, Species::Horse, 1.0).expect("Should load");
        let detections = detector.detect(&RgbImage::new(12, 6), 0.25).expect("Should detect");
        assert_eq!(detections[0].mask.dimensions(), (12, 6));
        assert_eq!(detections[0].mask.get_pixel(2, 2)[0], 255);
        assert_eq!(detections[0].mask.get_pixel(9, 2)[0], 0);
    }

    #[test]
    fn test_missing_mask_file_is_an_error() {
        let result = PrecomputedMaskDetector::from_path("/nonexistent/mask.png", Species::Cow, 1.0);
        assert!(result.is_err());
    }
}
