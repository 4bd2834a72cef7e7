use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    algorithms::{
        ClaheEnhancer, ContourApproximation, ExternalContourExtractor, GaussianBlurEnhancer, HoleFiller,
        MaskBinarizer, SharpenEnhancer, SmallObjectRemover,
    },
    detection::YoloSegConfig,
    traits::{ImageEnhancer, MaskCleaner},
};

/// Settings for a [`LivestockAnalyzer`](crate::pipeline::LivestockAnalyzer).
///
/// Every field has a default, so an empty TOML table or `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Minimum detection score passed to the detector
    #[schemars(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f32,
    pub enhancement: EnhancementConfig,
    pub cleanup: CleanupConfig,
    pub approximation: ContourApproximation,
    /// Segmentation model; only used by builds with ONNX support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelConfig>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            enhancement: EnhancementConfig::default(),
            cleanup: CleanupConfig::default(),
            approximation: ContourApproximation::Simple,
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EnhancementConfig {
    pub enabled: bool,
    pub clahe_clip_limit: f32,
    pub clahe_tile_grid: u32,
    pub sharpen: bool,
    /// Zero disables the blur
    pub blur_sigma: f32,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            clahe_clip_limit: 2.5,
            clahe_tile_grid: 8,
            sharpen: true,
            blur_sigma: 0.8,
        }
    }
}

impl EnhancementConfig {
    pub fn enhancers(&self) -> Vec<Box<dyn ImageEnhancer>> {
        if !self.enabled {
            return Vec::new();
        }

        let mut enhancers: Vec<Box<dyn ImageEnhancer>> = vec![Box::new(ClaheEnhancer {
            clip_limit: self.clahe_clip_limit,
            tile_grid: self.clahe_tile_grid,
        })];
        if self.sharpen {
            enhancers.push(Box::new(SharpenEnhancer::default()));
        }
        if self.blur_sigma > 0.0 {
            enhancers.push(Box::new(GaussianBlurEnhancer {
                sigma: self.blur_sigma,
            }));
        }
        enhancers
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CleanupConfig {
    /// Components with fewer pixels than this are dropped
    pub min_object_size: u32,
    pub fill_holes: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            min_object_size: 100,
            fill_holes: true,
        }
    }
}

impl CleanupConfig {
    pub fn cleaners(&self) -> Vec<Box<dyn MaskCleaner>> {
        let mut cleaners: Vec<Box<dyn MaskCleaner>> = vec![
            Box::new(MaskBinarizer::default()),
            Box::new(SmallObjectRemover {
                min_size: self.min_object_size,
                ..SmallObjectRemover::default()
            }),
        ];
        if self.fill_holes {
            cleaners.push(Box::new(HoleFiller));
        }
        cleaners
    }
}

impl AnalyzerConfig {
    pub fn contour_extractor(&self) -> ExternalContourExtractor {
        ExternalContourExtractor::new(self.approximation)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelConfig {
    /// Path to a YOLOv8-seg ONNX export
    pub path: PathBuf,
    #[serde(flatten)]
    pub inference: YoloSegConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AnalyzerConfig = serde_json::from_str("{}").expect("Should parse");
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.confidence_threshold, 0.25);
        assert_eq!(config.cleanup.min_object_size, 100);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config: AnalyzerConfig = serde_json::from_value(serde_json::json!({
            "confidence_threshold": 0.4,
            "enhancement": { "sharpen": false },
            "approximation": "none",
            "model": { "path": "yolov8n-seg.onnx", "iou_threshold": 0.5 }
        }))
        .expect("Should parse");

        assert_eq!(config.confidence_threshold, 0.4);
        assert!(!config.enhancement.sharpen);
        assert_eq!(config.enhancement.clahe_tile_grid, 8);
        assert_eq!(config.approximation, ContourApproximation::None);

        let model = config.model.expect("Should have a model");
        assert_eq!(model.path, PathBuf::from("yolov8n-seg.onnx"));
        assert_eq!(model.inference.iou_threshold, 0.5);
        assert_eq!(model.inference.input_size, 640);
    }

    #[test]
    fn test_stage_lists_follow_flags() {
        let mut enhancement = EnhancementConfig::default();
        assert_eq!(enhancement.enhancers().len(), 3);
        enhancement.blur_sigma = 0.0;
        enhancement.sharpen = false;
        assert_eq!(enhancement.enhancers().len(), 1);
        enhancement.enabled = false;
        assert!(enhancement.enhancers().is_empty());

        let cleanup = CleanupConfig {
            fill_holes: false,
            ..CleanupConfig::default()
        };
        assert_eq!(cleanup.cleaners().len(), 2);
        assert_eq!(CleanupConfig::default().cleaners().len(), 3);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = AnalyzerConfig {
            confidence_threshold: 0.5,
            ..AnalyzerConfig::default()
        };
        let json = serde_json::to_string(&config).expect("Should serialize");
        let parsed: AnalyzerConfig = serde_json::from_str(&json).expect("Should parse");
        assert_eq!(parsed, config);
    }
}
