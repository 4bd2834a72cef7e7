//! # GrazeScale
//!
//! Livestock body measurement from a single photograph. An injected detector
//! finds the animal and its segmentation mask; the mask is cleaned up, its
//! outer contour traced, and body dimensions are read off the contour's
//! extreme points. With a reference object area the pixel measurements are
//! rescaled and a live weight estimate is added.
//!
//! ## Core Features
//!
//! - **Trait-based stages**: enhancement, mask clean-up, contour extraction
//!   and detection are all swappable trait objects
//! - **Detector seam**: precomputed masks out of the box, YOLOv8-seg through
//!   ONNX Runtime with the `onnx` feature
//! - **Flat JSON output**: either the measurement object or `{"error": ...}`
//! - **GeoJSON export** of the measured outline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use grazescale::{LivestockAnalyzer, PrecomputedMaskDetector, ReferenceArea, Species};
//!
//! let detector = PrecomputedMaskDetector::from_path("cow_mask.png", Species::Cow, 1.0)?;
//! let analyzer = LivestockAnalyzer::new(detector);
//!
//! let analysis = analyzer.analyze_file("cow.jpg", Some(ReferenceArea::new(150.0)?))?;
//! println!("{}", serde_json::to_string_pretty(&analysis)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod detection;
pub mod config;
pub mod pipeline;
pub mod io;

pub use error::{GrazeError, Result};
pub use types::{
    Analysis, Contour, Extremes, FeatureSet, MeasurementFailure, PhysicalMeasurements,
    PixelMeasurements, ReferenceArea,
};
pub use traits::*;
pub use algorithms::*;
pub use detection::{Detection, PrecomputedMaskDetector, Species, YoloSegConfig};
#[cfg(feature = "onnx")]
pub use detection::YoloSegDetector;
pub use config::{AnalyzerConfig, CleanupConfig, EnhancementConfig, ModelConfig};
pub use pipeline::{AnalysisReport, LivestockAnalyzer, MaskPostProcessor};
