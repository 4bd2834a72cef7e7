use geo_types::{Coord, LineString, Polygon};
use imageproc::point::Point;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{GrazeError, Result};

/// Closed outer boundary of a mask region, in traversal order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contour {
    pub points: Vec<Point<i32>>,
}

/// Axis-aligned extremal points of a contour.
///
/// Each point is the *first* one in traversal order that attains the
/// extremum, so two contours with the same point set but different starting
/// points can yield different extremes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extremes {
    pub left: Point<i32>,
    pub right: Point<i32>,
    pub top: Point<i32>,
    pub bottom: Point<i32>,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Convert to a geo-types polygon (the exterior ring is closed by geo)
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self
            .points
            .iter()
            .map(|p| Coord {
                x: p.x as f64,
                y: p.y as f64,
            })
            .collect();

        Polygon::new(LineString::new(coords), vec![])
    }

    /// Enclosed area (shoelace formula, orientation-independent)
    pub fn area(&self) -> f64 {
        use geo::Area;
        self.to_geo_polygon().unsigned_area()
    }

    /// Length of the closed boundary, including the closing segment
    pub fn perimeter(&self) -> f64 {
        use geo::EuclideanLength;
        self.to_geo_polygon().exterior().euclidean_length()
    }

    pub fn extremes(&self) -> Option<Extremes> {
        let (first, rest) = self.points.split_first()?;

        let mut extremes = Extremes {
            left: *first,
            right: *first,
            top: *first,
            bottom: *first,
        };

        // Strict comparisons keep the earliest point on ties.
        for &p in rest {
            if p.x < extremes.left.x {
                extremes.left = p;
            }
            if p.x > extremes.right.x {
                extremes.right = p;
            }
            if p.y < extremes.top.y {
                extremes.top = p;
            }
            if p.y > extremes.bottom.y {
                extremes.bottom = p;
            }
        }

        Some(extremes)
    }

    /// Bounding box as `(min, max)` corners
    pub fn bounding_box(&self) -> Option<(Point<i32>, Point<i32>)> {
        let e = self.extremes()?;
        Some((
            Point::new(e.left.x, e.top.y),
            Point::new(e.right.x, e.bottom.y),
        ))
    }
}

/// Caller-supplied real-world area used to scale pixel measurements.
///
/// Only positive, finite values can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ReferenceArea(f64);

impl ReferenceArea {
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(GrazeError::InvalidReferenceArea(value))
        }
    }

    /// Lenient constructor: zero, negative and non-finite values mean "not supplied".
    pub fn positive(value: f64) -> Option<Self> {
        Self::new(value).ok()
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for ReferenceArea {
    type Error = GrazeError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ReferenceArea> for f64 {
    fn from(area: ReferenceArea) -> Self {
        area.0
    }
}

/// Silhouette measurements in pixel units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PixelMeasurements {
    #[schemars(description = "Distance between the leftmost and rightmost contour points")]
    pub body_length_px: f64,
    #[schemars(description = "Distance between the topmost and bottommost contour points")]
    pub withers_height_px: f64,
    #[schemars(description = "Vertical extent at the leftmost point, scaled by 0.8")]
    pub heart_girth_px: f64,
    #[schemars(description = "Vertical extent at the rightmost point, scaled by 0.7")]
    pub hip_length_px: f64,
    #[schemars(description = "Area enclosed by the contour in square pixels")]
    pub contour_area_px2: f64,
    #[schemars(description = "Closed perimeter of the contour in pixels")]
    pub contour_perimeter_px: f64,
}

/// Measurements rescaled with the reference-area ratio, plus the weight estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PhysicalMeasurements {
    pub body_length_cm: f64,
    pub withers_height_cm: f64,
    pub heart_girth_cm: f64,
    pub hip_length_cm: f64,
    #[schemars(description = "reference_object_area / body_length_px")]
    pub pixel_to_cm_ratio: f64,
    #[schemars(description = "round(heart_girth_cm^2 * body_length_cm / 300, 2)")]
    pub estimated_weight_kg: f64,
}

/// Measurement output for one animal, serialized as a single flat object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureSet {
    #[serde(flatten)]
    pub pixels: PixelMeasurements,
    #[serde(flatten)]
    pub physical: Option<PhysicalMeasurements>,
}

impl FeatureSet {
    pub fn pixels_only(pixels: PixelMeasurements) -> Self {
        Self {
            pixels,
            physical: None,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.physical.is_some()
    }
}

/// Reportable conditions that end an analysis without measurements
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum MeasurementFailure {
    #[error("No livestock detected")]
    #[serde(rename = "No livestock detected")]
    NoDetection,

    #[error("No contour found")]
    #[serde(rename = "No contour found")]
    NoContour,
}

/// Outcome of analysing one image.
///
/// Serializes either as `{"error": "..."}` or as the flat measurement object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Analysis {
    Failed { error: MeasurementFailure },
    Measured(FeatureSet),
}

impl Analysis {
    pub fn failed(failure: MeasurementFailure) -> Self {
        Self::Failed { error: failure }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, Self::Measured(_))
    }

    pub fn features(&self) -> Option<&FeatureSet> {
        match self {
            Self::Measured(features) => Some(features),
            Self::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<MeasurementFailure> {
        match self {
            Self::Failed { error } => Some(*error),
            Self::Measured(_) => None,
        }
    }

    /// JSON schema of the output object
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Analysis)
    }
}

impl From<FeatureSet> for Analysis {
    fn from(features: FeatureSet) -> Self {
        Self::Measured(features)
    }
}

impl From<MeasurementFailure> for Analysis {
    fn from(failure: MeasurementFailure) -> Self {
        Self::failed(failure)
    }
}
