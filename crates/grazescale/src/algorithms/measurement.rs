use imageproc::point::Point;
use crate::types::{Contour, FeatureSet, PhysicalMeasurements, PixelMeasurements, ReferenceArea};

/// Share of the vertical extent at the leftmost point taken as heart girth
pub const HEART_GIRTH_FACTOR: f64 = 0.8;
/// Share of the vertical extent at the rightmost point taken as hip length
pub const HIP_LENGTH_FACTOR: f64 = 0.7;
/// Divisor of the girth-squared-times-length weight formula
pub const WEIGHT_DIVISOR: f64 = 300.0;

/// Turns a silhouette contour into body measurements.
#[derive(Debug, Clone)]
pub struct MeasurementExtractor {
    pub heart_girth_factor: f64,
    pub hip_length_factor: f64,
    pub weight_divisor: f64,
}

impl Default for MeasurementExtractor {
    fn default() -> Self {
        Self {
            heart_girth_factor: HEART_GIRTH_FACTOR,
            hip_length_factor: HIP_LENGTH_FACTOR,
            weight_divisor: WEIGHT_DIVISOR,
        }
    }
}

impl MeasurementExtractor {
    /// Pixel measurements, plus calibrated ones when a reference area is given.
    ///
    /// Returns `None` for an empty contour.
    pub fn extract(&self, contour: &Contour, reference: Option<ReferenceArea>) -> Option<FeatureSet> {
        let pixels = self.measure(contour)?;
        let physical = reference.and_then(|r| self.calibrate(&pixels, r));
        Some(FeatureSet { pixels, physical })
    }

    pub fn measure(&self, contour: &Contour) -> Option<PixelMeasurements> {
        let e = contour.extremes()?;

        let girth_top = Point::new(e.left.x, e.top.y);
        let girth_bottom = Point::new(e.left.x, e.bottom.y);
        let hip_top = Point::new(e.right.x, e.top.y);
        let hip_bottom = Point::new(e.right.x, e.bottom.y);

        Some(PixelMeasurements {
            body_length_px: distance(e.left, e.right),
            withers_height_px: distance(e.top, e.bottom),
            heart_girth_px: distance(girth_top, girth_bottom) * self.heart_girth_factor,
            hip_length_px: distance(hip_top, hip_bottom) * self.hip_length_factor,
            contour_area_px2: contour.area(),
            contour_perimeter_px: contour.perimeter(),
        })
    }

    /// Scales every linear measurement by `reference / body_length_px`.
    ///
    /// A zero body length has no meaningful scale, so nothing is returned.
    pub fn calibrate(&self, pixels: &PixelMeasurements, reference: ReferenceArea) -> Option<PhysicalMeasurements> {
        if pixels.body_length_px <= 0.0 {
            return None;
        }

        let ratio = reference.value() / pixels.body_length_px;
        let body_length_cm = pixels.body_length_px * ratio;
        let heart_girth_cm = pixels.heart_girth_px * ratio;

        Some(PhysicalMeasurements {
            body_length_cm,
            withers_height_cm: pixels.withers_height_px * ratio,
            heart_girth_cm,
            hip_length_cm: pixels.hip_length_px * ratio,
            pixel_to_cm_ratio: ratio,
            estimated_weight_kg: self.weight_kg(heart_girth_cm, body_length_cm),
        })
    }

    pub fn weight_kg(&self, heart_girth_cm: f64, body_length_cm: f64) -> f64 {
        let raw = heart_girth_cm * heart_girth_cm * body_length_cm / self.weight_divisor;
        round_to_hundredths(raw)
    }
}

/// Live weight from heart girth and body length, rounded to two decimals
pub fn estimate_weight_kg(heart_girth_cm: f64, body_length_cm: f64) -> f64 {
    MeasurementExtractor::default().weight_kg(heart_girth_cm, body_length_cm)
}

/// Two decimals from the exact binary value, ties to even
fn round_to_hundredths(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

fn distance(a: Point<i32>, b: Point<i32>) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    dx.hypot(dy)
}
