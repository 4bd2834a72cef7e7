use image::GrayImage;
use imageproc::{contours::BorderType, point::Point};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use tracing::debug;
use crate::{error::Result, traits::ContourExtractor, types::Contour};

/// How contour point chains are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContourApproximation {
    /// Keep every boundary pixel
    None,
    /// Collapse straight horizontal, vertical and diagonal runs to their end points
    #[default]
    Simple,
}

/// Extracts the outermost boundaries of a binary mask.
///
/// Borders nested inside holes are ignored, as are the holes themselves.
#[derive(Debug, Clone, Default)]
pub struct ExternalContourExtractor {
    pub approximation: ContourApproximation,
}

impl ExternalContourExtractor {
    pub fn new(approximation: ContourApproximation) -> Self {
        Self { approximation }
    }
}

impl ContourExtractor for ExternalContourExtractor {
    fn extract_contours(&self, mask: &GrayImage) -> Result<Vec<Contour>> {
        let contours: Vec<Contour> = imageproc::contours::find_contours::<i32>(mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| match self.approximation {
                ContourApproximation::None => Contour::new(c.points),
                ContourApproximation::Simple => Contour::new(compress_chain(&c.points)),
            })
            .collect();

        debug!(count = contours.len(), "extracted external contours");
        Ok(contours)
    }
}

/// Drops every point whose incoming and outgoing steps are identical.
///
/// The chain is treated as closed, so the first and last points are checked
/// against their wrap-around neighbours. Chains of two points or fewer are
/// returned unchanged.
pub fn compress_chain(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n <= 2 {
        return points.to_vec();
    }

    let step = |from: Point<i32>, to: Point<i32>| (to.x - from.x, to.y - from.y);

    points
        .iter()
        .enumerate()
        .filter(|&(i, &p)| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, p) != step(p, next)
        })
        .map(|(_, &p)| p)
        .collect()
}

/// The contour with the greatest enclosed area; the earliest one wins ties
pub fn largest_contour(contours: Vec<Contour>) -> Option<Contour> {
    let mut best: Option<(f64, Contour)> = None;
    for contour in contours {
        let area = contour.area();
        match &best {
            Some((best_area, _)) if area <= *best_area => {}
            _ => best = Some((area, contour)),
        }
    }
    best.map(|(_, contour)| contour)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if (x0..=x1).contains(&x) && (y0..=y1).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn disc_mask(size: u32, radius: f32) -> GrayImage {
        let c = size as f32 / 2.0;
        GrayImage::from_fn(size, size, |x, y| {
            let (dx, dy) = (x as f32 - c, y as f32 - c);
            if dx * dx + dy * dy <= radius * radius {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_rectangle_compresses_to_corners() {
        let mask = rect_mask(60, 60, 10, 20, 49, 39);
        let contours = ExternalContourExtractor::default()
            .extract_contours(&mask)
            .expect("Should extract");

        assert_eq!(contours.len(), 1);
        let mut corners = contours[0].points.clone();
        corners.sort_by_key(|p| (p.x, p.y));
        assert_eq!(
            corners,
            vec![
                Point::new(10, 20),
                Point::new(10, 39),
                Point::new(49, 20),
                Point::new(49, 39),
            ]
        );
        assert!((contours[0].area() - 39.0 * 19.0).abs() < 1e-9);
        assert!((contours[0].perimeter() - 2.0 * (39.0 + 19.0)).abs() < 1e-9);
    }

    #[test]
    fn test_compression_preserves_area_and_perimeter() {
        let mask = disc_mask(80, 25.0);
        let raw = ExternalContourExtractor::new(ContourApproximation::None)
            .extract_contours(&mask)
            .expect("Should extract");
        let simple = ExternalContourExtractor::new(ContourApproximation::Simple)
            .extract_contours(&mask)
            .expect("Should extract");

        assert_eq!(raw.len(), 1);
        assert_eq!(simple.len(), 1);
        assert!(simple[0].len() < raw[0].len());
        assert!((simple[0].area() - raw[0].area()).abs() < 1e-6);
        assert!((simple[0].perimeter() - raw[0].perimeter()).abs() < 1e-6);
    }

    #[test]
    fn test_holes_and_nested_islands_are_ignored() {
        let mut mask = rect_mask(60, 60, 5, 5, 54, 54);
        for y in 15..45 {
            for x in 15..45 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        // Island inside the hole
        for y in 25..35 {
            for x in 25..35 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let contours = ExternalContourExtractor::default()
            .extract_contours(&mask)
            .expect("Should extract");
        assert_eq!(contours.len(), 1);
        assert!((contours[0].area() - 49.0 * 49.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_mask_has_no_contours() {
        let mask = GrayImage::new(20, 20);
        let contours = ExternalContourExtractor::default()
            .extract_contours(&mask)
            .expect("Should extract");
        assert!(contours.is_empty());
        assert!(largest_contour(contours).is_none());
    }

    #[test]
    fn test_compress_chain_short_and_straight() {
        let two = vec![Point::new(0, 0), Point::new(5, 0)];
        assert_eq!(compress_chain(&two), two);

        let line = vec![
            Point::new(0, 0),
            Point::new(1, 0),
            Point::new(2, 0),
            Point::new(2, 1),
            Point::new(1, 1),
            Point::new(0, 1),
        ];
        assert_eq!(
            compress_chain(&line),
            vec![Point::new(0, 0), Point::new(2, 0), Point::new(2, 1), Point::new(0, 1)]
        );
    }

    #[test]
    fn test_largest_contour_prefers_first_on_ties() {
        let a = Contour::new(vec![Point::new(0, 0), Point::new(0, 2), Point::new(2, 2), Point::new(2, 0)]);
        let b = Contour::new(vec![Point::new(5, 5), Point::new(5, 7), Point::new(7, 7), Point::new(7, 5)]);
        let small = Contour::new(vec![Point::new(0, 0), Point::new(0, 1), Point::new(1, 1)]);

        let best = largest_contour(vec![small, a.clone(), b]).expect("Should pick one");
        assert_eq!(best, a);
    }

    #[test]
    fn test_equal_regions_pick_the_upper_one() {
        let mut mask = rect_mask(40, 60, 5, 40, 14, 49);
        for y in 5..15 {
            for x in 20..30 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let contours = ExternalContourExtractor::default()
            .extract_contours(&mask)
            .expect("Should extract");
        let best = largest_contour(contours).expect("Should pick one");
        let (min, _) = best.bounding_box().expect("Should have points");
        assert_eq!((min.x, min.y), (20, 5));
    }

    #[test]
    fn test_separate_components_pick_largest() {
        let mut mask = rect_mask(100, 60, 5, 5, 20, 20);
        for y in 10..50 {
            for x in 40..90 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let contours = ExternalContourExtractor::default()
            .extract_contours(&mask)
            .expect("Should extract");
        assert_eq!(contours.len(), 2);

        let best = largest_contour(contours).expect("Should pick one");
        assert!((best.area() - 49.0 * 39.0).abs() < 1e-9);
    }
}
