use image::{GrayImage, Luma};
use imageproc::{
    map::map_colors,
    region_labelling::{connected_components, Connectivity},
};
use tracing::debug;
use crate::{error::Result, traits::MaskCleaner};

const FOREGROUND: Luma<u8> = Luma([255]);
const BACKGROUND: Luma<u8> = Luma([0]);

/// Maps every pixel above `threshold` to 255 and everything else to 0
#[derive(Debug, Clone, Default)]
pub struct MaskBinarizer {
    pub threshold: u8,
}

impl MaskCleaner for MaskBinarizer {
    fn clean(&self, mask: &GrayImage) -> Result<GrayImage> {
        let threshold = self.threshold;
        Ok(map_colors(mask, |p| if p[0] > threshold { FOREGROUND } else { BACKGROUND }))
    }
}

/// Drops connected foreground components smaller than `min_size` pixels
#[derive(Debug, Clone)]
pub struct SmallObjectRemover {
    pub min_size: u32,
    pub connectivity: Connectivity,
}

impl Default for SmallObjectRemover {
    fn default() -> Self {
        Self {
            min_size: 100,
            connectivity: Connectivity::Four,
        }
    }
}

impl MaskCleaner for SmallObjectRemover {
    fn clean(&self, mask: &GrayImage) -> Result<GrayImage> {
        let labels = connected_components(mask, self.connectivity, BACKGROUND);

        let max_label = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
        let mut sizes = vec![0u32; max_label + 1];
        for p in labels.pixels() {
            sizes[p[0] as usize] += 1;
        }

        let removed = sizes
            .iter()
            .skip(1)
            .filter(|&&size| size < self.min_size)
            .count();
        debug!(components = max_label, removed, min_size = self.min_size, "filtered mask components");

        Ok(GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
            let label = labels.get_pixel(x, y)[0] as usize;
            if label != 0 && sizes[label] >= self.min_size {
                FOREGROUND
            } else {
                BACKGROUND
            }
        }))
    }
}

/// Fills background regions that are not 4-connected to the image border
#[derive(Debug, Clone, Default)]
pub struct HoleFiller;

impl MaskCleaner for HoleFiller {
    fn clean(&self, mask: &GrayImage) -> Result<GrayImage> {
        let (width, height) = mask.dimensions();
        if width == 0 || height == 0 {
            return Ok(mask.clone());
        }

        let background = map_colors(mask, |p| if p[0] == 0 { FOREGROUND } else { BACKGROUND });
        let labels = connected_components(&background, Connectivity::Four, BACKGROUND);

        let max_label = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
        let mut touches_border = vec![false; max_label + 1];
        for x in 0..width {
            touches_border[labels.get_pixel(x, 0)[0] as usize] = true;
            touches_border[labels.get_pixel(x, height - 1)[0] as usize] = true;
        }
        for y in 0..height {
            touches_border[labels.get_pixel(0, y)[0] as usize] = true;
            touches_border[labels.get_pixel(width - 1, y)[0] as usize] = true;
        }

        let holes = touches_border.iter().skip(1).filter(|&&border| !border).count();
        debug!(holes, "filled enclosed mask holes");

        Ok(GrayImage::from_fn(width, height, |x, y| {
            let label = labels.get_pixel(x, y)[0] as usize;
            if mask.get_pixel(x, y)[0] != 0 || (label != 0 && !touches_border[label]) {
                FOREGROUND
            } else {
                BACKGROUND
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_rect(img: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, value: u8) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Luma([value]));
            }
        }
    }

    fn foreground_count(img: &GrayImage) -> usize {
        img.pixels().filter(|p| p[0] != 0).count()
    }

    #[test]
    fn test_binarizer_normalizes_values() {
        let mut mask = GrayImage::new(4, 1);
        mask.put_pixel(1, 0, Luma([1]));
        mask.put_pixel(2, 0, Luma([200]));

        let binary = MaskBinarizer::default().clean(&mask).expect("Should binarize");
        let values: Vec<u8> = binary.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![0, 255, 255, 0]);
    }

    #[test]
    fn test_small_objects_are_removed() {
        let mut mask = GrayImage::new(60, 60);
        fill_rect(&mut mask, 5, 5, 25, 25, 255); // 400 px
        fill_rect(&mut mask, 40, 40, 49, 51, 255); // 99 px
        fill_rect(&mut mask, 40, 5, 50, 15, 255); // exactly 100 px

        let cleaned = SmallObjectRemover::default().clean(&mask).expect("Should clean");
        assert_eq!(foreground_count(&cleaned), 500);
        assert_eq!(cleaned.get_pixel(45, 45)[0], 0);
        assert_eq!(cleaned.get_pixel(45, 10)[0], 255);
    }

    #[test]
    fn test_diagonal_pixels_are_separate_components() {
        // Two 60 px blocks touching only at a corner: each is too small on its own
        let mut mask = GrayImage::new(40, 40);
        fill_rect(&mut mask, 0, 0, 10, 6, 255);
        fill_rect(&mut mask, 10, 6, 20, 12, 255);

        let cleaned = SmallObjectRemover::default().clean(&mask).expect("Should clean");
        assert_eq!(foreground_count(&cleaned), 0);

        let eight = SmallObjectRemover {
            min_size: 100,
            connectivity: Connectivity::Eight,
        };
        let cleaned = eight.clean(&mask).expect("Should clean");
        assert_eq!(foreground_count(&cleaned), 120);
    }

    #[test]
    fn test_enclosed_holes_are_filled() {
        let mut mask = GrayImage::new(50, 50);
        fill_rect(&mut mask, 10, 10, 40, 40, 255);
        fill_rect(&mut mask, 20, 20, 30, 30, 0);

        let filled = HoleFiller.clean(&mask).expect("Should fill");
        assert_eq!(foreground_count(&filled), 900);
        assert_eq!(filled.get_pixel(25, 25)[0], 255);
    }

    #[test]
    fn test_open_notches_are_not_filled() {
        let mut mask = GrayImage::new(50, 50);
        fill_rect(&mut mask, 10, 10, 40, 40, 255);
        // Notch cut in from the top edge of the square, reaching the background
        fill_rect(&mut mask, 20, 10, 30, 30, 0);

        let filled = HoleFiller.clean(&mask).expect("Should fill");
        assert_eq!(filled.get_pixel(25, 20)[0], 0);
        assert_eq!(foreground_count(&filled), 900 - 200);
    }

    #[test]
    fn test_hole_connected_diagonally_to_outside_is_filled() {
        // Background fill uses 4-connectivity, so a gap that only leaks
        // through a diagonal counts as enclosed.
        let mut mask = GrayImage::new(12, 12);
        fill_rect(&mut mask, 2, 2, 10, 10, 255);
        mask.put_pixel(5, 5, Luma([0]));
        mask.put_pixel(2, 2, Luma([0]));
        mask.put_pixel(3, 3, Luma([0]));

        let filled = HoleFiller.clean(&mask).expect("Should fill");
        assert_eq!(filled.get_pixel(5, 5)[0], 255);
        assert_eq!(filled.get_pixel(3, 3)[0], 255);
        assert_eq!(filled.get_pixel(2, 2)[0], 0);
    }

    #[test]
    fn test_empty_mask_stays_empty() {
        let mask = GrayImage::new(30, 20);
        let cleaned = SmallObjectRemover::default().clean(&mask).expect("Should clean");
        let filled = HoleFiller.clean(&cleaned).expect("Should fill");
        assert_eq!(foreground_count(&filled), 0);
    }
}
