use image::{GrayImage, Luma, Rgb, RgbImage};
use palette::{Clamp, IntoColor, Lab, LinSrgb, Srgb};
use crate::{error::Result, traits::ImageEnhancer};

/// Contrast-limited adaptive histogram equalization on the CIELAB lightness channel
#[derive(Debug, Clone)]
pub struct ClaheEnhancer {
    pub clip_limit: f32,
    pub tile_grid: u32,
}

impl Default for ClaheEnhancer {
    fn default() -> Self {
        Self {
            clip_limit: 2.5,
            tile_grid: 8,
        }
    }
}

impl ImageEnhancer for ClaheEnhancer {
    fn enhance(&self, image: &RgbImage) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        let lab: Vec<Lab> = image.pixels().map(|p| rgb_to_lab(p.0)).collect();

        let lightness = GrayImage::from_fn(width, height, |x, y| {
            let l = lab[(y * width + x) as usize].l;
            Luma([(l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8])
        });
        let equalized = clahe(&lightness, self.clip_limit, self.tile_grid);

        Ok(RgbImage::from_fn(width, height, |x, y| {
            let Lab { a, b, .. } = lab[(y * width + x) as usize];
            let l = equalized.get_pixel(x, y)[0] as f32 * 100.0 / 255.0;
            Rgb(lab_to_rgb(Lab::new(l, a, b)))
        }))
    }
}

/// 3x3 sharpening convolution
#[derive(Debug, Clone)]
pub struct SharpenEnhancer {
    pub kernel: [f32; 9],
}

impl Default for SharpenEnhancer {
    fn default() -> Self {
        Self {
            kernel: [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0],
        }
    }
}

impl ImageEnhancer for SharpenEnhancer {
    fn enhance(&self, image: &RgbImage) -> Result<RgbImage> {
        Ok(imageproc::filter::filter3x3::<_, f32, u8>(image, &self.kernel))
    }
}

/// Gaussian blur for smoothing sharpening artifacts
#[derive(Debug, Clone)]
pub struct GaussianBlurEnhancer {
    pub sigma: f32,
}

impl Default for GaussianBlurEnhancer {
    fn default() -> Self {
        // Sigma OpenCV derives for a 3x3 kernel
        Self { sigma: 0.8 }
    }
}

impl ImageEnhancer for GaussianBlurEnhancer {
    fn enhance(&self, image: &RgbImage) -> Result<RgbImage> {
        if self.sigma <= 0.0 {
            return Ok(image.clone());
        }
        Ok(imageproc::filter::gaussian_blur_f32(image, self.sigma))
    }
}

/// Contrast-limited adaptive histogram equalization of a grey image.
///
/// The image is split into `tile_grid` x `tile_grid` tiles, each tile's
/// histogram is clipped at `clip_limit` times the mean bin height with the
/// excess spread evenly over all bins, and each pixel is mapped through the
/// bilinear blend of its four nearest tile lookup tables. A non-positive
/// `clip_limit` disables clipping (plain adaptive equalization).
pub fn clahe(image: &GrayImage, clip_limit: f32, tile_grid: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tile_grid = tile_grid.max(1);
    let tile_w = width.div_ceil(tile_grid);
    let tile_h = height.div_ceil(tile_grid);
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let (x0, y0) = (tx * tile_w, ty * tile_h);
            let (x1, y1) = ((x0 + tile_w).min(width), (y0 + tile_h).min(height));

            let mut histogram = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    histogram[image.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            luts.push(tile_lut(&mut histogram, (x1 - x0) * (y1 - y0), clip_limit));
        }
    }

    let lut = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    let mut output = GrayImage::new(width, height);
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let value = image.get_pixel(x, y)[0] as usize;

        let gx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let gy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = (gx.floor() as i64).clamp(0, tiles_x as i64 - 1) as u32;
        let ty0 = (gy.floor() as i64).clamp(0, tiles_y as i64 - 1) as u32;
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let wx = (gx - tx0 as f32).clamp(0.0, 1.0);
        let wy = (gy - ty0 as f32).clamp(0.0, 1.0);

        let top = lut(tx0, ty0)[value] as f32 * (1.0 - wx) + lut(tx1, ty0)[value] as f32 * wx;
        let bottom = lut(tx0, ty1)[value] as f32 * (1.0 - wx) + lut(tx1, ty1)[value] as f32 * wx;
        let mapped = top * (1.0 - wy) + bottom * wy;

        *pixel = Luma([mapped.round().clamp(0.0, 255.0) as u8]);
    }

    output
}

fn tile_lut(histogram: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);

        let mut excess = 0u32;
        for bin in histogram.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }

        let batch = excess / 256;
        let residual = (excess % 256) as usize;
        for bin in histogram.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (256 / residual).max(1);
            for i in (0..256).step_by(step).take(residual) {
                histogram[i] += 1;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (i, &bin) in histogram.iter().enumerate() {
        cumulative += bin;
        lut[i] = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

fn rgb_to_lab([r, g, b]: [u8; 3]) -> Lab {
    let linear: LinSrgb = Srgb::new(r, g, b).into_format::<f32>().into_linear();
    linear.into_color()
}

fn lab_to_rgb(lab: Lab) -> [u8; 3] {
    // Raising L can push saturated colours out of gamut
    let linear: LinSrgb = lab.into_color();
    let srgb: Srgb<f32> = Srgb::from_linear(linear.clamp());
    let srgb: Srgb<u8> = srgb.into_format();
    [srgb.red, srgb.green, srgb.blue]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = (60 + (x + y) % 40) as u8;
            Rgb([v, v.saturating_add(10), v.saturating_sub(10)])
        })
    }

    #[test]
    fn test_lab_lightness_range() {
        assert!(rgb_to_lab([0, 0, 0]).l.abs() < 1e-3);
        assert!((rgb_to_lab([255, 255, 255]).l - 100.0).abs() < 1e-2);
    }

    #[test]
    fn test_out_of_gamut_lab_is_clamped() {
        let rgb = lab_to_rgb(Lab::new(100.0, 120.0, -120.0));
        assert_eq!(rgb[0], 255);
    }

    #[test]
    fn test_lab_round_trip() {
        for rgb in [[0u8, 0, 0], [255, 255, 255], [200, 30, 90], [12, 140, 77]] {
            let back = lab_to_rgb(rgb_to_lab(rgb));
            for c in 0..3 {
                assert!(
                    (back[c] as i32 - rgb[c] as i32).abs() <= 1,
                    "{rgb:?} came back as {back:?}"
                );
            }
        }
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        let image = GrayImage::from_fn(64, 64, |x, _| Luma([100 + (x % 8) as u8]));
        let equalized = clahe(&image, 2.5, 8);

        let (min, max) = equalized
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        assert!(max - min > 7, "Contrast should increase, got range {min}..{max}");
    }

    #[test]
    fn test_clahe_keeps_uniform_image_uniform() {
        let image = GrayImage::from_pixel(40, 32, Luma([90]));
        let equalized = clahe(&image, 2.5, 8);
        let first = equalized.get_pixel(0, 0)[0];
        assert!(equalized.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn test_clahe_handles_images_smaller_than_grid() {
        let image = GrayImage::from_fn(3, 2, |x, y| Luma([(x * 40 + y * 20) as u8]));
        let equalized = clahe(&image, 2.5, 8);
        assert_eq!(equalized.dimensions(), (3, 2));
    }

    #[test]
    fn test_enhancers_preserve_dimensions() {
        let image = gradient_image(37, 23);
        let enhancers: Vec<Box<dyn ImageEnhancer>> = vec![
            Box::new(ClaheEnhancer::default()),
            Box::new(SharpenEnhancer::default()),
            Box::new(GaussianBlurEnhancer::default()),
        ];

        for enhancer in &enhancers {
            let output = enhancer.enhance(&image).expect("Should enhance");
            assert_eq!(output.dimensions(), image.dimensions());
        }
    }

    #[test]
    fn test_sharpen_leaves_flat_regions_alone() {
        let image = RgbImage::from_pixel(10, 10, Rgb([80, 120, 160]));
        let output = SharpenEnhancer::default().enhance(&image).expect("Should sharpen");
        assert_eq!(output.get_pixel(5, 5), &Rgb([80, 120, 160]));
    }

    #[test]
    fn test_zero_sigma_blur_is_identity() {
        let image = gradient_image(8, 8);
        let output = GaussianBlurEnhancer { sigma: 0.0 }.enhance(&image).expect("Should blur");
        assert_eq!(output, image);
    }
}
