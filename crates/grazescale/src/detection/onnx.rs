//! YOLOv8-seg instance segmentation through ONNX Runtime.
//!
//! The model is expected to expose one `images` input of shape
//! `[1, 3, S, S]` and two outputs: `output0` with `[1, 4 + classes + k, anchors]`
//! box/score/coefficient rows and `output1` with `[1, k, mh, mw]` mask
//! prototypes.

use std::path::Path;

use image::{imageops, imageops::FilterType, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use ndarray::{Array4, ArrayView3, ArrayView4, Ix3, Ix4};
use ort::{session::Session, value::TensorRef};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{Detection, Species, YoloSegConfig};
use crate::{
    error::{GrazeError, Result},
    traits::LivestockDetector,
};

const PAD_VALUE: u8 = 114;

fn model_error<E: std::fmt::Display>(operation: &'static str) -> impl FnOnce(E) -> GrazeError {
    move |e| GrazeError::Detection(format!("{operation}: {e}"))
}

pub struct YoloSegDetector {
    config: YoloSegConfig,
    session: Mutex<Session>,
}

impl YoloSegDetector {
    pub fn new(model_path: &Path, config: YoloSegConfig) -> Result<Self> {
        let session = Session::builder()
            .map_err(model_error("session builder"))?
            .commit_from_file(model_path)
            .map_err(model_error("load model"))?;

        info!(path = %model_path.display(), input_size = config.input_size, "loaded segmentation model");

        Ok(Self {
            config,
            session: Mutex::new(session),
        })
    }

    fn run(&self, tensor: &Array4<f32>) -> Result<(ndarray::Array3<f32>, Array4<f32>)> {
        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![
                "images" => TensorRef::from_array_view(tensor).map_err(model_error("input tensor"))?
            ])
            .map_err(model_error("inference"))?;

        let predictions = outputs["output0"]
            .try_extract_array::<f32>()
            .map_err(model_error("extract output0"))?
            .into_dimensionality::<Ix3>()
            .map_err(model_error("output0 shape"))?
            .to_owned();
        let prototypes = outputs["output1"]
            .try_extract_array::<f32>()
            .map_err(model_error("extract output1"))?
            .into_dimensionality::<Ix4>()
            .map_err(model_error("output1 shape"))?
            .to_owned();

        Ok((predictions, prototypes))
    }
}

impl LivestockDetector for YoloSegDetector {
    fn detect(&self, image: &RgbImage, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let letterbox = Letterbox::fit(width, height, self.config.input_size);
        let tensor = letterbox.tensor(image);
        let (predictions, prototypes) = self.run(&tensor)?;

        let candidates = decode_predictions(predictions.view(), prototypes.shape()[1], confidence_threshold);
        let kept = non_max_suppression(candidates, self.config.iou_threshold, self.config.max_detections);
        debug!(kept = kept.len(), "instances after suppression");

        let detections: Vec<Detection> = kept
            .into_iter()
            .filter_map(|c| {
                let species = Species::from_coco_class(c.class_id)?;
                let mask = assemble_mask(&c, prototypes.view(), &letterbox, self.config.mask_threshold);
                Some(Detection::new(species, c.score, mask))
            })
            .collect();

        Ok(detections)
    }
}

/// Aspect-preserving fit of an image into a square model input
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
    size: u32,
    source: (u32, u32),
    scaled: (u32, u32),
    offset: (u32, u32),
}

impl Letterbox {
    fn fit(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let scaled_w = ((width as f32 * scale).round() as u32).clamp(1, size);
        let scaled_h = ((height as f32 * scale).round() as u32).clamp(1, size);

        Self {
            size,
            source: (width, height),
            scaled: (scaled_w, scaled_h),
            offset: ((size - scaled_w) / 2, (size - scaled_h) / 2),
        }
    }

    /// NCHW float tensor in RGB order scaled to 0..1
    fn tensor(&self, image: &RgbImage) -> Array4<f32> {
        let resized = imageops::resize(image, self.scaled.0, self.scaled.1, FilterType::Triangle);
        let mut canvas = RgbImage::from_pixel(self.size, self.size, Rgb([PAD_VALUE; 3]));
        imageops::replace(&mut canvas, &resized, self.offset.0 as i64, self.offset.1 as i64);

        let s = self.size as usize;
        Array4::from_shape_fn((1, 3, s, s), |(_, c, y, x)| {
            canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    /// x1, y1, x2, y2 in model input pixels
    bbox: [f32; 4],
    class_id: usize,
    score: f32,
    coefficients: Vec<f32>,
}

fn decode_predictions(predictions: ArrayView3<f32>, mask_channels: usize, confidence_threshold: f32) -> Vec<Candidate> {
    let rows = predictions.shape()[1];
    let anchors = predictions.shape()[2];
    let num_classes = rows.saturating_sub(4 + mask_channels);

    let mut candidates = Vec::new();
    for i in 0..anchors {
        let (class_id, score) = (0..num_classes)
            .map(|c| (c, predictions[[0, 4 + c, i]]))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if num_classes == 0 || score < confidence_threshold {
            continue;
        }

        let (cx, cy) = (predictions[[0, 0, i]], predictions[[0, 1, i]]);
        let (w, h) = (predictions[[0, 2, i]], predictions[[0, 3, i]]);
        candidates.push(Candidate {
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
            class_id,
            score,
            coefficients: (0..mask_channels)
                .map(|k| predictions[[0, 4 + num_classes + k, i]])
                .collect(),
        });
    }
    candidates
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let intersection = w * h;
    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - intersection;
    if union <= 0.0 { 0.0 } else { intersection / union }
}

/// Greedy per-class suppression, highest score first
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32, max_detections: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// Build the full-resolution binary mask of one instance from the prototypes
fn assemble_mask(candidate: &Candidate, prototypes: ArrayView4<f32>, letterbox: &Letterbox, threshold: f32) -> GrayImage {
    let (channels, mh, mw) = (prototypes.shape()[1], prototypes.shape()[2], prototypes.shape()[3]);
    let sx = mw as f32 / letterbox.size as f32;
    let sy = mh as f32 / letterbox.size as f32;
    let [x1, y1, x2, y2] = candidate.bbox;

    let proto_mask: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_fn(mw as u32, mh as u32, |x, y| {
        let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);
        if fx < x1 * sx || fx > x2 * sx || fy < y1 * sy || fy > y2 * sy {
            return Luma([0.0]);
        }
        let logit: f32 = (0..channels)
            .map(|k| candidate.coefficients[k] * prototypes[[0, k, y as usize, x as usize]])
            .sum();
        Luma([sigmoid(logit)])
    });

    // Strip the letterbox padding, then scale back to the source resolution.
    let crop_x = (letterbox.offset.0 as f32 * sx).floor() as u32;
    let crop_y = (letterbox.offset.1 as f32 * sy).floor() as u32;
    let crop_w = ((letterbox.scaled.0 as f32 * sx).ceil() as u32).clamp(1, mw as u32 - crop_x);
    let crop_h = ((letterbox.scaled.1 as f32 * sy).ceil() as u32).clamp(1, mh as u32 - crop_y);
    let cropped = imageops::crop_imm(&proto_mask, crop_x, crop_y, crop_w, crop_h).to_image();

    let (width, height) = letterbox.source;
    let resized = imageops::resize(&cropped, width, height, FilterType::Triangle);
    GrayImage::from_fn(width, height, |x, y| {
        if resized.get_pixel(x, y)[0] > threshold { Luma([255]) } else { Luma([0]) }
    })
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
