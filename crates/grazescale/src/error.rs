use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrazeError {
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Mask is {mask_width}x{mask_height} but the image is {image_width}x{image_height}")]
    MaskDimensionMismatch {
        mask_width: u32,
        mask_height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Reference object area must be a positive number, got {0}")]
    InvalidReferenceArea(f64),

    #[error("Unknown species: {0}")]
    UnknownSpecies(String),

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GrazeError>;
