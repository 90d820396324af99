use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the raster context and display surfaces.
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("failed to load font '{path}': {reason}")]
    Font { path: PathBuf, reason: String },

    #[error("failed to parse font data: {0}")]
    FontData(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("display backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, SurfaceError>;
