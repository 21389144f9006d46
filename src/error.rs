use thiserror::Error;

/// Errors that can end an export run
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid export dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Failed to render frame: {0}")]
    Surface(String),

    #[error("GIF encoding failed: {0}")]
    Encoder(#[from] image::ImageError),

    #[error("I/O error during export: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output sink rejected the export: {0}")]
    Sink(String),

    #[error("Export was cancelled")]
    Cancelled,

    #[error("Export task ended without reporting a result")]
    Join,
}

/// Errors from decoding a background image
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

pub type ExportResult<T> = Result<T, ExportError>;
