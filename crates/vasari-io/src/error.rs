use std::path::PathBuf;
use thiserror::Error;

/// Raised when bytes do not start with any recognised magic number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown file format (leading bytes {leading:02x?})")]
pub struct SniffError {
    pub leading: Vec<u8>,
}

/// Errors produced by the loader and decoder services.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("blocked: unsupported scheme in {0}")]
    UnsupportedScheme(String),

    #[error("malformed data URI")]
    MalformedDataUri,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Sniff(#[from] SniffError),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("worker disconnected before answering")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, IoError>;
