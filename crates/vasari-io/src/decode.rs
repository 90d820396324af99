//! Off-thread image decoding.

use crate::error::{IoError, Result};
use crate::media::{decode_data_uri, is_data_uri};
use crate::{drain_ready, wait_all_pending, Completion};
use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Straight RGBA8 pixels of a decoded image.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Result emitted once a decode completes.
#[derive(Debug)]
pub struct DecodeResult {
    pub request_id: u64,
    /// The path or `data:` URI that was requested.
    pub source: String,
    pub image: Result<DecodedImage>,
}

struct PendingDecode {
    request_id: u64,
    source: String,
    receiver: Receiver<Result<DecodedImage>>,
    join: Option<JoinHandle<()>>,
}

impl Completion for PendingDecode {
    type Value = DecodedImage;
    type Output = DecodeResult;

    fn receiver(&self) -> &Receiver<Result<DecodedImage>> {
        &self.receiver
    }

    fn take_join(&mut self) -> Option<JoinHandle<()>> {
        self.join.take()
    }

    fn finish(self, image: Result<DecodedImage>) -> DecodeResult {
        DecodeResult {
            request_id: self.request_id,
            source: self.source,
            image,
        }
    }
}

/// Decode a file path or `data:` URI synchronously.
pub fn decode_source(source: &str) -> Result<DecodedImage> {
    let bytes = if is_data_uri(source) {
        decode_data_uri(source)?.bytes
    } else {
        let path = Path::new(source);
        std::fs::read(path).map_err(|source| IoError::Read {
            path: path.to_path_buf(),
            source,
        })?
    };
    let rgba = image::load_from_memory(&bytes)?.to_rgba8();
    Ok(DecodedImage {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// Manages non-blocking image decodes using a worker thread per request.
#[derive(Default)]
pub struct ImageDecodeService {
    pending: Vec<PendingDecode>,
}

impl ImageDecodeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start decoding `source`. The result becomes available on a future call to [`poll`](Self::poll).
    pub fn request(&mut self, request_id: u64, source: &str) {
        let (tx, rx) = mpsc::channel();
        let owned = source.to_string();
        let join = thread::spawn(move || {
            let _ = tx.send(decode_source(&owned));
        });
        self.pending.push(PendingDecode {
            request_id,
            source: source.to_string(),
            receiver: rx,
            join: Some(join),
        });
    }

    /// Poll for decode completions, returning all results that are ready.
    pub fn poll(&mut self) -> Vec<DecodeResult> {
        drain_ready(&mut self.pending)
    }

    /// Block until every outstanding decode finishes or `timeout` elapses.
    pub fn wait_all(&mut self, timeout: Duration) -> Vec<DecodeResult> {
        wait_all_pending(&mut self.pending, timeout)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([255, 0, 0, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_files_and_data_uris() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        std::fs::write(&path, png_bytes()).unwrap();

        let from_file = decode_source(path.to_str().unwrap()).unwrap();
        assert_eq!((from_file.width, from_file.height), (3, 2));
        assert_eq!(&from_file.rgba[..4], &[255, 0, 0, 255]);

        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png_bytes())
        );
        assert_eq!(decode_source(&uri).unwrap(), from_file);
    }

    #[test]
    fn missing_file_and_garbage_fail() {
        assert!(matches!(decode_source("/no/such/image.png"), Err(IoError::Read { .. })));
        assert!(matches!(decode_source("data:image/png;base64,AAAA"), Err(IoError::Decode(_))));
    }

    #[test]
    fn service_reports_results_by_request_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        std::fs::write(&path, png_bytes()).unwrap();

        let mut service = ImageDecodeService::new();
        service.request(7, path.to_str().unwrap());
        service.request(8, "/no/such/image.png");

        let mut results = service.wait_all(Duration::from_secs(10));
        results.sort_by_key(|r| r.request_id);
        assert_eq!(results.len(), 2);
        assert!(results[0].image.is_ok());
        assert!(results[1].image.is_err());
        assert_eq!(results[1].source, "/no/such/image.png");
        assert!(!service.has_pending());
    }
}
