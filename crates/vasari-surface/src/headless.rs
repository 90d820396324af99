//! Display surface without a window.

use crate::error::{Result, SurfaceError};
use crate::{validate_frame, DisplaySurface, PixelFormat};
use std::path::Path;

/// Keeps the most recently presented frame in memory.
#[derive(Debug)]
pub struct HeadlessSurface {
    width: u32,
    height: u32,
    frame: Vec<u8>,
    frames_presented: usize,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame: Vec::new(),
            frames_presented: 0,
        }
    }

    /// Change the reported size, as a window resize would.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn frames_presented(&self) -> usize {
        self.frames_presented
    }

    /// Last presented frame as tightly packed RGBA8 (premultiplied).
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// RGBA of one pixel of the last frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.frame.get(idx..idx + 4).map(|px| [px[0], px[1], px[2], px[3]])
    }

    /// Write the last frame as a PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.frame.len() != expected {
            return Err(SurfaceError::BufferSize {
                expected,
                actual: self.frame.len(),
            });
        }
        let image = image::RgbaImage::from_raw(self.width, self.height, self.frame.clone()).ok_or(
            SurfaceError::InvalidSize {
                width: self.width,
                height: self.height,
            },
        )?;
        image.save_with_format(path, image::ImageFormat::Png)?;
        tracing::info!(path = %path.display(), "wrote snapshot");
        Ok(())
    }
}

impl DisplaySurface for HeadlessSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(&mut self, width: u32, height: u32, stride: usize, format: PixelFormat, buffer: &[u8]) -> Result<()> {
        validate_frame(width, height, stride, buffer)?;
        let row = width as usize * 4;
        self.frame.clear();
        self.frame.reserve(row * height as usize);
        for y in 0..height as usize {
            let start = y * stride;
            self.frame.extend_from_slice(&buffer[start..start + row]);
        }
        if format == PixelFormat::Bgra8 {
            for px in self.frame.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }
        self.width = width;
        self.height = height;
        self.frames_presented += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_frames_and_normalizes_to_rgba() {
        let mut surface = HeadlessSurface::new(2, 1);
        surface
            .render(2, 1, 8, PixelFormat::Bgra8, &[3, 2, 1, 255, 6, 5, 4, 255])
            .unwrap();
        assert_eq!(surface.frames_presented(), 1);
        assert_eq!(surface.pixel(0, 0), Some([1, 2, 3, 255]));
        assert_eq!(surface.pixel(1, 0), Some([4, 5, 6, 255]));
        assert_eq!(surface.pixel(2, 0), None);
    }

    #[test]
    fn honours_row_stride() {
        let mut surface = HeadlessSurface::new(1, 2);
        let buffer = [9, 9, 9, 9, 0, 0, 0, 0, 7, 7, 7, 7, 0, 0, 0, 0];
        surface.render(1, 2, 8, PixelFormat::Rgba8, &buffer).unwrap();
        assert_eq!(surface.frame(), &[9, 9, 9, 9, 7, 7, 7, 7]);
    }

    #[test]
    fn writes_png_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut surface = HeadlessSurface::new(2, 2);
        surface.render(2, 2, 8, PixelFormat::Rgba8, &[255; 16]).unwrap();
        surface.save_png(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn snapshot_before_first_frame_fails() {
        let dir = tempfile::tempdir().unwrap();
        let surface = HeadlessSurface::new(2, 2);
        assert!(surface.save_png(&dir.path().join("none.png")).is_err());
    }
}
