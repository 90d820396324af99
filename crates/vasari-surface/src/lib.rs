//! vasari-surface: raster context and display surfaces.
//!
//! Render passes draw into a [`RasterContext`] (a tiny-skia pixmap with
//! fontdue text). When a pass completes the buffer is handed to a
//! [`DisplaySurface`], which either presents it in a window or, for
//! [`HeadlessSurface`], keeps it for inspection and snapshots.

mod error;
mod headless;
mod paint;
mod raster;
mod text;

pub use error::{Result, SurfaceError};
pub use headless::HeadlessSurface;
pub use paint::{Paint, Rgba};
pub use raster::{
    calculate_image_fit, ImageFitMode, LineJoin, RasterContext, RasterImage, StrokeStyle, TextStyle,
};
pub use text::{FontSource, Glyph, GlyphRasterizer, ITALIC_SHEAR};

/// Channel order of a presented buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
}

/// Destination of finished frames.
pub trait DisplaySurface {
    /// Current drawable size in physical pixels.
    fn size(&self) -> (u32, u32);

    /// Preferred channel order for [`DisplaySurface::render`].
    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Rgba8
    }

    /// Present a full frame. `stride` is the number of bytes per row.
    fn render(&mut self, width: u32, height: u32, stride: usize, format: PixelFormat, buffer: &[u8]) -> Result<()>;
}

/// Pointer button carried by pointer events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

/// A key press as reported by the surface: the key name plus modifier state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyInput {
    /// Key name, e.g. `"a"`, `"1"`, `"Backspace"`, `"Shift"`, `"Space"`.
    pub key: String,
    pub shift: bool,
    pub ctrl: bool,
    pub capslock: bool,
}

impl KeyInput {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn shifted(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_capslock(mut self) -> Self {
        self.capslock = true;
        self
    }
}

/// Native input delivered by a display surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Resized { width: u32, height: u32 },
    PointerMoved { x: f32, y: f32 },
    PointerDown { x: f32, y: f32, button: PointerButton },
    PointerUp { x: f32, y: f32, button: PointerButton },
    KeyDown(KeyInput),
    CloseRequested,
}

/// Check that `buffer` holds `height` rows of `stride` bytes, each wide enough for `width` pixels.
pub fn validate_frame(width: u32, height: u32, stride: usize, buffer: &[u8]) -> Result<()> {
    if width == 0 || height == 0 || stride < width as usize * 4 {
        return Err(SurfaceError::InvalidSize { width, height });
    }
    let expected = stride * height as usize;
    if buffer.len() < expected {
        return Err(SurfaceError::BufferSize {
            expected,
            actual: buffer.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_input_builders() {
        let key = KeyInput::new("a").shifted().with_capslock();
        assert_eq!(key.key, "a");
        assert!(key.shift && key.capslock && !key.ctrl);
    }

    #[test]
    fn frame_validation() {
        assert!(validate_frame(2, 2, 8, &[0; 16]).is_ok());
        assert!(matches!(
            validate_frame(2, 2, 8, &[0; 15]),
            Err(SurfaceError::BufferSize { expected: 16, actual: 15 })
        ));
        assert!(validate_frame(2, 2, 4, &[0; 16]).is_err());
        assert!(validate_frame(0, 2, 0, &[]).is_err());
    }
}
