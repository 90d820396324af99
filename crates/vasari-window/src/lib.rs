//! vasari-window: winit window presenting raster frames through `pixels`.
//!
//! Responsibilities:
//! - Create the window and a pixel buffer sized to the raster.
//! - Translate winit events into [`SurfaceEvent`]s in raster coordinates.
//! - Drive a fixed-interval frame callback until the handler asks to exit.

use anyhow::Result;
use pixels::{Pixels, SurfaceTexture};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use vasari_surface::{validate_frame, DisplaySurface, PixelFormat, PointerButton, SurfaceError, SurfaceEvent};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

pub mod keys;

pub use keys::{key_name, KeyboardState};

/// What the handler wants the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

pub trait WindowHandler {
    /// One translated input event.
    fn on_event(&mut self, event: SurfaceEvent) -> Result<Control>;
    /// Called once per frame interval.
    fn on_frame(&mut self, surface: &mut WindowSurface) -> Result<Control>;
}

#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub frame_interval: Duration,
}

/// Presents frames into the window's pixel buffer.
pub struct WindowSurface {
    window: &'static Window,
    pixels: Pixels<'static>,
    buffer_size: (u32, u32),
}

impl WindowSurface {
    fn new(window: &'static Window, width: u32, height: u32) -> Result<Self> {
        let size = window.inner_size();
        let texture = SurfaceTexture::new(size.width.max(1), size.height.max(1), window);
        let pixels = Pixels::new(width, height, texture)?;
        Ok(Self {
            window,
            pixels,
            buffer_size: (width, height),
        })
    }

    pub fn window(&self) -> &Window {
        self.window
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Err(err) = self.pixels.resize_surface(width, height) {
            tracing::warn!("window: surface resize to {width}x{height} failed: {err}");
        }
    }

    /// Window position to a buffer position, clamped to the buffer.
    fn to_buffer(&self, x: f64, y: f64) -> (f32, f32) {
        let (px, py) = match self.pixels.window_pos_to_pixel((x as f32, y as f32)) {
            Ok(pos) => pos,
            Err(outside) => self.pixels.clamp_pixel_pos(outside),
        };
        (px as f32, py as f32)
    }
}

impl DisplaySurface for WindowSurface {
    fn size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn render(&mut self, width: u32, height: u32, stride: usize, format: PixelFormat, buffer: &[u8]) -> vasari_surface::Result<()> {
        validate_frame(width, height, stride, buffer)?;
        if self.buffer_size != (width, height) {
            self.pixels
                .resize_buffer(width, height)
                .map_err(|err| SurfaceError::Backend(err.to_string()))?;
            self.buffer_size = (width, height);
        }
        let row = width as usize * 4;
        let frame = self.pixels.frame_mut();
        for (y, dst) in frame.chunks_exact_mut(row).take(height as usize).enumerate() {
            let src = &buffer[y * stride..y * stride + row];
            dst.copy_from_slice(src);
            if format == PixelFormat::Bgra8 {
                for px in dst.chunks_exact_mut(4) {
                    px.swap(0, 2);
                }
            }
        }
        self.pixels
            .render()
            .map_err(|err| SurfaceError::Backend(err.to_string()))
    }
}

pub struct VasariWindow {
    event_loop: EventLoop<()>,
    surface: WindowSurface,
    frame_interval: Duration,
}

impl VasariWindow {
    pub fn new(options: &WindowOptions) -> Result<Self> {
        let event_loop = EventLoop::new()?;
        let window = WindowBuilder::new()
            .with_title(options.title.as_str())
            .with_inner_size(LogicalSize::new(options.width, options.height))
            .build(&event_loop)?;
        // Leaked so the pixel surface can borrow it for 'static.
        let window: &'static Window = Box::leak(Box::new(window));
        let surface = WindowSurface::new(window, options.width, options.height)?;
        Ok(Self {
            event_loop,
            surface,
            frame_interval: options.frame_interval,
        })
    }

    pub fn run(self, mut handler: impl WindowHandler + 'static) -> Result<()> {
        let Self {
            event_loop,
            mut surface,
            frame_interval,
        } = self;
        let mut keyboard = KeyboardState::default();
        let mut cursor = (0.0f32, 0.0f32);
        let mut next_frame = Instant::now();
        let failure: Rc<RefCell<Option<anyhow::Error>>> = Rc::new(RefCell::new(None));
        let failed = failure.clone();

        event_loop.run(move |event, elwt| {
            let control = match event {
                Event::WindowEvent { window_id, event } if window_id == surface.window.id() => {
                    match translate(&event, &mut surface, &mut keyboard, &mut cursor) {
                        Some(translated) => handler.on_event(translated),
                        None => Ok(Control::Continue),
                    }
                }
                Event::AboutToWait => {
                    let now = Instant::now();
                    let control = if now >= next_frame {
                        next_frame = now + frame_interval;
                        handler.on_frame(&mut surface)
                    } else {
                        Ok(Control::Continue)
                    };
                    elwt.set_control_flow(ControlFlow::WaitUntil(next_frame));
                    control
                }
                _ => Ok(Control::Continue),
            };
            match control {
                Ok(Control::Continue) => {}
                Ok(Control::Exit) => elwt.exit(),
                Err(err) => {
                    tracing::error!("window: handler failed: {err:#}");
                    *failed.borrow_mut() = Some(err);
                    elwt.exit();
                }
            }
        })?;

        let error = failure.borrow_mut().take();
        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn translate(
    event: &WindowEvent,
    surface: &mut WindowSurface,
    keyboard: &mut KeyboardState,
    cursor: &mut (f32, f32),
) -> Option<SurfaceEvent> {
    match event {
        WindowEvent::CloseRequested => Some(SurfaceEvent::CloseRequested),
        WindowEvent::Resized(size) => {
            surface.resize_surface(size.width, size.height);
            Some(SurfaceEvent::Resized {
                width: size.width,
                height: size.height,
            })
        }
        WindowEvent::CursorMoved { position, .. } => {
            *cursor = surface.to_buffer(position.x, position.y);
            Some(SurfaceEvent::PointerMoved {
                x: cursor.0,
                y: cursor.1,
            })
        }
        WindowEvent::MouseInput { state, button, .. } => {
            let button = pointer_button(*button)?;
            let (x, y) = *cursor;
            Some(match state {
                ElementState::Pressed => SurfaceEvent::PointerDown { x, y, button },
                ElementState::Released => SurfaceEvent::PointerUp { x, y, button },
            })
        }
        WindowEvent::ModifiersChanged(modifiers) => {
            keyboard.set_modifiers(modifiers.state());
            None
        }
        WindowEvent::KeyboardInput { event, .. } => keyboard
            .key_event(event.physical_key, event.state)
            .map(SurfaceEvent::KeyDown),
        _ => None,
    }
}

fn pointer_button(button: MouseButton) -> Option<PointerButton> {
    match button {
        MouseButton::Left => Some(PointerButton::Primary),
        MouseButton::Right => Some(PointerButton::Secondary),
        MouseButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}
