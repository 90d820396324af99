//! The runtime: owns every registry and drives passes, input and I/O.
//!
//! Everything happens on the caller's thread. Background services report
//! through [`Runtime::pump`], which turns their completions into messages on
//! the same inbox as surface input. [`Runtime::step`] handles one message;
//! [`Runtime::frame`] runs a scheduled render pass and presents the result.

use crate::components::{ComponentKind, ComponentRegistry, ImageStatus};
use crate::dispatch::{self, PassContext, RenderReport};
use crate::error::{Result, ScriptError};
use crate::event_router::{EventRouter, Invocation, RouteOutcome};
use crate::image_cache::ImageCache;
use crate::input::{InputBuffers, KeyOutcome};
use crate::listeners::{DefaultAction, ListenerTable};
use crate::navigation::Navigator;
use crate::script::{Capabilities, Effect, EventContext, ScriptBindings, Value};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use vasari_config::VasariConfig;
use vasari_io::{ContentResult, DecodeResult, ImageDecodeService};
use vasari_surface::{DisplaySurface, FontSource, RasterContext, RasterImage, SurfaceEvent};

/// Work queued for the runtime.
#[derive(Debug)]
pub enum RuntimeMessage {
    /// Native input, stamped with its arrival time.
    Input { event: SurfaceEvent, at: Instant },
    ImageDecoded(DecodeResult),
    ContentLoaded(ContentResult),
    Navigate(String),
    Back,
    Exit,
}

/// Something the host must act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Exit,
}

/// Host-chosen resources that do not come from configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub font: FontSource,
}

impl RuntimeOptions {
    pub fn from_config(config: &VasariConfig) -> Self {
        Self {
            font: FontSource::from_config(config.text.font.as_deref()),
        }
    }
}

pub struct Runtime {
    document: String,
    default_font_size: f32,
    raster: RasterContext,
    registry: ComponentRegistry,
    listeners: ListenerTable,
    inputs: InputBuffers,
    script: ScriptBindings,
    images: ImageCache,
    decoder: ImageDecodeService,
    navigator: Navigator,
    router: EventRouter,
    inbox: VecDeque<RuntimeMessage>,
    focus: Option<String>,
    render_scheduled: bool,
    present_scheduled: bool,
    last_report: Option<RenderReport>,
}

impl Runtime {
    /// A runtime showing `document`. The first frame renders it.
    pub fn new(config: &VasariConfig, document: impl Into<String>, options: RuntimeOptions) -> Result<Self> {
        let (width, height) = (config.window.width, config.window.height);
        let mut script = ScriptBindings::new(Capabilities::new(config.script.capabilities.iter().cloned()));
        script
            .state_mut()
            .set("home", Value::Str(config.navigator.home.clone()));

        Ok(Self {
            document: document.into(),
            default_font_size: config.render.default_font_size,
            raster: RasterContext::new(width, height, &options.font)?,
            registry: ComponentRegistry::new(),
            listeners: ListenerTable::new(),
            inputs: InputBuffers::new(),
            script,
            images: ImageCache::new(),
            decoder: ImageDecodeService::new(),
            navigator: Navigator::new(config.navigator.peers.clone(), (width, height)),
            router: EventRouter::new(config.render.debounce_interval()),
            inbox: VecDeque::new(),
            focus: None,
            render_scheduled: true,
            present_scheduled: false,
            last_report: None,
        })
    }

    /// A runtime showing the browser chrome, navigating to the configured home.
    pub fn browser(config: &VasariConfig, options: RuntimeOptions) -> Result<Self> {
        let mut runtime = Self::new(config, String::new(), options)?;
        runtime.document = runtime.navigator.blank_document();
        runtime.post(RuntimeMessage::Navigate(config.navigator.home.clone()));
        Ok(runtime)
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    /// Replace the document wholesale and schedule a render.
    pub fn set_document(&mut self, document: impl Into<String>) {
        self.document = document.into();
        self.reset_document_state();
        self.render_scheduled = true;
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn listeners(&self) -> &ListenerTable {
        &self.listeners
    }

    pub fn inputs(&self) -> &InputBuffers {
        &self.inputs
    }

    pub fn script(&self) -> &ScriptBindings {
        &self.script
    }

    pub fn script_mut(&mut self) -> &mut ScriptBindings {
        &mut self.script
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn raster(&self) -> &RasterContext {
        &self.raster
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    pub fn hover(&self) -> Option<&str> {
        self.router.hover_target()
    }

    pub fn last_report(&self) -> Option<&RenderReport> {
        self.last_report.as_ref()
    }

    pub fn is_render_scheduled(&self) -> bool {
        self.render_scheduled
    }

    /// Ask for a render pass on the next frame.
    pub fn schedule_render(&mut self) {
        self.render_scheduled = true;
    }

    pub fn has_messages(&self) -> bool {
        !self.inbox.is_empty()
    }

    /// Whether any message or background work is outstanding.
    pub fn is_busy(&self) -> bool {
        !self.inbox.is_empty() || self.decoder.has_pending() || self.navigator.has_pending()
    }

    pub fn post(&mut self, message: RuntimeMessage) {
        self.inbox.push_back(message);
    }

    /// Queue surface input stamped with the current time.
    pub fn post_input(&mut self, event: SurfaceEvent) {
        self.post_input_at(event, Instant::now());
    }

    pub fn post_input_at(&mut self, event: SurfaceEvent, at: Instant) {
        self.post(RuntimeMessage::Input { event, at });
    }

    /// Move finished background work onto the inbox.
    pub fn pump(&mut self) {
        for result in self.decoder.poll() {
            self.post(RuntimeMessage::ImageDecoded(result));
        }
        for result in self.navigator.poll() {
            self.post(RuntimeMessage::ContentLoaded(result));
        }
    }

    /// Handle at most one queued message.
    pub fn step(&mut self) -> Result<Option<Signal>> {
        let Some(message) = self.inbox.pop_front() else {
            return Ok(None);
        };
        match message {
            RuntimeMessage::Input { event, at } => self.handle_input(event, at),
            RuntimeMessage::ImageDecoded(result) => {
                self.image_decoded(result);
                Ok(None)
            }
            RuntimeMessage::ContentLoaded(result) => {
                self.content_loaded(result);
                Ok(None)
            }
            RuntimeMessage::Navigate(path) => {
                self.navigate(&path);
                Ok(None)
            }
            RuntimeMessage::Back => {
                match self.navigator.back() {
                    Some(previous) => self.navigate(&previous),
                    None => tracing::debug!("runtime: no history to go back to"),
                }
                Ok(None)
            }
            RuntimeMessage::Exit => Ok(Some(Signal::Exit)),
        }
    }

    /// Run a scheduled render pass and present it, or re-present the current
    /// buffer if only that was requested. Returns the pass report if one ran.
    pub fn frame(&mut self, surface: &mut dyn DisplaySurface) -> Result<Option<RenderReport>> {
        let report = if self.render_scheduled {
            self.render_scheduled = false;
            Some(self.render()?)
        } else {
            None
        };
        if report.is_some() || self.present_scheduled {
            self.present_scheduled = false;
            self.present(surface)?;
        }
        Ok(report)
    }

    /// Pump, step and render until nothing is outstanding, an exit is
    /// requested, or `timeout` elapses.
    pub fn run_until_idle(&mut self, surface: &mut dyn DisplaySurface, timeout: Duration) -> Result<Option<Signal>> {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            while !self.inbox.is_empty() {
                if let Some(signal) = self.step()? {
                    return Ok(Some(signal));
                }
            }
            self.frame(surface)?;
            if !self.is_busy() && !self.render_scheduled {
                return Ok(None);
            }
            if Instant::now() >= deadline {
                tracing::debug!("runtime: idle wait timed out");
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn render(&mut self) -> Result<RenderReport> {
        let mut ctx = PassContext {
            raster: &mut self.raster,
            registry: &mut self.registry,
            listeners: &mut self.listeners,
            inputs: &mut self.inputs,
            script: &mut self.script,
            images: &mut self.images,
            decoder: &mut self.decoder,
            focus: self.focus.as_deref(),
            hover: self.router.hover_target(),
            default_font_size: self.default_font_size,
        };
        let output = dispatch::render(&self.document, &mut ctx)?;
        for effect in output.effects {
            self.apply_effect(effect);
        }
        self.last_report = Some(output.report);
        Ok(output.report)
    }

    fn present(&mut self, surface: &mut dyn DisplaySurface) -> Result<()> {
        let format = surface.pixel_format();
        let buffer = self.raster.export(format);
        surface.render(self.raster.width(), self.raster.height(), self.raster.stride(), format, &buffer)?;
        Ok(())
    }

    fn handle_input(&mut self, event: SurfaceEvent, at: Instant) -> Result<Option<Signal>> {
        match self.router.route(&self.listeners, &event, at) {
            RouteOutcome::Debounced | RouteOutcome::Released => Ok(None),
            RouteOutcome::Close => Ok(Some(Signal::Exit)),
            RouteOutcome::Resized { width, height } => {
                tracing::debug!(width, height, "runtime: surface resized");
                self.present_scheduled = true;
                Ok(None)
            }
            RouteOutcome::Accepted(invocations) => {
                for invocation in invocations {
                    self.invoke(invocation)?;
                }
                self.render_scheduled = true;
                Ok(None)
            }
        }
    }

    /// Run the slot's script handler, then its default action.
    fn invoke(&mut self, invocation: Invocation) -> std::result::Result<(), ScriptError> {
        let target = &invocation.target;
        if let Some(handler) = &invocation.handler {
            let event = EventContext {
                target: Some(target),
                point: invocation.point,
                key: invocation.key.as_ref().map(|k| k.key.as_str()),
            };
            let effects = self.script.invoke(handler, &event)?;
            for effect in effects {
                self.apply_effect(effect);
            }
        }

        match invocation.action {
            DefaultAction::None | DefaultAction::HoverLink => {}
            DefaultAction::Log => {
                tracing::debug!("{}.{} {}", target.tag, invocation.class.handler_name(), target.id);
            }
            DefaultAction::FocusInput => {
                self.focus = Some(target.id.clone());
            }
            DefaultAction::EditInput => {
                if let Some(key) = &invocation.key {
                    if let KeyOutcome::Submit(value) = self.inputs.apply_key(&target.id, key) {
                        self.post(RuntimeMessage::Navigate(value));
                    }
                }
            }
            DefaultAction::FollowLink => {
                let href = self.registry.get(&target.id).and_then(|c| match &c.kind {
                    ComponentKind::Link { href, .. } => href.clone(),
                    _ => None,
                });
                match href {
                    Some(href) => self.post(RuntimeMessage::Navigate(href)),
                    None => tracing::warn!(id = %target.id, "runtime: link has no target"),
                }
            }
        }
        Ok(())
    }

    fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Navigate(path) => self.post(RuntimeMessage::Navigate(path)),
            Effect::Back => self.post(RuntimeMessage::Back),
            Effect::Exit => self.post(RuntimeMessage::Exit),
            Effect::Log(message) => tracing::info!(target: "vasari::script", "{message}"),
        }
    }

    fn navigate(&mut self, path: &str) {
        if let Err(err) = self.navigator.request(path) {
            tracing::error!(path, %err, "runtime: cannot navigate");
        }
    }

    fn content_loaded(&mut self, result: ContentResult) {
        match self.navigator.complete(result) {
            None => {}
            Some(Err(err)) => tracing::error!(%err, "runtime: navigation failed"),
            Some(Ok(loaded)) => {
                self.document = loaded.document;
                self.reset_document_state();
                self.script.state_mut().set("search", Value::Str(loaded.path));
                self.render_scheduled = true;
            }
        }
    }

    fn reset_document_state(&mut self) {
        self.listeners.clear();
        self.script.reset_document();
        self.inputs.clear();
        self.router.reset();
        self.focus = None;
    }

    /// Blit a finished decode into every image component waiting on it.
    fn image_decoded(&mut self, result: DecodeResult) {
        let image = match result.image {
            Ok(decoded) => match RasterImage::from_rgba(decoded.width, decoded.height, decoded.rgba) {
                Ok(image) => Some(image),
                Err(err) => {
                    tracing::error!(source = %truncate(&result.source), %err, "runtime: unusable image");
                    None
                }
            },
            Err(err) => {
                tracing::error!(source = %truncate(&result.source), %err, "runtime: image decode failed");
                None
            }
        };
        let Some((source, image)) = self.images.complete(result.request_id, image) else {
            return;
        };

        for component in self.registry.iter_mut() {
            let ComponentKind::Image { path, fit, status } = &mut component.kind else {
                continue;
            };
            if *path != source {
                continue;
            }
            match &image {
                Some(image) => {
                    dispatch::blit(&mut self.raster, &component.appearance, *fit, image);
                    *status = ImageStatus::Ready;
                }
                None => *status = ImageStatus::Failed,
            }
        }
        if image.is_some() {
            self.present_scheduled = true;
        }
    }
}

/// Keep data URIs out of log lines.
fn truncate(source: &str) -> &str {
    match source.char_indices().nth(48) {
        Some((i, _)) => &source[..i],
        None => source,
    }
}
