//! vasari: render a markup document, or browse peers, headless or in a window.
//!
//! Usage: `vasari [--config PATH] [--snapshot PNG] [--headless] [DOCUMENT]`
//!
//! Without a document the browser chrome opens on the configured home path.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vasari_config::VasariConfig;
use vasari_scene::{Runtime, RuntimeOptions, Signal};
use vasari_surface::HeadlessSurface;

const HEADLESS_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    document: Option<PathBuf>,
    headless: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => parsed.config = Some(args.next().context("--config needs a path")?.into()),
            "--snapshot" => parsed.snapshot = Some(args.next().context("--snapshot needs a path")?.into()),
            "--headless" => parsed.headless = true,
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            path => parsed.document = Some(path.into()),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = VasariConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    let options = RuntimeOptions::from_config(&config);
    let runtime = match &args.document {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read document {}", path.display()))?;
            Runtime::new(&config, source, options)?
        }
        None => Runtime::browser(&config, options)?,
    };

    #[cfg(feature = "desktop")]
    if !args.headless {
        return desktop::run(&config, runtime);
    }

    headless(&config, runtime, args.snapshot.as_deref())
}

fn headless(config: &VasariConfig, mut runtime: Runtime, snapshot: Option<&std::path::Path>) -> Result<()> {
    let mut surface = HeadlessSurface::new(config.window.width, config.window.height);
    if let Some(Signal::Exit) = runtime.run_until_idle(&mut surface, HEADLESS_TIMEOUT)? {
        info!("document requested exit");
    }
    if let Some(report) = runtime.last_report() {
        info!(
            nodes = report.nodes,
            built = report.built,
            reused = report.reused,
            listeners = report.listeners,
            "render complete"
        );
    }
    if let Some(path) = snapshot {
        surface
            .save_png(path)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        info!("snapshot written to {}", path.display());
    }
    Ok(())
}

#[cfg(feature = "desktop")]
mod desktop {
    use anyhow::Result;
    use vasari_config::VasariConfig;
    use vasari_scene::{Runtime, Signal};
    use vasari_surface::SurfaceEvent;
    use vasari_window::{Control, VasariWindow, WindowHandler, WindowOptions, WindowSurface};

    struct RuntimeHandler {
        runtime: Runtime,
    }

    impl WindowHandler for RuntimeHandler {
        fn on_event(&mut self, event: SurfaceEvent) -> Result<Control> {
            self.runtime.post_input(event);
            Ok(Control::Continue)
        }

        fn on_frame(&mut self, surface: &mut WindowSurface) -> Result<Control> {
            self.runtime.pump();
            while self.runtime.has_messages() {
                if let Some(Signal::Exit) = self.runtime.step()? {
                    return Ok(Control::Exit);
                }
            }
            self.runtime.frame(surface)?;
            Ok(Control::Continue)
        }
    }

    pub fn run(config: &VasariConfig, runtime: Runtime) -> Result<()> {
        let window = VasariWindow::new(&WindowOptions {
            title: config.window.title.clone(),
            width: config.window.width,
            height: config.window.height,
            frame_interval: config.frame_interval(),
        })?;
        window.run(RuntimeHandler { runtime })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_flags_and_document() {
        let parsed = args(&["--config", "vasari.toml", "--snapshot", "out.png", "--headless", "page.jsx"]).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("vasari.toml")));
        assert_eq!(parsed.snapshot, Some(PathBuf::from("out.png")));
        assert_eq!(parsed.document, Some(PathBuf::from("page.jsx")));
        assert!(parsed.headless);
    }

    #[test]
    fn rejects_unknown_flags_and_missing_values() {
        assert!(args(&["--fullscreen"]).is_err());
        assert!(args(&["--config"]).is_err());
        assert!(args(&[]).unwrap().document.is_none());
    }
}
