use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand, ValueEnum};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use neon_visualiser_core::{
    list_input_devices, DeviceCapture, NeonVizError, PacedHost, Session, SourceKind,
    VisualiserConfig, MAX_REFRESH_HZ,
};
use tiny_skia::{Color, Pixmap};
use tracing_subscriber::EnvFilter;

mod terminal;

use terminal::TerminalPresenter;

fn main() -> neon_visualiser_core::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Live {
            source,
            config,
            fps,
        } => {
            // The terminal belongs to the renderer; only log when asked to.
            let default_filter = if cli.log_file.is_some() { "info" } else { "off" };
            init_tracing(cli.log_file.as_deref(), default_filter)?;
            run_live(source.into(), config.as_deref(), fps)
        }
        Commands::Devices => {
            init_tracing(cli.log_file.as_deref(), "info")?;
            run_devices()
        }
    }
}

fn run_live(source: SourceKind, config: Option<&Path>, fps: u32) -> neon_visualiser_core::Result<()> {
    let config = match config {
        Some(path) => VisualiserConfig::load(path)?,
        None => VisualiserConfig::default(),
    };
    tracing::info!(%source, fps, "starting live mode");

    let mut host = PacedHost::new(fps);
    let mut session = Session::new(DeviceCapture::new(config.audio.clone()), config);
    let mut presenter = TerminalPresenter::enter()?;
    let mut surface = new_surface()?;

    // Failures are kept on the session and shown in the status line.
    let _ = session.start(source, &mut host);
    let mut dirty = true;

    loop {
        let timeout = host
            .due()
            .map(|(_, at)| at.saturating_duration_since(Instant::now()))
            .unwrap_or_else(|| host.interval().max(Duration::from_millis(100)));

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('m') => {
                        let _ = session.start(SourceKind::Microphone, &mut host);
                    }
                    KeyCode::Char('d') => {
                        let _ = session.start(SourceKind::SharedDisplay, &mut host);
                    }
                    KeyCode::Char('s') => session.stop(&mut host),
                    _ => {}
                },
                Event::Resize(..) => surface = new_surface()?,
                _ => {}
            }
            dirty = true;
        }

        if let Some(id) = host.take_due(Instant::now()) {
            dirty |= session.on_frame(id, &mut host, &mut surface);
        }

        if dirty {
            presenter.present(&surface, &status_line(&session))?;
            dirty = false;
        }
    }

    session.stop(&mut host);
    tracing::info!("live mode finished");
    Ok(())
}

fn run_devices() -> neon_visualiser_core::Result<()> {
    let devices = list_input_devices()?;
    if devices.is_empty() {
        println!("no capture devices found");
    }
    for device in devices {
        let kind = if device.loopback { "  [display audio]" } else { "" };
        println!(
            "{}  {}ch @ {} Hz{}",
            device.name, device.channels, device.sample_rate, kind
        );
    }
    Ok(())
}

fn new_surface() -> neon_visualiser_core::Result<Pixmap> {
    let (width, height) = TerminalPresenter::surface_size()?;
    let mut surface = Pixmap::new(width, height)
        .ok_or_else(|| NeonVizError::msg(format!("cannot allocate a {width}x{height} surface")))?;
    surface.fill(Color::BLACK);
    Ok(surface)
}

fn status_line(session: &Session<DeviceCapture>) -> String {
    let keys = "m mic | d display | s stop | q quit";
    if let Some(message) = session.error_message() {
        return format!(" {message} | {keys}");
    }
    let source = match (session.source(), session.handle()) {
        (Some(source), Some(capture)) => Some(format!("{source} ({})", capture.device_name())),
        (source, _) => source.map(|source| source.to_string()),
    };
    match (source, session.pipeline().last_report()) {
        (Some(source), Some(report)) => format!(
            " {source} | bass {:>3.0} mid {:>3.0} treble {:>3.0} | particles {:>3}{} | {keys}",
            report.levels.bass,
            report.levels.mid,
            report.levels.treble,
            report.particles,
            if report.beat { " *" } else { "  " },
        ),
        (Some(source), None) => format!(" {source} | waiting for audio | {keys}"),
        (None, _) => format!(" stopped | {keys}"),
    }
}

fn init_tracing(log_file: Option<&Path>, default_filter: &str) -> neon_visualiser_core::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_ansi(false);

    let _ = match log_file {
        Some(path) => builder.with_writer(Mutex::new(File::create(path)?)).try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    Ok(())
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Neon audio visualiser for the terminal", long_about = None)]
struct Cli {
    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Visualise live audio until `q` is pressed.
    Live {
        /// Audio to visualise on startup.
        #[arg(short, long, value_enum, default_value_t = SourceArg::Mic)]
        source: SourceArg,
        /// JSON configuration file overriding the defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Refresh rate of the render loop.
        #[arg(
            long,
            default_value_t = 60,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_REFRESH_HZ))
        )]
        fps: u32,
    },
    /// List capture devices and mark the ones usable as display audio.
    Devices,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceArg {
    /// The default microphone.
    Mic,
    /// A monitor/loopback of the system output.
    Display,
}

impl From<SourceArg> for SourceKind {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Mic => SourceKind::Microphone,
            SourceArg::Display => SourceKind::SharedDisplay,
        }
    }
}
