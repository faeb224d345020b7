use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use log::{error, info, warn, LevelFilter};

use tictac_vision::board::{
    BoardEvent, Disconnected, MarkerKind, Session, SessionError, StreamChannel, TickOutcome,
};
use tictac_vision::detect::{self, DetectError};
use tictac_vision::frames::DirectoryFrameSource;
use tictac_vision::print::{render_page, BoardLayoutError, MarkerStyle, PageSpec, SyntheticFrame};
use tictac_vision::{ConfigIoError, RunReport, TrackerConfig};

/// Camera-based 3x3 board tracking
#[derive(Parser, Debug)]
#[command(name = "tictac-vision")]
#[command(
    about = "Calibrate, classify and track a 3x3 board from camera frames",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a printable A4 board
    RenderBoard {
        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value_t = 150.0)]
        dpi: f32,
    },

    /// Render a synthetic camera frame, optionally with markers
    RenderFrame {
        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value_t = 640)]
        width: usize,

        #[arg(long, default_value_t = 480)]
        height: usize,

        /// Marker in a cell, `N=a` or `N=b` with N in 0..=8 (repeatable)
        #[arg(long = "cell", value_parser = parse_cell_marker)]
        cells: Vec<(usize, MarkerKind)>,

        /// Board offset from the centre, in pixels
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        shift_x: isize,

        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        shift_y: isize,

        /// Per-channel noise amplitude
        #[arg(long, default_value_t = 0)]
        noise: u8,

        #[arg(long, default_value_t = 1)]
        seed: u32,
    },

    /// Locate the nine cells in one frame and print them as JSON
    Calibrate {
        #[arg(long)]
        frame: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the regions here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Calibrate on the first usable frame of a directory and track the rest
    Run {
        #[arg(long)]
        frames: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Device node or file receiving actuator commands
        #[arg(long)]
        actuator: Option<PathBuf>,

        #[arg(long)]
        report: Option<PathBuf>,

        #[arg(long)]
        frame_interval_ms: Option<u64>,
    },

    /// Write the default configuration as JSON
    DefaultConfig {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigIoError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error(transparent)]
    Layout(#[from] BoardLayoutError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("unknown log level '{0}'")]
    LogLevel(String),
    #[error("logger already installed: {0}")]
    Logger(String),
}

fn parse_cell_marker(raw: &str) -> Result<(usize, MarkerKind), String> {
    let (cell, kind) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected N=a or N=b, got '{raw}'"))?;
    let cell: usize = cell
        .trim()
        .parse()
        .map_err(|_| format!("invalid cell index '{cell}'"))?;
    if cell > 8 {
        return Err(format!("cell index {cell} out of range 0..=8"));
    }
    let kind = match kind.trim().to_ascii_lowercase().as_str() {
        "a" => MarkerKind::A,
        "b" => MarkerKind::B,
        other => return Err(format!("unknown marker '{other}', expected a or b")),
    };
    Ok((cell, kind))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(&cli.log_level) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: &str) -> Result<(), CliError> {
    let level = LevelFilter::from_str(level).map_err(|_| CliError::LogLevel(level.to_string()))?;
    tictac_vision::core::init_with_level(level)
        .map_err(|err| CliError::Logger(err.to_string()))?;
    Ok(())
}

#[cfg(feature = "tracing")]
fn init_logging(level: &str) -> Result<(), CliError> {
    LevelFilter::from_str(level).map_err(|_| CliError::LogLevel(level.to_string()))?;
    let _ = tracing_log::LogTracer::init();
    tictac_vision::core::init_tracing(false);
    Ok(())
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::RenderBoard { out, dpi } => render_board(&out, dpi),
        Command::RenderFrame {
            out,
            width,
            height,
            cells,
            shift_x,
            shift_y,
            noise,
            seed,
        } => {
            let mut frame = SyntheticFrame::new(width, height).shifted(shift_x, shift_y);
            for (cell, kind) in cells {
                frame = frame.with_marker(cell, marker_style(kind));
            }
            if noise > 0 {
                frame = frame.with_noise(noise, seed);
            }
            detect::save_rgb(&frame.render()?, &out)?;
            info!("wrote {}", out.display());
            Ok(())
        }
        Command::Calibrate { frame, config, out } => {
            calibrate(&frame, config.as_deref(), out.as_deref())
        }
        Command::Run {
            frames,
            config,
            actuator,
            report,
            frame_interval_ms,
        } => track(
            &frames,
            config.as_deref(),
            actuator.as_deref(),
            report.as_deref(),
            frame_interval_ms.map(Duration::from_millis),
        ),
        Command::DefaultConfig { out } => {
            TrackerConfig::default().write_json(&out)?;
            info!("wrote {}", out.display());
            Ok(())
        }
    }
}

/// Colours the default classifier envelopes recognise.
fn marker_style(kind: MarkerKind) -> MarkerStyle {
    match kind {
        MarkerKind::A => MarkerStyle::WHITE,
        MarkerKind::B => MarkerStyle::BLACK,
    }
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig, CliError> {
    match path {
        Some(path) => Ok(TrackerConfig::load_json(path)?),
        None => Ok(TrackerConfig::default()),
    }
}

fn render_board(out: &Path, dpi: f32) -> Result<(), CliError> {
    let page = PageSpec {
        dpi,
        ..PageSpec::default()
    };
    let img = render_page(&page)?;
    detect::save_rgb(&img, out)?;
    info!("wrote {} ({}x{} px)", out.display(), img.width, img.height);
    Ok(())
}

fn calibrate(frame: &Path, config: Option<&Path>, out: Option<&Path>) -> Result<(), CliError> {
    let cfg = load_config(config)?;
    let img = image::open(frame).map_err(DetectError::from)?.to_rgb8();
    let regions = detect::locate_cells(&img, &cfg.locator)?;
    let json = serde_json::to_string_pretty(&regions)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn track(
    frames: &Path,
    config: Option<&Path>,
    actuator: Option<&Path>,
    report_path: Option<&Path>,
    interval: Option<Duration>,
) -> Result<(), CliError> {
    let cfg = load_config(config)?;
    let mut source = DirectoryFrameSource::open(frames)?;
    if let Some(interval) = interval {
        source = source.with_interval(interval);
    }

    let mut report = RunReport::new(frames.display().to_string());
    let calibrated = Session::calibrate(
        source,
        &cfg.build_locator(),
        cfg.build_classifier(),
        cfg.tracker,
        cfg.session,
    );
    let mut session = match calibrated {
        Ok(session) => session,
        Err(err) => {
            report.error = Some(err.to_string());
            if let Some(path) = report_path {
                report.write_json(path)?;
            }
            return Err(err.into());
        }
    };
    report.calibration = Some(session.calibration().clone());

    if let Some(path) = actuator {
        match StreamChannel::open(path) {
            Ok(channel) => {
                session = session.with_channel(Box::new(channel));
                info!("actuator attached at {}", path.display());
            }
            Err(err) => {
                warn!("actuator {} unavailable, tracking without it: {err}", path.display());
                session = session.with_channel(Box::new(Disconnected));
            }
        }
    }

    loop {
        match session.tick(Instant::now()) {
            Ok(tick) => {
                if let TickOutcome::Updated(update) = &tick.outcome {
                    log_event(update.frame, &update.event);
                    if let Some(violation) = &update.violation {
                        warn!("frame {}: {violation:?}", update.frame);
                    }
                }
                report.record(tick);
            }
            Err(SessionError::SourceExhausted) => break,
            Err(err) => return Err(err.into()),
        }
    }

    let board = session.tracker().snapshot();
    info!(
        "{} update(s), {} violation(s), {} command(s) sent, occupied cells {:?}\n{}",
        report.updates(),
        report.violations(),
        report.commands_sent.len(),
        board.occupied(),
        board.render()
    );
    match report_path {
        Some(path) => report.write_json(path)?,
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn log_event(frame: u64, event: &BoardEvent) {
    match event {
        BoardEvent::NoOp { .. } => {}
        BoardEvent::Placement(p) => info!(
            "frame {frame}: placement in cell {} ({})",
            p.cell,
            p.color
                .map(|c| format!("{c:?}"))
                .unwrap_or_else(|| "colour unknown".to_string())
        ),
        BoardEvent::Move { from, to, .. } => info!("frame {frame}: marker moved {from} -> {to}"),
    }
}
