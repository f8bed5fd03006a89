use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use darkspot_vision::capture_loop::CaptureLoop;
use darkspot_vision::core_modules::utils::image_helper::image_helper::FrameWriter;
use darkspot_vision::device::{self, CaptureBackend, CaptureSettings};
use darkspot_vision::display::{HighGuiWindow, WINDOW_TITLE};
use darkspot_vision::pipeline::SpotDetector;
use log::{error, info};
use std::path::PathBuf;

/// Real-time dark spot detection from a live camera.
#[derive(Debug, Parser)]
#[command(name = "darkspot_viewer", version, about)]
struct Args {
    /// Index of the camera to open.
    #[arg(short, long, default_value_t = 0)]
    device: i32,

    /// Capture backend. `auto` picks the native one for this platform.
    #[arg(short, long, value_enum, default_value_t = BackendArg::Auto)]
    backend: BackendArg,

    /// Directory that receives frames saved with the `s` key.
    #[arg(short, long, default_value = "saved_frames")]
    output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Auto,
    #[value(name = "v4l2")]
    V4l2,
    Avfoundation,
    Dshow,
    Msmf,
    Gstreamer,
    Any,
}

impl From<BackendArg> for CaptureBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => CaptureBackend::Auto,
            BackendArg::V4l2 => CaptureBackend::V4l2,
            BackendArg::Avfoundation => CaptureBackend::AvFoundation,
            BackendArg::Dshow => CaptureBackend::DirectShow,
            BackendArg::Msmf => CaptureBackend::MediaFoundation,
            BackendArg::Gstreamer => CaptureBackend::GStreamer,
            BackendArg::Any => CaptureBackend::Any,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // --- 1. Output Directory ---
    let writer = FrameWriter::new(&args.output_dir)
        .with_context(|| format!("failed to create output directory {}", args.output_dir.display()))?;

    // --- 2. Camera Acquisition ---
    let settings = CaptureSettings::default();
    let camera = match device::open_device(args.device, args.backend.into(), &settings) {
        Ok(camera) => camera,
        Err(e) => {
            error!("Error: {e}");
            error!("Please ensure the camera is connected and not in use by another application.");
            return Ok(());
        }
    };

    info!(
        "Camera {} initialized successfully! (backend: {})",
        camera.index(),
        camera.backend()
    );
    info!("Press 'q' to quit");
    info!("Press 's' to save current frame");
    info!("Press 't' to toggle threshold view");

    // --- 3. Main Processing Loop ---
    let window = HighGuiWindow::open(WINDOW_TITLE)?;
    let detector = SpotDetector::default();
    let config = detector.config();
    info!(
        "Showing '{}': threshold {}, blur {}x{}, minimum spot area {}",
        window.title(),
        config.dark_threshold,
        config.blur_kernel_size,
        config.blur_kernel_size,
        config.min_region_area
    );
    let capture_loop = CaptureLoop::new(camera, window, detector, writer)
        .with_retry_pause(settings.read_retry_pause);
    let summary = capture_loop.run()?;

    info!(
        "Session finished: {} frames processed, {} frames saved",
        summary.frames_processed, summary.saves_requested
    );
    Ok(())
}
