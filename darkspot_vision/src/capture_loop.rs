// THEORY:
// The `capture_loop` is the interactive shell around the analyzer. It owns the
// frame source and the display for as long as the session runs, and it is the
// only place with mutable session state: the view mode, the stop flag, and (via
// the `FrameWriter`) the save counter.
//
// One iteration is strictly sequential: read, analyze, render, poll a key. A
// failed read is not an error, only a reason to wait briefly and try again. The
// loop ends only when the user asks it to, or when OpenCV itself fails.

use crate::core_modules::utils::image_helper::image_helper::FrameWriter;
use crate::device::{CaptureSettings, FrameSource};
use crate::display::DisplaySurface;
use crate::pipeline::{DetectionResult, SpotDetector};
use log::{info, warn};
use opencv::core::{Mat, Point, Scalar};
use opencv::imgproc;
use opencv::prelude::*;
use std::thread;
use std::time::Duration;

pub const KEY_POLL_DELAY_MS: i32 = 1;
pub const CAPTION_ORIGIN: (i32, i32) = (10, 450);
pub const CAPTION_FONT_SCALE: f64 = 0.6;

/// Which image is put on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// The annotated color frame.
    #[default]
    Normal,
    /// The binary mask.
    Threshold,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Normal => ViewMode::Threshold,
            ViewMode::Threshold => ViewMode::Normal,
        }
    }

    pub fn caption(self) -> &'static str {
        match self {
            ViewMode::Normal => "Normal View - Press T for threshold",
            ViewMode::Threshold => "Threshold View - Press T to toggle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Save,
    ToggleView,
}

impl Command {
    /// Maps a raw key code to a command. Only lowercase `q`, `s`, `t` are recognized.
    pub fn from_key(key: i32) -> Option<Self> {
        match (key & 0xFF) as u8 {
            b'q' => Some(Command::Quit),
            b's' => Some(Command::Save),
            b't' => Some(Command::ToggleView),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// What a finished session looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub final_mode: ViewMode,
    pub frames_processed: u64,
    pub saves_requested: u32,
}

pub struct CaptureLoop<S: FrameSource, D: DisplaySurface> {
    source: S,
    display: D,
    detector: SpotDetector,
    writer: FrameWriter,
    mode: ViewMode,
    state: LoopState,
    frames_processed: u64,
    retry_pause: Duration,
}

impl<S: FrameSource, D: DisplaySurface> CaptureLoop<S, D> {
    pub fn new(source: S, display: D, detector: SpotDetector, writer: FrameWriter) -> Self {
        Self {
            source,
            display,
            detector,
            writer,
            mode: ViewMode::default(),
            state: LoopState::Running,
            frames_processed: 0,
            retry_pause: CaptureSettings::default().read_retry_pause,
        }
    }

    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn view_mode(&self) -> ViewMode {
        self.mode
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs until the quit command, then releases the source and closes the display.
    /// Both are released even when an iteration fails.
    pub fn run(mut self) -> opencv::Result<SessionSummary> {
        let outcome = self.drive();
        let released = self.source.release();
        let closed = self.display.close();

        outcome?;
        released?;
        closed?;
        info!("Camera released and windows closed");
        Ok(self.summary())
    }

    fn drive(&mut self) -> opencv::Result<()> {
        while self.state == LoopState::Running {
            self.step()?;
        }
        Ok(())
    }

    /// One read → analyze → render → key poll iteration.
    pub fn step(&mut self) -> opencv::Result<LoopState> {
        let frame = match self.source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                warn!("Failed to capture frame, retrying...");
                thread::sleep(self.retry_pause);
                return Ok(self.state);
            }
            Err(e) => {
                warn!("Failed to capture frame ({e}), retrying...");
                thread::sleep(self.retry_pause);
                return Ok(self.state);
            }
        };

        let detection = self.detector.analyze(&frame)?;
        self.frames_processed += 1;

        let display_frame = self.render(&detection)?;
        self.display.show(&display_frame)?;

        let key = self.display.poll_key(KEY_POLL_DELAY_MS)?;
        if let Some(command) = Command::from_key(key) {
            self.handle_command(command, &detection.annotated);
        }
        Ok(self.state)
    }

    pub fn handle_command(&mut self, command: Command, annotated: &Mat) {
        match command {
            Command::Quit => {
                info!("Quitting...");
                self.state = LoopState::Stopped;
            }
            Command::Save => {
                let (path, result) = self.writer.save(annotated);
                match result {
                    Ok(()) => info!("Frame saved as {}", path.display()),
                    Err(e) => warn!("Failed to save frame as {}: {e}", path.display()),
                }
            }
            Command::ToggleView => {
                self.mode = self.mode.toggled();
                let flag = match self.mode {
                    ViewMode::Threshold => "ON",
                    ViewMode::Normal => "OFF",
                };
                info!("Threshold view: {flag}");
            }
        }
    }

    /// Builds the on-screen image for the current mode. The annotated frame in
    /// `detection` is left without the caption.
    fn render(&self, detection: &DetectionResult) -> opencv::Result<Mat> {
        let mut display_frame = match self.mode {
            ViewMode::Threshold => {
                let mut bgr = Mat::default();
                imgproc::cvt_color(&detection.mask, &mut bgr, imgproc::COLOR_GRAY2BGR, 0)?;
                bgr
            }
            ViewMode::Normal => detection.annotated.try_clone()?,
        };

        let (x, y) = CAPTION_ORIGIN;
        imgproc::put_text(
            &mut display_frame,
            self.mode.caption(),
            Point::new(x, y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            CAPTION_FONT_SCALE,
            Scalar::all(255.0),
            1,
            imgproc::LINE_8,
            false,
        )?;
        Ok(display_frame)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            final_mode: self.mode,
            frames_processed: self.frames_processed,
            saves_requested: self.writer.saved_count(),
        }
    }
}
