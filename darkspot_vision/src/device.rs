// THEORY:
// The `device` module is the acquisition layer. It turns an integer camera index
// into a handle that is known to deliver frames.
//
// Opening a camera is a two-phase operation:
// 1.  **Open**: ask the capture backend for the device. A refusal here is final.
// 2.  **Validate**: some backends report a successful open before the hardware
//     stream is live, so a handful of throwaway reads are made with a short pause
//     between them. Only a handle that produced at least one frame is returned.
//
// The rest of the crate never talks to `VideoCapture` directly. It sees the
// `FrameSource` trait, which is also what the tests mock.

use log::{debug, info, warn};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use std::fmt;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// A native capture API understood by OpenCV's `videoio`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureBackend {
    /// The preferred backend for the platform this binary was built for.
    #[default]
    Auto,
    V4l2,
    AvFoundation,
    DirectShow,
    MediaFoundation,
    GStreamer,
    /// Let OpenCV pick whatever it finds first.
    Any,
}

impl CaptureBackend {
    pub fn platform_default() -> Self {
        if cfg!(target_os = "linux") {
            CaptureBackend::V4l2
        } else if cfg!(target_os = "macos") {
            CaptureBackend::AvFoundation
        } else if cfg!(target_os = "windows") {
            CaptureBackend::MediaFoundation
        } else {
            CaptureBackend::Any
        }
    }

    /// Replaces `Auto` with the platform default. Every other value is kept.
    pub fn resolve(self) -> Self {
        match self {
            CaptureBackend::Auto => Self::platform_default(),
            other => other,
        }
    }

    /// The `videoio::CAP_*` constant passed to `VideoCapture::new`.
    pub fn api_preference(self) -> i32 {
        match self.resolve() {
            CaptureBackend::V4l2 => videoio::CAP_V4L2,
            CaptureBackend::AvFoundation => videoio::CAP_AVFOUNDATION,
            CaptureBackend::DirectShow => videoio::CAP_DSHOW,
            CaptureBackend::MediaFoundation => videoio::CAP_MSMF,
            CaptureBackend::GStreamer => videoio::CAP_GSTREAMER,
            CaptureBackend::Any | CaptureBackend::Auto => videoio::CAP_ANY,
        }
    }
}

impl fmt::Display for CaptureBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureBackend::Auto => "auto",
            CaptureBackend::V4l2 => "v4l2",
            CaptureBackend::AvFoundation => "avfoundation",
            CaptureBackend::DirectShow => "dshow",
            CaptureBackend::MediaFoundation => "msmf",
            CaptureBackend::GStreamer => "gstreamer",
            CaptureBackend::Any => "any",
        };
        f.write_str(name)
    }
}

/// Requested capture format and the timing of the acquisition retries.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub frame_width: f64,
    pub frame_height: f64,
    pub fps: f64,
    /// Number of reads made to confirm the device is live.
    pub validation_attempts: u32,
    /// Pause after each failed validation read.
    pub validation_pause: Duration,
    /// Pause after a failed read inside the capture loop.
    pub read_retry_pause: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            frame_width: 640.0,
            frame_height: 480.0,
            fps: 30.0,
            validation_attempts: 5,
            validation_pause: Duration::from_millis(200),
            read_retry_pause: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("could not open camera {index} with backend {backend}")]
    Open {
        index: i32,
        backend: CaptureBackend,
        #[source]
        source: Option<opencv::Error>,
    },
    #[error("camera {index} opened but delivered no frame after {attempts} attempts")]
    NotReady { index: i32, attempts: u32 },
}

/// Anything that can hand out color frames one at a time.
pub trait FrameSource {
    /// Reads the next frame. `Ok(None)` means the device answered but had no data.
    fn read_frame(&mut self) -> opencv::Result<Option<Mat>>;

    /// Applies the requested format. Hints are best-effort and never fail.
    fn apply_hints(&mut self, _settings: &CaptureSettings) {}

    fn release(&mut self) -> opencv::Result<()>;
}

/// A live camera opened through OpenCV.
pub struct CameraDevice {
    capture: VideoCapture,
    index: i32,
    backend: CaptureBackend,
}

impl CameraDevice {
    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn backend(&self) -> CaptureBackend {
        self.backend
    }
}

impl FrameSource for CameraDevice {
    fn read_frame(&mut self) -> opencv::Result<Option<Mat>> {
        let mut frame = Mat::default();
        if self.capture.read(&mut frame)? && !frame.empty() {
            Ok(Some(frame))
        } else {
            Ok(None)
        }
    }

    fn apply_hints(&mut self, settings: &CaptureSettings) {
        let hints = [
            ("frame width", videoio::CAP_PROP_FRAME_WIDTH, settings.frame_width),
            ("frame height", videoio::CAP_PROP_FRAME_HEIGHT, settings.frame_height),
            ("fps", videoio::CAP_PROP_FPS, settings.fps),
        ];
        for (name, property, value) in hints {
            match self.capture.set(property, value) {
                Ok(true) => {}
                Ok(false) => debug!("Camera {} ignored {name} hint {value}", self.index),
                Err(e) => debug!("Camera {} rejected {name} hint {value}: {e}", self.index),
            }
        }
    }

    fn release(&mut self) -> opencv::Result<()> {
        self.capture.release()
    }
}

/// Opens camera `index` through `backend` and waits until it delivers a frame.
pub fn open_device(
    index: i32,
    backend: CaptureBackend,
    settings: &CaptureSettings,
) -> Result<CameraDevice, DeviceError> {
    let backend = backend.resolve();
    info!("Attempting to open camera with index: {index} (backend: {backend})");

    let open_error = |source| DeviceError::Open {
        index,
        backend,
        source,
    };
    let capture = VideoCapture::new(index, backend.api_preference()).map_err(|e| open_error(Some(e)))?;
    if !capture.is_opened().map_err(|e| open_error(Some(e)))? {
        return Err(open_error(None));
    }

    let device = CameraDevice {
        capture,
        index,
        backend,
    };
    initialize_source(device, index, settings)
}

/// Applies the capture hints to an already open source, then validates it.
pub fn initialize_source<S: FrameSource>(
    mut source: S,
    index: i32,
    settings: &CaptureSettings,
) -> Result<S, DeviceError> {
    source.apply_hints(settings);
    validate_source(source, index, settings)
}

/// Makes up to `validation_attempts` reads. Releases the source before
/// reporting `NotReady`.
pub fn validate_source<S: FrameSource>(
    mut source: S,
    index: i32,
    settings: &CaptureSettings,
) -> Result<S, DeviceError> {
    let attempts = settings.validation_attempts;
    for attempt in 1..=attempts {
        match source.read_frame() {
            Ok(Some(_)) => {
                info!("Camera {index} test successful!");
                return Ok(source);
            }
            Ok(None) => {}
            Err(e) => debug!("Camera {index} validation read failed: {e}"),
        }
        info!("Camera {index} test attempt {attempt}/{attempts}...");
        thread::sleep(settings.validation_pause);
    }

    warn!("Camera {index} opened but cannot read frames");
    if let Err(e) = source.release() {
        warn!("Failed to release camera {index}: {e}");
    }
    Err(DeviceError::NotReady { index, attempts })
}
