use opencv::core::Mat;
use opencv::highgui;

pub const WINDOW_TITLE: &str = "Real-time Dark Spot Detection";

/// Where rendered frames go and where key presses come from.
pub trait DisplaySurface {
    fn show(&mut self, frame: &Mat) -> opencv::Result<()>;

    /// Waits up to `delay_ms` for a key. Returns -1 when nothing was pressed.
    fn poll_key(&mut self, delay_ms: i32) -> opencv::Result<i32>;

    fn close(&mut self) -> opencv::Result<()>;
}

/// A single OpenCV HighGUI window.
pub struct HighGuiWindow {
    title: String,
}

impl HighGuiWindow {
    pub fn open(title: &str) -> opencv::Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self {
            title: title.to_string(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl DisplaySurface for HighGuiWindow {
    fn show(&mut self, frame: &Mat) -> opencv::Result<()> {
        highgui::imshow(&self.title, frame)
    }

    fn poll_key(&mut self, delay_ms: i32) -> opencv::Result<i32> {
        highgui::wait_key(delay_ms)
    }

    fn close(&mut self) -> opencv::Result<()> {
        highgui::destroy_all_windows()
    }
}
