pub mod image_helper {
    use image::ImageEncoder;
    use image::codecs::jpeg::JpegEncoder;
    use opencv::core::Mat;
    use opencv::imgproc;
    use opencv::prelude::*;
    use std::fs;
    use std::io::{self, BufWriter};
    use std::path::{Path, PathBuf};
    use thiserror::Error;

    pub const FRAME_FILE_PREFIX: &str = "darkspot_frame_";
    pub const FRAME_FILE_EXTENSION: &str = "jpg";

    #[derive(Debug, Error)]
    pub enum SaveError {
        #[error("could not convert frame for encoding: {0}")]
        Convert(#[from] opencv::Error),
        #[error("could not write frame: {0}")]
        Encode(#[from] image::ImageError),
        #[error("could not create frame file: {0}")]
        Io(#[from] io::Error),
    }

    /// Encodes a BGR frame as a JPEG file at `path`.
    pub fn save_jpeg(path: &Path, frame: &Mat) -> Result<(), SaveError> {
        let mut rgb = Mat::default();
        imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let buffer = rgb.data_bytes()?;

        let output = BufWriter::new(fs::File::create(path)?);
        let encoder = JpegEncoder::new(output);
        encoder.write_image(buffer, width, height, image::ExtendedColorType::Rgb8)?;

        Ok(())
    }

    /// Writes annotated frames into one directory as `darkspot_frame_<N>.jpg`.
    ///
    /// The counter belongs to the writer, so it starts at 0 for every session and
    /// advances on every save request, including requests whose write fails.
    pub struct FrameWriter {
        directory: PathBuf,
        next_index: u32,
    }

    impl FrameWriter {
        /// Creates `directory` (and any missing parents) if it does not exist yet.
        pub fn new(directory: impl Into<PathBuf>) -> io::Result<Self> {
            let directory = directory.into();
            fs::create_dir_all(&directory)?;
            Ok(Self {
                directory,
                next_index: 0,
            })
        }

        pub fn directory(&self) -> &Path {
            &self.directory
        }

        pub fn next_path(&self) -> PathBuf {
            self.directory.join(format!(
                "{FRAME_FILE_PREFIX}{}.{FRAME_FILE_EXTENSION}",
                self.next_index
            ))
        }

        /// Number of save requests handled so far.
        pub fn saved_count(&self) -> u32 {
            self.next_index
        }

        pub fn save(&mut self, frame: &Mat) -> (PathBuf, Result<(), SaveError>) {
            let path = self.next_path();
            self.next_index += 1;
            let result = save_jpeg(&path, frame);
            (path, result)
        }
    }
}
