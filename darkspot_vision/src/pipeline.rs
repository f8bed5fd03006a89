// THEORY:
// The `pipeline` module is the top-level API of the frame analyzer. It wraps the
// individual stages from `spot_detector` into a single call that takes one color
// frame and returns everything a caller needs to render it: the annotated frame,
// the binary mask, and the detected regions.
//
// Unlike a tracking pipeline there is no memory here. `SpotDetector` holds only
// its configuration, `analyze` takes `&self`, and two calls on the same frame
// produce the same result.

use crate::core_modules::region::Region;
use crate::core_modules::spot_detector::spot_detector;
use opencv::core::Mat;

pub const DEFAULT_BLUR_KERNEL_SIZE: i32 = 3;
pub const DEFAULT_DARK_THRESHOLD: u8 = 45;
pub const DEFAULT_MIN_REGION_AREA: f64 = 100.0;
pub const DEFAULT_BOX_THICKNESS: i32 = 2;

/// Fixed constants of the detection pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Side length of the square Gaussian kernel. Must be odd.
    pub blur_kernel_size: i32,
    /// Pixels with an equalized, blurred intensity strictly below this are dark.
    pub dark_threshold: u8,
    /// Regions whose polygon area is at or below this floor are treated as speckle.
    pub min_region_area: f64,
    /// Line thickness of the bounding boxes, in pixels.
    pub box_thickness: i32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            blur_kernel_size: DEFAULT_BLUR_KERNEL_SIZE,
            dark_threshold: DEFAULT_DARK_THRESHOLD,
            min_region_area: DEFAULT_MIN_REGION_AREA,
            box_thickness: DEFAULT_BOX_THICKNESS,
        }
    }
}

/// The output of the analyzer for a single frame.
pub struct DetectionResult {
    /// A copy of the input with boxes and the count label drawn on it.
    pub annotated: Mat,
    /// The thresholded mask, 255 where a pixel is a dark-spot candidate.
    pub mask: Mat,
    /// Every region that survived the area filter.
    pub regions: Vec<Region>,
    /// Number of surviving regions. Always equal to `regions.len()`.
    pub spot_count: usize,
}

/// Stateless dark spot analyzer.
#[derive(Debug, Clone, Default)]
pub struct SpotDetector {
    config: AnalyzerConfig,
}

impl SpotDetector {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn analyze(&self, frame: &Mat) -> opencv::Result<DetectionResult> {
        // Stage 1: Intensity map -> binary mask
        let mask = self.build_mask(frame)?;

        // Stage 2: Spatial grouping
        let regions = self.find_regions(&mask)?;

        // Stage 3: Annotation
        let annotated = spot_detector::annotate(frame, &regions, self.config.box_thickness)?;

        let spot_count = regions.len();
        Ok(DetectionResult {
            annotated,
            mask,
            regions,
            spot_count,
        })
    }

    /// Grayscale, equalize, blur and threshold one color frame.
    pub fn build_mask(&self, frame: &Mat) -> opencv::Result<Mat> {
        let gray = spot_detector::to_grayscale(frame)?;
        if !spot_detector::has_contrast(&gray)? {
            return spot_detector::empty_mask(&gray);
        }

        let equalized = spot_detector::equalize(&gray)?;
        let blurred = spot_detector::smooth(&equalized, self.config.blur_kernel_size)?;
        spot_detector::binarize(&blurred, self.config.dark_threshold)
    }

    pub fn find_regions(&self, mask: &Mat) -> opencv::Result<Vec<Region>> {
        spot_detector::extract_regions(mask, self.config.min_region_area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{self, Point, Rect, Scalar, Vector};
    use opencv::imgproc;
    use opencv::prelude::*;

    const WIDTH: i32 = 640;
    const HEIGHT: i32 = 480;
    const BLUR_TOLERANCE: i32 = 3;
    /// Rows covered by the `Dark Spots: N` label.
    const LABEL_BAND: i32 = 50;

    fn solid_frame(value: f64) -> Mat {
        Mat::new_rows_cols_with_default(HEIGHT, WIDTH, core::CV_8UC3, Scalar::all(value)).unwrap()
    }

    fn bright_frame_with(dark_rects: &[Rect]) -> Mat {
        let mut frame = solid_frame(220.0);
        for rect in dark_rects {
            imgproc::rectangle(&mut frame, *rect, Scalar::all(10.0), imgproc::FILLED, imgproc::LINE_8, 0).unwrap();
        }
        frame
    }

    fn close_to(actual: Rect, expected: Rect) -> bool {
        (actual.x - expected.x).abs() <= BLUR_TOLERANCE
            && (actual.y - expected.y).abs() <= BLUR_TOLERANCE
            && (actual.width - expected.width).abs() <= 2 * BLUR_TOLERANCE
            && (actual.height - expected.height).abs() <= 2 * BLUR_TOLERANCE
    }

    fn pixel(frame: &Mat, x: i32, y: i32) -> [u8; 3] {
        frame.at_2d::<core::Vec3b>(y, x).unwrap().0
    }

    #[test]
    fn default_config_matches_fixed_constants() {
        let config = AnalyzerConfig::default();

        assert_eq!(config.blur_kernel_size, 3);
        assert_eq!(config.dark_threshold, 45);
        assert_eq!(config.min_region_area, 100.0);
        assert_eq!(config.box_thickness, 2);
    }

    #[test]
    fn detector_keeps_its_config() {
        let config = AnalyzerConfig {
            dark_threshold: 60,
            min_region_area: 250.0,
            ..AnalyzerConfig::default()
        };
        let detector = SpotDetector::new(config.clone());

        assert_eq!(detector.config(), &config);
        assert_eq!(SpotDetector::default().config(), &AnalyzerConfig::default());
    }

    #[test]
    fn all_black_frame_has_no_spots() {
        let result = SpotDetector::default().analyze(&solid_frame(0.0)).unwrap();

        assert_eq!(result.spot_count, 0);
        assert_eq!(core::count_non_zero(&result.mask).unwrap(), 0);
    }

    #[test]
    fn all_white_frame_has_no_spots() {
        let result = SpotDetector::default().analyze(&solid_frame(255.0)).unwrap();

        assert_eq!(result.spot_count, 0);
        assert!(result.regions.is_empty());
    }

    #[test]
    fn single_dark_rectangle_is_one_spot() {
        let rect = Rect::new(200, 150, 60, 40);
        let result = SpotDetector::default().analyze(&bright_frame_with(&[rect])).unwrap();

        assert_eq!(result.spot_count, 1);
        let found = result.regions[0].bounding_box;
        assert!(close_to(found, rect), "found {found:?}, expected about {rect:?}");
    }

    #[test]
    fn small_dark_shape_is_filtered_out() {
        let result = SpotDetector::default()
            .analyze(&bright_frame_with(&[Rect::new(300, 200, 8, 8)]))
            .unwrap();

        assert_eq!(result.spot_count, 0);
        // The speckle is still in the mask; only the area floor removed it.
        assert!(core::count_non_zero(&result.mask).unwrap() > 0);
    }

    #[test]
    fn separate_rectangles_are_counted_separately() {
        let rects = [Rect::new(40, 60, 50, 50), Rect::new(400, 300, 80, 30)];
        let result = SpotDetector::default().analyze(&bright_frame_with(&rects)).unwrap();

        assert_eq!(result.spot_count, 2);
        assert_eq!(result.regions.len(), result.spot_count);
        for rect in rects {
            assert!(result.regions.iter().any(|r| close_to(r.bounding_box, rect)));
        }
    }

    #[test]
    fn dark_ring_is_a_single_spot() {
        let mut frame = bright_frame_with(&[Rect::new(100, 100, 100, 100)]);
        imgproc::rectangle(
            &mut frame,
            Rect::new(130, 130, 40, 40),
            Scalar::all(220.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();

        let result = SpotDetector::default().analyze(&frame).unwrap();

        assert_eq!(result.spot_count, 1);
    }

    #[test]
    fn analysis_is_repeatable() {
        let frame = bright_frame_with(&[Rect::new(10, 300, 70, 70), Rect::new(500, 50, 30, 90)]);
        let detector = SpotDetector::default();

        let first = detector.analyze(&frame).unwrap();
        let second = detector.analyze(&frame).unwrap();

        assert_eq!(first.spot_count, second.spot_count);
        assert_eq!(first.regions, second.regions);
    }

    #[test]
    fn every_region_gets_a_box_on_the_annotated_frame() {
        let rects = [Rect::new(60, 200, 40, 40), Rect::new(450, 250, 60, 60)];
        let frame = bright_frame_with(&rects);
        let result = SpotDetector::default().analyze(&frame).unwrap();

        assert_eq!(result.spot_count, 2);
        for region in &result.regions {
            let tl = region.top_left();
            assert_eq!(pixel(&result.annotated, tl.x, tl.y), [0, 255, 0]);
        }
        // The input frame itself is untouched.
        let tl = result.regions[0].top_left();
        assert_ne!(pixel(&frame, tl.x, tl.y), [0, 255, 0]);
    }

    /// Marks pure annotation-green pixels below the label band.
    fn box_outline_mask(annotated: &Mat) -> Mat {
        let mut mask = Mat::new_rows_cols_with_default(HEIGHT, WIDTH, core::CV_8UC1, Scalar::all(0.0)).unwrap();
        for y in LABEL_BAND..HEIGHT {
            for x in 0..WIDTH {
                if pixel(annotated, x, y) == [0, 255, 0] {
                    *mask.at_2d_mut::<u8>(y, x).unwrap() = 255;
                }
            }
        }
        mask
    }

    #[test]
    fn drawn_box_count_matches_spot_count() {
        let rects = [
            Rect::new(60, 100, 40, 40),
            Rect::new(300, 200, 70, 50),
            Rect::new(500, 350, 45, 80),
            // Below the area floor, so it must not get a box.
            Rect::new(200, 400, 8, 8),
        ];
        let result = SpotDetector::default().analyze(&bright_frame_with(&rects)).unwrap();

        let mut outlines = Vector::<Vector<Point>>::new();
        imgproc::find_contours(
            &box_outline_mask(&result.annotated),
            &mut outlines,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )
        .unwrap();

        assert_eq!(result.spot_count, 3);
        assert_eq!(outlines.len(), result.spot_count);
    }

    #[test]
    fn uniform_frame_only_carries_the_label() {
        let frame = solid_frame(128.0);
        let result = SpotDetector::default().analyze(&frame).unwrap();

        let mut diff = Mat::default();
        core::absdiff(&frame, &result.annotated, &mut diff).unwrap();
        let mut diff_gray = Mat::default();
        imgproc::cvt_color(&diff, &mut diff_gray, imgproc::COLOR_BGR2GRAY, 0).unwrap();

        let bytes = diff_gray.data_bytes().unwrap();
        let label_band = (LABEL_BAND * WIDTH) as usize;
        assert!(bytes[..label_band].iter().any(|b| *b != 0));
        assert!(bytes[label_band..].iter().all(|b| *b == 0));
    }

    #[test]
    fn analyzer_follows_the_frame_size() {
        let mut frame = Mat::new_rows_cols_with_default(240, 320, core::CV_8UC3, Scalar::all(230.0)).unwrap();
        imgproc::rectangle(&mut frame, Rect::new(100, 100, 30, 30), Scalar::all(5.0), imgproc::FILLED, imgproc::LINE_8, 0)
            .unwrap();

        let result = SpotDetector::default().analyze(&frame).unwrap();

        assert_eq!(result.mask.rows(), 240);
        assert_eq!(result.mask.cols(), 320);
        assert_eq!(result.spot_count, 1);
    }
}
