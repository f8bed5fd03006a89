// THEORY:
// The `spot_detector` module holds the individual stages of the dark spot
// pipeline. Each stage is a small, stateless function that takes one image and
// returns a new one, so the stages can be tested and reasoned about in isolation.
// The `SpotDetector` in `pipeline.rs` strings them together.
//
// Stage order:
// 1.  **Grayscale**: luminance-weighted BGR → single channel conversion.
// 2.  **Equalization**: global histogram equalization. The remap depends only on
//     the current frame's histogram, so identical frames give identical output.
// 3.  **Smoothing**: a small Gaussian blur removes single-pixel speckle before the
//     hard threshold is applied.
// 4.  **Binarization**: inverted threshold. Dark pixels become foreground (255).
// 5.  **Region Extraction**: outer contours only, compressed to simple polygons,
//     filtered by a minimum area.
// 6.  **Annotation**: bounding boxes and a count label drawn on a copy of the
//     original color frame.
//
// A frame with no intensity contrast at all (every pixel equal) has nothing to
// equalize against. Equalization would leave it unchanged and a uniformly dark
// frame would then be reported as one giant spot, so such frames short-circuit to
// an empty mask.

use crate::core_modules::region::Region;
use opencv::core::{self, Mat, Point, Scalar, Size, Vector};
use opencv::imgproc;

pub mod spot_detector {
    use super::*;
    use opencv::prelude::*;

    /// BGR green, used for boxes and the count label.
    pub const ANNOTATION_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);
    pub const LABEL_ORIGIN: (i32, i32) = (10, 30);
    pub const LABEL_FONT_SCALE: f64 = 1.0;
    pub const LABEL_THICKNESS: i32 = 2;

    pub fn annotation_color() -> Scalar {
        let (b, g, r) = ANNOTATION_COLOR;
        Scalar::new(b, g, r, 0.0)
    }

    pub fn to_grayscale(frame: &Mat) -> opencv::Result<Mat> {
        let mut gray = Mat::default();
        imgproc::cvt_color(frame, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
        Ok(gray)
    }

    /// Returns `false` when every pixel of the intensity map has the same value.
    pub fn has_contrast(gray: &Mat) -> opencv::Result<bool> {
        let bytes = gray.data_bytes()?;
        Ok(match bytes.first() {
            Some(first) => bytes.iter().any(|b| b != first),
            None => false,
        })
    }

    /// A mask of the same size as `gray` with no foreground pixels.
    pub fn empty_mask(gray: &Mat) -> opencv::Result<Mat> {
        Mat::new_rows_cols_with_default(gray.rows(), gray.cols(), core::CV_8UC1, Scalar::all(0.0))
    }

    pub fn equalize(gray: &Mat) -> opencv::Result<Mat> {
        let mut equalized = Mat::default();
        imgproc::equalize_hist(gray, &mut equalized)?;
        Ok(equalized)
    }

    /// Square Gaussian blur. A sigma of zero lets OpenCV derive it from the kernel size.
    pub fn smooth(gray: &Mat, kernel_size: i32) -> opencv::Result<Mat> {
        let mut blurred = Mat::default();
        imgproc::gaussian_blur(
            gray,
            &mut blurred,
            Size::new(kernel_size, kernel_size),
            0.0,
            0.0,
            core::BORDER_DEFAULT,
        )?;
        Ok(blurred)
    }

    /// Marks every pixel strictly below `threshold` as foreground (255).
    pub fn binarize(gray: &Mat, threshold: u8) -> opencv::Result<Mat> {
        let mut mask = Mat::default();
        // THRESH_BINARY_INV keeps values <= thresh, so shift down by one.
        imgproc::threshold(
            gray,
            &mut mask,
            f64::from(threshold) - 1.0,
            255.0,
            imgproc::THRESH_BINARY_INV,
        )?;
        Ok(mask)
    }

    /// Finds the outer contour of every foreground blob and keeps the ones whose
    /// polygon area is strictly greater than `min_area`.
    pub fn extract_regions(mask: &Mat, min_area: f64) -> opencv::Result<Vec<Region>> {
        let mut contours = Vector::<Vector<Point>>::new();
        imgproc::find_contours(
            mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        let mut regions = Vec::with_capacity(contours.len());
        for contour in contours.iter() {
            let region = Region::from_contour(&contour)?;
            if region.exceeds_area(min_area) {
                regions.push(region);
            }
        }
        Ok(regions)
    }

    /// Draws one box per region plus the `Dark Spots: N` label on a copy of `frame`.
    pub fn annotate(frame: &Mat, regions: &[Region], box_thickness: i32) -> opencv::Result<Mat> {
        let mut output = frame.try_clone()?;
        let color = annotation_color();

        for region in regions {
            imgproc::rectangle_points(
                &mut output,
                region.top_left(),
                region.bottom_right(),
                color,
                box_thickness,
                imgproc::LINE_8,
                0,
            )?;
        }

        let (x, y) = LABEL_ORIGIN;
        imgproc::put_text(
            &mut output,
            &format!("Dark Spots: {}", regions.len()),
            Point::new(x, y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            LABEL_FONT_SCALE,
            color,
            LABEL_THICKNESS,
            imgproc::LINE_8,
            false,
        )?;

        Ok(output)
    }
}
