// THEORY:
// A `Region` is the spatial output of the spot detector: one connected blob of
// dark pixels, described by its outer boundary only. Holes inside a blob are
// never represented, so a dark ring and a dark disc produce the same kind of
// region.
//
// Key architectural principles:
// 1.  **Stateless Data Container**: Like `SmartBlob`, a `Region` lives for a single
//     frame. It carries no id and has no memory of earlier frames.
// 2.  **Compressed Boundary**: The contour is stored in its simplified form, where
//     runs of collinear boundary pixels are collapsed to their end points.
// 3.  **Polygon Area**: `area` is the area enclosed by that simplified polygon, not
//     a raw pixel count. For a filled w×h rectangle this is (w-1)·(h-1).

use opencv::core::{Point, Rect, Vector};
use opencv::imgproc;

/// A single dark spot found in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// The axis-aligned box enclosing every contour point.
    pub bounding_box: Rect,
    /// The area enclosed by the simplified contour polygon.
    pub area: f64,
    /// The outer contour with collinear points removed.
    pub contour: Vec<Point>,
}

impl Region {
    pub fn from_contour(contour: &Vector<Point>) -> opencv::Result<Self> {
        Ok(Self {
            bounding_box: imgproc::bounding_rect(contour)?,
            area: imgproc::contour_area(contour, false)?,
            contour: contour.to_vec(),
        })
    }

    /// Top-left corner of the bounding box.
    pub fn top_left(&self) -> Point {
        self.bounding_box.tl()
    }

    /// The corner at `(x + width, y + height)`, one past the last covered pixel.
    pub fn bottom_right(&self) -> Point {
        self.bounding_box.br()
    }

    /// Whether this region survives a noise floor. The floor itself is rejected.
    pub fn exceeds_area(&self, floor: f64) -> bool {
        self.area > floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_contour(x: i32, y: i32, side: i32) -> Vector<Point> {
        Vector::from_iter([
            Point::new(x, y),
            Point::new(x, y + side),
            Point::new(x + side, y + side),
            Point::new(x + side, y),
        ])
    }

    #[test]
    fn region_from_square_contour() {
        let region = Region::from_contour(&square_contour(5, 7, 10)).unwrap();

        assert_eq!(region.bounding_box, Rect::new(5, 7, 11, 11));
        assert_eq!(region.area, 100.0);
        assert_eq!(region.contour.len(), 4);
        assert_eq!(region.top_left(), Point::new(5, 7));
        assert_eq!(region.bottom_right(), Point::new(16, 18));
    }

    #[test]
    fn area_floor_is_exclusive() {
        let region = Region::from_contour(&square_contour(0, 0, 10)).unwrap();

        assert!(!region.exceeds_area(100.0));
        assert!(region.exceeds_area(99.0));
    }
}
