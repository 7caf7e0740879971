//! Pixel to geographic affine transforms

use super::point::Point;
use crate::errors::{FexError, FexResult};

/// Affine transform from pixel to map coordinates
///
/// Coefficients follow the usual six-value geotransform layout:
/// `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`,
/// where `pixel_height` is typically negative for north-up images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    coefficients: [f64; 6],
}

impl GeoTransform {
    /// Create a transform from six geotransform coefficients
    pub fn new(coefficients: [f64; 6]) -> Self {
        GeoTransform { coefficients }
    }

    /// North-up transform with the given origin and pixel size
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GeoTransform::new([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height.abs()])
    }

    /// Identity transform (pixel coordinates are map coordinates)
    pub fn identity() -> Self {
        GeoTransform::new([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    /// Raw coefficients
    pub fn coefficients(&self) -> &[f64; 6] {
        &self.coefficients
    }

    /// Transform a pixel position to map coordinates
    pub fn pixel_to_geo(&self, px: f64, py: f64) -> Point {
        let [ox, a, b, oy, c, d] = self.coefficients;
        Point::new(ox + px * a + py * b, oy + px * c + py * d)
    }

    /// Transform a map position back to pixel coordinates
    pub fn geo_to_pixel(&self, point: &Point) -> FexResult<Point> {
        let [ox, a, b, oy, c, d] = self.coefficients;
        let det = a * d - b * c;
        if det == 0.0 || !det.is_finite() {
            return Err(FexError::Configuration(
                "Geotransform is not invertible".to_string()));
        }
        let dx = point.x - ox;
        let dy = point.y - oy;
        Ok(Point::new((d * dx - b * dy) / det, (a * dy - c * dx) / det))
    }
}
