//! Geographic extent of a grid cell

use super::point::Point;

/// Lon/lat rectangle, west/south edges first
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        BoundingBox { west, south, east, north }
    }

    /// Extent in degrees of longitude
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Extent in degrees of latitude
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Edges count as inside
    pub fn contains(&self, point: &Point) -> bool {
        (self.west..=self.east).contains(&point.lon()) && (self.south..=self.north).contains(&point.lat())
    }
}
