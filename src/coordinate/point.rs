//! Positions in map or pixel space

/// A position; `x`/`y` are lon/lat when geographic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// Longitude in degrees
    pub fn lon(&self) -> f64 {
        self.x
    }

    /// Latitude in degrees
    pub fn lat(&self) -> f64 {
        self.y
    }
}
