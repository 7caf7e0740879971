//! Coordinate handling for the global patch grid
//!
//! This module provides the geographic primitives used to place patches
//! on the global grid: points, extents, pixel-to-map transforms and the
//! grid indexer itself.

mod bbox;
mod point;
mod transform;
mod grid;

// Re-export key types
pub use self::bbox::BoundingBox;
pub use self::point::Point;
pub use self::transform::GeoTransform;
pub use self::grid::{GridCell, GridIndexer};
