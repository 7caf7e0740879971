//! Global patch grid in equirectangular projection
//!
//! The grid covers the whole globe with square cells of a fixed size in
//! degrees. Its origin is the north-west corner (-180°, +90°); cell column
//! indices grow eastward and row indices grow southward.

use std::fmt;

use log::debug;

use super::bbox::BoundingBox;
use super::point::Point;
use super::transform::GeoTransform;
use crate::errors::{FexError, FexResult};
use crate::extractor::Region;

const EASTING: f64 = -180.0;
const NORTHING: f64 = 90.0;

/// Integer indices of one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    /// Column index, counted eastward from -180°
    pub x: u32,
    /// Row index, counted southward from +90°
    pub y: u32,
}

impl GridCell {
    pub fn new(x: u32, y: u32) -> Self {
        GridCell { x, y }
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}y{}", self.x, self.y)
    }
}

/// Maps geographic positions to grid cells and back
///
/// Pure coordinate math, no I/O. Construction fails fast on a degenerate
/// cell size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridIndexer {
    /// Resolution of one image pixel in degrees
    resolution: f64,
    /// Edge length of a cell in degrees
    cell_size: f64,
    columns: u32,
    rows: u32,
}

impl GridIndexer {
    /// Create a grid from a pixel resolution and a patch size in pixels
    ///
    /// # Arguments
    /// * `resolution` - Size of one pixel in degrees
    /// * `patch_size` - Number of pixels along one cell edge
    ///
    /// # Returns
    /// The grid, or a configuration error if the resulting cell size is not positive
    pub fn new(resolution: f64, patch_size: f64) -> FexResult<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(FexError::Configuration(
                format!("Grid resolution must be positive, got {}", resolution)));
        }
        if !(patch_size.is_finite() && patch_size > 0.0) {
            return Err(FexError::Configuration(
                format!("Grid patch size must be positive, got {}", patch_size)));
        }
        Self::build(resolution, resolution * patch_size)
    }

    /// Create a grid directly from a cell size in degrees
    pub fn with_cell_size(cell_size_deg: f64) -> FexResult<Self> {
        Self::build(cell_size_deg, cell_size_deg)
    }

    fn build(resolution: f64, cell_size: f64) -> FexResult<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(FexError::Configuration(
                format!("Grid cell size must be positive, got {} degrees", cell_size)));
        }

        let columns = (360.0 / cell_size).ceil().max(1.0) as u32;
        let rows = (180.0 / cell_size).ceil().max(1.0) as u32;
        debug!("Grid with {}° cells: {} columns x {} rows", cell_size, columns, rows);

        Ok(GridIndexer { resolution, cell_size, columns, rows })
    }

    /// Cell edge length in degrees
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Pixel resolution in degrees
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Number of cell columns around the globe
    pub fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of cell rows from pole to pole
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Column index for a longitude
    ///
    /// The longitude is first normalized into [-180, 180), so both -180° and
    /// +180° map to column 0.
    pub fn cell_x(&self, lon: f64) -> u32 {
        let lon = (lon - EASTING).rem_euclid(360.0) + EASTING;
        let x = ((lon - EASTING) / self.cell_size).floor() as i64;
        x.rem_euclid(self.columns as i64) as u32
    }

    /// Row index for a latitude, clamped so the poles map to the extreme rows
    pub fn cell_y(&self, lat: f64) -> u32 {
        let y = ((NORTHING - lat) / self.cell_size).floor() as i64;
        y.clamp(0, self.rows as i64 - 1) as u32
    }

    /// Cell containing a geographic position
    pub fn cell_for(&self, lon: f64, lat: f64) -> GridCell {
        GridCell::new(self.cell_x(lon), self.cell_y(lat))
    }

    /// North-west corner of a cell as (lon, lat)
    pub fn cell_origin(&self, cell_x: u32, cell_y: u32) -> Point {
        Point::new(
            EASTING + cell_x as f64 * self.cell_size,
            NORTHING - cell_y as f64 * self.cell_size,
        )
    }

    /// Geographic extent of a cell
    pub fn cell_bounds(&self, cell: GridCell) -> BoundingBox {
        let origin = self.cell_origin(cell.x, cell.y);
        BoundingBox::new(
            origin.x,
            origin.y - self.cell_size,
            origin.x + self.cell_size,
            origin.y,
        )
    }

    /// Transform from global grid image pixels to map coordinates
    pub fn image_to_map_transform(&self) -> GeoTransform {
        GeoTransform::north_up(EASTING, NORTHING, self.resolution, self.resolution)
    }

    /// Grid cell of a pixel rectangle
    ///
    /// The centre of the rectangle is transformed to geographic coordinates and
    /// the single cell containing it is returned. A rectangle straddling a cell
    /// boundary is not split; callers that need full coverage tile explicitly.
    pub fn cell_for_region(&self, region: &Region, transform: &GeoTransform) -> GridCell {
        let cx = region.x as f64 + region.width as f64 / 2.0;
        let cy = region.y as f64 + region.height as f64 / 2.0;
        let center = transform.pixel_to_geo(cx, cy);
        self.cell_for(center.lon(), center.lat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_degree_grid() -> GridIndexer {
        GridIndexer::new(0.01, 200.0).unwrap()
    }

    #[test]
    fn cell_x_boundaries() {
        let grid = two_degree_grid();
        assert_eq!(grid.cell_x(-180.0), 0);
        assert_eq!(grid.cell_x(-179.0), 0);
        assert_eq!(grid.cell_x(-178.0), 1);
        assert_eq!(grid.cell_x(178.0), 179);
        assert_eq!(grid.cell_x(180.0), 0);
    }

    #[test]
    fn cell_y_boundaries() {
        let grid = two_degree_grid();
        assert_eq!(grid.cell_y(90.0), 0);
        assert_eq!(grid.cell_y(89.0), 0);
        assert_eq!(grid.cell_y(88.0), 1);
        assert_eq!(grid.cell_y(-88.0), 89);
        assert_eq!(grid.cell_y(-90.0), 89);
    }

    #[test]
    fn one_degree_grid_dimensions() {
        let grid = GridIndexer::with_cell_size(1.0).unwrap();
        assert_eq!(grid.columns(), 360);
        assert_eq!(grid.rows(), 180);
        assert_eq!(grid.cell_x(-180.0), 0);
        assert_eq!(grid.cell_x(178.0), 358);
        assert_eq!(grid.cell_x(179.999), 359);
        assert_eq!(grid.cell_y(90.0), 0);
        assert_eq!(grid.cell_y(-88.0), 178);
        assert_eq!(grid.cell_y(-90.0), 179);
    }

    #[test]
    fn longitudes_outside_range_are_normalized() {
        let grid = GridIndexer::with_cell_size(1.0).unwrap();
        assert_eq!(grid.cell_x(181.5), grid.cell_x(-178.5));
        assert_eq!(grid.cell_x(-540.0), 0);
    }

    #[test]
    fn degenerate_cell_size_fails_fast() {
        assert!(GridIndexer::with_cell_size(0.0).is_err());
        assert!(GridIndexer::with_cell_size(-2.0).is_err());
        assert!(GridIndexer::with_cell_size(f64::NAN).is_err());
        assert!(GridIndexer::new(0.0, 200.0).is_err());
        assert!(GridIndexer::new(0.01, 0.0).is_err());
    }

    #[test]
    fn origin_round_trip_stays_within_one_cell() {
        for &size in &[0.5, 1.0, 2.0, 7.0] {
            let grid = GridIndexer::with_cell_size(size).unwrap();
            let mut lon = -180.0;
            while lon < 180.0 {
                let mut lat = -90.0;
                while lat <= 90.0 {
                    let origin = grid.cell_origin(grid.cell_x(lon), grid.cell_y(lat));
                    assert!((origin.lon() - lon).abs() <= size, "lon {} size {}", lon, size);
                    assert!((origin.lat() - lat).abs() <= size, "lat {} size {}", lat, size);
                    lat += 3.7;
                }
                lon += 4.3;
            }
        }
    }

    #[test]
    fn cell_bounds_contain_position() {
        let grid = two_degree_grid();
        let cell = grid.cell_for(13.4, 52.5);
        let bounds = grid.cell_bounds(cell);
        assert!(bounds.contains(&Point::new(13.4, 52.5)));
        assert!((bounds.width() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn region_maps_by_its_center() {
        let grid = two_degree_grid();
        let identity = GeoTransform::identity();

        let shifted = GeoTransform::new([0.0, 1.0, 0.0, -20.0, 0.0, 1.0]);
        let cell = grid.cell_for_region(&Region::new(50, 0, 100, 0), &shifted);
        assert_eq!(cell, grid.cell_for(100.0, -20.0));

        let cell = grid.cell_for_region(&Region::new(0, 0, 200, 200), &identity);
        assert_eq!(cell, grid.cell_for(100.0, 100.0));
        assert_eq!(cell.y, 0);
    }

    #[test]
    fn global_image_transform_matches_grid() {
        let grid = two_degree_grid();
        let t = grid.image_to_map_transform();
        let region = Region::new(200 * 5, 200 * 7, 200, 200);
        assert_eq!(grid.cell_for_region(&region, &t), GridCell::new(5, 7));
    }
}
