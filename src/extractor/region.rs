//! Region structure for defining patch windows
//!
//! This module defines the Region structure that specifies a rectangular
//! area of a raster in pixel coordinates, where (0,0) is the top-left
//! corner of the raster.

/// Region of a raster (in pixel coordinates)
///
/// Represents a rectangular area defined by its top-left corner coordinates
/// and dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// X-coordinate of the top-left corner (pixels from left)
    pub x: u32,

    /// Y-coordinate of the top-left corner (pixels from top)
    pub y: u32,

    /// Width of the region in pixels
    pub width: u32,

    /// Height of the region in pixels
    pub height: u32,
}

impl Region {
    /// Create a new region
    ///
    /// # Arguments
    /// * `x` - X-coordinate of the top-left corner
    /// * `y` - Y-coordinate of the top-left corner
    /// * `width` - Width of the region in pixels
    /// * `height` - Height of the region in pixels
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Region { x, y, width, height }
    }

    /// Get the rightmost X coordinate (exclusive)
    pub fn end_x(&self) -> u32 {
        self.x + self.width
    }

    /// Get the bottommost Y coordinate (exclusive)
    pub fn end_y(&self) -> u32 {
        self.y + self.height
    }

    /// Number of pixels covered by the region
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the region lies fully inside a raster of the given size
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.end_x() <= width && self.end_y() <= height
    }

    /// Cut a raster into a row-major sequence of patch windows
    ///
    /// Windows at the right and bottom borders are clipped to the raster,
    /// so they may be smaller than the requested patch size. They are kept,
    /// never padded or dropped.
    ///
    /// # Arguments
    /// * `width` - Raster width in pixels
    /// * `height` - Raster height in pixels
    /// * `patch_width` - Nominal window width
    /// * `patch_height` - Nominal window height
    ///
    /// # Returns
    /// The windows, each paired with its (column, row) index in the patch raster
    pub fn tile(width: u32, height: u32, patch_width: u32, patch_height: u32) -> Vec<((u32, u32), Region)> {
        if patch_width == 0 || patch_height == 0 {
            return Vec::new();
        }

        let mut windows = Vec::new();
        let mut y = 0;
        while y < height {
            let h = patch_height.min(height - y);
            let mut x = 0;
            while x < width {
                let w = patch_width.min(width - x);
                windows.push(((x / patch_width, y / patch_height), Region::new(x, y, w, h)));
                x += patch_width;
            }
            y += patch_height;
        }
        windows
    }
}
