//! Raster access contract and an in-memory raster product
//!
//! Decoding real satellite formats is left to collaborators; they plug in by
//! implementing [`RasterSource`]. [`InMemoryRaster`] is the implementation
//! used for patch sub-products, tests and plain image inputs.

use std::path::Path;

use image::{DynamicImage, GenericImageView};
use log::{debug, info};

use super::region::Region;
use super::statistics::Statistics;
use crate::coordinate::GeoTransform;
use crate::errors::{FexError, FexResult};

/// Read access to a named, multi-band raster product
pub trait RasterSource: Send + Sync {
    /// Product name, used to name the patch archive
    fn name(&self) -> &str;

    /// Raster width in pixels
    fn width(&self) -> u32;

    /// Raster height in pixels
    fn height(&self) -> u32;

    /// Names of all bands in product order
    fn band_names(&self) -> Vec<String>;

    /// Read the samples of one band over a rectangle
    fn read_tile(&self, band: &str, region: Region) -> FexResult<Tile>;

    /// Pixel to map transform, if the product is georeferenced
    fn geo_transform(&self) -> Option<GeoTransform> {
        None
    }

    /// Check whether a band exists
    fn has_band(&self, band: &str) -> bool {
        self.band_names().iter().any(|b| b == band)
    }

    /// Copy a rectangle of every band into a new in-memory product
    fn subset(&self, region: Region) -> FexResult<InMemoryRaster> {
        let mut product = InMemoryRaster::new("patch", region.width, region.height);
        for band in self.band_names() {
            let tile = self.read_tile(&band, region)?;
            product.add_band_with_no_data(&band, tile.data, tile.no_data)?;
        }
        if let Some(t) = self.geo_transform() {
            let origin = t.pixel_to_geo(region.x as f64, region.y as f64);
            let c = t.coefficients();
            product.geo_transform = Some(GeoTransform::new([origin.x, c[1], c[2], origin.y, c[4], c[5]]));
        }
        Ok(product)
    }
}

/// Samples of one band over a rectangle, row-major
#[derive(Debug, Clone)]
pub struct Tile {
    /// Area of the source raster covered by the tile
    pub region: Region,
    /// Sample values, `region.width * region.height` long
    pub data: Vec<f64>,
    /// Sample value marking missing data
    pub no_data: Option<f64>,
}

impl Tile {
    pub fn width(&self) -> u32 {
        self.region.width
    }

    pub fn height(&self) -> u32 {
        self.region.height
    }

    /// Sample at tile-local coordinates
    pub fn get(&self, x: u32, y: u32) -> Option<f64> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        self.data.get((y * self.width() + x) as usize).copied()
    }

    /// A sample is valid unless it is NaN or equals the no-data value
    pub fn is_valid(&self, value: f64) -> bool {
        !value.is_nan() && self.no_data.map_or(true, |nd| value != nd)
    }

    /// Number of valid samples
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| self.is_valid(**v)).count()
    }

    /// Statistics over the valid samples
    pub fn statistics(&self) -> Statistics {
        let valid: Vec<f64> = self.data.iter().copied().filter(|v| self.is_valid(*v)).collect();
        Statistics::compute(&valid)
    }
}

/// One band of an in-memory raster
#[derive(Debug, Clone)]
pub struct Band {
    pub name: String,
    pub data: Vec<f64>,
    pub no_data: Option<f64>,
}

/// A raster product held entirely in memory
#[derive(Debug, Clone)]
pub struct InMemoryRaster {
    name: String,
    width: u32,
    height: u32,
    bands: Vec<Band>,
    /// Pixel to map transform
    pub geo_transform: Option<GeoTransform>,
}

impl InMemoryRaster {
    /// Create an empty product
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        InMemoryRaster {
            name: name.to_string(),
            width,
            height,
            bands: Vec::new(),
            geo_transform: None,
        }
    }

    /// Rename the product
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Attach a pixel to map transform
    pub fn with_geo_transform(mut self, transform: GeoTransform) -> Self {
        self.geo_transform = Some(transform);
        self
    }

    /// Add a band; the data must cover the full raster
    pub fn add_band(&mut self, name: &str, data: Vec<f64>) -> FexResult<()> {
        self.add_band_with_no_data(name, data, None)
    }

    /// Add a band with a no-data value
    pub fn add_band_with_no_data(&mut self, name: &str, data: Vec<f64>, no_data: Option<f64>) -> FexResult<()> {
        let expected = self.width as usize * self.height as usize;
        if data.len() != expected {
            return Err(FexError::Configuration(format!(
                "Band '{}' has {} samples, expected {} for a {}x{} raster",
                name, data.len(), expected, self.width, self.height)));
        }
        if self.band(name).is_some() {
            return Err(FexError::Configuration(format!("Duplicate band '{}'", name)));
        }
        self.bands.push(Band { name: name.to_string(), data, no_data });
        Ok(())
    }

    /// Band by exact name
    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    /// All bands in product order
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Load a product from an image file
    ///
    /// Grey images become a single `gray` band, colour images become
    /// `red`, `green` and `blue` bands. The product is named after the
    /// file stem.
    pub fn from_image_file(path: &Path) -> FexResult<Self> {
        info!("Loading raster from {}", path.display());
        let image = image::open(path)?;
        let name = path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "product".to_string());
        Self::from_image(&name, &image)
    }

    /// Build a product from a decoded image
    pub fn from_image(name: &str, image: &DynamicImage) -> FexResult<Self> {
        let (width, height) = image.dimensions();
        let mut raster = InMemoryRaster::new(name, width, height);

        if image.color().has_color() {
            let rgb = image.to_rgb8();
            for (channel, band_name) in ["red", "green", "blue"].iter().enumerate() {
                let data = rgb.pixels().map(|p| p[channel] as f64).collect();
                raster.add_band(band_name, data)?;
            }
        } else {
            let gray = image.to_luma32f();
            let scale = match image {
                DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_) => 255.0,
                DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => 65535.0,
                _ => 1.0,
            };
            let data = gray.pixels().map(|p| (p[0] as f64 * scale).round()).collect();
            raster.add_band("gray", data)?;
        }

        debug!("Raster '{}' {}x{} with {} band(s)", name, width, height, raster.bands.len());
        Ok(raster)
    }
}

impl RasterSource for InMemoryRaster {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }

    fn read_tile(&self, band: &str, region: Region) -> FexResult<Tile> {
        let source = self.band(band)
            .ok_or_else(|| FexError::Configuration(format!("Band '{}' not found in '{}'", band, self.name)))?;

        if !region.fits_within(self.width, self.height) {
            return Err(FexError::GenericError(format!(
                "Region {:?} exceeds raster bounds {}x{}", region, self.width, self.height)));
        }

        let mut data = Vec::with_capacity(region.area() as usize);
        for y in region.y..region.end_y() {
            let start = (y * self.width + region.x) as usize;
            data.extend_from_slice(&source.data[start..start + region.width as usize]);
        }

        Ok(Tile { region, data, no_data: source.no_data })
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_transform
    }
}
