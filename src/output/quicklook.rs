//! Quicklook rendering
//!
//! Turns band tiles into small preview images for visual inspection of
//! patches during retrieval.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage};

use crate::errors::FexResult;
use crate::extractor::{Comparison, Tile};

/// Grey image of a tile, linearly stretched between its valid min and max
///
/// Invalid samples are rendered black.
pub fn render_grey(tile: &Tile) -> DynamicImage {
    let stx = tile.statistics();
    let image: GrayImage = ImageBuffer::from_fn(tile.width(), tile.height(), |x, y| {
        let value = tile.get(x, y).unwrap_or(f64::NAN);
        Luma([stretch(tile, value, stx.min, stx.max)])
    });
    DynamicImage::ImageLuma8(image)
}

/// Black and white image of the samples passing a threshold test
pub fn render_mask(tile: &Tile, threshold: f64, comparison: Comparison) -> DynamicImage {
    let image: GrayImage = ImageBuffer::from_fn(tile.width(), tile.height(), |x, y| {
        let pass = tile.get(x, y).map_or(false, |v| comparison.test(v, threshold));
        Luma([if pass { 255 } else { 0 }])
    });
    DynamicImage::ImageLuma8(image)
}

/// Colour composite of three equally sized tiles, each stretched on its own
pub fn render_rgb(red: &Tile, green: &Tile, blue: &Tile) -> DynamicImage {
    let ranges: Vec<(f64, f64)> = [red, green, blue].iter()
        .map(|t| {
            let stx = t.statistics();
            (stx.min, stx.max)
        })
        .collect();

    let image: RgbImage = ImageBuffer::from_fn(red.width(), red.height(), |x, y| {
        let mut pixel = [0u8; 3];
        for (i, tile) in [red, green, blue].iter().enumerate() {
            let value = tile.get(x, y).unwrap_or(f64::NAN);
            pixel[i] = stretch(tile, value, ranges[i].0, ranges[i].1);
        }
        Rgb(pixel)
    });
    DynamicImage::ImageRgb8(image)
}

fn stretch(tile: &Tile, value: f64, min: f64, max: f64) -> u8 {
    if !tile.is_valid(value) || !(max > min) {
        return 0;
    }
    (((value - min) / (max - min)) * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Encode an image as PNG
pub fn encode_png(image: &DynamicImage) -> FexResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
