//! Patch sub-product output
//!
//! A patch's sub-product is stored as a `patch.dim` XML header next to a
//! `patch.data/` directory holding one raw `<band>.img` file per band.
//! Samples are written row-major as big-endian 32-bit floats.

use byteorder::{BigEndian, WriteBytesExt};

use super::container::OutputContainer;
use super::default_writer::PartWriter;
use crate::errors::FexResult;
use crate::extractor::{InMemoryRaster, RasterSource};
use crate::model::{format_number, Feature, FeatureType, FeatureValue, Patch};
use crate::utils::xml_utils::XmlBuilder;

/// Header file name of a patch sub-product
pub const PRODUCT_FILE_NAME: &str = "patch.dim";
/// Directory holding the band files of a patch sub-product
pub const PRODUCT_DATA_DIR: &str = "patch.data";

/// Writes the sub-product features of each patch
#[derive(Debug, Default)]
pub struct ProductPartWriter;

impl ProductPartWriter {
    pub fn new() -> Self {
        ProductPartWriter
    }
}

/// Render the `patch.dim` header of a sub-product
pub fn product_header(product: &InMemoryRaster) -> FexResult<String> {
    let location = product.name().to_string();
    let mut xml = XmlBuilder::new(&location)?;
    xml.start("Dimap_Document", &[("name", product.name())])?;
    xml.text_element("DATASET_NAME", product.name())?;

    xml.start("Raster_Dimensions", &[])?;
    xml.text_element("NCOLS", &product.width().to_string())?;
    xml.text_element("NROWS", &product.height().to_string())?;
    xml.text_element("NBANDS", &product.bands().len().to_string())?;
    xml.end("Raster_Dimensions")?;

    if let Some(transform) = product.geo_transform() {
        let coefficients = transform.coefficients()
            .iter()
            .map(|c| format_number(*c))
            .collect::<Vec<_>>()
            .join(",");
        xml.text_element("Geoposition", &coefficients)?;
    }

    xml.start("Image_Interpretation", &[])?;
    for (index, band) in product.bands().iter().enumerate() {
        xml.start("Spectral_Band_Info", &[])?;
        xml.text_element("BAND_INDEX", &index.to_string())?;
        xml.text_element("BAND_NAME", &band.name)?;
        xml.text_element("DATA_TYPE", "float32")?;
        xml.text_element("DATA_FILE", &band_file(&band.name))?;
        if let Some(no_data) = band.no_data {
            xml.text_element("NO_DATA_VALUE", &format_number(no_data))?;
        }
        xml.end("Spectral_Band_Info")?;
    }
    xml.end("Image_Interpretation")?;

    xml.end("Dimap_Document")?;
    xml.finish()
}

fn band_file(band: &str) -> String {
    format!("{}/{}.img", PRODUCT_DATA_DIR, band)
}

/// Encode band samples as big-endian f32
pub fn encode_band(data: &[f64]) -> FexResult<Vec<u8>> {
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for value in data {
        bytes.write_f32::<BigEndian>(*value as f32)?;
    }
    Ok(bytes)
}

impl PartWriter for ProductPartWriter {
    fn write_patch(&mut self, container: &mut OutputContainer, patch: &Patch, features: &[Feature]) -> FexResult<()> {
        let dir = patch.patch_name();
        for feature in features {
            if let FeatureValue::SubProduct(product) = feature.value() {
                container.write_file(&format!("{}/{}", dir, PRODUCT_FILE_NAME),
                                     product_header(product)?.as_bytes())?;
                for band in product.bands() {
                    container.write_file(&format!("{}/{}", dir, band_file(&band.name)),
                                         &encode_band(&band.data)?)?;
                }
            }
        }
        Ok(())
    }

    fn initialize(&mut self, _container: &mut OutputContainer, _source: &dyn RasterSource,
                  _feature_types: &[FeatureType]) -> FexResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::xml_utils::parse_xml;

    #[test]
    fn header_lists_bands() {
        let mut product = InMemoryRaster::new("x001y002", 2, 1);
        product.add_band("b1", vec![1.0, 2.0]).unwrap();
        product.add_band_with_no_data("b2", vec![0.0, 5.0], Some(0.0)).unwrap();

        let root = parse_xml(&product_header(&product).unwrap(), "test").unwrap();
        assert_eq!(root.child("Raster_Dimensions").unwrap().child_text("NCOLS"), Some("2"));
        let bands: Vec<_> = root.child("Image_Interpretation").unwrap()
            .children_named("Spectral_Band_Info")
            .map(|b| b.child_text("DATA_FILE").unwrap().to_string())
            .collect();
        assert_eq!(bands, vec!["patch.data/b1.img", "patch.data/b2.img"]);
    }

    #[test]
    fn band_samples_are_big_endian_floats() {
        let bytes = encode_band(&[1.0, -2.5]).unwrap();
        assert_eq!(bytes, vec![0x3f, 0x80, 0, 0, 0xc0, 0x20, 0, 0]);
    }
}
