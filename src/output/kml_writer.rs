//! KML overview of a product's quicklooks
//!
//! Writes one `<feature>-overview.kml` per image feature. Every patch
//! quicklook becomes a ground overlay pinned at the four corners of its
//! sub-product, so the whole product can be browsed in a globe viewer.

use log::debug;

use super::container::OutputContainer;
use super::default_writer::PartWriter;
use crate::coordinate::{GeoTransform, Point};
use crate::errors::FexResult;
use crate::extractor::RasterSource;
use crate::model::{Feature, FeatureType, Patch, ValueType};
use crate::utils::xml_utils::XmlBuilder;

const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
const KML_EXT_NAMESPACE: &str = "http://www.google.com/kml/ext/2.2";

/// Name of the overview file of an image feature
pub fn overview_file_name(feature_name: &str) -> String {
    format!("{}-overview.kml", feature_name)
}

/// Writes the KML overviews of georeferenced products
#[derive(Default)]
pub struct KmlPartWriter {
    source_transform: Option<GeoTransform>,
    /// Open documents keyed by image feature name
    documents: Vec<(String, XmlBuilder)>,
}

impl KmlPartWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Corner positions of a patch, counter-clockwise from the lower left
    ///
    /// The sub-product's own transform is used when the patch carries one,
    /// otherwise the source transform shifted to the patch window.
    fn corners(&self, patch: &Patch) -> Option<[Point; 4]> {
        let region = patch.region();
        let (transform, x0, y0) = match patch.product().and_then(|p| p.geo_transform) {
            Some(transform) => (transform, 0.0, 0.0),
            None => (self.source_transform?, region.x as f64, region.y as f64),
        };
        let x1 = x0 + region.width as f64;
        let y1 = y0 + region.height as f64;
        Some([
            transform.pixel_to_geo(x0, y1),
            transform.pixel_to_geo(x1, y1),
            transform.pixel_to_geo(x1, y0),
            transform.pixel_to_geo(x0, y0),
        ])
    }
}

fn write_overlay(xml: &mut XmlBuilder, patch: &Patch, feature_name: &str, corners: &[Point; 4]) -> FexResult<()> {
    let patch_name = patch.patch_name();
    xml.start("GroundOverlay", &[])?;
    xml.text_element("name", &patch_name)?;
    if let Some(cell) = patch.grid_cell {
        xml.text_element("description", &format!("Grid cell {}", cell))?;
    }
    xml.start("Icon", &[])?;
    xml.text_element("href", &format!("{}/{}.png", patch_name, feature_name))?;
    xml.end("Icon")?;
    xml.start("gx:LatLonQuad", &[])?;
    let coordinates: Vec<String> = corners.iter().map(|p| format!("{},{}", p.lon(), p.lat())).collect();
    xml.text_element("coordinates", &coordinates.join(" "))?;
    xml.end("gx:LatLonQuad")?;
    xml.end("GroundOverlay")
}

impl PartWriter for KmlPartWriter {
    fn initialize(&mut self, _container: &mut OutputContainer, source: &dyn RasterSource,
                  feature_types: &[FeatureType]) -> FexResult<()> {
        self.documents.clear();
        self.source_transform = source.geo_transform();
        if self.source_transform.is_none() {
            debug!("Product '{}' is not georeferenced, no KML overview written", source.name());
            return Ok(());
        }

        for feature_type in feature_types.iter().filter(|t| t.value_type == ValueType::Image) {
            let mut xml = XmlBuilder::new(&overview_file_name(&feature_type.name))?;
            xml.start("kml", &[("xmlns", KML_NAMESPACE), ("xmlns:gx", KML_EXT_NAMESPACE)])?;
            xml.start("Document", &[])?;
            xml.text_element("name", source.name())?;
            xml.text_element("description", &format!("{} quicklooks of {}", feature_type.name, source.name()))?;
            self.documents.push((feature_type.name.clone(), xml));
        }
        Ok(())
    }

    fn write_patch(&mut self, _container: &mut OutputContainer, patch: &Patch, features: &[Feature]) -> FexResult<()> {
        if self.documents.is_empty() {
            return Ok(());
        }
        let corners = match self.corners(patch) {
            Some(corners) => corners,
            None => return Ok(()),
        };
        for feature in features.iter().filter(|f| f.image().is_some()) {
            if let Some((_, xml)) = self.documents.iter_mut().find(|(name, _)| name.as_str() == feature.name()) {
                write_overlay(xml, patch, feature.name(), &corners)?;
            }
        }
        Ok(())
    }

    fn close(&mut self, container: &mut OutputContainer) -> FexResult<()> {
        for (feature_name, mut xml) in self.documents.drain(..) {
            xml.end("Document")?;
            xml.end("kml")?;
            let text = xml.finish()?;
            container.write_file(&overview_file_name(&feature_name), text.as_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate::GridCell;
    use crate::extractor::{InMemoryRaster, Region};
    use crate::model::FeatureValue;
    use crate::utils::xml_utils::parse_xml;
    use image::{DynamicImage, GrayImage};
    use std::sync::Arc;

    fn quicklook(feature_type: &FeatureType) -> Feature {
        let image = DynamicImage::ImageLuma8(GrayImage::new(2, 2));
        Feature::new(feature_type.clone(), FeatureValue::Image(image)).unwrap()
    }

    #[test]
    fn overlays_follow_patch_corners() {
        let dir = tempfile::tempdir().unwrap();
        let mut container = OutputContainer::directory(dir.path()).unwrap();
        let mut source = InMemoryRaster::new("MER_20080713", 4, 4)
            .with_geo_transform(GeoTransform::north_up(10.0, 50.0, 0.5, 0.5));
        source.add_band("b1", vec![0.0; 16]).unwrap();
        let mask = FeatureType::new("mask", "Mask", ValueType::Image);
        let mean = FeatureType::new("mean", "Mean", ValueType::Number);

        let mut writer = KmlPartWriter::new();
        writer.initialize(&mut container, &source, &[mean.clone(), mask.clone()]).unwrap();

        let region = Region::new(2, 0, 2, 2);
        let mut with_product = Patch::new(source.name(), 1, 0, region);
        with_product.set_product(Arc::new(source.subset(region).unwrap()));
        with_product.grid_cell = Some(GridCell::new(95, 20));
        let without_product = Patch::new(source.name(), 0, 0, Region::new(0, 0, 2, 2));
        let number = Feature::new(mean, FeatureValue::Number(1.0)).unwrap();

        writer.write_patch(&mut container, &with_product, &[number, quicklook(&mask)]).unwrap();
        writer.write_patch(&mut container, &without_product, &[quicklook(&mask)]).unwrap();
        writer.close(&mut container).unwrap();
        writer.close(&mut container).unwrap();

        assert!(!dir.path().join("mean-overview.kml").exists());
        let text = std::fs::read_to_string(dir.path().join("mask-overview.kml")).unwrap();
        let kml = parse_xml(&text, "mask-overview.kml").unwrap();
        assert_eq!(kml.attribute("xmlns:gx"), Some(KML_EXT_NAMESPACE));
        let document = kml.child("Document").unwrap();
        assert_eq!(document.child_text("name"), Some("MER_20080713"));

        let overlays: Vec<_> = document.children_named("GroundOverlay").collect();
        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays[0].child_text("name"), Some("x001y000"));
        assert_eq!(overlays[0].child_text("description"), Some("Grid cell x95y20"));
        assert_eq!(overlays[0].child("Icon").unwrap().child_text("href"), Some("x001y000/mask.png"));
        let quad = overlays[0].child("gx:LatLonQuad").unwrap();
        assert_eq!(quad.child_text("coordinates"), Some("11,49 12,49 12,50 11,50"));

        assert_eq!(overlays[1].child_text("description"), None);
        let quad = overlays[1].child("gx:LatLonQuad").unwrap();
        assert_eq!(quad.child_text("coordinates"), Some("10,49 11,49 11,50 10,50"));
    }

    #[test]
    fn plain_images_get_no_overview() {
        let dir = tempfile::tempdir().unwrap();
        let mut container = OutputContainer::directory(dir.path()).unwrap();
        let source = InMemoryRaster::new("scene", 2, 2);
        let mask = FeatureType::new("mask", "Mask", ValueType::Image);

        let mut writer = KmlPartWriter::new();
        writer.initialize(&mut container, &source, &[mask.clone()]).unwrap();
        let patch = Patch::new("scene", 0, 0, Region::new(0, 0, 2, 2));
        writer.write_patch(&mut container, &patch, &[quicklook(&mask)]).unwrap();
        writer.close(&mut container).unwrap();

        assert!(!dir.path().join("mask-overview.kml").exists());
    }
}
