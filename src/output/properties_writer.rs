//! Property-file output
//!
//! Writes `fex-metadata.txt` describing the feature types once per product,
//! followed by any extra writer properties, and a `features.txt` record into
//! every patch directory.

use std::fmt::Write;

use super::container::OutputContainer;
use super::default_writer::PartWriter;
use crate::errors::FexResult;
use crate::extractor::RasterSource;
use crate::model::{features_to_text, Feature, FeatureType, Patch};
use crate::utils::string_utils::write_property;

/// Per-product metadata file name
pub const METADATA_FILE_NAME: &str = "fex-metadata.txt";
/// Per-patch feature record file name
pub const FEATURES_FILE_NAME: &str = "features.txt";

/// Writes the feature metadata and per-patch records
#[derive(Debug, Default)]
pub struct PropertiesPatchWriter {
    /// Extra writer properties copied into the metadata file
    extra: Vec<(String, String)>,
}

impl PropertiesPatchWriter {
    pub fn new(extra: Vec<(String, String)>) -> Self {
        PropertiesPatchWriter { extra }
    }

    fn metadata_text(&self, feature_types: &[FeatureType]) -> String {
        let mut out = feature_types_text(feature_types);
        if !self.extra.is_empty() {
            out.push_str("#\n# Writer properties\n#\n");
            for (key, value) in &self.extra {
                write_property(&mut out, key, value);
            }
        }
        out
    }
}

/// Render the feature type metadata text
pub fn feature_types_text(feature_types: &[FeatureType]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "featureTypes.length = {}", feature_types.len());
    for (i, t) in feature_types.iter().enumerate() {
        let _ = writeln!(out, "#\n# Feature '{}'\n#", t.name);
        let _ = writeln!(out, "featureTypes.{}.name = {}", i, t.name);
        let _ = writeln!(out, "featureTypes.{}.description = {}", i, t.description);
        if t.has_attributes() {
            let _ = writeln!(out, "featureTypes.{}.attributeTypes.length = {}", i, t.attributes.len());
            for (j, attr) in t.attributes.iter().enumerate() {
                let _ = writeln!(out, "featureTypes.{}.attributeTypes.{}.name = {}", i, j, attr.name);
                let _ = writeln!(out, "featureTypes.{}.attributeTypes.{}.description = {}", i, j, attr.description);
                let _ = writeln!(out, "featureTypes.{}.attributeTypes.{}.valueType = Number", i, j);
            }
        } else {
            let _ = writeln!(out, "featureTypes.{}.valueType = {}", i, t.value_type);
        }
    }
    out
}

impl PartWriter for PropertiesPatchWriter {
    fn initialize(&mut self, container: &mut OutputContainer, _source: &dyn RasterSource,
                  feature_types: &[FeatureType]) -> FexResult<()> {
        container.write_file(METADATA_FILE_NAME, self.metadata_text(feature_types).as_bytes())
    }

    fn write_patch(&mut self, container: &mut OutputContainer, patch: &Patch, features: &[Feature]) -> FexResult<()> {
        let path = format!("{}/{}", patch.patch_name(), FEATURES_FILE_NAME);
        container.write_file(&path, features_to_text(features).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueType;

    #[test]
    fn metadata_lists_types_and_attributes() {
        let text = feature_types_text(&[
            FeatureType::new("patch", "Patch product", ValueType::SubProduct),
            FeatureType::statistics("chl", "Chlorophyll"),
        ]);
        assert!(text.starts_with("featureTypes.length = 2\n#\n# Feature 'patch'\n#\n"));
        assert!(text.contains("featureTypes.0.valueType = SubProduct\n"));
        assert!(text.contains("featureTypes.1.attributeTypes.length = 10\n"));
        assert!(text.contains("featureTypes.1.attributeTypes.8.name = skewness\n"));
    }

    #[test]
    fn extra_properties_follow_the_types() {
        let writer = PropertiesPatchWriter::new(vec![("mission".to_string(), "MERIS".to_string())]);
        let text = writer.metadata_text(&[FeatureType::new("pct", "Coverage", ValueType::Number)]);
        assert!(text.ends_with("# Writer properties\n#\nmission = MERIS\n"));
        assert!(!PropertiesPatchWriter::default().metadata_text(&[]).contains("Writer properties"));
    }
}
