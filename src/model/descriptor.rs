//! Dataset descriptor
//!
//! Declares the feature-type schema of one application. Stored next to an
//! archive or index as `ds-descriptor.xml`:
//!
//! ```xml
//! <DatasetDescriptor>
//!     <name>AlgalBloom</name>
//!     <version>1.0</version>
//!     <featureTypes>
//!         <featureType name="chl" valueType="StatisticsGroup">
//!             <description>Chlorophyll</description>
//!             <attribute name="mean" description="Mean"/>
//!         </featureType>
//!     </featureTypes>
//! </DatasetDescriptor>
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::debug;

use super::feature::{effective_feature_types, AttributeType, FeatureType, ValueType};
use crate::errors::{FexError, FexResult};
use crate::utils::xml_utils::{parse_xml, XmlBuilder};

/// File name of a descriptor stored with an archive or index
pub const DESCRIPTOR_FILE_NAME: &str = "ds-descriptor.xml";

const ROOT: &str = "DatasetDescriptor";

/// Feature schema of an application
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetDescriptor {
    pub name: String,
    pub version: String,
    feature_types: Vec<FeatureType>,
}

impl DatasetDescriptor {
    /// Create a descriptor; feature type names must be unique
    pub fn new(name: &str, version: &str, feature_types: Vec<FeatureType>) -> FexResult<Self> {
        let mut seen = HashSet::new();
        for t in &feature_types {
            if !seen.insert(t.name.as_str()) {
                return Err(FexError::Configuration(format!(
                    "Duplicate feature type '{}' in descriptor '{}'", t.name, name)));
            }
        }
        Ok(DatasetDescriptor {
            name: name.to_string(),
            version: version.to_string(),
            feature_types,
        })
    }

    pub fn feature_types(&self) -> &[FeatureType] {
        &self.feature_types
    }

    /// Feature type by name
    pub fn feature_type(&self, name: &str) -> Option<&FeatureType> {
        self.feature_types.iter().find(|t| t.name == name)
    }

    /// Flattened record types, optionally restricted to a feature set
    pub fn effective_feature_types(&self, allowed: Option<&HashSet<String>>) -> Vec<FeatureType> {
        effective_feature_types(&self.feature_types, allowed)
    }

    /// Read a descriptor file
    pub fn read(path: &Path) -> FexResult<Self> {
        debug!("Reading dataset descriptor {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_xml(&text, &path.display().to_string())
    }

    /// Write the descriptor to a file
    pub fn write(&self, path: &Path) -> FexResult<()> {
        fs::write(path, self.to_xml()?)?;
        Ok(())
    }

    /// Parse descriptor XML
    ///
    /// # Arguments
    /// * `xml` - Document text
    /// * `location` - Document name for error messages
    pub fn from_xml(xml: &str, location: &str) -> FexResult<Self> {
        let root = parse_xml(xml, location)?;
        if root.name != ROOT {
            return Err(FexError::format(location, format!(
                "Expected root element <{}>, found <{}>", ROOT, root.name)));
        }

        let name = root.child_text("name")
            .ok_or_else(|| FexError::format(location, "Missing <name>"))?;
        let version = root.child_text("version").unwrap_or("1.0");

        let mut feature_types = Vec::new();
        if let Some(list) = root.child("featureTypes") {
            for element in list.children_named("featureType") {
                let type_name = element.attribute("name")
                    .ok_or_else(|| FexError::format(location, "featureType without name"))?;
                let value_type: ValueType = element.attribute("valueType")
                    .ok_or_else(|| FexError::format(location, format!(
                        "featureType '{}' without valueType", type_name)))?
                    .parse()
                    .map_err(|e: FexError| FexError::format(location, e.to_string()))?;
                let description = element.child_text("description").unwrap_or("");

                let attributes: Vec<AttributeType> = element.children_named("attribute")
                    .filter_map(|a| a.attribute("name")
                        .map(|n| AttributeType::new(n, a.attribute("description").unwrap_or(""))))
                    .collect();

                feature_types.push(FeatureType {
                    name: type_name.to_string(),
                    description: description.to_string(),
                    value_type,
                    attributes,
                });
            }
        }

        Self::new(name, version, feature_types)
            .map_err(|e| FexError::format(location, e.to_string()))
    }

    /// Render descriptor XML
    pub fn to_xml(&self) -> FexResult<String> {
        let mut xml = XmlBuilder::new(DESCRIPTOR_FILE_NAME)?;
        xml.start(ROOT, &[])?;
        xml.text_element("name", &self.name)?;
        xml.text_element("version", &self.version)?;
        xml.start("featureTypes", &[])?;
        for t in &self.feature_types {
            xml.start("featureType", &[("name", t.name.as_str()), ("valueType", t.value_type.as_str())])?;
            xml.text_element("description", &t.description)?;
            for attr in &t.attributes {
                xml.empty("attribute", &[("name", attr.name.as_str()), ("description", attr.description.as_str())])?;
            }
            xml.end("featureType")?;
        }
        xml.end("featureTypes")?;
        xml.end(ROOT)?;
        xml.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> DatasetDescriptor {
        DatasetDescriptor::new("AlgalBloom", "1.1", vec![
            FeatureType::new("product", "Source product", ValueType::Text),
            FeatureType::statistics("chl", "Chlorophyll & pigments"),
            FeatureType::new("rgb", "RGB quicklook", ValueType::Image),
        ]).unwrap()
    }

    #[test]
    fn xml_round_trip() {
        let ds = descriptor();
        let xml = ds.to_xml().unwrap();
        let back = DatasetDescriptor::from_xml(&xml, "mem").unwrap();
        assert_eq!(back, ds);
        assert_eq!(back.feature_type("chl").unwrap().attributes.len(), 10);
        assert_eq!(back.effective_feature_types(None).len(), 12);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DESCRIPTOR_FILE_NAME);
        descriptor().write(&path).unwrap();
        assert_eq!(DatasetDescriptor::read(&path).unwrap(), descriptor());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dup = DatasetDescriptor::new("X", "1", vec![
            FeatureType::new("a", "", ValueType::Number),
            FeatureType::new("a", "", ValueType::Text),
        ]);
        assert!(dup.is_err());
    }

    #[test]
    fn malformed_documents_are_format_errors() {
        assert!(matches!(DatasetDescriptor::from_xml("<Other/>", "f.xml"),
                         Err(FexError::Format { .. })));
        let no_type = "<DatasetDescriptor><name>X</name><featureTypes>\
                       <featureType name=\"a\"/></featureTypes></DatasetDescriptor>";
        assert!(matches!(DatasetDescriptor::from_xml(no_type, "f.xml"),
                         Err(FexError::Format { .. })));
    }
}
