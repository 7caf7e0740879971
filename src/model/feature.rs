//! Feature types and feature values
//!
//! A [`FeatureType`] names and describes one extracted quantity, a
//! [`Feature`] pairs a type with a value whose shape matches the type's
//! [`ValueType`].

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use image::DynamicImage;

use crate::errors::{FexError, FexResult};
use crate::extractor::{InMemoryRaster, Statistics, STATISTICS_ATTRIBUTES};

/// Runtime shape of a feature value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Text,
    Number,
    Image,
    SubProduct,
    StatisticsGroup,
}

impl ValueType {
    /// Name used in descriptor and metadata files
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Text => "Text",
            ValueType::Number => "Number",
            ValueType::Image => "Image",
            ValueType::SubProduct => "SubProduct",
            ValueType::StatisticsGroup => "StatisticsGroup",
        }
    }

    /// Whether values of this type go into the plain-text feature record
    pub fn is_textual(&self) -> bool {
        matches!(self, ValueType::Text | ValueType::Number | ValueType::StatisticsGroup)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = FexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Text" | "String" => Ok(ValueType::Text),
            "Number" | "Double" | "Float" | "Integer" => Ok(ValueType::Number),
            "Image" | "RenderedImage" | "BufferedImage" => Ok(ValueType::Image),
            "SubProduct" | "Product" => Ok(ValueType::SubProduct),
            "StatisticsGroup" => Ok(ValueType::StatisticsGroup),
            other => Err(FexError::format("value type", format!("Unknown value type '{}'", other))),
        }
    }
}

/// One named attribute of a statistics group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeType {
    pub name: String,
    pub description: String,
}

impl AttributeType {
    pub fn new(name: &str, description: &str) -> Self {
        AttributeType {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// The standard statistics attribute set
pub fn statistics_attributes() -> Vec<AttributeType> {
    STATISTICS_ATTRIBUTES.iter()
        .map(|(name, description)| AttributeType::new(name, description))
        .collect()
}

/// Name, description and value shape of one feature
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureType {
    /// Dotted name, unique within an application
    pub name: String,
    pub description: String,
    pub value_type: ValueType,
    /// Attributes of a statistics group; empty for all other types
    pub attributes: Vec<AttributeType>,
}

impl FeatureType {
    /// Create a feature type without attributes
    pub fn new(name: &str, description: &str, value_type: ValueType) -> Self {
        FeatureType {
            name: name.to_string(),
            description: description.to_string(),
            value_type,
            attributes: Vec::new(),
        }
    }

    /// Create a statistics group using the standard attribute set
    pub fn statistics(name: &str, description: &str) -> Self {
        Self::group(name, description, statistics_attributes())
    }

    /// Create a statistics group with explicit attributes
    pub fn group(name: &str, description: &str, attributes: Vec<AttributeType>) -> Self {
        FeatureType {
            name: name.to_string(),
            description: description.to_string(),
            value_type: ValueType::StatisticsGroup,
            attributes,
        }
    }

    pub fn has_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }
}

/// A feature value; its variant must match the feature type's value type
#[derive(Debug, Clone)]
pub enum FeatureValue {
    Text(String),
    Number(f64),
    Image(DynamicImage),
    SubProduct(Arc<InMemoryRaster>),
    StatisticsGroup(Vec<(String, f64)>),
}

impl FeatureValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            FeatureValue::Text(_) => ValueType::Text,
            FeatureValue::Number(_) => ValueType::Number,
            FeatureValue::Image(_) => ValueType::Image,
            FeatureValue::SubProduct(_) => ValueType::SubProduct,
            FeatureValue::StatisticsGroup(_) => ValueType::StatisticsGroup,
        }
    }
}

/// A feature type paired with its value
#[derive(Debug, Clone)]
pub struct Feature {
    feature_type: FeatureType,
    value: FeatureValue,
}

impl Feature {
    /// Create a feature, checking the value shape against the type
    ///
    /// # Returns
    /// The feature, or a configuration error on a shape mismatch
    pub fn new(feature_type: FeatureType, value: FeatureValue) -> FexResult<Self> {
        if value.value_type() != feature_type.value_type {
            return Err(FexError::Configuration(format!(
                "Feature '{}' expects a {} value, got {}",
                feature_type.name, feature_type.value_type, value.value_type())));
        }

        if let FeatureValue::StatisticsGroup(values) = &value {
            let expected = feature_type.attributes.iter().map(|a| a.name.as_str());
            let actual = values.iter().map(|(n, _)| n.as_str());
            if !expected.eq(actual) {
                return Err(FexError::Configuration(format!(
                    "Feature '{}' attribute values do not match its attribute types",
                    feature_type.name)));
            }
        }

        Ok(Feature { feature_type, value })
    }

    /// Statistics group feature built from computed statistics
    pub fn from_statistics(feature_type: FeatureType, stx: &Statistics) -> FexResult<Self> {
        Self::new(feature_type, FeatureValue::StatisticsGroup(stx.attribute_values()))
    }

    pub fn name(&self) -> &str {
        &self.feature_type.name
    }

    pub fn feature_type(&self) -> &FeatureType {
        &self.feature_type
    }

    pub fn value(&self) -> &FeatureValue {
        &self.value
    }

    /// Numeric value, if the feature is a number
    pub fn number(&self) -> Option<f64> {
        match self.value {
            FeatureValue::Number(v) => Some(v),
            _ => None,
        }
    }

    /// Image value, if the feature is an image
    pub fn image(&self) -> Option<&DynamicImage> {
        match &self.value {
            FeatureValue::Image(img) => Some(img),
            _ => None,
        }
    }

    /// Record entries of this feature as (effective name, value text)
    ///
    /// Statistics groups expand into one `<group>.<attr>` entry per attribute;
    /// images and sub-products have no record entries.
    pub fn record_entries(&self) -> Vec<(String, String)> {
        match &self.value {
            FeatureValue::Text(text) => vec![(self.name().to_string(), text.clone())],
            FeatureValue::Number(v) => vec![(self.name().to_string(), format_number(*v))],
            FeatureValue::StatisticsGroup(values) => values.iter()
                .map(|(attr, v)| (format!("{}.{}", self.name(), attr), format_number(*v)))
                .collect(),
            FeatureValue::Image(_) | FeatureValue::SubProduct(_) => Vec::new(),
        }
    }
}

/// Render a number the way feature records store it
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else {
        format!("{}", value)
    }
}

/// Parse a number written by [`format_number`]
pub fn parse_number(text: &str) -> Option<f64> {
    match text.trim() {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

/// Flatten feature types into the types stored in feature records
///
/// Attributed types expand into one type per attribute, named
/// `<group>.<attr>` with number values. Every resulting name is then
/// checked against `allowed`; `None` accepts all names.
///
/// # Arguments
/// * `types` - Declared feature types
/// * `allowed` - Optional set of accepted effective names
pub fn effective_feature_types(types: &[FeatureType], allowed: Option<&HashSet<String>>) -> Vec<FeatureType> {
    let accept = |name: &str| allowed.map_or(true, |set| set.contains(name));
    let mut effective = Vec::new();

    for feature_type in types {
        if feature_type.has_attributes() {
            for attr in &feature_type.attributes {
                let name = format!("{}.{}", feature_type.name, attr.name);
                if accept(&name) {
                    effective.push(FeatureType::new(&name, &attr.description, ValueType::Number));
                }
            }
        } else if accept(&feature_type.name) {
            effective.push(feature_type.clone());
        }
    }

    effective
}

/// Effective types that hold numbers, in declaration order
pub fn numeric_feature_types(types: &[FeatureType], allowed: Option<&HashSet<String>>) -> Vec<FeatureType> {
    effective_feature_types(types, allowed)
        .into_iter()
        .filter(|t| t.value_type == ValueType::Number)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_shape_must_match_type() {
        let number = FeatureType::new("flood.pct", "", ValueType::Number);
        assert!(Feature::new(number.clone(), FeatureValue::Number(0.5)).is_ok());
        assert!(matches!(Feature::new(number, FeatureValue::Text("x".into())),
                         Err(FexError::Configuration(_))));
    }

    #[test]
    fn statistics_group_attributes_are_checked() {
        let stx_type = FeatureType::statistics("sigma0", "SAR backscatter");
        let stx = Statistics::compute(&[1.0, 2.0, 3.0]);
        let feature = Feature::from_statistics(stx_type.clone(), &stx).unwrap();
        assert_eq!(feature.record_entries().len(), 10);
        assert_eq!(feature.record_entries()[0], ("sigma0.mean".to_string(), "2".to_string()));

        let wrong = FeatureValue::StatisticsGroup(vec![("mean".into(), 1.0)]);
        assert!(Feature::new(stx_type, wrong).is_err());
    }

    #[test]
    fn effective_types_flatten_groups() {
        let types = vec![
            FeatureType::new("product", "", ValueType::Text),
            FeatureType::statistics("chl", ""),
            FeatureType::new("rgb", "", ValueType::Image),
        ];
        let all = effective_feature_types(&types, None);
        assert_eq!(all.len(), 12);
        assert_eq!(all[1].name, "chl.mean");
        assert_eq!(all[1].value_type, ValueType::Number);

        let allowed: HashSet<String> = ["chl.mean", "chl.p90"].iter().map(|s| s.to_string()).collect();
        let some = effective_feature_types(&types, Some(&allowed));
        let names: Vec<&str> = some.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["chl.mean", "chl.p90"]);

        assert_eq!(numeric_feature_types(&types, None).len(), 10);
    }

    #[test]
    fn numbers_round_trip_through_text() {
        for v in [0.0, -1.5, 1e-9, 123456.789] {
            assert_eq!(parse_number(&format_number(v)), Some(v));
        }
        assert!(parse_number("NaN").unwrap().is_nan());
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn value_type_names_parse() {
        assert_eq!("Number".parse::<ValueType>().unwrap(), ValueType::Number);
        assert_eq!("Double".parse::<ValueType>().unwrap(), ValueType::Number);
        assert!("Blob".parse::<ValueType>().is_err());
    }
}
