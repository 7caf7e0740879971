//! Patch model
//!
//! A patch is one window of a source product together with the features
//! computed for it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::feature::{parse_number, Feature, FeatureType, FeatureValue, ValueType};
use crate::coordinate::GridCell;
use crate::errors::{FexError, FexResult};
use crate::extractor::{InMemoryRaster, Region};
use crate::utils::string_utils::{parse_properties, property, write_property};

static NEXT_UID: AtomicU64 = AtomicU64::new(0);

/// Relevance label assigned during relevance feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchLabel {
    #[default]
    None,
    Relevant,
    Irrelevant,
}

/// Identity of a patch within an archive
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchId {
    pub product: String,
    pub x: u32,
    pub y: u32,
}

impl PatchId {
    pub fn new(product: &str, x: u32, y: u32) -> Self {
        PatchId { product: product.to_string(), x, y }
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product, patch_name(self.x, self.y))
    }
}

/// Directory name of a patch in the current archive layout
pub fn patch_name(x: u32, y: u32) -> String {
    format!("x{:03}y{:03}", x, y)
}

/// One patch and its features
#[derive(Debug, Clone)]
pub struct Patch {
    uid: u64,
    parent_product_name: String,
    patch_x: u32,
    patch_y: u32,
    region: Region,
    /// Global grid cell, when the source product is georeferenced
    pub grid_cell: Option<GridCell>,
    features: Vec<Feature>,
    product: Option<Arc<InMemoryRaster>>,
    /// Relevance label
    pub label: PatchLabel,
    /// Distance assigned by a similarity query or classifier
    pub distance: f64,
}

impl Patch {
    /// Create a patch; every patch gets a process-unique id
    ///
    /// # Arguments
    /// * `parent_product_name` - Name of the source product
    /// * `patch_x` - Column index of the patch
    /// * `patch_y` - Row index of the patch
    /// * `region` - Pixel window in the source product
    pub fn new(parent_product_name: &str, patch_x: u32, patch_y: u32, region: Region) -> Self {
        Patch {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            parent_product_name: parent_product_name.to_string(),
            patch_x,
            patch_y,
            region,
            grid_cell: None,
            features: Vec::new(),
            product: None,
            label: PatchLabel::None,
            distance: 0.0,
        }
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn parent_product_name(&self) -> &str {
        &self.parent_product_name
    }

    pub fn patch_x(&self) -> u32 {
        self.patch_x
    }

    pub fn patch_y(&self) -> u32 {
        self.patch_y
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn id(&self) -> PatchId {
        PatchId::new(&self.parent_product_name, self.patch_x, self.patch_y)
    }

    /// Name of the patch directory, `x%03dy%03d`
    pub fn patch_name(&self) -> String {
        patch_name(self.patch_x, self.patch_y)
    }

    /// Attach the extracted sub-product
    pub fn set_product(&mut self, product: Arc<InMemoryRaster>) {
        self.product = Some(product);
    }

    pub fn product(&self) -> Option<&Arc<InMemoryRaster>> {
        self.product.as_ref()
    }

    /// Release the sub-product
    pub fn dispose_product(&mut self) {
        self.product = None;
    }

    pub fn add_feature(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn set_features(&mut self, features: Vec<Feature>) {
        self.features = features;
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Feature by name
    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name() == name)
    }

    /// Render the plain-text feature record
    pub fn features_as_text(&self) -> String {
        features_to_text(&self.features)
    }

    /// Numeric feature values for the given effective types
    ///
    /// Statistics groups are looked up by their `<group>.<attr>` names.
    /// Missing values are NaN.
    pub fn numeric_vector(&self, types: &[FeatureType]) -> Vec<f64> {
        let entries: Vec<(String, f64)> = self.features.iter()
            .flat_map(|f| match f.value() {
                FeatureValue::Number(v) => vec![(f.name().to_string(), *v)],
                FeatureValue::StatisticsGroup(values) => values.iter()
                    .map(|(attr, v)| (format!("{}.{}", f.name(), attr), *v))
                    .collect(),
                _ => Vec::new(),
            })
            .collect();

        types.iter()
            .map(|t| entries.iter()
                .find(|(name, _)| *name == t.name)
                .map_or(f64::NAN, |(_, v)| *v))
            .collect()
    }
}

/// Render features in record form, one `name = value` line per entry
pub fn features_to_text(features: &[Feature]) -> String {
    let mut text = String::new();
    for feature in features {
        for (name, value) in feature.record_entries() {
            write_property(&mut text, &name, &value);
        }
    }
    text
}

/// Read a feature record back into features
///
/// Feature types absent from the record are skipped. A statistics group is
/// restored when at least one of its attributes is present; missing
/// attributes become NaN. Image and sub-product types are never part of a
/// record.
///
/// # Arguments
/// * `text` - Record text
/// * `types` - Declared feature types
/// * `location` - Record location for error messages
pub fn parse_features_text(text: &str, types: &[FeatureType], location: &str) -> FexResult<Vec<Feature>> {
    let properties = parse_properties(text);
    let mut features = Vec::new();

    let number = |key: &str, raw: &str| -> FexResult<f64> {
        parse_number(raw).ok_or_else(|| FexError::format(
            location, format!("Invalid number '{}' for '{}'", raw, key)))
    };

    for feature_type in types {
        let value = match feature_type.value_type {
            ValueType::Text => property(&properties, &feature_type.name)
                .map(|v| FeatureValue::Text(v.to_string())),
            ValueType::Number => match property(&properties, &feature_type.name) {
                Some(raw) => Some(FeatureValue::Number(number(&feature_type.name, raw)?)),
                None => None,
            },
            ValueType::StatisticsGroup => {
                let mut values = Vec::with_capacity(feature_type.attributes.len());
                let mut found = false;
                for attr in &feature_type.attributes {
                    let key = format!("{}.{}", feature_type.name, attr.name);
                    let v = match property(&properties, &key) {
                        Some(raw) => {
                            found = true;
                            number(&key, raw)?
                        }
                        None => f64::NAN,
                    };
                    values.push((attr.name.clone(), v));
                }
                if found { Some(FeatureValue::StatisticsGroup(values)) } else { None }
            }
            ValueType::Image | ValueType::SubProduct => None,
        };

        if let Some(value) = value {
            features.push(Feature::new(feature_type.clone(), value)?);
        }
    }

    Ok(features)
}
